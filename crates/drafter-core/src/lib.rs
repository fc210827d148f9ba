//! Domain layer for Drafter.
//!
//! Pure models and algorithms shared by every other crate: writing sessions
//! and their server API, prompt templates with message extraction and
//! fill-in-the-middle rendering, generation plans and requests, bounded
//! search/replace and per-session generation history.

pub mod config;
pub mod error;
pub mod generation;
pub mod history;
pub mod plan;
pub mod search;
pub mod session;
pub mod template;
pub mod theme;

// Re-export common error type
pub use error::{DrafterError, Result};
