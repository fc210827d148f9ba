//! Infrastructure layer for Drafter.
//!
//! Configuration loading and in-memory implementations of the session,
//! template and theme server APIs.

pub mod config_service;
pub mod memory;
pub mod paths;

pub use crate::config_service::ConfigService;
pub use crate::memory::{InMemorySessionApi, InMemoryTemplateApi, InMemoryThemeApi};
pub use crate::paths::DrafterPaths;
