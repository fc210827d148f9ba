//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Writing session record, payload, patch and saved snapshot
//! - `settings`: Sampling settings (`GenerationSettings`)
//! - `repository`: Trait for the server-side session API
//!
//! # Usage
//!
//! ```ignore
//! use drafter_core::session::{SessionApi, SessionPayload, WritingSession};
//! ```

mod model;
mod repository;
mod settings;

pub use model::{
    CURRENT_SCHEMA_VERSION, SavedSnapshot, SessionPatch, SessionPayload, WritingSession,
};
pub use repository::SessionApi;
pub use settings::GenerationSettings;
