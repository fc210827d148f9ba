//! In-memory implementations of the server APIs.
//!
//! Used as a local stand-in for the session server and in tests.

mod catalog;
mod session;

pub use catalog::{InMemoryTemplateApi, InMemoryThemeApi};
pub use session::InMemorySessionApi;
