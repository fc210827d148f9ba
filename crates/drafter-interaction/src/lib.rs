//! Generation backends for Drafter.
//!
//! Implementations of [`drafter_core::generation::GenerationBackend`] that
//! talk to remote language models.

pub mod openai_stream_backend;
pub mod sse;

pub use openai_stream_backend::OpenAIStreamBackend;
