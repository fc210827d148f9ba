//! Generation domain module.
//!
//! - `message`: Role-tagged chat messages
//! - `request`: Sampling parameters and the backend request
//! - `prompt`: Message construction from a generation plan
//! - `backend`: Trait for streaming language-model backends

mod backend;
mod message;
mod prompt;
mod request;

pub use backend::{GenerationBackend, TokenStream};
pub use message::{ChatMessage, ChatRole};
pub use prompt::{PromptMessages, build_messages};
pub use request::{GenerationRequest, SamplingParams};
