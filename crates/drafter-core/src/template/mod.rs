//! Prompt templates.
//!
//! # Module Structure
//!
//! - `model`: `Template` and the raw payload it is normalized from
//! - `extractor`: Splits a buffer into role messages using template markers
//! - `fim`: Fill-in-the-middle prompt construction
//! - `repository`: Trait for the server-side template API

mod extractor;
mod fim;
mod model;
mod repository;

pub use extractor::{Extraction, extract_messages};
pub use fim::{FimPrompt, build_fim_prompt, render_fim_template};
pub use model::{RawTemplate, Template};
pub use repository::TemplateApi;
