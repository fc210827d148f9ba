//! Template API trait.

use super::model::Template;
use crate::error::Result;
use async_trait::async_trait;

/// Server-side storage for prompt templates, keyed by name.
///
/// Updates and deletes are guarded by the template's `version` just like
/// session writes.
#[async_trait]
pub trait TemplateApi: Send + Sync {
    /// Lists all templates.
    async fn list(&self) -> Result<Vec<Template>>;

    /// Fetches one template by name.
    async fn get(&self, name: &str) -> Result<Template>;

    /// Creates a template. The returned copy carries its first version.
    async fn create(&self, template: Template) -> Result<Template>;

    /// Replaces a template if the server still holds `expected_version`.
    async fn update(&self, template: Template, expected_version: u64) -> Result<Template>;

    /// Deletes a template if the server still holds `expected_version`.
    async fn delete(&self, name: &str, expected_version: u64) -> Result<()>;
}
