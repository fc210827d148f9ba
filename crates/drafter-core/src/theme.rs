//! Editor themes.
//!
//! Themes are opaque to Drafter: the CSS is stored and versioned but never
//! interpreted here.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A named stylesheet a session can render with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub name: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub css: String,
}

/// Server-side storage for themes, keyed by name and version-guarded.
#[async_trait]
pub trait ThemeApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Theme>>;
    async fn get(&self, name: &str) -> Result<Theme>;
    async fn create(&self, theme: Theme) -> Result<Theme>;
    async fn update(&self, theme: Theme, expected_version: u64) -> Result<Theme>;
    async fn delete(&self, name: &str, expected_version: u64) -> Result<()>;
}
