//! Application configuration model.
//!
//! Loaded from `config.toml` by the infrastructure layer. Every section and
//! field has a default, so a partial or missing file is valid.

use crate::search::DEFAULT_MAX_MATCHES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Debounce applied to session saves unless configured otherwise.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 800;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DrafterConfig {
    pub save: SaveConfig,
    pub search: SearchConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SaveConfig {
    pub debounce_ms: u64,
    /// How many sessions a session-list refresh asks for.
    pub list_limit: usize,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            list_limit: 50,
        }
    }
}

impl SaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub max_matches: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model name sent to the backend. Generation is disabled when unset.
    pub model: Option<String>,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub system_prompt: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            system_prompt: None,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DrafterConfig = toml::from_str(
            r#"
            [save]
            debounce_ms = 250

            [generation]
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(config.save.debounce(), Duration::from_millis(250));
        assert_eq!(config.save.list_limit, 50);
        assert_eq!(config.search.max_matches, DEFAULT_MAX_MATCHES);
        assert_eq!(config.generation.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.generation.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.logging.level, "info");
    }
}
