//! Sampling settings attached to a writing session.

use serde::{Deserialize, Serialize};

/// Sampling parameters used when generating text for a session.
///
/// Equality is structural over every field, including the order of `stop`,
/// and is what the save scheduler uses to decide whether settings changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub top_p: f64,
    /// `0` disables top-k sampling.
    pub top_k: f64,
    pub max_tokens: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub seed: Option<i64>,
    /// Stop sequences, in the order they are sent to the backend.
    pub stop: Vec<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.95,
            top_k: 0.0,
            max_tokens: 512.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            seed: None,
            stop: Vec::new(),
        }
    }
}

impl GenerationSettings {
    /// Returns `max_tokens` as a request-ready count, clamped to at least one.
    pub fn max_token_count(&self) -> u32 {
        if self.max_tokens.is_finite() && self.max_tokens >= 1.0 {
            self.max_tokens.min(u32::MAX as f64) as u32
        } else {
            1
        }
    }

    /// Returns `top_k` when it is set to a positive value.
    pub fn effective_top_k(&self) -> Option<u32> {
        if self.top_k.is_finite() && self.top_k >= 1.0 {
            Some(self.top_k.min(u32::MAX as f64) as u32)
        } else {
            None
        }
    }
}
