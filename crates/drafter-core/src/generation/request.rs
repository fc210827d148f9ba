//! Generation request assembly.

use super::message::ChatMessage;
use crate::session::GenerationSettings;
use serde::{Deserialize, Serialize};

/// Sampling parameters as sent to a backend.
///
/// Optional fields are omitted from the request when the session leaves
/// them at their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl From<&GenerationSettings> for SamplingParams {
    fn from(settings: &GenerationSettings) -> Self {
        let non_zero = |v: f64| (v != 0.0).then_some(v);
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_token_count(),
            top_p: settings.top_p,
            top_k: settings.effective_top_k(),
            seed: settings.seed,
            stop: (!settings.stop.is_empty()).then(|| settings.stop.clone()),
            presence_penalty: non_zero(settings.presence_penalty),
            frequency_penalty: non_zero(settings.frequency_penalty),
        }
    }
}

/// Everything a backend needs to stream a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub params: SamplingParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}
