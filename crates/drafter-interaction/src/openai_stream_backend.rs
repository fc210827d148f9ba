//! OpenAIStreamBackend - streaming chat completions over HTTP.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (OpenAI,
//! llama.cpp server, vLLM, Ollama's compatibility API, ...).

use crate::sse::{SseDecoder, SseEvent};
use async_trait::async_trait;
use drafter_core::config::GenerationConfig;
use drafter_core::error::{DrafterError, Result};
use drafter_core::generation::{
    ChatMessage, GenerationBackend, GenerationRequest, SamplingParams, TokenStream,
};
use futures::StreamExt;
use futures::channel::mpsc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backend that streams tokens from an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAIStreamBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAIStreamBackend {
    /// Creates a backend for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| DrafterError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    /// Builds a backend from configuration, reading the API key from the
    /// configured environment variable.
    ///
    /// A missing key is allowed: local servers usually do not need one.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::debug!(
                "[OpenAIStreamBackend] {} is not set, sending requests without authorization",
                config.api_key_env
            );
        }
        Self::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_request(&self, body: &ChatCompletionRequest<'_>) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationBackend for OpenAIStreamBackend {
    async fn stream(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<TokenStream> {
        let messages = with_system_prompt(request.messages, request.system_prompt);
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &messages,
            stream: true,
            params: &request.params,
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(DrafterError::StreamAborted),
            response = self.send_request(&body) => response?,
        };

        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(pump_events(response, tx, cancel));
        Ok(rx.boxed())
    }
}

/// Reads the response body and forwards decoded tokens until the stream
/// ends, fails, or is cancelled.
async fn pump_events(
    response: reqwest::Response,
    tx: mpsc::UnboundedSender<Result<String>>,
    cancel: CancellationToken,
) {
    let mut bytes = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("[OpenAIStreamBackend] Stream cancelled");
                let _ = tx.unbounded_send(Err(DrafterError::StreamAborted));
                return;
            }
            chunk = bytes.next() => chunk,
        };

        let finished = chunk.is_none();
        let events = match chunk {
            Some(Ok(chunk)) => decoder.push(&chunk),
            Some(Err(e)) => {
                let _ = tx.unbounded_send(Err(map_transport_error(e)));
                return;
            }
            None => decoder.finish(),
        };

        for event in events {
            match event {
                SseEvent::Token(token) => {
                    if tx.unbounded_send(Ok(token)).is_err() {
                        return;
                    }
                }
                SseEvent::Done => return,
                SseEvent::Error(e) => {
                    let _ = tx.unbounded_send(Err(e));
                    return;
                }
            }
        }

        if finished {
            return;
        }
    }
}

fn with_system_prompt(
    messages: Vec<ChatMessage>,
    system_prompt: Option<String>,
) -> Vec<ChatMessage> {
    match system_prompt.filter(|p| !p.trim().is_empty()) {
        Some(prompt) => std::iter::once(ChatMessage::system(prompt))
            .chain(messages)
            .collect(),
        None => messages,
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(flatten)]
    params: &'a SamplingParams,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn map_transport_error(err: reqwest::Error) -> DrafterError {
    if let Some(status) = err.status() {
        return DrafterError::server(status.as_u16(), err.to_string());
    }
    DrafterError::network(format!("Generation request failed: {err}"))
}

fn map_http_error(status: StatusCode, body: String) -> DrafterError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);
    DrafterError::server(status.as_u16(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drafter_core::session::GenerationSettings;

    #[test]
    fn test_request_body_flattens_params() {
        let messages = vec![ChatMessage::user("Hello")];
        let params = SamplingParams::from(&GenerationSettings {
            seed: Some(42),
            ..Default::default()
        });
        let body = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            stream: true,
            params: &params,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["stream"], true);
        assert_eq!(json["seed"], 42);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("top_k").is_none());
    }

    #[test]
    fn test_system_prompt_is_prepended() {
        let messages = with_system_prompt(
            vec![ChatMessage::user("Hi")],
            Some("You are a novelist.".into()),
        );
        assert_eq!(messages[0], ChatMessage::system("You are a novelist."));
        assert_eq!(messages.len(), 2);

        let messages = with_system_prompt(vec![ChatMessage::user("Hi")], Some("  ".into()));
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_http_error_message_is_extracted() {
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Rate limit reached"}}"#.into(),
        );
        assert_eq!(err, DrafterError::server(429, "Rate limit reached"));
        assert!(err.is_transient());

        let err = map_http_error(StatusCode::BAD_GATEWAY, "upstream down".into());
        assert_eq!(err, DrafterError::server(502, "upstream down"));
    }

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let backend =
            OpenAIStreamBackend::new("http://localhost:8080/v1/", None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
