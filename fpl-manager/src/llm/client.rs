// Claude API streaming client using reqwest-eventsource.
//
// Sends one message to the Anthropic Messages API with `stream: true`,
// accumulates the text deltas of the Server-Sent Events, and returns the
// full reply. `LlmClient` routes the recommendation gateway to the
// configured provider.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm::gemini::GeminiClient;
use crate::llm::prompt::system_prompt;
use crate::llm::recommendation::{
    parse_recommendation, GatewayError, Recommendation, RecommendationGateway,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// Errors and results
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum LlmError {
    #[error("API key not configured")]
    NotConfigured,

    #[error("failed to create event source: {0}")]
    EventSource(String),

    #[error("{0}")]
    Stream(String),

    #[error("stream ended unexpectedly without any content")]
    EmptyResponse,

    #[error("{0}")]
    Request(String),
}

/// A finished reply with its token usage.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// ---------------------------------------------------------------------------
// ClaudeClient
// ---------------------------------------------------------------------------

/// Low-level Claude API streaming client.
pub struct ClaudeClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl ClaudeClient {
    /// Create a new client with the given API key and model identifier.
    pub fn new(api_key: String, model: String, max_tokens: u32, temperature: f64) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key,
            model,
            max_tokens,
            temperature,
        }
    }

    /// Point the client at another Messages endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Send a message and collect the streamed reply.
    pub async fn complete(&self, system: &str, user_content: &str) -> Result<Completion, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": true,
            "system": system,
            "messages": [{ "role": "user", "content": user_content }]
        });

        let request = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let mut es = request
            .eventsource()
            .map_err(|e| LlmError::EventSource(e.to_string()))?;

        let mut full_text = String::new();
        let mut input_tokens: u32 = 0;
        let mut output_tokens: u32 = 0;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("SSE connection opened");
                }
                Ok(Event::Message(msg)) => {
                    let data = &msg.data;
                    match msg.event.as_str() {
                        "message_start" => {
                            match parse_input_tokens(data) {
                                Some(n) => input_tokens = n,
                                None => warn!("failed to parse input_tokens from message_start"),
                            }
                            debug!(input_tokens, "message_start");
                        }
                        "content_block_delta" => {
                            if let Some(text) = parse_delta_text(data) {
                                full_text.push_str(&text);
                            }
                        }
                        "message_delta" => {
                            match parse_output_tokens(data) {
                                Some(n) => output_tokens = n,
                                None => warn!("failed to parse output_tokens from message_delta"),
                            }
                        }
                        "message_stop" => {
                            debug!("message_stop, streaming complete");
                            es.close();
                            return Ok(Completion {
                                text: full_text,
                                input_tokens,
                                output_tokens,
                            });
                        }
                        // Ignore ping, content_block_start, content_block_stop, etc.
                        other => {
                            debug!(event_type = other, "ignoring SSE event");
                        }
                    }
                }
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    es.close();
                    return Err(LlmError::Stream(extract_error_message(&err)));
                }
            }
        }

        // Stream ended without message_stop.
        if full_text.is_empty() {
            Err(LlmError::EmptyResponse)
        } else {
            Ok(Completion {
                text: full_text,
                input_tokens,
                output_tokens,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Provider routing
// ---------------------------------------------------------------------------

/// Which recommendation backend `[llm]` talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    Gemini,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider `{0}` (expected anthropic or gemini)")]
pub struct UnknownProvider(pub String);

impl FromStr for LlmProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // `claude` is accepted as an alias of the Anthropic backend.
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            "gemini" => Ok(LlmProvider::Gemini),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// The configured recommendation backend, or disabled when its key is missing.
pub enum LlmClient {
    Claude(ClaudeClient),
    Gemini(GeminiClient),
    /// No API key for the selected provider; every request fails as unavailable.
    Disabled,
}

impl LlmClient {
    /// Build the client for `config.llm.provider` from that provider's key.
    pub fn from_config(config: &Config) -> Self {
        let llm = &config.llm;
        let key = match llm.provider {
            LlmProvider::Anthropic => config.credentials.anthropic_api_key.as_ref(),
            LlmProvider::Gemini => config.credentials.gemini_api_key.as_ref(),
        };
        let Some(key) = key.filter(|k| !k.is_empty()).cloned() else {
            return LlmClient::Disabled;
        };
        match llm.provider {
            LlmProvider::Anthropic => LlmClient::Claude(ClaudeClient::new(
                key,
                llm.model.clone(),
                llm.max_tokens,
                llm.temperature,
            )),
            LlmProvider::Gemini => LlmClient::Gemini(GeminiClient::new(
                key,
                llm.model.clone(),
                llm.max_tokens,
                llm.temperature,
            )),
        }
    }
}

#[async_trait]
impl RecommendationGateway for LlmClient {
    async fn recommend(&self, prompt: &str) -> Result<Recommendation, GatewayError> {
        let system = system_prompt();
        let completion = match self {
            LlmClient::Claude(client) => client.complete(&system, prompt).await,
            LlmClient::Gemini(client) => client.complete(&system, prompt).await,
            LlmClient::Disabled => {
                return Err(GatewayError::Unavailable("LLM not configured".to_string()))
            }
        }
        .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        info!(
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            "recommendation received"
        );
        parse_recommendation(&completion.text)
    }
}

// ---------------------------------------------------------------------------
// SSE JSON parsing helpers
// ---------------------------------------------------------------------------

/// Extract `input_tokens` from a `message_start` event's JSON.
///
/// Expected shape: `{ "type": "message_start", "message": { "usage": { "input_tokens": N } } }`
pub(crate) fn parse_input_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("message")?
        .get("usage")?
        .get("input_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

/// Extract `delta.text` from a `content_block_delta` event's JSON.
pub(crate) fn parse_delta_text(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("delta")?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract `output_tokens` from a `message_delta` event's JSON.
pub(crate) fn parse_output_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("usage")?
        .get("output_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

/// Extract a human-readable error message from an SSE error.
fn extract_error_message(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            format!("API returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => {
            format!("Network error: {e}")
        }
        other => format!("Stream error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
