// Response schema of the recommendation gateway and its strict parser.
//
// The model must answer with one JSON object carrying a `transfers` list.
// The only tolerated wrapping is a single Markdown code fence around the
// whole reply; anything else is rejected as unparsable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Longest slice of a rejected reply kept for diagnostics.
const EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// The gateway could not be reached or is not configured.
    #[error("recommendation service unavailable: {0}")]
    Unavailable(String),

    /// The reply did not match the recommendation schema.
    #[error("unparsable recommendation ({reason}); reply began: {excerpt:?}")]
    Unparsable { reason: String, excerpt: String },
}

/// One proposed swap, by player display name. Names are unverified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub player_out: String,
    pub player_in: String,
}

/// A structured recommendation. An empty `transfers` list is a valid
/// "do nothing" answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub transfers: Vec<TransferIntent>,
    /// Any further advice the model returned (captaincy, reasoning, ...),
    /// kept for reporting.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recommendation {
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Turns a text request into a recommendation.
#[async_trait]
pub trait RecommendationGateway: Send + Sync {
    async fn recommend(&self, prompt: &str) -> Result<Recommendation, GatewayError>;
}

/// Parse a model reply into a [`Recommendation`].
pub fn parse_recommendation(reply: &str) -> Result<Recommendation, GatewayError> {
    let body = strip_code_fence(reply.trim());
    serde_json::from_str(body).map_err(|e| GatewayError::Unparsable {
        reason: e.to_string(),
        excerpt: reply.chars().take(EXCERPT_LEN).collect(),
    })
}

/// If the whole reply is one fenced block (```json ... ```), return its
/// contents; otherwise return the reply unchanged.
fn strip_code_fence(text: &str) -> &str {
    let Some(after_open) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = after_open.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match inner.split_once('\n') {
        Some((_, rest)) => rest.trim(),
        None => inner.trim(),
    }
}
