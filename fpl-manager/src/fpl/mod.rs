// Game API access: wire models, the HTTP client, and the collaborator
// traits the pipeline depends on so every remote call can be faked.

pub mod client;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::payload::TransferPayload;
use types::{Bootstrap, Fixture, GameweekPicks, MyTeam};

#[derive(Debug, Error)]
pub enum FplError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
}

/// Read-only snapshots of game data.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    async fn bootstrap(&self) -> Result<Bootstrap, FplError>;

    async fn fixtures(&self) -> Result<Vec<Fixture>, FplError>;

    async fn my_team(&self, entry: u64) -> Result<MyTeam, FplError>;

    async fn gameweek_picks(&self, entry: u64, gameweek: u32)
        -> Result<GameweekPicks, FplError>;
}

/// Result of a transfer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted { status: u16 },
    /// The payload carried no transfers, so nothing was sent.
    NothingToSubmit,
}

/// Accepts a transfer payload. Called at most once per run; never retried.
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    async fn submit_transfers(&self, payload: &TransferPayload) -> Result<Submission, FplError>;
}
