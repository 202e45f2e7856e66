// Manual-approval notifications.
//
// Used when a recommendation would cost points and the manager runs in
// hybrid mode: the recommendation goes to a human instead of the API.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::llm::recommendation::Recommendation;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no notification channel configured")]
    NotConfigured,

    #[error("failed to send notification: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification service returned status {0}")]
    Status(u16),

    #[error("failed to encode recommendation: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sends a recommendation to a human for manual approval.
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    async fn request_approval(
        &self,
        recommendation: &Recommendation,
        points_hit: u32,
    ) -> Result<(), NotifyError>;
}

/// Body of the approval message.
pub fn format_approval_message(
    recommendation: &Recommendation,
    points_hit: u32,
) -> Result<String, serde_json::Error> {
    Ok(format!(
        "FPL Manager: manual approval required.\n\
         The recommended transfers cost a -{points_hit} points hit.\n\n\
         Recommendations:\n{}",
        serde_json::to_string_pretty(recommendation)?
    ))
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: TELEGRAM_API_URL.to_string(),
            bot_token,
            chat_id,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifier wrapper
// ---------------------------------------------------------------------------

/// Either a configured Telegram channel or disabled.
pub enum Notifier {
    Telegram(TelegramNotifier),
    Disabled,
}

impl Notifier {
    /// `Telegram` when both bot token and chat id are configured.
    pub fn from_config(config: &Config) -> Self {
        let creds = &config.credentials;
        match (&creds.telegram_bot_token, &creds.telegram_chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Notifier::Telegram(TelegramNotifier::new(token.clone(), chat.clone()))
            }
            _ => Notifier::Disabled,
        }
    }
}

#[async_trait]
impl ApprovalNotifier for Notifier {
    async fn request_approval(
        &self,
        recommendation: &Recommendation,
        points_hit: u32,
    ) -> Result<(), NotifyError> {
        match self {
            Notifier::Telegram(telegram) => {
                let text = format_approval_message(recommendation, points_hit)?;
                telegram.send(&text).await?;
                info!("Approval request sent");
                Ok(())
            }
            Notifier::Disabled => Err(NotifyError::NotConfigured),
        }
    }
}
