// HTTP client for the game API.
//
// A single cookie-backed `reqwest::Client` holds the login session, so the
// authenticated endpoints (my-team, picks, transfers) work after `login`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::types::{Bootstrap, Fixture, GameweekPicks, Me, MyTeam};
use super::{FplError, Submission, TransferSubmitter, UpstreamSource};
use crate::engine::payload::TransferPayload;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_API_URL: &str = "https://fantasy.premierleague.com/api";
const LOGIN_URL: &str = "https://users.premierleague.com/accounts/login/";
const LOGIN_REDIRECT: &str = "https://fantasy.premierleague.com/";
const LOGIN_APP: &str = "plfpl-web";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// ---------------------------------------------------------------------------
// FplClient
// ---------------------------------------------------------------------------

pub struct FplClient {
    http: reqwest::Client,
    api_url: String,
    login_url: String,
}

impl FplClient {
    pub fn new() -> Result<Self, FplError> {
        Self::with_urls(DEFAULT_API_URL, LOGIN_URL)
    }

    /// Build a client against explicit endpoints (tests point these at a
    /// local listener).
    pub fn with_urls(api_url: &str, login_url: &str) -> Result<Self, FplError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| FplError::Http {
                url: api_url.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            login_url: login_url.to_string(),
        })
    }

    /// Log in with account credentials and verify the session against
    /// `/me/`.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), FplError> {
        let form = [
            ("login", email),
            ("password", password),
            ("redirect_uri", LOGIN_REDIRECT),
            ("app", LOGIN_APP),
        ];
        self.http
            .post(&self.login_url)
            .form(&form)
            .send()
            .await
            .map_err(|source| FplError::Http {
                url: self.login_url.clone(),
                source,
            })?;

        let url = self.url("me/");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| FplError::Http {
                url: url.clone(),
                source,
            })?;
        if resp.status().as_u16() != 200 {
            return Err(FplError::Authentication(format!(
                "session check returned status {}; check credentials",
                resp.status()
            )));
        }
        info!("Logged in and session verified");
        Ok(())
    }

    pub async fn me(&self) -> Result<Me, FplError> {
        self.get_json("me/").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FplError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| FplError::Http {
                url: url.clone(),
                source,
            })?;
        let body = read_success_body(&url, resp).await?;
        serde_json::from_str(&body).map_err(|source| FplError::Decode { url, source })
    }
}

/// Read a response body, turning non-2xx statuses into `FplError::Status`.
async fn read_success_body(url: &str, resp: reqwest::Response) -> Result<String, FplError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|source| FplError::Http {
        url: url.to_string(),
        source,
    })?;
    if !status.is_success() {
        return Err(FplError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[async_trait]
impl UpstreamSource for FplClient {
    async fn bootstrap(&self) -> Result<Bootstrap, FplError> {
        self.get_json("bootstrap-static/").await
    }

    async fn fixtures(&self) -> Result<Vec<Fixture>, FplError> {
        self.get_json("fixtures/").await
    }

    async fn my_team(&self, entry: u64) -> Result<MyTeam, FplError> {
        self.get_json(&format!("my-team/{entry}/")).await
    }

    async fn gameweek_picks(
        &self,
        entry: u64,
        gameweek: u32,
    ) -> Result<GameweekPicks, FplError> {
        self.get_json(&format!("entry/{entry}/event/{gameweek}/picks/"))
            .await
    }
}

#[async_trait]
impl TransferSubmitter for FplClient {
    async fn submit_transfers(&self, payload: &TransferPayload) -> Result<Submission, FplError> {
        if payload.transfers.is_empty() {
            info!("Transfer payload is empty, nothing submitted");
            return Ok(Submission::NothingToSubmit);
        }
        let url = self.url("transfers/");
        let resp = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|source| FplError::Http {
                url: url.clone(),
                source,
            })?;
        let status = resp.status().as_u16();
        read_success_body(&url, resp).await?;
        Ok(Submission::Accepted { status })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a local port and return the
    /// base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        });
        format!("http://{addr}/api")
    }

    #[tokio::test]
    async fn fixtures_decode_from_server() {
        let base = serve_once(
            "200 OK",
            r#"[{"event": 4, "team_h": 1, "team_a": 2, "team_h_difficulty": 3, "team_a_difficulty": 4},
                {"event": null, "team_h": 5, "team_a": 6, "team_h_difficulty": 2, "team_a_difficulty": 2}]"#,
        )
        .await;
        let client = FplClient::with_urls(&base, "http://127.0.0.1:9/login").unwrap();
        let fixtures = client.fixtures().await.unwrap();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].event, Some(4));
        assert_eq!(fixtures[1].event, None);
        assert_eq!(fixtures[0].team_a_difficulty, Some(4));
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let base = serve_once("403 Forbidden", r#"{"detail":"nope"}"#).await;
        let client = FplClient::with_urls(&base, "http://127.0.0.1:9/login").unwrap();
        let err = client.my_team(42).await.unwrap_err();
        match err {
            FplError::Status { status, body, url } => {
                assert_eq!(status, 403);
                assert!(body.contains("nope"));
                assert!(url.ends_with("my-team/42/"));
            }
            other => panic!("expected Status error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_payload_is_not_sent() {
        // Nothing listens on the discard port; a request would fail.
        let client = FplClient::with_urls("http://127.0.0.1:9/api", "http://127.0.0.1:9/login").unwrap();
        let payload = TransferPayload {
            chips: None,
            entry: 1,
            event: 2,
            transfers: vec![],
        };
        let result = client.submit_transfers(&payload).await.unwrap();
        assert_eq!(result, Submission::NothingToSubmit);
    }

    #[tokio::test]
    async fn rejected_submission_carries_status_and_body() {
        let base = serve_once("400 Bad Request", r#"{"non_form_errors":["Insufficient funds"]}"#).await;
        let client = FplClient::with_urls(&base, "http://127.0.0.1:9/login").unwrap();
        let payload = TransferPayload {
            chips: None,
            entry: 1,
            event: 2,
            transfers: vec![crate::engine::payload::TransferRecord {
                element_in: 3,
                element_out: 4,
                purchase_price: 50,
                selling_price: 45,
            }],
        };
        match client.submit_transfers(&payload).await.unwrap_err() {
            FplError::Status { status, body, .. } => {
                assert_eq!(status, 400);
                assert!(body.contains("Insufficient funds"));
            }
            other => panic!("expected Status error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let base = serve_once("200 OK", "not json").await;
        let client = FplClient::with_urls(&base, "http://127.0.0.1:9/login").unwrap();
        let err = client.bootstrap().await.unwrap_err();
        assert!(matches!(err, FplError::Decode { .. }));
    }
}
