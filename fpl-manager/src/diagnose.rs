// Account access diagnostic: log in, ask the server which entry belongs to
// the account, then try to read that entry's team.

use anyhow::Context;
use tracing::{error, info};

use crate::config::Config;
use crate::fpl::client::FplClient;
use crate::fpl::UpstreamSource;

/// Outcome of each diagnostic step, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticStep {
    Login,
    /// The server-confirmed entry id.
    Me { entry: u64 },
    MyTeam { entry: u64, picks: usize },
}

/// Run the diagnostic. Stops at the first failing step; the error says which
/// step it was.
pub async fn run(config: &Config) -> anyhow::Result<Vec<DiagnosticStep>> {
    let creds = &config.credentials;
    let (Some(email), Some(password)) = (&creds.fpl_email, &creds.fpl_password) else {
        anyhow::bail!("FPL credentials not configured (set FPL_EMAIL and FPL_PASSWORD)");
    };
    let client = FplClient::new().context("failed to build HTTP client")?;
    diagnose(&client, email, password, config.manager.team_id).await
}

pub async fn diagnose(
    client: &FplClient,
    email: &str,
    password: &str,
    configured_entry: u64,
) -> anyhow::Result<Vec<DiagnosticStep>> {
    let mut steps = Vec::new();

    client
        .login(email, password)
        .await
        .context("step 1: login and session check failed; check your credentials")?;
    info!("Step 1: login and session succeeded");
    steps.push(DiagnosticStep::Login);

    let me = client.me().await.context("step 2: fetching /api/me/ failed")?;
    let Some(entry) = me.player.and_then(|p| p.entry) else {
        anyhow::bail!(
            "step 2: /api/me/ has no player entry; finish setting up your team for the season"
        );
    };
    info!("Step 2: server confirms entry id {entry}");
    if entry != configured_entry {
        error!(
            configured = configured_entry,
            confirmed = entry,
            "configured team_id does not match the account"
        );
    }
    steps.push(DiagnosticStep::Me { entry });

    let team = client
        .my_team(entry)
        .await
        .with_context(|| format!("step 3: fetching team for confirmed entry {entry} failed"))?;
    info!(picks = team.picks.len(), "Step 3: team data fetched");
    steps.push(DiagnosticStep::MyTeam {
        entry,
        picks: team.picks.len(),
    });

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers each connection with the next canned (status, body) pair.
    async fn serve(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn all_steps_succeed() {
        let base = serve(vec![
            (200, "{}"),
            (200, "{}"),
            (200, r#"{"player":{"entry":77}}"#),
            (200, r#"{"picks":[{"element":1},{"element":2}],"transfers":null}"#),
        ])
        .await;
        let client = FplClient::with_urls(&base, &format!("{base}/login")).unwrap();

        let steps = diagnose(&client, "a@b.c", "pw", 77).await.unwrap();
        assert_eq!(
            steps,
            vec![
                DiagnosticStep::Login,
                DiagnosticStep::Me { entry: 77 },
                DiagnosticStep::MyTeam { entry: 77, picks: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn account_without_team_stops_at_step_two() {
        let base = serve(vec![(200, "{}"), (200, "{}"), (200, r#"{"player":null}"#)]).await;
        let client = FplClient::with_urls(&base, &format!("{base}/login")).unwrap();

        let err = diagnose(&client, "a@b.c", "pw", 77).await.unwrap_err();
        assert!(err.to_string().contains("step 2"));
    }

    #[tokio::test]
    async fn rejected_session_stops_at_step_one() {
        let base = serve(vec![(200, "{}"), (403, "{}")]).await;
        let client = FplClient::with_urls(&base, &format!("{base}/login")).unwrap();

        let err = diagnose(&client, "a@b.c", "bad", 77).await.unwrap_err();
        assert!(err.to_string().contains("step 1"));
    }
}
