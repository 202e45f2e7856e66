// Integration tests for the FPL manager.
//
// These tests drive a whole run through the library crate's public API with
// in-memory collaborators: data is served from tests/fixtures, and the
// gateway, submitter and notifier record what they were asked to do. They
// check the mode policy, payload construction, the action log and the
// isolation between the decision and summary phases.

use std::sync::Mutex;

use async_trait::async_trait;

use fpl_manager::action_log::SUMMARY_MARKER;
use fpl_manager::app::{run_pipeline, Collaborators, DecisionPhase, RunReport};
use fpl_manager::config::*;
use fpl_manager::engine::decision::{AutonomyMode, DecisionOutcome};
use fpl_manager::engine::payload::{TransferPayload, TransferRecord};
use fpl_manager::fpl::types::{Bootstrap, Fixture, GameweekPicks, MyTeam};
use fpl_manager::fpl::{FplError, Submission, TransferSubmitter, UpstreamSource};
use fpl_manager::llm::client::LlmProvider;
use fpl_manager::llm::recommendation::{
    parse_recommendation, GatewayError, Recommendation, RecommendationGateway,
};
use fpl_manager::notify::{ApprovalNotifier, NotifyError};

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory path (relative to the package root, which is the cwd
/// for `cargo test`).
const FIXTURES: &str = "tests/fixtures";

const TEAM_ID: u64 = 6638986;

fn load_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
    let path = format!("{FIXTURES}/{name}");
    let text = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("{path}: {e}"))
}

/// A config rooted in a fresh temp directory holding the shipped prompt
/// template.
fn inline_config(name: &str, mode: AutonomyMode) -> Config {
    let base_dir = std::env::temp_dir().join(format!(
        "fpl_integration_{name}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&base_dir);
    std::fs::create_dir_all(base_dir.join("config")).unwrap();
    std::fs::copy(
        "defaults/strategy_prompt.txt",
        base_dir.join("config/strategy_prompt.txt"),
    )
    .unwrap();

    Config {
        base_dir,
        manager: ManagerConfig {
            team_id: TEAM_ID,
            mode,
        },
        analysis: AnalysisConfig::default(),
        llm: LlmConfig {
            provider: LlmProvider::Anthropic,
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 4000,
            temperature: 0.1,
            prompt_template: "config/strategy_prompt.txt".into(),
        },
        paths: PathsConfig::default(),
        credentials: CredentialsConfig::default(),
    }
}

fn cleanup(config: &Config) {
    let _ = std::fs::remove_dir_all(&config.base_dir);
}

fn read_log(config: &Config) -> String {
    std::fs::read_to_string(config.action_log_path()).unwrap_or_default()
}

/// Build a recommendation the way the gateway would, from a model reply.
fn recommendation(pairs: &[(&str, &str)]) -> Recommendation {
    let transfers: Vec<serde_json::Value> = pairs
        .iter()
        .map(|(out, inn)| serde_json::json!({"player_out": out, "player_in": inn}))
        .collect();
    let reply = serde_json::json!({
        "transfers": transfers,
        "captain": "Salah",
        "reasoning": "fixtures",
    });
    parse_recommendation(&reply.to_string()).unwrap()
}

// ===========================================================================
// In-memory collaborators
// ===========================================================================

struct FixtureSource;

#[async_trait]
impl UpstreamSource for FixtureSource {
    async fn bootstrap(&self) -> Result<Bootstrap, FplError> {
        Ok(load_fixture("bootstrap.json"))
    }

    async fn fixtures(&self) -> Result<Vec<Fixture>, FplError> {
        Ok(load_fixture("fixtures.json"))
    }

    async fn my_team(&self, _entry: u64) -> Result<MyTeam, FplError> {
        Ok(load_fixture("my_team.json"))
    }

    async fn gameweek_picks(&self, _entry: u64, _gameweek: u32) -> Result<GameweekPicks, FplError> {
        Ok(load_fixture("gameweek_picks.json"))
    }
}

struct ScriptedGateway {
    reply: Result<Recommendation, GatewayError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn returning(reply: Result<Recommendation, GatewayError>) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RecommendationGateway for ScriptedGateway {
    async fn recommend(&self, prompt: &str) -> Result<Recommendation, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

#[derive(Default)]
struct RecordingSubmitter {
    payloads: Mutex<Vec<TransferPayload>>,
    reject: bool,
}

#[async_trait]
impl TransferSubmitter for RecordingSubmitter {
    async fn submit_transfers(&self, payload: &TransferPayload) -> Result<Submission, FplError> {
        self.payloads.lock().unwrap().push(payload.clone());
        if self.reject {
            return Err(FplError::Status {
                url: "https://example.invalid/api/transfers/".into(),
                status: 400,
                body: "{\"non_form_errors\":[\"Insufficient funds\"]}".into(),
            });
        }
        Ok(Submission::Accepted { status: 200 })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    hits: Mutex<Vec<u32>>,
}

#[async_trait]
impl ApprovalNotifier for RecordingNotifier {
    async fn request_approval(
        &self,
        _recommendation: &Recommendation,
        points_hit: u32,
    ) -> Result<(), NotifyError> {
        self.hits.lock().unwrap().push(points_hit);
        Ok(())
    }
}

struct Run {
    gateway: ScriptedGateway,
    submitter: RecordingSubmitter,
    notifier: RecordingNotifier,
}

impl Run {
    fn new(reply: Result<Recommendation, GatewayError>) -> Self {
        Self {
            gateway: ScriptedGateway::returning(reply),
            submitter: RecordingSubmitter::default(),
            notifier: RecordingNotifier::default(),
        }
    }

    fn rejecting(mut self) -> Self {
        self.submitter.reject = true;
        self
    }

    async fn execute(&self, config: &Config) -> RunReport {
        let collab = Collaborators {
            source: &FixtureSource,
            gateway: &self.gateway,
            submitter: &self.submitter,
            notifier: &self.notifier,
        };
        run_pipeline(config, collab).await.expect("run should complete")
    }

    fn submissions(&self) -> Vec<TransferPayload> {
        self.submitter.payloads.lock().unwrap().clone()
    }

    fn approvals(&self) -> Vec<u32> {
        self.notifier.hits.lock().unwrap().clone()
    }
}

fn saka_for_palmer() -> TransferRecord {
    TransferRecord {
        element_in: 7,
        element_out: 5,
        purchase_price: 105,
        selling_price: 98,
    }
}

// ===========================================================================
// Mode policy
// ===========================================================================

#[tokio::test]
async fn suggest_mode_never_submits() {
    let config = inline_config("suggest", AutonomyMode::Suggest);
    let run = Run::new(Ok(recommendation(&[("Saka", "Palmer"), ("Isak", "Wood")])));

    let report = run.execute(&config).await;

    assert!(matches!(
        report.decision,
        DecisionPhase::Completed(DecisionOutcome::Reported { points_hit: 4 })
    ));
    assert!(run.submissions().is_empty());
    assert!(run.approvals().is_empty());

    let log = read_log(&config);
    assert_eq!(log.matches("POINTS HIT").count(), 1);
    assert!(!log.contains("TRANSFER MADE"));

    cleanup(&config);
}

#[tokio::test]
async fn hybrid_mode_executes_free_transfer() {
    let config = inline_config("hybrid_free", AutonomyMode::Hybrid);
    let run = Run::new(Ok(recommendation(&[("Saka", "Palmer")])));

    let report = run.execute(&config).await;

    assert!(matches!(
        report.decision,
        DecisionPhase::Completed(DecisionOutcome::Executed {
            points_hit: 0,
            submitted: 1,
            skipped: 0,
            submission: Submission::Accepted { status: 200 },
        })
    ));
    assert!(run.approvals().is_empty());
    assert_eq!(
        run.submissions(),
        vec![TransferPayload {
            chips: None,
            entry: TEAM_ID,
            event: 3,
            transfers: vec![saka_for_palmer()],
        }]
    );

    let log = read_log(&config);
    assert!(log.contains("TRANSFER MADE: OUT - Saka (5), IN - Palmer (7)"));
    assert!(!log.contains("POINTS HIT"));

    cleanup(&config);
}

#[tokio::test]
async fn hybrid_mode_asks_before_points_hit() {
    let config = inline_config("hybrid_hit", AutonomyMode::Hybrid);
    let run = Run::new(Ok(recommendation(&[("Saka", "Palmer"), ("Isak", "Wood")])));

    let report = run.execute(&config).await;

    assert!(matches!(
        report.decision,
        DecisionPhase::Completed(DecisionOutcome::ApprovalRequested {
            points_hit: 4,
            delivered: true,
        })
    ));
    assert!(run.submissions().is_empty());
    assert_eq!(run.approvals(), vec![4]);
    assert_eq!(read_log(&config).matches("POINTS HIT").count(), 1);

    cleanup(&config);
}

#[tokio::test]
async fn auto_mode_executes_despite_points_hit() {
    let config = inline_config("auto_hit", AutonomyMode::Auto);
    let run = Run::new(Ok(recommendation(&[("Saka", "Palmer"), ("Isak", "Wood")])));

    let report = run.execute(&config).await;

    assert!(matches!(
        report.decision,
        DecisionPhase::Completed(DecisionOutcome::Executed {
            points_hit: 4,
            submitted: 2,
            ..
        })
    ));
    let submissions = run.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(
        submissions[0].transfers,
        vec![
            saka_for_palmer(),
            TransferRecord {
                element_in: 12,
                element_out: 9,
                purchase_price: 70,
                selling_price: 84,
            },
        ]
    );

    let log = read_log(&config);
    assert_eq!(log.matches("POINTS HIT").count(), 1);
    assert_eq!(log.matches("TRANSFER MADE").count(), 2);

    cleanup(&config);
}

// ===========================================================================
// Payload construction
// ===========================================================================

#[tokio::test]
async fn unresolvable_transfers_are_skipped() {
    let config = inline_config("skipped", AutonomyMode::Auto);
    let run = Run::new(Ok(recommendation(&[
        ("Saka", "Palmer"),
        ("Nobody", "Wood"),
        ("Salah", "Ghost"),
        ("Mbeumo", "Wood"),
    ])));

    let report = run.execute(&config).await;

    // Four proposed against one free transfer: 12 points, even though only
    // one survives resolution.
    assert!(matches!(
        report.decision,
        DecisionPhase::Completed(DecisionOutcome::Executed {
            points_hit: 12,
            submitted: 1,
            skipped: 3,
            ..
        })
    ));
    assert_eq!(run.submissions()[0].transfers, vec![saka_for_palmer()]);

    cleanup(&config);
}

#[tokio::test]
async fn empty_recommendation_takes_no_action() {
    let config = inline_config("empty", AutonomyMode::Auto);
    let run = Run::new(Ok(recommendation(&[])));

    let report = run.execute(&config).await;

    assert!(matches!(
        report.decision,
        DecisionPhase::Completed(DecisionOutcome::NoTransfers)
    ));
    assert!(run.submissions().is_empty());
    assert!(run.approvals().is_empty());
    assert_eq!(report.summary.logged, vec![1, 2]);

    cleanup(&config);
}

// ===========================================================================
// Failure isolation
// ===========================================================================

#[tokio::test]
async fn submission_failure_is_reported_and_summary_still_runs() {
    let config = inline_config("rejected", AutonomyMode::Auto);
    let run = Run::new(Ok(recommendation(&[("Saka", "Palmer")]))).rejecting();

    let report = run.execute(&config).await;

    match &report.decision {
        DecisionPhase::DecisionFailed(reason) => {
            assert!(reason.contains("\"element_in\":7"), "payload missing: {reason}");
            assert!(reason.contains("Insufficient funds"), "response missing: {reason}");
        }
        other => panic!("expected DecisionFailed, got {other:?}"),
    }
    // Submitted once, never retried.
    assert_eq!(run.submissions().len(), 1);
    assert_eq!(report.summary.logged, vec![1, 2]);
    assert!(!read_log(&config).contains("TRANSFER MADE"));

    cleanup(&config);
}

#[tokio::test]
async fn gateway_failure_skips_decision_but_not_summary() {
    let config = inline_config("garbled", AutonomyMode::Auto);
    let garbled = parse_recommendation("I think you should sell Saka.").unwrap_err();
    let run = Run::new(Err(garbled));

    let report = run.execute(&config).await;

    assert!(matches!(
        report.decision,
        DecisionPhase::GatewayFailed(GatewayError::Unparsable { .. })
    ));
    assert!(run.submissions().is_empty());
    assert_eq!(report.summary.logged, vec![1, 2]);

    cleanup(&config);
}

// ===========================================================================
// Gameweek summaries
// ===========================================================================

#[tokio::test]
async fn summaries_are_logged_once_across_runs() {
    let config = inline_config("rerun", AutonomyMode::Suggest);
    let run = Run::new(Ok(recommendation(&[])));

    let first = run.execute(&config).await;
    assert_eq!(first.summary.logged, vec![1, 2]);

    let second = run.execute(&config).await;
    assert!(second.summary.logged.is_empty());

    let log = read_log(&config);
    assert_eq!(log.matches(SUMMARY_MARKER).count(), 2);
    assert!(log.contains("Gameweek Summary for GW1:"));
    assert!(log.contains("  - Points: 64"));
    assert!(log.contains("  - Points Deducted: -0"));
    assert!(log.contains("  - Captain: Salah"));
    assert!(log.contains("  - Vice-Captain: Haaland"));
    assert!(log.contains("  - Chip Played: None"));
    assert!(log.contains("  - Bench: Flekken, Isak"));
    assert!(log.lines().all(|l| l.starts_with('[')));

    cleanup(&config);
}

// ===========================================================================
// Prompt construction
// ===========================================================================

#[tokio::test]
async fn prompt_carries_joined_data() {
    let config = inline_config("prompt", AutonomyMode::Suggest);
    let run = Run::new(Ok(recommendation(&[])));

    run.execute(&config).await;

    let prompts = run.gateway.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];

    assert!(prompt.contains("gameweek 3"));
    assert!(prompt.contains("Money in the bank: £2.5m"));
    assert!(prompt.contains("£101.2m"));
    assert!(prompt.contains("Free transfers available: 1"));
    assert!(prompt.contains("Salah (£13.0m, sells £12.8m, LIV)"));
    assert!(prompt.contains("\"ARS\":3"));
    assert!(prompt.contains("\"LIV\": 3.5"));
    assert!(prompt.contains("\"BRE\": 3.0"));
    assert!(prompt.contains("Hamstring - 75% chance of playing\""));
    // Ruled out of the next round.
    assert!(!prompt.contains("Watkins"));

    cleanup(&config);
}
