// One run of the manager: fetch, analyze, consult, decide, summarize.
//
// Fetch failures abort the run before any decision is made. Everything after
// the fetch is isolated per phase, so the gameweek summary still runs when
// the prompt, the gateway or the decision fails.

use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::action_log::ActionLog;
use crate::config::Config;
use crate::data::fixtures::{next_gameweek, summarize_fixture_difficulty};
use crate::data::join::{
    build_name_map, build_team_map, squad_details, summarize_squad, team_distribution,
    top_players_of_interest, PlayerOfInterest, SquadBreakdown, SquadDetails,
};
use crate::engine::decision::{DecisionContext, DecisionEngine, DecisionOutcome};
use crate::fpl::client::FplClient;
use crate::fpl::types::{Bootstrap, Fixture, MyTeam};
use crate::fpl::{TransferSubmitter, UpstreamSource};
use crate::llm::client::LlmClient;
use crate::llm::prompt::{build_prompt, PromptContext};
use crate::llm::recommendation::{GatewayError, RecommendationGateway};
use crate::notify::{ApprovalNotifier, Notifier};
use crate::summary::{run_gameweek_summary, SummaryReport};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// The external systems one run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub source: &'a dyn UpstreamSource,
    pub gateway: &'a dyn RecommendationGateway,
    pub submitter: &'a dyn TransferSubmitter,
    pub notifier: &'a dyn ApprovalNotifier,
}

/// Raw snapshots fetched at the start of a run.
#[derive(Debug, Clone)]
pub struct FetchedData {
    pub bootstrap: Bootstrap,
    pub fixtures: Vec<Fixture>,
    pub my_team: MyTeam,
}

/// Derived views over the fetched data.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub names: HashMap<u32, String>,
    pub squad: SquadDetails,
    pub breakdown: SquadBreakdown,
    pub team_distribution: BTreeMap<String, usize>,
    pub fixture_difficulty: BTreeMap<String, f64>,
    pub players_of_interest: Vec<PlayerOfInterest>,
    pub next_gameweek: Option<u32>,
}

impl Analysis {
    pub fn prompt_context(&self) -> PromptContext<'_> {
        PromptContext {
            squad: &self.squad,
            gameweek: self.next_gameweek,
            breakdown: &self.breakdown,
            team_distribution: &self.team_distribution,
            fixture_difficulty: &self.fixture_difficulty,
            players_of_interest: &self.players_of_interest,
        }
    }
}

/// How far the decision phase got.
#[derive(Debug)]
pub enum DecisionPhase {
    Completed(DecisionOutcome),
    /// The prompt could not be built; the gateway was never consulted.
    PromptFailed(String),
    GatewayFailed(GatewayError),
    DecisionFailed(String),
}

#[derive(Debug)]
pub struct RunReport {
    pub decision: DecisionPhase,
    pub summary: SummaryReport,
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Fetch every snapshot the run needs. Any failure aborts the run.
pub async fn fetch(source: &dyn UpstreamSource, entry: u64) -> anyhow::Result<FetchedData> {
    let bootstrap = source
        .bootstrap()
        .await
        .context("failed to fetch bootstrap data")?;
    let fixtures = source.fixtures().await.context("failed to fetch fixtures")?;
    let my_team = source
        .my_team(entry)
        .await
        .with_context(|| format!("failed to fetch team for entry {entry}"))?;
    info!(
        players = bootstrap.players.len(),
        teams = bootstrap.teams.len(),
        fixtures = fixtures.len(),
        picks = my_team.picks.len(),
        "All data fetched"
    );
    Ok(FetchedData {
        bootstrap,
        fixtures,
        my_team,
    })
}

pub fn analyze(data: &FetchedData, config: &Config) -> Analysis {
    let players = &data.bootstrap.players;
    let names = build_name_map(players);
    let teams = build_team_map(&data.bootstrap.teams);
    let picks = &data.my_team.picks;

    let analysis = Analysis {
        squad: squad_details(&data.my_team, &names),
        breakdown: summarize_squad(picks, players, &teams),
        team_distribution: team_distribution(picks, players, &teams),
        fixture_difficulty: summarize_fixture_difficulty(
            &data.bootstrap.events,
            &data.fixtures,
            &teams,
            config.analysis.fixture_window,
        ),
        players_of_interest: top_players_of_interest(
            players,
            &teams,
            config.analysis.players_of_interest,
        ),
        next_gameweek: next_gameweek(&data.bootstrap.events),
        names,
    };
    info!(
        free_transfers = %analysis.squad.state.free_transfers,
        bank = analysis.squad.state.bank,
        next_gameweek = ?analysis.next_gameweek,
        "Data processed"
    );
    analysis
}

async fn decide(
    config: &Config,
    collab: &Collaborators<'_>,
    data: &FetchedData,
    analysis: &Analysis,
    log: &ActionLog,
) -> DecisionPhase {
    let prompt = match build_prompt(&config.prompt_template_path(), &analysis.prompt_context()) {
        Ok(prompt) => prompt,
        Err(e) => {
            error!("Error building prompt: {e}");
            return DecisionPhase::PromptFailed(e.to_string());
        }
    };

    info!("Prompt created, requesting recommendation");
    let recommendation = match collab.gateway.recommend(&prompt).await {
        Ok(rec) => rec,
        Err(e) => {
            error!("Recommendation failed: {e}");
            return DecisionPhase::GatewayFailed(e);
        }
    };
    info!(transfers = recommendation.transfers.len(), "Recommendation received");

    let engine = DecisionEngine::new(config.manager.mode, collab.submitter, collab.notifier, log);
    let ctx = DecisionContext {
        entry: config.manager.team_id,
        next_gameweek: analysis.next_gameweek,
        players: &data.bootstrap.players,
        picks: &data.my_team.picks,
        state: &analysis.squad.state,
    };
    match engine.handle(&recommendation, &ctx).await {
        Ok(outcome) => DecisionPhase::Completed(outcome),
        Err(e) => {
            error!("Decision phase failed: {e}");
            DecisionPhase::DecisionFailed(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run every phase against the given collaborators.
pub async fn run_pipeline(config: &Config, collab: Collaborators<'_>) -> anyhow::Result<RunReport> {
    let entry = config.manager.team_id;
    let data = fetch(collab.source, entry).await?;
    let analysis = analyze(&data, config);
    let log = ActionLog::new(config.action_log_path());

    let decision = decide(config, &collab, &data, &analysis, &log).await;

    info!("Checking for finished gameweeks to log");
    let summary = run_gameweek_summary(
        collab.source,
        entry,
        &data.bootstrap.events,
        &analysis.names,
        &log,
    )
    .await;

    info!(?decision, logged = ?summary.logged, "Run complete");
    Ok(RunReport { decision, summary })
}

/// Log in to the game and run the pipeline against the live services.
pub async fn run(config: &Config) -> anyhow::Result<RunReport> {
    let creds = &config.credentials;
    let (Some(email), Some(password)) = (&creds.fpl_email, &creds.fpl_password) else {
        anyhow::bail!("FPL credentials not configured (set FPL_EMAIL and FPL_PASSWORD)");
    };

    let fpl = FplClient::new().context("failed to build HTTP client")?;
    fpl.login(email, password).await.context("login failed")?;

    let llm = LlmClient::from_config(config);
    if matches!(llm, LlmClient::Disabled) {
        warn!(
            provider = %config.llm.provider,
            "no API key configured for the LLM provider; recommendations are unavailable"
        );
    }
    let notifier = Notifier::from_config(config);

    run_pipeline(
        config,
        Collaborators {
            source: &fpl,
            gateway: &llm,
            submitter: &fpl,
            notifier: &notifier,
        },
    )
    .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
