// Transfer decision engine.
//
// Given a recommendation and the squad's free-transfer allowance, computes
// the points hit and picks one of three actions according to the
// configured autonomy mode:
//
// | mode    | no hit  | hit              |
// |---------|---------|------------------|
// | suggest | report  | report           |
// | hybrid  | execute | request approval |
// | auto    | execute | execute          |
//
// Executing means building the payload and submitting it exactly once.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::action_log::ActionLog;
use crate::data::join::{build_name_map, player_name, FreeTransfers, SquadState};
use crate::engine::payload::{PayloadBuilder, TransferPayload};
use crate::fpl::types::{Pick, Player};
use crate::fpl::{FplError, Submission, TransferSubmitter};
use crate::llm::recommendation::Recommendation;
use crate::notify::ApprovalNotifier;

/// Points deducted for every transfer beyond the free allowance.
pub const POINTS_PER_EXTRA_TRANSFER: u32 = 4;

// ---------------------------------------------------------------------------
// Autonomy mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyMode {
    /// Report recommendations only; never touch the squad.
    Suggest,
    /// Execute free transfers, ask a human before taking a hit.
    Hybrid,
    /// Execute every recommendation.
    Auto,
}

impl AutonomyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutonomyMode::Suggest => "suggest",
            AutonomyMode::Hybrid => "hybrid",
            AutonomyMode::Auto => "auto",
        }
    }

    /// The action this mode takes for a recommendation costing `points_hit`.
    pub fn action(self, points_hit: u32) -> Action {
        match (self, points_hit) {
            (AutonomyMode::Suggest, _) => Action::Report,
            (AutonomyMode::Hybrid, 0) => Action::Execute,
            (AutonomyMode::Hybrid, _) => Action::RequestApproval,
            (AutonomyMode::Auto, _) => Action::Execute,
        }
    }
}

impl fmt::Display for AutonomyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode `{0}` (expected suggest, hybrid or auto)")]
pub struct UnknownMode(pub String);

impl FromStr for AutonomyMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suggest" => Ok(AutonomyMode::Suggest),
            "hybrid" => Ok(AutonomyMode::Hybrid),
            "auto" => Ok(AutonomyMode::Auto),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Report,
    RequestApproval,
    Execute,
}

/// Penalty for making `proposed` transfers with `free_transfers` available.
pub fn points_hit(proposed: usize, free_transfers: u32) -> u32 {
    let proposed = u32::try_from(proposed).unwrap_or(u32::MAX);
    proposed
        .saturating_sub(free_transfers)
        .saturating_mul(POINTS_PER_EXTRA_TRANSFER)
}

// ---------------------------------------------------------------------------
// Outcomes and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The recommendation proposed no transfers.
    NoTransfers,
    Reported {
        points_hit: u32,
    },
    ApprovalRequested {
        points_hit: u32,
        delivered: bool,
    },
    Executed {
        points_hit: u32,
        submitted: usize,
        skipped: usize,
        submission: Submission,
    },
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("no upcoming gameweek to transfer into")]
    NoUpcomingGameweek,

    #[error("transfer submission failed for payload {payload}: {source}")]
    Submission {
        payload: String,
        source: FplError,
    },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The squad and market snapshot a decision is made against.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub entry: u64,
    pub next_gameweek: Option<u32>,
    pub players: &'a [Player],
    pub picks: &'a [Pick],
    pub state: &'a SquadState,
}

pub struct DecisionEngine<'a> {
    mode: AutonomyMode,
    submitter: &'a dyn TransferSubmitter,
    notifier: &'a dyn ApprovalNotifier,
    log: &'a ActionLog,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(
        mode: AutonomyMode,
        submitter: &'a dyn TransferSubmitter,
        notifier: &'a dyn ApprovalNotifier,
        log: &'a ActionLog,
    ) -> Self {
        Self {
            mode,
            submitter,
            notifier,
            log,
        }
    }

    /// Act on a recommendation. Submission happens at most once and is not
    /// retried on failure.
    pub async fn handle(
        &self,
        recommendation: &Recommendation,
        ctx: &DecisionContext<'_>,
    ) -> Result<DecisionOutcome, DecisionError> {
        if recommendation.is_empty() {
            info!("No transfers recommended, no action taken");
            return Ok(DecisionOutcome::NoTransfers);
        }

        let proposed = recommendation.transfers.len();
        let hit = points_hit(proposed, ctx.state.free_transfers.allowance());
        info!(
            proposed,
            free_transfers = %ctx.state.free_transfers,
            points_hit = hit,
            mode = %self.mode,
            "Evaluating recommendation"
        );
        if hit > 0 {
            self.log.append(&format!(
                "POINTS HIT: {proposed} transfer(s) proposed with {} free, hit of -{hit} ({} mode)",
                ctx.state.free_transfers, self.mode
            ));
        }

        match self.mode.action(hit) {
            Action::Report => {
                report(recommendation, hit);
                Ok(DecisionOutcome::Reported { points_hit: hit })
            }
            Action::RequestApproval => {
                info!("Points hit required, requesting manual approval");
                let delivered = match self.notifier.request_approval(recommendation, hit).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Approval request failed: {e}");
                        false
                    }
                };
                Ok(DecisionOutcome::ApprovalRequested {
                    points_hit: hit,
                    delivered,
                })
            }
            Action::Execute => self.execute(recommendation, ctx, hit).await,
        }
    }

    async fn execute(
        &self,
        recommendation: &Recommendation,
        ctx: &DecisionContext<'_>,
        hit: u32,
    ) -> Result<DecisionOutcome, DecisionError> {
        let gameweek = ctx.next_gameweek.ok_or(DecisionError::NoUpcomingGameweek)?;
        let built = PayloadBuilder::new(ctx.players, ctx.picks).build(
            ctx.entry,
            gameweek,
            &recommendation.transfers,
        );

        info!(
            transfers = built.payload.transfers.len(),
            skipped = built.skipped.len(),
            gameweek,
            "Submitting transfers"
        );
        let submission = self
            .submitter
            .submit_transfers(&built.payload)
            .await
            .map_err(|source| DecisionError::Submission {
                payload: describe_payload(&built.payload),
                source,
            })?;

        if let Submission::Accepted { .. } = submission {
            let names = build_name_map(ctx.players);
            for t in &built.payload.transfers {
                self.log.append(&format!(
                    "TRANSFER MADE: OUT - {} ({}), IN - {} ({})",
                    player_name(&names, t.element_out),
                    t.element_out,
                    player_name(&names, t.element_in),
                    t.element_in
                ));
            }
            info!("Transfers executed");
        }

        Ok(DecisionOutcome::Executed {
            points_hit: hit,
            submitted: built.payload.transfers.len(),
            skipped: built.skipped.len(),
            submission,
        })
    }
}

/// Print a recommendation for the user to act on by hand.
fn report(recommendation: &Recommendation, hit: u32) {
    let body = serde_json::to_string_pretty(recommendation)
        .unwrap_or_else(|_| format!("{recommendation:?}"));
    println!("Recommended transfers (suggest mode, no changes made):");
    println!("{body}");
    if hit > 0 {
        println!("These transfers would cost a -{hit} points hit.");
    }
    println!("Make the transfers manually on the game website if you agree.");
}

fn describe_payload(payload: &TransferPayload) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| format!("{payload:?}"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
