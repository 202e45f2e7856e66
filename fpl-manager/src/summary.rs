// Post-gameweek performance summaries written to the action log.
//
// Each finished gameweek newer than the last logged marker gets one block:
// the marker line followed by points, deductions, captaincy, chip and bench.
// Blocks are written in ascending order and the pass stops at the first
// failed fetch, so the highest marker never skips an unlogged gameweek.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::action_log::{ActionLog, SUMMARY_MARKER};
use crate::data::join::player_name;
use crate::fpl::types::{Event, GameweekPicks};
use crate::fpl::UpstreamSource;

/// Shown when no pick carries the captain or vice-captain flag.
const NOT_SET: &str = "N/A";

/// Gameweeks handled by one summary pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub logged: Vec<u32>,
    /// The gameweek whose fetch failed and ended the pass.
    pub failed: Option<u32>,
    /// Pending gameweeks after the failure, left for the next run.
    pub deferred: Vec<u32>,
}

/// Finished gameweeks newer than `last_logged`, ascending.
pub fn pending_gameweeks(events: &[Event], last_logged: u32) -> Vec<u32> {
    let mut ids: Vec<u32> = events
        .iter()
        .filter(|e| e.is_complete() && e.id > last_logged)
        .map(|e| e.id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// The log lines for one gameweek, marker first.
pub fn summary_lines(
    gameweek: u32,
    picks: &GameweekPicks,
    names: &HashMap<u32, String>,
) -> Vec<String> {
    let named = |id: Option<u32>| match id {
        Some(id) => player_name(names, id).to_string(),
        None => NOT_SET.to_string(),
    };
    let captain = named(picks.picks.iter().find(|p| p.is_captain).map(|p| p.player_id));
    let vice = named(picks.picks.iter().find(|p| p.is_vice_captain).map(|p| p.player_id));
    let bench: Vec<&str> = picks
        .picks
        .iter()
        .filter(|p| p.multiplier == 0)
        .map(|p| player_name(names, p.player_id))
        .collect();

    vec![
        format!("{SUMMARY_MARKER}{gameweek}:"),
        format!("  - Points: {}", picks.entry_history.points),
        format!("  - Points Deducted: -{}", picks.entry_history.event_transfers_cost),
        format!("  - Captain: {captain}"),
        format!("  - Vice-Captain: {vice}"),
        format!(
            "  - Chip Played: {}",
            picks.active_chip.as_deref().unwrap_or("None")
        ),
        format!("  - Bench: {}", bench.join(", ")),
    ]
}

/// Log a summary for every finished gameweek not yet in the log.
///
/// A failed fetch is reported and ends the pass; it and every later
/// gameweek are retried on the next run.
pub async fn run_gameweek_summary(
    source: &dyn UpstreamSource,
    entry: u64,
    events: &[Event],
    names: &HashMap<u32, String>,
    log: &ActionLog,
) -> SummaryReport {
    let last_logged = log.last_logged_gameweek();
    let mut report = SummaryReport::default();

    let pending = pending_gameweeks(events, last_logged);
    for (i, &gameweek) in pending.iter().enumerate() {
        info!("Found new finished gameweek {gameweek} to log");
        match source.gameweek_picks(entry, gameweek).await {
            Ok(picks) => {
                for line in summary_lines(gameweek, &picks, names) {
                    log.append(&line);
                }
                info!("Logged summary for gameweek {gameweek}");
                report.logged.push(gameweek);
            }
            Err(e) => {
                warn!("Failed to log summary for GW{gameweek}: {e}");
                report.failed = Some(gameweek);
                report.deferred = pending[i + 1..].to_vec();
                if !report.deferred.is_empty() {
                    warn!(deferred = ?report.deferred, "Deferring later gameweeks to the next run");
                }
                break;
            }
        }
    }

    report
}
