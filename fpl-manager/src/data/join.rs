// Lookup maps over one data snapshot and the joined views built from them.
//
// Every lookup is total: a missing id resolves to a sentinel name instead
// of failing, since the snapshot tables are not guaranteed to agree.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::fpl::types::{tenths_to_currency, MyTeam, Pick, Player, Position, Team};

/// Sentinel for a player id missing from the player table.
pub const UNKNOWN_PLAYER: &str = "Unknown";
/// Sentinel for a team id missing from the team table.
pub const UNKNOWN_TEAM: &str = "N/A";

/// Default number of players handed to the recommendation request.
pub const DEFAULT_PLAYERS_OF_INTEREST: usize = 50;

// ---------------------------------------------------------------------------
// Lookup maps
// ---------------------------------------------------------------------------

/// Player id -> display name.
pub fn build_name_map(players: &[Player]) -> HashMap<u32, String> {
    players.iter().map(|p| (p.id, p.web_name.clone())).collect()
}

/// Team id -> short name.
pub fn build_team_map(teams: &[Team]) -> HashMap<u32, String> {
    teams.iter().map(|t| (t.id, t.short_name.clone())).collect()
}

/// Squad player id -> selling price (tenths).
///
/// Picks without a selling price fall back to the player's current listed
/// price from `players`. Picks found in neither are left out.
pub fn build_price_map(picks: &[Pick], players: &[Player]) -> HashMap<u32, u32> {
    picks
        .iter()
        .filter_map(|pick| match pick.selling_price {
            Some(price) => Some((pick.player_id, price)),
            None => {
                let listed = players.iter().find(|p| p.id == pick.player_id)?;
                debug!(
                    player_id = pick.player_id,
                    "no selling price on pick, using listed price"
                );
                Some((pick.player_id, listed.now_cost))
            }
        })
        .collect()
}

/// Display name -> player id. Display names are not unique across the
/// league; the last player in table order wins.
pub fn build_id_by_name(players: &[Player]) -> HashMap<String, u32> {
    players.iter().map(|p| (p.web_name.clone(), p.id)).collect()
}

/// Display name -> player id, restricted to the squad's picks.
pub fn build_squad_id_by_name(picks: &[Pick], players: &[Player]) -> HashMap<String, u32> {
    let by_id: HashMap<u32, &Player> = players.iter().map(|p| (p.id, p)).collect();
    picks
        .iter()
        .filter_map(|pick| by_id.get(&pick.player_id))
        .map(|p| (p.web_name.clone(), p.id))
        .collect()
}

pub fn player_name(names: &HashMap<u32, String>, id: u32) -> &str {
    names.get(&id).map(String::as_str).unwrap_or(UNKNOWN_PLAYER)
}

pub fn team_name(teams: &HashMap<u32, String>, id: u32) -> &str {
    teams.get(&id).map(String::as_str).unwrap_or(UNKNOWN_TEAM)
}

// ---------------------------------------------------------------------------
// Squad state
// ---------------------------------------------------------------------------

/// Free transfers available for the next gameweek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeTransfers {
    Limited(u32),
    /// A chip (wildcard, free hit) has lifted the limit.
    Unlimited,
}

impl FreeTransfers {
    /// Transfers that cost no points.
    pub fn allowance(self) -> u32 {
        match self {
            FreeTransfers::Limited(n) => n,
            FreeTransfers::Unlimited => u32::MAX,
        }
    }
}

impl fmt::Display for FreeTransfers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreeTransfers::Limited(n) => write!(f, "{n}"),
            FreeTransfers::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Transfer budget state derived from the squad's transfer summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SquadState {
    pub free_transfers: FreeTransfers,
    /// Money in the bank, decimal currency.
    pub bank: f64,
    /// Total budget (squad value plus bank), decimal currency.
    pub value: f64,
}

impl SquadState {
    pub fn from_team(my_team: &MyTeam) -> Self {
        match &my_team.transfers {
            Some(summary) => Self {
                free_transfers: summary
                    .limit
                    .map_or(FreeTransfers::Unlimited, FreeTransfers::Limited),
                bank: tenths_to_currency(summary.bank),
                value: tenths_to_currency(summary.value),
            },
            None => Self {
                free_transfers: FreeTransfers::Limited(1),
                bank: 0.0,
                value: 0.0,
            },
        }
    }
}

/// Squad player names (in pick order) alongside the budget state.
#[derive(Debug, Clone)]
pub struct SquadDetails {
    pub player_names: Vec<String>,
    pub state: SquadState,
}

pub fn squad_details(my_team: &MyTeam, names: &HashMap<u32, String>) -> SquadDetails {
    SquadDetails {
        player_names: my_team
            .picks
            .iter()
            .map(|pick| player_name(names, pick.player_id).to_string())
            .collect(),
        state: SquadState::from_team(my_team),
    }
}

// ---------------------------------------------------------------------------
// Squad by position
// ---------------------------------------------------------------------------

/// One squad member joined with its market data.
#[derive(Debug, Clone, PartialEq)]
pub struct SquadEntry {
    pub player_id: u32,
    pub name: String,
    pub team: String,
    /// Listed price, tenths.
    pub price: u32,
    /// Selling price, tenths.
    pub selling_price: u32,
}

impl fmt::Display for SquadEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (£{:.1}m, sells £{:.1}m, {})",
            self.name,
            tenths_to_currency(self.price),
            tenths_to_currency(self.selling_price),
            self.team
        )
    }
}

/// The squad split into the four position categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SquadBreakdown {
    groups: BTreeMap<Position, Vec<SquadEntry>>,
}

impl SquadBreakdown {
    pub fn players(&self, position: Position) -> &[SquadEntry] {
        self.groups.get(&position).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Comma-separated, human-readable list for one position.
    pub fn format_position(&self, position: Position) -> String {
        self.players(position)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Join the squad's picks with the player and team tables, grouped by
/// position. Picks whose player is missing from the table, or carries an
/// unknown position code, are skipped.
pub fn summarize_squad(
    picks: &[Pick],
    players: &[Player],
    teams: &HashMap<u32, String>,
) -> SquadBreakdown {
    let by_id: HashMap<u32, &Player> = players.iter().map(|p| (p.id, p)).collect();
    let mut breakdown = SquadBreakdown::default();

    for pick in picks {
        let Some(player) = by_id.get(&pick.player_id) else {
            debug!(player_id = pick.player_id, "squad pick not in player table");
            continue;
        };
        let Some(position) = player.position() else {
            debug!(
                player_id = player.id,
                element_type = player.element_type,
                "unknown position code"
            );
            continue;
        };
        breakdown.groups.entry(position).or_default().push(SquadEntry {
            player_id: player.id,
            name: player.web_name.clone(),
            team: team_name(teams, player.team).to_string(),
            price: player.now_cost,
            selling_price: pick.selling_price.unwrap_or(player.now_cost),
        });
    }

    breakdown
}

/// Team short name -> number of squad players from that team.
pub fn team_distribution(
    picks: &[Pick],
    players: &[Player],
    teams: &HashMap<u32, String>,
) -> BTreeMap<String, usize> {
    let team_of: HashMap<u32, u32> = players.iter().map(|p| (p.id, p.team)).collect();
    let mut counts = BTreeMap::new();
    for pick in picks {
        let Some(name) = team_of.get(&pick.player_id).and_then(|t| teams.get(t)) else {
            continue;
        };
        *counts.entry(name.clone()).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Players of interest
// ---------------------------------------------------------------------------

/// Compact market record handed to the recommendation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerOfInterest {
    pub name: String,
    pub team: String,
    /// Decimal currency.
    pub price: f64,
    pub form: f64,
    pub points: i32,
    pub news: String,
}

/// The `limit` best players by form, ties broken by total points, leaving
/// out anyone ruled out of the next round.
pub fn top_players_of_interest(
    players: &[Player],
    teams: &HashMap<u32, String>,
    limit: usize,
) -> Vec<PlayerOfInterest> {
    let mut ranked: Vec<&Player> = players.iter().filter(|p| !p.is_ruled_out()).collect();
    ranked.sort_by(|a, b| {
        b.form
            .total_cmp(&a.form)
            .then_with(|| b.total_points.cmp(&a.total_points))
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|p| PlayerOfInterest {
            name: p.web_name.clone(),
            team: team_name(teams, p.team).to_string(),
            price: p.price(),
            form: p.form,
            points: p.total_points,
            news: if p.news.is_empty() {
                "No news".to_string()
            } else {
                p.news.clone()
            },
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
