// Wire models for the game API's JSON snapshots.
//
// Only the fields the manager reads are modelled; serde ignores the rest.
// Prices are kept in the API's integer tenths (e.g. 75 == 7.5m).

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// The four squad position categories, keyed by the API's `element_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    /// All positions in squad display order.
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Map an API `element_type` code (1-4) to a position.
    pub fn from_element_type(code: u8) -> Option<Self> {
        match code {
            1 => Some(Position::Goalkeeper),
            2 => Some(Position::Defender),
            3 => Some(Position::Midfielder),
            4 => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GKP",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Bootstrap snapshot
// ---------------------------------------------------------------------------

/// The `bootstrap-static` snapshot: every player, team and gameweek.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bootstrap {
    #[serde(rename = "elements")]
    pub players: Vec<Player>,
    pub teams: Vec<Team>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Player {
    pub id: u32,
    pub web_name: String,
    pub team: u32,
    pub element_type: u8,
    /// Current listed price in tenths.
    pub now_cost: u32,
    /// The API sends form as a decimal string ("5.2").
    #[serde(deserialize_with = "de_form")]
    pub form: f64,
    pub total_points: i32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub chance_of_playing_next_round: Option<u8>,
    #[serde(default, deserialize_with = "de_news")]
    pub news: String,
}

impl Player {
    pub fn position(&self) -> Option<Position> {
        Position::from_element_type(self.element_type)
    }

    /// Listed price in decimal currency.
    pub fn price(&self) -> f64 {
        tenths_to_currency(self.now_cost)
    }

    /// Injured, suspended or otherwise unavailable, with no chance of
    /// featuring next round.
    pub fn is_ruled_out(&self) -> bool {
        matches!(self.status.as_str(), "i" | "s" | "u")
            && self.chance_of_playing_next_round == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Team {
    pub id: u32,
    pub short_name: String,
}

/// One gameweek in the season calendar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    pub id: u32,
    #[serde(default)]
    pub is_previous: bool,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub is_next: bool,
    #[serde(default)]
    pub finished: bool,
}

impl Event {
    /// Finished gameweeks eligible for a performance summary.
    pub fn is_complete(&self) -> bool {
        self.is_previous || (self.is_current && self.finished)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fixture {
    /// `None` for fixtures that have not been scheduled into a gameweek.
    pub event: Option<u32>,
    pub team_h: Option<u32>,
    pub team_a: Option<u32>,
    /// Absent on some fixtures; an unrated side is left out of averages.
    #[serde(default)]
    pub team_h_difficulty: Option<u8>,
    #[serde(default)]
    pub team_a_difficulty: Option<u8>,
}

// ---------------------------------------------------------------------------
// The user's squad
// ---------------------------------------------------------------------------

/// Response of `my-team/{entry}`: current picks plus the transfer summary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MyTeam {
    pub picks: Vec<Pick>,
    #[serde(default)]
    pub transfers: Option<TransferSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Pick {
    #[serde(rename = "element")]
    pub player_id: u32,
    /// Selling price in tenths. Absent on historical pick snapshots.
    #[serde(default)]
    pub selling_price: Option<u32>,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_vice_captain: bool,
    #[serde(default = "default_multiplier")]
    pub multiplier: u8,
}

fn default_multiplier() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferSummary {
    /// Free transfers available. `null` while a chip lifts the limit.
    pub limit: Option<u32>,
    /// Money in the bank, tenths.
    pub bank: i64,
    /// Total budget (squad value plus bank), tenths.
    pub value: i64,
}

/// Response of `entry/{entry}/event/{gw}/picks`.
#[derive(Debug, Clone, Deserialize)]
pub struct GameweekPicks {
    pub picks: Vec<Pick>,
    pub entry_history: EntryHistory,
    #[serde(default)]
    pub active_chip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryHistory {
    pub points: i32,
    #[serde(default)]
    pub event_transfers_cost: i32,
}

/// The `player` block of `/api/me/`.
#[derive(Debug, Clone, Deserialize)]
pub struct Me {
    #[serde(default)]
    pub player: Option<MePlayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MePlayer {
    pub entry: Option<u64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert an integer tenths amount into decimal currency.
pub fn tenths_to_currency<T: Into<i64>>(tenths: T) -> f64 {
    let tenths: i64 = tenths.into();
    tenths as f64 / 10.0
}

fn de_form<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn de_news<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|s| s.trim().to_string()).unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
