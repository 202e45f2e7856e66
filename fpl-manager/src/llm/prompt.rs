// Prompt construction for transfer recommendations.
//
// The user prompt comes from a template file with `{placeholder}` fields
// that are filled from the joined squad, fixture and market data. The
// template's wording is the user's to edit; this module only guarantees
// that every placeholder is known and filled.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::data::join::{PlayerOfInterest, SquadBreakdown, SquadDetails};
use crate::fpl::types::Position;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unknown placeholder `{{{0}}}` in prompt template")]
    UnknownPlaceholder(String),

    #[error("unmatched `{brace}` at byte {offset} in prompt template")]
    UnmatchedBrace { brace: char, offset: usize },

    #[error("failed to encode prompt data: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// Fixes the reply format the recommendation parser accepts.
pub fn system_prompt() -> String {
    "You are a fantasy football transfer advisor.\n\
     Reply with exactly one JSON object and nothing else, shaped as:\n\
     {\"transfers\": [{\"player_out\": \"<name>\", \"player_in\": \"<name>\"}]}\n\
     Use player names exactly as given in the data. An empty transfers list means no transfers.\n\
     You may add further top-level fields (for example \"captain\" or \"reasoning\")."
        .to_string()
}

// ---------------------------------------------------------------------------
// Template fields
// ---------------------------------------------------------------------------

/// Everything the template can reference.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub squad: &'a SquadDetails,
    pub gameweek: Option<u32>,
    pub breakdown: &'a SquadBreakdown,
    pub team_distribution: &'a BTreeMap<String, usize>,
    pub fixture_difficulty: &'a BTreeMap<String, f64>,
    pub players_of_interest: &'a [PlayerOfInterest],
}

impl PromptContext<'_> {
    /// Placeholder name -> rendered value.
    pub fn fields(&self) -> Result<HashMap<&'static str, String>, PromptError> {
        let state = &self.squad.state;
        let mut fields = HashMap::new();
        fields.insert(
            "my_team_string",
            serde_json::to_string(&self.squad.player_names)?,
        );
        fields.insert("bank", format!("{:.1}", state.bank));
        fields.insert("free_transfers", state.free_transfers.to_string());
        fields.insert(
            "gameweek",
            self.gameweek
                .map(|gw| gw.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        );
        fields.insert("total_budget", format!("{:.1}", state.value));
        fields.insert(
            "squad_gkp_string",
            self.breakdown.format_position(Position::Goalkeeper),
        );
        fields.insert(
            "squad_def_string",
            self.breakdown.format_position(Position::Defender),
        );
        fields.insert(
            "squad_mid_string",
            self.breakdown.format_position(Position::Midfielder),
        );
        fields.insert(
            "squad_fwd_string",
            self.breakdown.format_position(Position::Forward),
        );
        fields.insert(
            "team_distribution_string",
            serde_json::to_string(self.team_distribution)?,
        );
        fields.insert(
            "fixture_difficulty_string",
            serde_json::to_string_pretty(self.fixture_difficulty)?,
        );
        fields.insert(
            "players_of_interest_string",
            serde_json::to_string_pretty(self.players_of_interest)?,
        );
        Ok(fields)
    }
}

// ---------------------------------------------------------------------------
// Template rendering
// ---------------------------------------------------------------------------

pub fn load_template(path: &Path) -> Result<String, PromptError> {
    std::fs::read_to_string(path).map_err(|source| PromptError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Substitute `{name}` fields. `{{` and `}}` produce literal braces.
pub fn render(template: &str, fields: &HashMap<&'static str, String>) -> Result<String, PromptError> {
    let mut out = String::with_capacity(template.len() * 2);
    let mut chars = template.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(PromptError::UnmatchedBrace { brace: '{', offset });
                }
                let value = fields
                    .get(name.as_str())
                    .ok_or_else(|| PromptError::UnknownPlaceholder(name.clone()))?;
                out.push_str(value);
            }
            '}' => return Err(PromptError::UnmatchedBrace { brace: '}', offset }),
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Load the template at `path` and fill it from `context`.
pub fn build_prompt(path: &Path, context: &PromptContext<'_>) -> Result<String, PromptError> {
    let template = load_template(path)?;
    render(&template, &context.fields()?)
}
