// Transfer payload construction.
//
// Resolves recommended player names to ids and attaches prices from the
// current snapshot: the outgoing player's selling price from the squad and
// the incoming player's listed price from the market. Intents that cannot
// be resolved are skipped one by one; the rest of the batch still goes out.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::data::join::{build_id_by_name, build_price_map, build_squad_id_by_name};
use crate::fpl::types::{Pick, Player};
use crate::llm::recommendation::TransferIntent;

/// Body of the transfers endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferPayload {
    /// Always `null`: the manager never plays chips.
    pub chips: Option<String>,
    pub entry: u64,
    pub event: u32,
    pub transfers: Vec<TransferRecord>,
}

/// One resolved transfer. Prices in tenths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub element_in: u32,
    pub element_out: u32,
    pub purchase_price: u32,
    pub selling_price: u32,
}

/// Why an intent was left out of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnknownPlayerOut,
    UnknownPlayerIn,
    /// The outgoing player exists but is not in the current squad.
    NotInSquad,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedIntent {
    pub intent: TransferIntent,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPayload {
    pub payload: TransferPayload,
    pub skipped: Vec<SkippedIntent>,
}

/// Lookup tables for one snapshot of players and the current squad.
pub struct PayloadBuilder {
    id_by_name: HashMap<String, u32>,
    /// Outgoing names resolve here first, so a squad player wins over a
    /// namesake elsewhere in the table.
    squad_id_by_name: HashMap<String, u32>,
    listed_price: HashMap<u32, u32>,
    selling_price: HashMap<u32, u32>,
}

impl PayloadBuilder {
    pub fn new(players: &[Player], picks: &[Pick]) -> Self {
        Self {
            id_by_name: build_id_by_name(players),
            squad_id_by_name: build_squad_id_by_name(picks, players),
            listed_price: players.iter().map(|p| (p.id, p.now_cost)).collect(),
            selling_price: build_price_map(picks, players),
        }
    }

    pub fn build(&self, entry: u64, gameweek: u32, intents: &[TransferIntent]) -> BuiltPayload {
        let mut transfers = Vec::with_capacity(intents.len());
        let mut skipped = Vec::new();

        for intent in intents {
            match self.resolve(intent) {
                Ok(record) => transfers.push(record),
                Err(reason) => {
                    warn!(
                        player_out = %intent.player_out,
                        player_in = %intent.player_in,
                        ?reason,
                        "skipping transfer that cannot be resolved"
                    );
                    skipped.push(SkippedIntent {
                        intent: intent.clone(),
                        reason,
                    });
                }
            }
        }

        BuiltPayload {
            payload: TransferPayload {
                chips: None,
                entry,
                event: gameweek,
                transfers,
            },
            skipped,
        }
    }

    fn resolve(&self, intent: &TransferIntent) -> Result<TransferRecord, SkipReason> {
        let out_id = *self
            .squad_id_by_name
            .get(&intent.player_out)
            .or_else(|| self.id_by_name.get(&intent.player_out))
            .ok_or(SkipReason::UnknownPlayerOut)?;
        let in_id = *self
            .id_by_name
            .get(&intent.player_in)
            .ok_or(SkipReason::UnknownPlayerIn)?;
        let selling_price = *self
            .selling_price
            .get(&out_id)
            .ok_or(SkipReason::NotInSquad)?;
        let purchase_price = *self
            .listed_price
            .get(&in_id)
            .ok_or(SkipReason::UnknownPlayerIn)?;

        Ok(TransferRecord {
            element_in: in_id,
            element_out: out_id,
            purchase_price,
            selling_price,
        })
    }
}
