// Versioned persistence and per-player views. A snapshot is a JSON envelope
// tagging the full game state with a format version; restore refuses any
// version it does not speak instead of guessing. Player views redact hidden
// zones (other hands, stock contents) down to counts.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cards::Card;
use crate::contract::Contract;
use crate::game::{Game, TurnPhase};
use crate::meld::Meld;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub game: Game,
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("snapshot version {found} is not supported, this engine speaks {SNAPSHOT_VERSION}")]
    UnsupportedVersion { found: u64 },
    #[error("snapshot carries no version tag")]
    MissingVersion,
    #[error("snapshot is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serializes the complete game, hidden zones included. Not for player
/// consumption; see [`player_view`].
pub fn write(game: &Game) -> String {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        game: game.clone(),
    };
    serde_json::to_string(&snapshot).expect("game state always serializes")
}

/// Restores a game from a snapshot document. The version tag is checked
/// before the body is decoded.
pub fn restore(document: &str) -> Result<Game, RestoreError> {
    let value: serde_json::Value = serde_json::from_str(document)?;
    let version = value
        .get("version")
        .and_then(|v| v.as_u64())
        .ok_or(RestoreError::MissingVersion)?;
    if version != SNAPSHOT_VERSION as u64 {
        return Err(RestoreError::UnsupportedVersion { found: version });
    }
    let snapshot: Snapshot = serde_json::from_value(value)?;
    debug!(round = snapshot.game.round.number, "game restored from snapshot");
    Ok(snapshot.game)
}

/// What one seat knows about another: public zone sizes and flags only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub player: usize,
    pub cards: usize,
    pub down: bool,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MayIView {
    pub card: Card,
    pub discarded_by: Option<usize>,
    pub prompted: Option<usize>,
    pub first_caller: Option<usize>,
}

/// Everything one player is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player: usize,
    /// The viewer's own hand, in their chosen order.
    pub hand: Vec<Card>,
    pub seats: Vec<SeatView>,
    pub table: Vec<Meld>,
    /// The discard pile is public history, most recent last.
    pub discard: Vec<Card>,
    pub stock_count: usize,
    pub round_number: u8,
    pub contract: Contract,
    pub dealer: usize,
    pub current_player: usize,
    pub turn_phase: TurnPhase,
    pub may_i: Option<MayIView>,
    pub winner: Option<usize>,
}

/// Builds the view for one seat, or `None` for an unknown player index.
pub fn player_view(game: &Game, player: usize) -> Option<PlayerView> {
    if player >= game.players.len() {
        return None;
    }
    Some(PlayerView {
        player,
        hand: game.players[player].hand.clone(),
        seats: game
            .players
            .iter()
            .enumerate()
            .map(|(seat, p)| SeatView {
                player: seat,
                cards: p.hand.len(),
                down: p.down,
                score: p.score,
            })
            .collect(),
        table: game.round.table.clone(),
        discard: game.round.discard.iter().map(|entry| entry.card).collect(),
        stock_count: game.round.stock.len(),
        round_number: game.round.number,
        contract: game.contract(),
        dealer: game.round.dealer,
        current_player: game.round.current_player,
        turn_phase: game.round.turn.phase,
        may_i: game.round.may_i.as_ref().map(|m| MayIView {
            card: m.card,
            discarded_by: m.discarded_by,
            prompted: m.prompted(),
            first_caller: m.first_caller,
        }),
        winner: game.winner,
    })
}
