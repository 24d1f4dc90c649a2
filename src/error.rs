// Structured rejections. Every expected rule violation is a `Reject` value
// returned to the caller with the prior state untouched; the engine never
// panics on bad input and never coerces a command into a "closest legal"
// action.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meld::{LayOffError, RunError};

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Reject {
    #[error("the game is over")]
    GameOver,
    #[error("no player with id {player}")]
    UnknownPlayer { player: usize },
    #[error("it is not this player's turn")]
    NotYourTurn,
    #[error("this action is not legal in the current turn phase")]
    WrongTurnPhase,
    #[error("a may-i window is open; only may-i responses are accepted")]
    MayIInProgress,
    #[error("no may-i window is open")]
    NoMayIWindow,
    #[error("only the currently prompted player may respond")]
    NotPrompted,
    #[error("this player holds no claim rights in the open window")]
    NotEligibleForMayI,
    #[error("a may-i call has already been recorded")]
    MayIAlreadyCalled,
    #[error("card {card_id} is not in this player's hand")]
    CardNotInHand { card_id: i32 },
    #[error("no meld with id {meld_id} is on the table")]
    UnknownMeld { meld_id: i32 },
    #[error("card {card_id} is not part of that meld")]
    CardNotInMeld { card_id: i32 },
    #[error("the discard pile is empty")]
    DiscardEmpty,
    #[error("the stock is exhausted and the discard pile cannot replenish it")]
    StockExhausted,
    #[error("a down player may only draw from stock")]
    DownMayNotDrawDiscard,
    #[error("this player has already laid down this round")]
    AlreadyDown,
    #[error(
        "melds do not satisfy the round contract: needed {expected_sets} sets and \
         {expected_runs} runs, got {got_sets} sets and {got_runs} runs"
    )]
    ContractMismatch {
        expected_sets: usize,
        expected_runs: usize,
        got_sets: usize,
        got_runs: usize,
    },
    #[error("card {card_id} is used by more than one proposed meld")]
    DuplicateCardInMelds { card_id: i32 },
    #[error("proposed set is not legal")]
    InvalidSet,
    #[error("proposed run is not legal: {0}")]
    InvalidRun(#[from] RunError),
    #[error("must be down to lay off")]
    NotDown,
    #[error("laying off is not allowed on the turn the contract was laid down")]
    LayOffOnLayDownTurn,
    #[error("lay-off does not fit: {0}")]
    LayOff(#[from] LayOffError),
    #[error("a card must be kept in hand for the mandatory discard")]
    MustKeepDiscardCard,
    #[error("only a joker may be swapped out of a run")]
    SwapTargetNotJoker,
    #[error("jokers can only be swapped out of runs")]
    SwapRequiresRun,
    #[error("replacement does not exactly match the joker's stand-in rank and suit")]
    SwapMismatch,
    #[error("proposed order is not a permutation of the current hand")]
    NotAPermutation,
}

/// Malformed game configuration. These are the only construction-time
/// failures; everything after construction is a `Reject`.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConfigError {
    #[error("a game needs at least 2 players, got {players}")]
    NotEnoughPlayers { players: usize },
    #[error("{needed} cards needed to deal, only {available} in the pool")]
    NotEnoughCards { needed: usize, available: usize },
    #[error("starting round {round} is outside 1..=6")]
    BadStartingRound { round: u8 },
}
