// The May I? state machines. Game sequences six contract rounds; Round owns
// the shared stock/discard/table and the May-I negotiation; Turn tracks one
// player's draw/act/discard cycle. External callers issue one command at a
// time; every command either returns a new consistent state or a structured
// rejection with the prior state untouched.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cards::{build_deck, hand_points, Card, Rank};
use crate::contract::{contract_for_round, Contract, FIRST_ROUND, LAST_ROUND};
use crate::error::{ConfigError, Reject};
use crate::meld::{
    apply_lay_off, normalize_run, validate_set, wildcard_roles, Meld, MeldKind, RunEnd,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub players: usize,
    pub decks: usize,
    pub jokers: usize,
    pub hand_size: usize,
    pub starting_round: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            players: 4,
            decks: 2,
            jokers: 4,
            hand_size: 11,
            starting_round: FIRST_ROUND,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TurnPhase {
    #[default]
    AwaitingDraw,
    AwaitingAction,
    AwaitingDiscard,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub phase: TurnPhase,
    /// The player went down this turn; lays off must wait for a later turn.
    pub laid_down: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Order is player-controlled and persisted, never implied by rank/suit.
    pub hand: Vec<Card>,
    pub down: bool,
    pub score: i32,
}

/// A face-up discard and who produced it. The seed card flipped at the deal
/// carries no discarder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscardEntry {
    pub card: Card,
    pub discarded_by: Option<usize>,
}

/// May-I negotiation state: a queue plus cursor, never ambient globals, so
/// independent engine instances cannot interfere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MayI {
    /// The contested card, still sitting on top of the discard pile.
    pub card: Card,
    pub discarded_by: Option<usize>,
    pub drawer: usize,
    /// Eligible players in prompt order.
    pub queue: Vec<usize>,
    pub cursor: usize,
    pub first_caller: Option<usize>,
}

impl MayI {
    pub fn prompted(&self) -> Option<usize> {
        self.queue.get(self.cursor).copied()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub number: u8,
    /// Face-down, drawn from the back.
    pub stock: Vec<Card>,
    /// Face-up, most recent discard last.
    pub discard: Vec<DiscardEntry>,
    pub table: Vec<Meld>,
    pub dealer: usize,
    pub current_player: usize,
    pub turn: Turn,
    pub may_i: Option<MayI>,
    pub next_meld_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProposedMeld {
    pub kind: MeldKind,
    pub card_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    DrawFromStock,
    DrawFromDiscard,
    LayDown {
        melds: Vec<ProposedMeld>,
    },
    LayOff {
        card_id: i32,
        meld_id: i32,
        position: Option<RunEnd>,
    },
    SwapJoker {
        meld_id: i32,
        joker_id: i32,
        natural_id: i32,
    },
    Discard {
        card_id: i32,
    },
    Skip,
    ReorderHand {
        order: Vec<i32>,
    },
    CallMayI,
    AllowMayI,
    ClaimMayI,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub config: GameConfig,
    pub players: Vec<Player>,
    pub round: Round,
    /// Lowest cumulative total after round 6; `Some` means the game is over.
    pub winner: Option<usize>,
    /// Drives every mid-game shuffle (re-deals, stock replenishment) and is
    /// part of the serialized state, so a restored game replays shuffles
    /// identically to the original.
    rng: ChaCha8Rng,
}

impl Game {
    pub fn new(config: GameConfig) -> Result<Game, ConfigError> {
        Game::new_with_rng(config, &mut thread_rng())
    }

    /// Builds a game with a caller-supplied permutation source. The source
    /// seeds the game's own serializable rng, which then drives the initial
    /// deal and every later shuffle, so a given seed fixes the whole game.
    pub fn new_with_rng(config: GameConfig, rng: &mut impl Rng) -> Result<Game, ConfigError> {
        validate_config(&config)?;
        let mut game = Game {
            config,
            players: (0..config.players).map(|_| Player::default()).collect(),
            round: Round::default(),
            winner: None,
            rng: ChaCha8Rng::seed_from_u64(rng.gen()),
        };
        // Dealer starts at the last seat so the first seat acts first.
        game.deal_round(config.starting_round, config.players - 1);
        Ok(game)
    }

    pub fn contract(&self) -> Contract {
        contract_for_round(self.round.number)
    }

    /// Applies one command for one player. Returns the resulting state or a
    /// rejection; the receiver is never mutated, so a rejected command leaves
    /// no observable trace.
    pub fn apply(&self, player: usize, command: Command) -> Result<Game, Reject> {
        let mut next = self.clone();
        next.apply_mut(player, &command)?;
        Ok(next)
    }

    fn apply_mut(&mut self, player: usize, command: &Command) -> Result<(), Reject> {
        if player >= self.players.len() {
            return Err(Reject::UnknownPlayer { player });
        }
        if self.winner.is_some() {
            return Err(Reject::GameOver);
        }
        trace!(player, ?command, "applying command");
        match command {
            Command::ReorderHand { order } => self.reorder_hand(player, order),
            Command::CallMayI => self.call_may_i(player),
            Command::AllowMayI => self.allow_may_i(player),
            Command::ClaimMayI => self.claim_may_i(player),
            _ => {
                if self.round.may_i.is_some() {
                    return Err(Reject::MayIInProgress);
                }
                if player != self.round.current_player {
                    return Err(Reject::NotYourTurn);
                }
                match command {
                    Command::DrawFromStock => self.draw_from_stock(player),
                    Command::DrawFromDiscard => self.draw_from_discard(player),
                    Command::LayDown { melds } => self.lay_down(player, melds),
                    Command::LayOff {
                        card_id,
                        meld_id,
                        position,
                    } => self.lay_off(player, *card_id, *meld_id, *position),
                    Command::SwapJoker {
                        meld_id,
                        joker_id,
                        natural_id,
                    } => self.swap_joker(player, *meld_id, *joker_id, *natural_id),
                    Command::Discard { card_id } => self.discard(player, *card_id),
                    Command::Skip => self.skip(),
                    _ => unreachable!("non-turn commands dispatched above"),
                }
            }
        }
    }

    // Deals a fresh round: equal hands, one face-up seed discard, the rest
    // becomes stock. Down flags reset; scores carry across rounds.
    fn deal_round(&mut self, number: u8, dealer: usize) {
        let config = self.config;
        let mut deck = build_deck(config.decks, config.jokers);
        deck.shuffle(&mut self.rng);
        for player in self.players.iter_mut() {
            player.hand.clear();
            player.down = false;
        }
        for _ in 0..config.hand_size {
            for player in 0..config.players {
                let card = deck.pop().expect("config guarantees enough cards");
                self.players[player].hand.push(card);
            }
        }
        let seed = deck.pop().expect("config guarantees a seed discard");
        self.round = Round {
            number,
            stock: deck,
            discard: vec![DiscardEntry {
                card: seed,
                discarded_by: None,
            }],
            table: vec![],
            dealer,
            current_player: (dealer + 1) % config.players,
            turn: Turn::default(),
            may_i: None,
            next_meld_id: 0,
        };
        debug!(round = number, dealer, "round dealt");
    }

    fn draw_from_stock(&mut self, player: usize) -> Result<(), Reject> {
        if self.round.turn.phase != TurnPhase::AwaitingDraw {
            return Err(Reject::WrongTurnPhase);
        }
        let card = self.take_from_stock().ok_or(Reject::StockExhausted)?;
        self.players[player].hand.push(card);
        self.round.turn.phase = TurnPhase::AwaitingAction;
        self.open_may_i_window(player);
        Ok(())
    }

    fn draw_from_discard(&mut self, player: usize) -> Result<(), Reject> {
        if self.round.turn.phase != TurnPhase::AwaitingDraw {
            return Err(Reject::WrongTurnPhase);
        }
        if self.players[player].down {
            return Err(Reject::DownMayNotDrawDiscard);
        }
        let entry = self.round.discard.pop().ok_or(Reject::DiscardEmpty)?;
        self.players[player].hand.push(entry.card);
        self.round.turn.phase = TurnPhase::AwaitingAction;
        Ok(())
    }

    /// Draws the top stock card, replenishing an empty stock from the discard
    /// pile minus its top card. `None` only when both are exhausted.
    fn take_from_stock(&mut self) -> Option<Card> {
        if self.round.stock.is_empty() && self.round.discard.len() > 1 {
            let top = self.round.discard.pop().expect("checked non-empty");
            let mut recycled: Vec<Card> =
                self.round.discard.drain(..).map(|entry| entry.card).collect();
            recycled.shuffle(&mut self.rng);
            debug!(cards = recycled.len(), "stock replenished from discard pile");
            self.round.stock = recycled;
            self.round.discard.push(top);
        }
        self.round.stock.pop()
    }

    // Opens the negotiation window on the discard the drawer chose not to
    // take. Prompt order walks from the seat after the discarder, wrapping,
    // skipping the discarder, the drawer and down players. The seed flip has
    // no discarder; the dealer anchors the walk in that case.
    fn open_may_i_window(&mut self, drawer: usize) {
        let Some(top) = self.round.discard.last() else {
            return;
        };
        let card = top.card;
        let discarded_by = top.discarded_by;
        let anchor = discarded_by.unwrap_or(self.round.dealer);
        let seats = self.players.len();
        let queue: Vec<usize> = (1..=seats)
            .map(|offset| (anchor + offset) % seats)
            .filter(|&p| p != drawer && Some(p) != discarded_by && !self.players[p].down)
            .collect();
        if queue.is_empty() {
            return;
        }
        debug!(card = card.id, ?queue, drawer, "may-i window opened");
        self.round.may_i = Some(MayI {
            card,
            discarded_by,
            drawer,
            queue,
            cursor: 0,
            first_caller: None,
        });
    }

    fn call_may_i(&mut self, player: usize) -> Result<(), Reject> {
        let Some(may_i) = self.round.may_i.as_mut() else {
            return Err(Reject::NoMayIWindow);
        };
        let Some(index) = may_i.queue.iter().position(|&p| p == player) else {
            return Err(Reject::NotEligibleForMayI);
        };
        if index < may_i.cursor {
            // already declined when prompted
            return Err(Reject::NotEligibleForMayI);
        }
        if may_i.first_caller.is_some() {
            return Err(Reject::MayIAlreadyCalled);
        }
        may_i.first_caller = Some(player);
        debug!(player, "may-i call recorded");
        if index == may_i.cursor {
            // the prompted player's response is now known
            may_i.cursor += 1;
        }
        self.settle_may_i();
        Ok(())
    }

    fn allow_may_i(&mut self, player: usize) -> Result<(), Reject> {
        let Some(may_i) = self.round.may_i.as_mut() else {
            return Err(Reject::NoMayIWindow);
        };
        if may_i.prompted() != Some(player) {
            return Err(Reject::NotPrompted);
        }
        may_i.cursor += 1;
        self.settle_may_i();
        Ok(())
    }

    fn claim_may_i(&mut self, player: usize) -> Result<(), Reject> {
        let Some(may_i) = self.round.may_i.as_ref() else {
            return Err(Reject::NoMayIWindow);
        };
        if may_i.prompted() != Some(player) {
            return Err(Reject::NotPrompted);
        }
        // a claim ends the window immediately, overriding any earlier caller
        self.resolve_may_i(Some(player));
        Ok(())
    }

    // Advances past any response that is already known: a caller who becomes
    // the prompted player wins outright, and exhausting the queue falls back
    // to the first caller or closes the window.
    fn settle_may_i(&mut self) {
        let Some(may_i) = self.round.may_i.as_ref() else {
            return;
        };
        let (prompted, first_caller) = (may_i.prompted(), may_i.first_caller);
        match prompted {
            None => self.resolve_may_i(first_caller),
            Some(player) if first_caller == Some(player) => self.resolve_may_i(Some(player)),
            Some(_) => {}
        }
    }

    fn resolve_may_i(&mut self, winner: Option<usize>) {
        let may_i = self.round.may_i.take().expect("window must be open");
        let Some(winner) = winner else {
            // drawer keeps the stock draw and the discard keeps its top card
            debug!(drawer = may_i.drawer, "may-i window closed with no winner");
            return;
        };
        let entry = self
            .round
            .discard
            .pop()
            .expect("contested card sits on the discard pile");
        debug_assert_eq!(entry.card.id, may_i.card.id);
        self.players[winner].hand.push(entry.card);
        // the penalty draw is skipped only when stock and discard are both dry
        if let Some(penalty) = self.take_from_stock() {
            self.players[winner].hand.push(penalty);
        }
        self.round.current_player = winner;
        self.round.turn = Turn {
            phase: TurnPhase::AwaitingAction,
            laid_down: false,
        };
        debug!(winner, card = may_i.card.id, "may-i resolved");
    }

    fn lay_down(&mut self, player: usize, melds: &[ProposedMeld]) -> Result<(), Reject> {
        if self.round.turn.phase != TurnPhase::AwaitingAction {
            return Err(Reject::WrongTurnPhase);
        }
        if self.players[player].down {
            return Err(Reject::AlreadyDown);
        }
        let contract = contract_for_round(self.round.number);
        let got_sets = melds.iter().filter(|m| m.kind == MeldKind::Set).count();
        let got_runs = melds.iter().filter(|m| m.kind == MeldKind::Run).count();
        if got_sets != contract.sets || got_runs != contract.runs {
            return Err(Reject::ContractMismatch {
                expected_sets: contract.sets,
                expected_runs: contract.runs,
                got_sets,
                got_runs,
            });
        }
        let mut used: HashSet<i32> = HashSet::new();
        let mut built: Vec<(MeldKind, Vec<Card>)> = Vec::with_capacity(melds.len());
        let mut total = 0;
        for proposed in melds {
            let mut cards = Vec::with_capacity(proposed.card_ids.len());
            for &card_id in &proposed.card_ids {
                if !used.insert(card_id) {
                    return Err(Reject::DuplicateCardInMelds { card_id });
                }
                let card = self.players[player]
                    .hand
                    .iter()
                    .find(|c| c.id == card_id)
                    .copied()
                    .ok_or(Reject::CardNotInHand { card_id })?;
                cards.push(card);
                total += 1;
            }
            match proposed.kind {
                MeldKind::Set => {
                    if !validate_set(&cards) {
                        return Err(Reject::InvalidSet);
                    }
                    built.push((MeldKind::Set, cards));
                }
                MeldKind::Run => {
                    built.push((MeldKind::Run, normalize_run(&cards)?));
                }
            }
        }
        if total >= self.players[player].hand.len() {
            return Err(Reject::MustKeepDiscardCard);
        }
        for (kind, cards) in built {
            self.players[player]
                .hand
                .retain(|c| !cards.iter().any(|used| used.id == c.id));
            let id = self.round.next_meld_id;
            self.round.next_meld_id += 1;
            self.round.table.push(Meld {
                id,
                owner: player,
                kind,
                cards,
            });
        }
        self.players[player].down = true;
        self.round.turn.laid_down = true;
        debug!(player, round = self.round.number, "contract laid down");
        Ok(())
    }

    fn lay_off(
        &mut self,
        player: usize,
        card_id: i32,
        meld_id: i32,
        position: Option<RunEnd>,
    ) -> Result<(), Reject> {
        if self.round.turn.phase != TurnPhase::AwaitingAction {
            return Err(Reject::WrongTurnPhase);
        }
        if !self.players[player].down {
            return Err(Reject::NotDown);
        }
        if self.round.turn.laid_down {
            // house rule: no lays off on the turn the contract went down
            return Err(Reject::LayOffOnLayDownTurn);
        }
        let card = self.players[player]
            .hand
            .iter()
            .find(|c| c.id == card_id)
            .copied()
            .ok_or(Reject::CardNotInHand { card_id })?;
        if self.players[player].hand.len() == 1 {
            return Err(Reject::MustKeepDiscardCard);
        }
        let meld_index = self
            .round
            .table
            .iter()
            .position(|m| m.id == meld_id)
            .ok_or(Reject::UnknownMeld { meld_id })?;
        let updated = apply_lay_off(&self.round.table[meld_index], card, position)?;
        self.round.table[meld_index] = updated;
        remove_card(&mut self.players[player].hand, card_id);
        Ok(())
    }

    fn swap_joker(
        &mut self,
        player: usize,
        meld_id: i32,
        joker_id: i32,
        natural_id: i32,
    ) -> Result<(), Reject> {
        if self.round.turn.phase != TurnPhase::AwaitingAction {
            return Err(Reject::WrongTurnPhase);
        }
        let meld_index = self
            .round
            .table
            .iter()
            .position(|m| m.id == meld_id)
            .ok_or(Reject::UnknownMeld { meld_id })?;
        let meld = &self.round.table[meld_index];
        if meld.kind != MeldKind::Run {
            return Err(Reject::SwapRequiresRun);
        }
        let joker_index = meld
            .cards
            .iter()
            .position(|c| c.id == joker_id)
            .ok_or(Reject::CardNotInMeld { card_id: joker_id })?;
        if meld.cards[joker_index].rank != Rank::Joker {
            // a wildcard 2 is never swappable
            return Err(Reject::SwapTargetNotJoker);
        }
        let natural = self.players[player]
            .hand
            .iter()
            .find(|c| c.id == natural_id)
            .copied()
            .ok_or(Reject::CardNotInHand { card_id: natural_id })?;
        if natural.is_wild() {
            return Err(Reject::SwapMismatch);
        }
        let role = wildcard_roles(meld)
            .into_iter()
            .find(|role| role.card_id == joker_id)
            .ok_or(Reject::SwapMismatch)?;
        if natural.run_value() != Some(role.rank_value) || natural.suit != Some(role.suit) {
            return Err(Reject::SwapMismatch);
        }
        let joker = self.round.table[meld_index].cards[joker_index];
        self.round.table[meld_index].cards[joker_index] = natural;
        remove_card(&mut self.players[player].hand, natural_id);
        self.players[player].hand.push(joker);
        debug!(player, meld_id, "joker swapped out of run");
        Ok(())
    }

    fn discard(&mut self, player: usize, card_id: i32) -> Result<(), Reject> {
        if self.round.turn.phase != TurnPhase::AwaitingDiscard {
            return Err(Reject::WrongTurnPhase);
        }
        let card =
            remove_card(&mut self.players[player].hand, card_id).ok_or(Reject::CardNotInHand {
                card_id,
            })?;
        self.round.discard.push(DiscardEntry {
            card,
            discarded_by: Some(player),
        });
        if self.players[player].hand.is_empty() {
            self.end_round(player);
        } else {
            self.round.current_player = (player + 1) % self.players.len();
            self.round.turn = Turn::default();
        }
        Ok(())
    }

    fn skip(&mut self) -> Result<(), Reject> {
        if self.round.turn.phase != TurnPhase::AwaitingAction {
            return Err(Reject::WrongTurnPhase);
        }
        self.round.turn.phase = TurnPhase::AwaitingDiscard;
        Ok(())
    }

    fn reorder_hand(&mut self, player: usize, order: &[i32]) -> Result<(), Reject> {
        let hand = &self.players[player].hand;
        if order.len() != hand.len() {
            return Err(Reject::NotAPermutation);
        }
        let mut remaining = hand.clone();
        let mut reordered = Vec::with_capacity(order.len());
        for &card_id in order {
            let index = remaining
                .iter()
                .position(|c| c.id == card_id)
                .ok_or(Reject::NotAPermutation)?;
            reordered.push(remaining.swap_remove(index));
        }
        self.players[player].hand = reordered;
        Ok(())
    }

    // Scores every remaining hand into the cumulative totals, then either
    // deals the next round with the dealer rotated or, after round 6, ends
    // the game in favor of the lowest total.
    fn end_round(&mut self, goer_out: usize) {
        for player in self.players.iter_mut() {
            player.score += hand_points(&player.hand);
        }
        let totals: Vec<i32> = self.players.iter().map(|p| p.score).collect();
        debug!(round = self.round.number, goer_out, ?totals, "round ended");
        if self.round.number >= LAST_ROUND {
            let winner = totals
                .iter()
                .enumerate()
                .min_by_key(|(_, score)| **score)
                .map(|(player, _)| player)
                .expect("games always have players");
            self.winner = Some(winner);
            debug!(winner, "game complete");
        } else {
            let number = self.round.number + 1;
            let dealer = (self.round.dealer + 1) % self.players.len();
            self.deal_round(number, dealer);
        }
    }
}

fn remove_card(hand: &mut Vec<Card>, card_id: i32) -> Option<Card> {
    let index = hand.iter().position(|c| c.id == card_id)?;
    Some(hand.remove(index))
}

fn validate_config(config: &GameConfig) -> Result<(), ConfigError> {
    if config.players < 2 {
        return Err(ConfigError::NotEnoughPlayers {
            players: config.players,
        });
    }
    if !(FIRST_ROUND..=LAST_ROUND).contains(&config.starting_round) {
        return Err(ConfigError::BadStartingRound {
            round: config.starting_round,
        });
    }
    let available = config.decks * 52 + config.jokers;
    // hands plus the seed discard plus at least one stock card
    let needed = config.players * config.hand_size + 2;
    if needed > available {
        return Err(ConfigError::NotEnoughCards { needed, available });
    }
    Ok(())
}
