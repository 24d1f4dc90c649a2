// Meld legality and run normalization. A run's card order is semantically
// meaningful: position i stands for rank value (low + i), which is how a
// wildcard's stand-in rank is derived. Sets are unordered.
//
// Invariant for both meld kinds: wildcards never outnumber naturals.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cards::{Card, Suit, RUN_MAX_VALUE, RUN_MIN_VALUE};

pub const SET_MIN_CARDS: usize = 3;
pub const RUN_MIN_CARDS: usize = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MeldKind {
    Set,
    Run,
}

/// A laid-down, identified group of cards on the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Meld {
    pub id: i32,
    pub owner: usize,
    pub kind: MeldKind,
    /// Low-to-high position order for runs; arbitrary for sets.
    pub cards: Vec<Card>,
}

/// Which end of a run a lay-off extends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RunEnd {
    Low,
    High,
}

/// Occupied rank range of a run, derived from its first natural card.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunBounds {
    pub low: i32,
    pub high: i32,
    pub suit: Suit,
}

/// The rank/suit a wildcard in a run is currently standing in for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WildcardRole {
    pub card_id: i32,
    pub rank_value: i32,
    pub suit: Suit,
}

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunError {
    #[error("a run needs at least 4 cards")]
    TooFewCards,
    #[error("a run cannot be made of wildcards alone")]
    AllWildcards,
    #[error("naturals in a run must share one suit")]
    MixedSuits,
    #[error("two naturals of the same rank cannot share a run")]
    DuplicateRank,
    #[error("wildcards may never outnumber naturals")]
    TooManyWildcards,
    #[error("not enough wildcards to fill the gaps between naturals")]
    UnfillableGaps,
    #[error("no wildcard placement keeps the run between 3 and ace")]
    NoFeasiblePlacement,
}

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LayOffError {
    #[error("the card does not fit this meld")]
    DoesNotFit,
    #[error("the card fits both ends; an explicit position is required")]
    PositionRequired,
    #[error("the card does not fit the requested end")]
    PositionNotLegal,
}

fn naturals(cards: &[Card]) -> Vec<&Card> {
    cards.iter().filter(|c| !c.is_wild()).collect()
}

/// True iff the cards form a legal set: at least 3 cards, wildcards not
/// outnumbering naturals, every natural sharing one rank. Duplicate suits
/// are allowed (multiple decks are in play).
pub fn validate_set(cards: &[Card]) -> bool {
    if cards.len() < SET_MIN_CARDS {
        return false;
    }
    let naturals = naturals(cards);
    if cards.len() - naturals.len() > naturals.len() {
        return false;
    }
    let Some(first) = naturals.first() else {
        return false;
    };
    naturals.iter().all(|c| c.rank == first.rank)
}

/// True iff the cards, read as position-ordered, form a legal run: at least
/// 4 cards of one suit occupying strictly increasing gap-free positions
/// (wildcards filling any position) between rank 3 and ace.
pub fn validate_run(cards: &[Card]) -> bool {
    if cards.len() < RUN_MIN_CARDS {
        return false;
    }
    let wild_count = cards.iter().filter(|c| c.is_wild()).count();
    if wild_count > cards.len() - wild_count {
        return false;
    }
    let Some(bounds) = run_bounds(cards) else {
        return false;
    };
    if bounds.low < RUN_MIN_VALUE || bounds.high > RUN_MAX_VALUE {
        return false;
    }
    for (i, card) in cards.iter().enumerate() {
        if card.is_wild() {
            continue;
        }
        if card.suit != Some(bounds.suit) {
            return false;
        }
        if card.run_value() != Some(bounds.low + i as i32) {
            return false;
        }
    }
    true
}

/// Rank range a position-ordered run occupies, anchored by its first natural
/// card. Returns `None` instead of failing when no natural fixes the frame:
/// bounds are also computed against partially-constructed selections, so an
/// all-wildcard input must not be an error here.
pub fn run_bounds(cards: &[Card]) -> Option<RunBounds> {
    let (index, first) = cards.iter().enumerate().find(|(_, c)| !c.is_wild())?;
    let low = first.run_value()? - index as i32;
    Some(RunBounds {
        low,
        high: low + cards.len() as i32 - 1,
        suit: first.suit?,
    })
}

/// For a run meld, the rank/suit each wildcard is standing in for. Empty for
/// sets (a set wildcard has a rank but no particular suit) and for anything
/// without bounds.
pub fn wildcard_roles(meld: &Meld) -> Vec<WildcardRole> {
    if meld.kind != MeldKind::Run {
        return vec![];
    }
    let Some(bounds) = run_bounds(&meld.cards) else {
        return vec![];
    };
    meld.cards
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_wild())
        .map(|(i, c)| WildcardRole {
            card_id: c.id,
            rank_value: bounds.low + i as i32,
            suit: bounds.suit,
        })
        .collect()
}

/// Orders an arbitrarily-selected group of cards into a valid run if one
/// exists. Internal gaps between naturals are filled with wildcards first;
/// spare wildcards are pushed to the ends, trying the high end first, and
/// the first split that keeps both ends inside [3, ace] wins.
pub fn normalize_run(cards: &[Card]) -> Result<Vec<Card>, RunError> {
    if cards.len() < RUN_MIN_CARDS {
        return Err(RunError::TooFewCards);
    }
    let mut naturals: Vec<Card> = cards.iter().filter(|c| !c.is_wild()).cloned().collect();
    let wildcards: Vec<Card> = cards.iter().filter(|c| c.is_wild()).cloned().collect();
    if naturals.is_empty() {
        return Err(RunError::AllWildcards);
    }
    if wildcards.len() > naturals.len() {
        return Err(RunError::TooManyWildcards);
    }
    let suit = naturals[0].suit;
    if naturals.iter().any(|c| c.suit != suit) {
        return Err(RunError::MixedSuits);
    }
    naturals.sort_by_key(|c| c.run_value());
    if naturals
        .windows(2)
        .any(|pair| pair[0].run_value() == pair[1].run_value())
    {
        return Err(RunError::DuplicateRank);
    }
    let low_natural = naturals[0].run_value().expect("naturals have run values");
    let high_natural = naturals[naturals.len() - 1]
        .run_value()
        .expect("naturals have run values");
    let natural_span = (high_natural - low_natural + 1) as usize;
    let gaps = natural_span - naturals.len();
    if gaps > wildcards.len() {
        return Err(RunError::UnfillableGaps);
    }
    let spare = wildcards.len() - gaps;
    for below in 0..=spare {
        let low = low_natural - below as i32;
        let high = high_natural + (spare - below) as i32;
        if low < RUN_MIN_VALUE || high > RUN_MAX_VALUE {
            continue;
        }
        // Total span now equals the card count; walk the value range placing
        // naturals where they belong and wildcards everywhere else.
        let mut ordered = Vec::with_capacity(cards.len());
        let mut next_natural = naturals.iter().peekable();
        let mut next_wildcard = wildcards.iter();
        for value in low..=high {
            match next_natural.peek() {
                Some(natural) if natural.run_value() == Some(value) => {
                    ordered.push(*next_natural.next().expect("peeked natural"));
                }
                _ => {
                    ordered.push(*next_wildcard.next().expect("wildcard budget checked"));
                }
            }
        }
        return Ok(ordered);
    }
    Err(RunError::NoFeasiblePlacement)
}

/// Whether a card can legally extend a run at the given end.
fn can_extend_run(meld: &Meld, card: &Card, end: RunEnd) -> bool {
    let Some(bounds) = run_bounds(&meld.cards) else {
        return false;
    };
    let target = match end {
        RunEnd::Low => bounds.low - 1,
        RunEnd::High => bounds.high + 1,
    };
    if !(RUN_MIN_VALUE..=RUN_MAX_VALUE).contains(&target) {
        return false;
    }
    if card.is_wild() {
        let wild_count = meld.cards.iter().filter(|c| c.is_wild()).count() + 1;
        return wild_count <= meld.cards.len() + 1 - wild_count;
    }
    card.suit == Some(bounds.suit) && card.run_value() == Some(target)
}

fn can_add_to_set(meld: &Meld, card: &Card) -> bool {
    if card.is_wild() {
        let wild_count = meld.cards.iter().filter(|c| c.is_wild()).count() + 1;
        return wild_count <= meld.cards.len() + 1 - wild_count;
    }
    naturals(&meld.cards)
        .first()
        .map(|first| first.rank == card.rank)
        .unwrap_or(false)
}

/// True exactly when a lay-off of `card` onto `meld` would be legal at both
/// ends of a run, so the caller must choose one explicitly. Sets and
/// single-ended runs never need a choice.
pub fn needs_position_choice(card: &Card, meld: &Meld) -> bool {
    meld.kind == MeldKind::Run
        && can_extend_run(meld, card, RunEnd::Low)
        && can_extend_run(meld, card, RunEnd::High)
}

/// Applies one lay-off to a meld, returning the resulting meld. A run
/// extension that fits only one end is auto-resolved; one that fits both
/// demands an explicit position.
pub fn apply_lay_off(
    meld: &Meld,
    card: Card,
    position: Option<RunEnd>,
) -> Result<Meld, LayOffError> {
    let mut result = meld.clone();
    match meld.kind {
        MeldKind::Set => {
            if !can_add_to_set(meld, &card) {
                return Err(LayOffError::DoesNotFit);
            }
            result.cards.push(card);
        }
        MeldKind::Run => {
            let low_ok = can_extend_run(meld, &card, RunEnd::Low);
            let high_ok = can_extend_run(meld, &card, RunEnd::High);
            let end = match position {
                Some(end) => {
                    let requested_ok = match end {
                        RunEnd::Low => low_ok,
                        RunEnd::High => high_ok,
                    };
                    if !requested_ok {
                        return Err(LayOffError::PositionNotLegal);
                    }
                    end
                }
                None => {
                    if low_ok && high_ok {
                        return Err(LayOffError::PositionRequired);
                    } else if low_ok {
                        RunEnd::Low
                    } else if high_ok {
                        RunEnd::High
                    } else {
                        return Err(LayOffError::DoesNotFit);
                    }
                }
            };
            match end {
                RunEnd::Low => result.cards.insert(0, card),
                RunEnd::High => result.cards.push(card),
            }
        }
    }
    Ok(result)
}

/// A lay-off that has been chosen but not yet committed to the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StagedLayOff {
    pub card: Card,
    pub position: Option<RunEnd>,
}

/// The meld as it will look once every staged lay-off has been applied, in
/// staging order. Each later decision is evaluated against the accumulated
/// result, not the original table state, so a previously staged card that
/// consumed one end is taken into account.
pub fn effective_meld(meld: &Meld, staged: &[StagedLayOff]) -> Result<Meld, LayOffError> {
    let mut result = meld.clone();
    for lay_off in staged {
        result = apply_lay_off(&result, lay_off.card, lay_off.position)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::Rank;

    fn natural(id: i32, rank: Rank, suit: Suit) -> Card {
        Card::natural(id, rank, suit)
    }

    fn two(id: i32) -> Card {
        Card::natural(id, Rank::Two, Suit::Clubs)
    }

    fn run_meld(cards: Vec<Card>) -> Meld {
        Meld {
            id: 0,
            owner: 0,
            kind: MeldKind::Run,
            cards,
        }
    }

    fn set_meld(cards: Vec<Card>) -> Meld {
        Meld {
            id: 0,
            owner: 0,
            kind: MeldKind::Set,
            cards,
        }
    }

    #[test]
    fn test_validate_set() {
        let hearts_nines = vec![
            natural(0, Rank::Nine, Suit::Hearts),
            natural(1, Rank::Nine, Suit::Hearts),
            natural(2, Rank::Nine, Suit::Spades),
        ];
        assert!(validate_set(&hearts_nines));
        // wildcard tie with naturals is allowed
        assert!(validate_set(&[
            natural(0, Rank::Nine, Suit::Hearts),
            natural(1, Rank::Nine, Suit::Spades),
            two(2),
            Card::joker(3),
        ]));
        // wildcards outnumbering naturals is not
        assert!(!validate_set(&[
            natural(0, Rank::Nine, Suit::Hearts),
            two(1),
            Card::joker(2),
        ]));
        // mixed ranks
        assert!(!validate_set(&[
            natural(0, Rank::Nine, Suit::Hearts),
            natural(1, Rank::Eight, Suit::Hearts),
            natural(2, Rank::Nine, Suit::Spades),
        ]));
        // too few
        assert!(!validate_set(&[
            natural(0, Rank::Nine, Suit::Hearts),
            natural(1, Rank::Nine, Suit::Spades),
        ]));
    }

    #[derive(Debug)]
    struct RunCase {
        description: &'static str,
        cards: Vec<Card>,
        valid: bool,
    }

    #[test]
    fn test_validate_run() {
        let cases = [
            RunCase {
                description: "plain four-card run",
                cards: vec![
                    natural(0, Rank::Five, Suit::Hearts),
                    natural(1, Rank::Six, Suit::Hearts),
                    natural(2, Rank::Seven, Suit::Hearts),
                    natural(3, Rank::Eight, Suit::Hearts),
                ],
                valid: true,
            },
            RunCase {
                description: "wildcard filling an internal gap",
                cards: vec![
                    natural(0, Rank::Five, Suit::Hearts),
                    two(1),
                    natural(2, Rank::Seven, Suit::Hearts),
                    natural(3, Rank::Eight, Suit::Hearts),
                ],
                valid: true,
            },
            RunCase {
                description: "joker standing above the high natural",
                cards: vec![
                    natural(0, Rank::Queen, Suit::Spades),
                    natural(1, Rank::King, Suit::Spades),
                    natural(2, Rank::Ace, Suit::Spades),
                    Card::joker(3),
                ],
                valid: false, // joker would stand for a rank above ace
            },
            RunCase {
                description: "run reaching ace at the top",
                cards: vec![
                    natural(0, Rank::Jack, Suit::Spades),
                    natural(1, Rank::Queen, Suit::Spades),
                    natural(2, Rank::King, Suit::Spades),
                    natural(3, Rank::Ace, Suit::Spades),
                ],
                valid: true,
            },
            RunCase {
                description: "implied start below three",
                cards: vec![
                    Card::joker(0),
                    natural(1, Rank::Three, Suit::Hearts),
                    natural(2, Rank::Four, Suit::Hearts),
                    natural(3, Rank::Five, Suit::Hearts),
                ],
                valid: false,
            },
            RunCase {
                description: "gap without a wildcard",
                cards: vec![
                    natural(0, Rank::Five, Suit::Hearts),
                    natural(1, Rank::Six, Suit::Hearts),
                    natural(2, Rank::Eight, Suit::Hearts),
                    natural(3, Rank::Nine, Suit::Hearts),
                ],
                valid: false,
            },
            RunCase {
                description: "duplicate rank",
                cards: vec![
                    natural(0, Rank::Five, Suit::Hearts),
                    natural(1, Rank::Five, Suit::Hearts),
                    natural(2, Rank::Six, Suit::Hearts),
                    natural(3, Rank::Seven, Suit::Hearts),
                ],
                valid: false,
            },
            RunCase {
                description: "two suits",
                cards: vec![
                    natural(0, Rank::Five, Suit::Hearts),
                    natural(1, Rank::Six, Suit::Spades),
                    natural(2, Rank::Seven, Suit::Hearts),
                    natural(3, Rank::Eight, Suit::Hearts),
                ],
                valid: false,
            },
            RunCase {
                description: "wildcards outnumbering naturals",
                cards: vec![
                    natural(0, Rank::Five, Suit::Hearts),
                    two(1),
                    Card::joker(2),
                    two(3),
                ],
                valid: false,
            },
            RunCase {
                description: "three cards is too few",
                cards: vec![
                    natural(0, Rank::Five, Suit::Hearts),
                    natural(1, Rank::Six, Suit::Hearts),
                    natural(2, Rank::Seven, Suit::Hearts),
                ],
                valid: false,
            },
        ];
        for case in cases {
            assert_eq!(
                validate_run(&case.cards),
                case.valid,
                "{}",
                case.description
            );
        }
    }

    #[test]
    fn test_run_bounds() {
        let cards = vec![
            two(0),
            natural(1, Rank::Six, Suit::Hearts),
            natural(2, Rank::Seven, Suit::Hearts),
            natural(3, Rank::Eight, Suit::Hearts),
        ];
        assert_eq!(
            run_bounds(&cards),
            Some(RunBounds {
                low: 5,
                high: 8,
                suit: Suit::Hearts
            })
        );
        // all wildcards: indeterminate, not a panic
        assert_eq!(run_bounds(&[two(0), Card::joker(1)]), None);
    }

    #[test]
    fn test_wildcard_roles() {
        let meld = run_meld(vec![
            natural(0, Rank::Five, Suit::Hearts),
            Card::joker(1),
            natural(2, Rank::Seven, Suit::Hearts),
            two(3),
        ]);
        assert_eq!(
            wildcard_roles(&meld),
            vec![
                WildcardRole {
                    card_id: 1,
                    rank_value: 6,
                    suit: Suit::Hearts
                },
                WildcardRole {
                    card_id: 3,
                    rank_value: 8,
                    suit: Suit::Hearts
                },
            ]
        );
        // roles are positional; sets have none
        let set = set_meld(vec![
            natural(0, Rank::Nine, Suit::Hearts),
            natural(1, Rank::Nine, Suit::Spades),
            Card::joker(2),
        ]);
        assert!(wildcard_roles(&set).is_empty());
    }

    #[test]
    fn test_normalize_run_orders_arbitrary_selection() {
        let cards = vec![
            natural(0, Rank::Seven, Suit::Hearts),
            natural(1, Rank::Five, Suit::Hearts),
            natural(2, Rank::Eight, Suit::Hearts),
            natural(3, Rank::Six, Suit::Hearts),
        ];
        let ordered = normalize_run(&cards).unwrap();
        assert_eq!(
            ordered.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 3, 0, 2]
        );
        assert!(validate_run(&ordered));
    }

    #[test]
    fn test_normalize_run_fills_gap_with_wildcard() {
        let cards = vec![
            natural(0, Rank::Three, Suit::Hearts),
            natural(1, Rank::Four, Suit::Hearts),
            natural(2, Rank::Six, Suit::Hearts),
            two(3),
        ];
        let ordered = normalize_run(&cards).unwrap();
        assert_eq!(
            ordered.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![0, 1, 3, 2]
        );
        assert!(validate_run(&ordered));
    }

    #[test]
    fn test_normalize_run_spares_respect_bounds() {
        // K-A naturals force both spare wildcards below
        let cards = vec![
            Card::joker(0),
            natural(1, Rank::Ace, Suit::Spades),
            two(2),
            natural(3, Rank::King, Suit::Spades),
        ];
        let ordered = normalize_run(&cards).unwrap();
        assert!(validate_run(&ordered));
        let bounds = run_bounds(&ordered).unwrap();
        assert_eq!((bounds.low, bounds.high), (11, 14));
        // 3-4 naturals force both spares above
        let cards = vec![
            natural(0, Rank::Three, Suit::Hearts),
            natural(1, Rank::Four, Suit::Hearts),
            two(2),
            Card::joker(3),
        ];
        let bounds = run_bounds(&normalize_run(&cards).unwrap()).unwrap();
        assert_eq!((bounds.low, bounds.high), (3, 6));
    }

    #[test]
    fn test_normalize_run_failures_are_described() {
        assert_eq!(
            normalize_run(&[two(0), Card::joker(1), two(2), Card::joker(3)]),
            Err(RunError::AllWildcards)
        );
        assert_eq!(
            normalize_run(&[
                natural(0, Rank::Five, Suit::Hearts),
                natural(1, Rank::Six, Suit::Spades),
                natural(2, Rank::Seven, Suit::Hearts),
                natural(3, Rank::Eight, Suit::Hearts),
            ]),
            Err(RunError::MixedSuits)
        );
        assert_eq!(
            normalize_run(&[
                natural(0, Rank::Three, Suit::Hearts),
                natural(1, Rank::Nine, Suit::Hearts),
                natural(2, Rank::Ten, Suit::Hearts),
                two(3),
            ]),
            Err(RunError::UnfillableGaps)
        );
        assert_eq!(
            normalize_run(&[
                natural(0, Rank::Five, Suit::Hearts),
                natural(1, Rank::Five, Suit::Hearts),
                natural(2, Rank::Six, Suit::Hearts),
                natural(3, Rank::Seven, Suit::Hearts),
            ]),
            Err(RunError::DuplicateRank)
        );
        assert_eq!(
            normalize_run(&[natural(0, Rank::Five, Suit::Hearts), two(1), two(2)]),
            Err(RunError::TooFewCards)
        );
    }

    #[test]
    fn test_normalized_runs_always_validate() {
        // round-trip property over a spread of accepted selections
        let selections = [
            vec![
                natural(0, Rank::Ten, Suit::Clubs),
                Card::joker(1),
                natural(2, Rank::Queen, Suit::Clubs),
                natural(3, Rank::King, Suit::Clubs),
                natural(4, Rank::Ace, Suit::Clubs),
            ],
            vec![
                two(0),
                natural(1, Rank::Four, Suit::Diamonds),
                natural(2, Rank::Five, Suit::Diamonds),
                natural(3, Rank::Six, Suit::Diamonds),
            ],
            vec![
                natural(0, Rank::Seven, Suit::Spades),
                natural(1, Rank::Nine, Suit::Spades),
                two(2),
                natural(3, Rank::Ten, Suit::Spades),
                Card::joker(4),
                natural(5, Rank::Jack, Suit::Spades),
            ],
        ];
        for selection in selections {
            let ordered = normalize_run(&selection).unwrap();
            assert!(validate_run(&ordered), "{:?}", ordered);
            assert_eq!(ordered.len(), selection.len());
        }
    }

    #[test]
    fn test_needs_position_choice() {
        let middle_run = run_meld(vec![
            natural(0, Rank::Five, Suit::Hearts),
            natural(1, Rank::Six, Suit::Hearts),
            natural(2, Rank::Seven, Suit::Hearts),
            natural(3, Rank::Eight, Suit::Hearts),
        ]);
        // a wildcard fits both ends
        assert!(needs_position_choice(&Card::joker(9), &middle_run));
        // a natural only ever fits one end
        assert!(!needs_position_choice(
            &natural(9, Rank::Four, Suit::Hearts),
            &middle_run
        ));
        // run anchored at 3: only the high end remains
        let low_run = run_meld(vec![
            natural(0, Rank::Three, Suit::Hearts),
            natural(1, Rank::Four, Suit::Hearts),
            natural(2, Rank::Five, Suit::Hearts),
            natural(3, Rank::Six, Suit::Hearts),
        ]);
        assert!(!needs_position_choice(&Card::joker(9), &low_run));
        // sets never need a choice
        let set = set_meld(vec![
            natural(0, Rank::Nine, Suit::Hearts),
            natural(1, Rank::Nine, Suit::Spades),
            natural(2, Rank::Nine, Suit::Clubs),
        ]);
        assert!(!needs_position_choice(&Card::joker(9), &set));
    }

    #[test]
    fn test_apply_lay_off_auto_resolves_single_end() {
        let run = run_meld(vec![
            natural(0, Rank::Five, Suit::Hearts),
            natural(1, Rank::Six, Suit::Hearts),
            natural(2, Rank::Seven, Suit::Hearts),
            natural(3, Rank::Eight, Suit::Hearts),
        ]);
        let extended = apply_lay_off(&run, natural(9, Rank::Nine, Suit::Hearts), None).unwrap();
        assert_eq!(extended.cards.last().unwrap().id, 9);
        assert!(validate_run(&extended.cards));

        let extended = apply_lay_off(&run, natural(9, Rank::Four, Suit::Hearts), None).unwrap();
        assert_eq!(extended.cards.first().unwrap().id, 9);

        assert_eq!(
            apply_lay_off(&run, Card::joker(9), None),
            Err(LayOffError::PositionRequired)
        );
        assert_eq!(
            apply_lay_off(&run, natural(9, Rank::Jack, Suit::Hearts), None),
            Err(LayOffError::DoesNotFit)
        );
        assert_eq!(
            apply_lay_off(&run, natural(9, Rank::Nine, Suit::Hearts), Some(RunEnd::Low)),
            Err(LayOffError::PositionNotLegal)
        );
    }

    #[test]
    fn test_apply_lay_off_to_set() {
        let set = set_meld(vec![
            natural(0, Rank::Nine, Suit::Hearts),
            natural(1, Rank::Nine, Suit::Spades),
            natural(2, Rank::Nine, Suit::Clubs),
        ]);
        let extended = apply_lay_off(&set, natural(9, Rank::Nine, Suit::Hearts), None).unwrap();
        assert_eq!(extended.cards.len(), 4);
        assert!(validate_set(&extended.cards));
        assert_eq!(
            apply_lay_off(&set, natural(9, Rank::Eight, Suit::Hearts), None),
            Err(LayOffError::DoesNotFit)
        );
        // wildcard balance holds across additions
        let extended = apply_lay_off(&set, Card::joker(9), None).unwrap();
        assert_eq!(
            apply_lay_off(&extended, two(10), None),
            Err(LayOffError::DoesNotFit)
        );
    }

    #[test]
    fn test_effective_meld_sees_staged_cards() {
        let run = run_meld(vec![
            natural(0, Rank::Five, Suit::Hearts),
            natural(1, Rank::Six, Suit::Hearts),
            natural(2, Rank::Seven, Suit::Hearts),
            natural(3, Rank::Eight, Suit::Hearts),
        ]);
        // the first staged card consumes the low end down to 3, so the joker
        // no longer has a choice: low would fall below 3
        let staged = vec![
            StagedLayOff {
                card: natural(9, Rank::Four, Suit::Hearts),
                position: None,
            },
            StagedLayOff {
                card: natural(10, Rank::Three, Suit::Hearts),
                position: None,
            },
        ];
        let effective = effective_meld(&run, &staged).unwrap();
        assert!(!needs_position_choice(&Card::joker(11), &effective));
        let finished = apply_lay_off(&effective, Card::joker(11), None).unwrap();
        assert_eq!(run_bounds(&finished.cards).unwrap().high, 9);
    }

    #[test]
    fn test_effective_meld_matches_incremental_application() {
        let run = run_meld(vec![
            natural(0, Rank::Five, Suit::Hearts),
            natural(1, Rank::Six, Suit::Hearts),
            natural(2, Rank::Seven, Suit::Hearts),
            natural(3, Rank::Eight, Suit::Hearts),
        ]);
        let staged = vec![
            StagedLayOff {
                card: Card::joker(9),
                position: Some(RunEnd::Low),
            },
            StagedLayOff {
                card: two(10),
                position: Some(RunEnd::Low),
            },
        ];
        let one_pass = effective_meld(&run, &staged).unwrap();
        let mut incremental = run.clone();
        for lay_off in &staged {
            incremental = apply_lay_off(&incremental, lay_off.card, lay_off.position).unwrap();
        }
        assert_eq!(one_pass, incremental);
        assert_eq!(
            one_pass.cards.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![10, 9, 0, 1, 2, 3]
        );
    }
}
