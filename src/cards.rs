// Card identity, wildcard classification, point values and deck construction
// for May I?. Runs order ranks 3 low through Ace high; 2s and Jokers have no
// position of their own and stand in for whatever rank a meld needs.

use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};

/// Lowest rank value a run may occupy.
pub const RUN_MIN_VALUE: i32 = 3;
/// Highest rank value a run may occupy (Ace).
pub const RUN_MAX_VALUE: i32 = 14;

#[derive(
    Debug, Clone, Copy, Serialize, Sequence, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "camelCase")]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

#[derive(
    Debug, Clone, Copy, Serialize, Sequence, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "camelCase")]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
    Joker,
}

impl Rank {
    /// Position of this rank in run order, `None` for the wildcard ranks.
    pub fn run_value(&self) -> Option<i32> {
        match self {
            Rank::Two | Rank::Joker => None,
            Rank::Three => Some(3),
            Rank::Four => Some(4),
            Rank::Five => Some(5),
            Rank::Six => Some(6),
            Rank::Seven => Some(7),
            Rank::Eight => Some(8),
            Rank::Nine => Some(9),
            Rank::Ten => Some(10),
            Rank::Jack => Some(11),
            Rank::Queen => Some(12),
            Rank::King => Some(13),
            Rank::Ace => Some(14),
        }
    }

    /// Rank standing at a given run position.
    pub fn from_run_value(value: i32) -> Option<Rank> {
        match value {
            3 => Some(Rank::Three),
            4 => Some(Rank::Four),
            5 => Some(Rank::Five),
            6 => Some(Rank::Six),
            7 => Some(Rank::Seven),
            8 => Some(Rank::Eight),
            9 => Some(Rank::Nine),
            10 => Some(Rank::Ten),
            11 => Some(Rank::Jack),
            12 => Some(Rank::Queen),
            13 => Some(Rank::King),
            14 => Some(Rank::Ace),
            _ => None,
        }
    }

    /// End-of-round scoring value of a card left in hand.
    pub fn points(&self) -> i32 {
        match self {
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack | Rank::Queen | Rank::King => 10,
            Rank::Ace => 15,
            Rank::Two => 20,
            Rank::Joker => 50,
        }
    }

    pub fn is_wild(&self) -> bool {
        matches!(self, Rank::Two | Rank::Joker)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i32,
    pub rank: Rank,
    pub suit: Option<Suit>,
}

impl Card {
    pub fn natural(id: i32, rank: Rank, suit: Suit) -> Card {
        Card {
            id,
            rank,
            suit: Some(suit),
        }
    }

    pub fn joker(id: i32) -> Card {
        Card {
            id,
            rank: Rank::Joker,
            suit: None,
        }
    }

    pub fn is_wild(&self) -> bool {
        self.rank.is_wild()
    }

    pub fn run_value(&self) -> Option<i32> {
        self.rank.run_value()
    }

    pub fn points(&self) -> i32 {
        self.rank.points()
    }
}

/// Builds the full unshuffled card pool: `decks` standard 52-card decks plus
/// `jokers` jokers, with ids unique across the whole pool.
pub fn build_deck(decks: usize, jokers: usize) -> Vec<Card> {
    let mut cards = Vec::with_capacity(decks * 52 + jokers);
    let mut id = 0;
    for _ in 0..decks {
        for suit in all::<Suit>() {
            for rank in all::<Rank>() {
                if rank == Rank::Joker {
                    continue;
                }
                cards.push(Card::natural(id, rank, suit));
                id += 1;
            }
        }
    }
    for _ in 0..jokers {
        cards.push(Card::joker(id));
        id += 1;
    }
    cards
}

/// Points scored against a player for the cards left in their hand.
pub fn hand_points(hand: &[Card]) -> i32 {
    hand.iter().map(|c| c.points()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_build_deck_counts() {
        let deck = build_deck(2, 4);
        assert_eq!(deck.len(), 2 * 52 + 4);
        let ids: HashSet<i32> = deck.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), deck.len());
        assert_eq!(deck.iter().filter(|c| c.rank == Rank::Joker).count(), 4);
        assert_eq!(deck.iter().filter(|c| c.is_wild()).count(), 12);
        assert!(deck
            .iter()
            .all(|c| c.suit.is_some() || c.rank == Rank::Joker));
    }

    #[test]
    fn test_run_values_cover_three_through_ace() {
        assert_eq!(Rank::Three.run_value(), Some(3));
        assert_eq!(Rank::Ten.run_value(), Some(10));
        assert_eq!(Rank::Jack.run_value(), Some(11));
        assert_eq!(Rank::Ace.run_value(), Some(14));
        assert_eq!(Rank::Two.run_value(), None);
        assert_eq!(Rank::Joker.run_value(), None);
        for value in RUN_MIN_VALUE..=RUN_MAX_VALUE {
            assert_eq!(Rank::from_run_value(value).unwrap().run_value(), Some(value));
        }
        assert_eq!(Rank::from_run_value(2), None);
        assert_eq!(Rank::from_run_value(15), None);
    }

    #[test]
    fn test_going_out_scoring_example() {
        // 3♥ + J♦ + A♠ + Joker = 3 + 10 + 15 + 50
        let hand = vec![
            Card::natural(0, Rank::Three, Suit::Hearts),
            Card::natural(1, Rank::Jack, Suit::Diamonds),
            Card::natural(2, Rank::Ace, Suit::Spades),
            Card::joker(3),
        ];
        assert_eq!(hand_points(&hand), 78);
    }

    #[test]
    fn test_wildcard_points() {
        assert_eq!(Rank::Two.points(), 20);
        assert_eq!(Rank::Joker.points(), 50);
        assert_eq!(Rank::King.points(), 10);
    }
}
