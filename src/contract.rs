// The six-round contract arc. Each round demands an exact combination of
// sets and runs; extra melds in the same lay-down are never allowed.

use serde::{Deserialize, Serialize};

pub const FIRST_ROUND: u8 = 1;
pub const LAST_ROUND: u8 = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub sets: usize,
    pub runs: usize,
}

const CONTRACTS: [Contract; 6] = [
    Contract { sets: 2, runs: 0 },
    Contract { sets: 1, runs: 1 },
    Contract { sets: 0, runs: 2 },
    Contract { sets: 3, runs: 0 },
    Contract { sets: 2, runs: 1 },
    Contract { sets: 1, runs: 2 },
];

/// Contract for a round number in 1..=6.
pub fn contract_for_round(number: u8) -> Contract {
    assert!(
        (FIRST_ROUND..=LAST_ROUND).contains(&number),
        "round number out of range: {}",
        number
    );
    CONTRACTS[(number - 1) as usize]
}
