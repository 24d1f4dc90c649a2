/*
Game: May I? (contract rummy family)
A rules engine for the six-round contract game with May-I claim rights
on discards. Pure state machine: hosts drive it one command at a time
and get back either a new state or a structured rejection.
*/

pub mod cards;
pub mod contract;
pub mod error;
pub mod game;
pub mod meld;
pub mod snapshot;
