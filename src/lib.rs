//! Continuously-cycling, server-authoritative poster-guessing game.
//!
//! A poster is progressively revealed through random peepholes, players
//! submit free-text guesses over WebSocket, and the engine judges and
//! broadcasts results before moving to the next round.

pub mod clients;
pub mod config;
pub mod filters;
pub mod game;
pub mod matching;
pub mod media;
pub mod protocol;
pub mod reveal;
pub mod ws;
