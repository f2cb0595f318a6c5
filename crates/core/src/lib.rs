#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! No-Limit Hold'em CFR+ solver core.
//!
//! Computes approximate Nash-equilibrium strategies for NLHE variants via
//! external-sampling Monte-Carlo CFR with CFR+ regret flooring.
//!
//! # Modules
//!
//! - `cards` - card/deck primitives and the street machine
//! - `game` - the rules engine (blinds, betting, side pots)
//! - `abstraction` - the discrete bet-sizing abstraction
//! - `info_set` - canonical decision-point keys
//! - `node` - per-infoset storage and the concurrent node table
//! - `solver` - the CFR+ traversal and training loop
//! - `checkpoint` - binary save/resume
//! - `export` - position-keyed JSON strategy export
//! - `equity` - Monte-Carlo equity probes
//! - `error` - error types

pub mod abstraction;
pub mod cards;
pub mod checkpoint;
pub mod equity;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod game;
pub mod hands;
pub mod info_set;
pub mod node;
pub mod solver;

pub use cards::{Card, Street};
pub use error::SolverError;
pub use game::{Action, ActionKind, GameState};
pub use solver::{CfrSolver, TrainConfig};
