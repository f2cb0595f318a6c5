use thiserror::Error;

/// Errors that can occur in the solver.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("illegal action: {0}")]
    IllegalAction(String),

    #[error("deck exhausted: needed {needed} cards, {remaining} remaining")]
    DeckExhausted { needed: usize, remaining: usize },

    #[error("player {0} has no hole cards at a decision point")]
    MissingHand(usize),

    #[error(
        "node action count mismatch for key {key}: node has {node_actions}, call site computed {expected}"
    )]
    NodeMismatch {
        key: String,
        node_actions: usize,
        expected: usize,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("checkpoint version mismatch: expected {expected}, got {actual}")]
    CheckpointVersion { expected: u32, actual: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
