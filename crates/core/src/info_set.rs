//! Infoset keys.
//!
//! A decision point is identified by a canonical string: acting player,
//! index-sorted hole cards, street, index-sorted board padded to five slots,
//! and the action history. The string form is an external contract: it is
//! stored verbatim in checkpoints, so its layout must not drift.

use std::fmt::Write as _;

use crate::cards::{Card, Street};
use crate::error::SolverError;
use crate::game::GameState;

/// The information available to the acting player at one decision point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InfoSet {
    key: String,
}

impl InfoSet {
    /// Build the infoset for `player` from a live traversal state.
    ///
    /// # Errors
    /// `MissingHand` when the player has no hole cards.
    pub fn from_state(state: &GameState, player: usize) -> Result<Self, SolverError> {
        let hand = state.hand(player).ok_or(SolverError::MissingHand(player))?;
        Ok(Self::from_components(
            hand,
            state.history_string(),
            state,
            player,
        ))
    }

    /// Build an infoset from an explicit hand and history, with `context`
    /// supplying the street and board.
    ///
    /// Used for post-training strategy queries that sweep all 1326 hole
    /// combinations through one betting context.
    #[must_use]
    pub fn from_components(
        hand: [Card; 2],
        history: &str,
        context: &GameState,
        player: usize,
    ) -> Self {
        Self {
            key: build_key(player, hand, context.street(), context.board(), history),
        }
    }

    /// The canonical string key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Consume the infoset, yielding the owned key.
    #[must_use]
    pub fn into_key(self) -> String {
        self.key
    }
}

/// `P<idx>:<sorted_hole>|<street>|<len><sorted_board>[-- per missing]|<history>`
fn build_key(
    player: usize,
    hand: [Card; 2],
    street: Street,
    board: &[Card],
    history: &str,
) -> String {
    let mut hole = hand;
    hole.sort_unstable();

    let mut sorted_board: Vec<Card> = board.to_vec();
    sorted_board.sort_unstable();

    let mut key = String::with_capacity(32 + history.len());
    let _ = write!(key, "P{player}:{}{}|{}|", hole[0], hole[1], street.as_u8());
    let _ = write!(key, "{}", sorted_board.len());
    for card in &sorted_board {
        let _ = write!(key, "{card}");
    }
    for _ in sorted_board.len()..5 {
        key.push_str("--");
    }
    key.push('|');
    key.push_str(history);
    key
}
