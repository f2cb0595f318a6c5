//! No-Limit Hold'em rules engine.
//!
//! [`GameState`] owns every table-rules decision: blind/ante posting, betting
//! round closure, street advancement, all-in semantics, and side-pot aware
//! settlement. Bet sizing policy lives in [`crate::abstraction`], not here.

mod state;

pub use state::GameState;

/// Small blind in chips.
pub const SMALL_BLIND: i64 = 1;

/// Big blind in chips. One big blind is the sizing unit for stacks.
pub const BIG_BLIND: i64 = 2;

/// What a player did at a decision point.
///
/// Declaration order is meaningful: it is the sort order for abstracted
/// action lists and the on-disk action code (Fold = 0 .. AllIn = 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

impl ActionKind {
    /// On-disk code (Fold = 0 .. AllIn = 5).
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Fold => 0,
            Self::Check => 1,
            Self::Call => 2,
            Self::Bet => 3,
            Self::Raise => 4,
            Self::AllIn => 5,
        }
    }

    /// Inverse of [`Self::as_i32`].
    #[must_use]
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Fold),
            1 => Some(Self::Check),
            2 => Some(Self::Call),
            3 => Some(Self::Bet),
            4 => Some(Self::Raise),
            5 => Some(Self::AllIn),
            _ => None,
        }
    }
}

/// A concrete player action.
///
/// For `Bet`, `Raise`, and `AllIn`, `amount` is the **total** number of chips
/// the player has committed in the current street after the action, not the
/// delta added by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action {
    pub kind: ActionKind,
    pub amount: i64,
    pub player: usize,
}

impl Action {
    /// A fold by `player`.
    #[must_use]
    pub fn fold(player: usize) -> Self {
        Self { kind: ActionKind::Fold, amount: 0, player }
    }

    /// A check by `player`.
    #[must_use]
    pub fn check(player: usize) -> Self {
        Self { kind: ActionKind::Check, amount: 0, player }
    }

    /// A call by `player`.
    #[must_use]
    pub fn call(player: usize) -> Self {
        Self { kind: ActionKind::Call, amount: 0, player }
    }

    /// A bet by `player` to `total` chips this street.
    #[must_use]
    pub fn bet(player: usize, total: i64) -> Self {
        Self { kind: ActionKind::Bet, amount: total, player }
    }

    /// A raise by `player` to `total` chips this street.
    #[must_use]
    pub fn raise(player: usize, total: i64) -> Self {
        Self { kind: ActionKind::Raise, amount: total, player }
    }

    /// An all-in commit of `player`'s remaining stack.
    #[must_use]
    pub fn all_in(player: usize) -> Self {
        Self { kind: ActionKind::AllIn, amount: 0, player }
    }
}
