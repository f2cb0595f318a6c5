//! Card and street primitives.
//!
//! Cards are indices 0..52 with `rank = idx / 4` (0 = deuce .. 12 = ace) and
//! `suit = idx % 4` (0 = clubs, 1 = diamonds, 2 = hearts, 3 = spades), so
//! sorting by index sorts by rank first. The printable form is
//! `"<rank><suit>"`, e.g. `"As"`, `"Td"`, `"2c"`.

use std::fmt;
use std::str::FromStr;

use crate::error::SolverError;

const RANK_CHARS: [char; 13] = [
    '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A',
];
const SUIT_CHARS: [char; 4] = ['c', 'd', 'h', 's'];

/// A playing card, stored as an index in 0..52.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card(u8);

impl Card {
    /// Build a card from a raw index.
    ///
    /// # Panics
    /// Panics if `index >= 52`.
    #[must_use]
    pub fn from_index(index: u8) -> Self {
        assert!(index < 52, "card index out of range: {index}");
        Self(index)
    }

    /// Build a card from rank (0 = deuce .. 12 = ace) and suit (0..4).
    ///
    /// # Panics
    /// Panics if `rank >= 13` or `suit >= 4`.
    #[must_use]
    pub fn new(rank: u8, suit: u8) -> Self {
        assert!(rank < 13 && suit < 4, "invalid rank/suit: {rank}/{suit}");
        Self(rank * 4 + suit)
    }

    /// The raw index in 0..52.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Rank in 0..13 (0 = deuce, 12 = ace).
    #[must_use]
    #[inline]
    pub const fn rank(self) -> u8 {
        self.0 / 4
    }

    /// Suit in 0..4 (0 = clubs, 1 = diamonds, 2 = hearts, 3 = spades).
    #[must_use]
    #[inline]
    pub const fn suit(self) -> u8 {
        self.0 % 4
    }

    /// Rank character (`'2'`..`'A'`).
    #[must_use]
    pub fn rank_char(self) -> char {
        RANK_CHARS[self.rank() as usize]
    }

    /// Suit character (`'c'`, `'d'`, `'h'`, `'s'`).
    #[must_use]
    pub fn suit_char(self) -> char {
        SUIT_CHARS[self.suit() as usize]
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank_char(), self.suit_char())
    }
}

impl FromStr for Card {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(r), Some(su), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(SolverError::InvalidConfig(format!("bad card string: {s:?}")));
        };
        let rank = RANK_CHARS
            .iter()
            .position(|&c| c == r)
            .ok_or_else(|| SolverError::InvalidConfig(format!("bad card rank: {s:?}")))?;
        let suit = SUIT_CHARS
            .iter()
            .position(|&c| c == su)
            .ok_or_else(|| SolverError::InvalidConfig(format!("bad card suit: {s:?}")))?;
        #[allow(clippy::cast_possible_truncation)]
        let (rank, suit) = (rank as u8, suit as u8);
        Ok(Self::new(rank, suit))
    }
}

/// The full 52-card deck in index order.
#[must_use]
pub fn full_deck() -> Vec<Card> {
    (0..52).map(Card).collect()
}

/// Betting rounds, in play order. Transitions are strictly monotone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Street {
    /// The street after this one (`Showdown` is absorbing).
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Preflop => Self::Flop,
            Self::Flop => Self::Turn,
            Self::Turn => Self::River,
            Self::River | Self::Showdown => Self::Showdown,
        }
    }

    /// Number of board cards visible on this street.
    #[must_use]
    pub fn board_len(self) -> usize {
        match self {
            Self::Preflop => 0,
            Self::Flop => 3,
            Self::Turn => 4,
            Self::River | Self::Showdown => 5,
        }
    }

    /// Integer code used in infoset keys (Preflop = 0 .. Showdown = 4).
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Preflop => 0,
            Self::Flop => 1,
            Self::Turn => 2,
            Self::River => 3,
            Self::Showdown => 4,
        }
    }
}
