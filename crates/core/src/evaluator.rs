//! Showdown hand ranking.
//!
//! Thin wrapper over the `rs_poker` evaluator. The rest of the crate treats
//! ranking as a black box: [`showdown_rank`] returns an opaque ordered value
//! where a greater rank wins the showdown.

use rs_poker::core::{Hand, Rank, Rankable, Suit, Value};

use crate::cards::Card;

const VALUES: [Value; 13] = [
    Value::Two,
    Value::Three,
    Value::Four,
    Value::Five,
    Value::Six,
    Value::Seven,
    Value::Eight,
    Value::Nine,
    Value::Ten,
    Value::Jack,
    Value::Queen,
    Value::King,
    Value::Ace,
];

const SUITS: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];

/// Opaque showdown strength. Greater compares as the stronger hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShowdownRank(Rank);

/// Convert a deck index card into the evaluator's card type.
fn to_eval_card(card: Card) -> rs_poker::core::Card {
    rs_poker::core::Card::new(VALUES[card.rank() as usize], SUITS[card.suit() as usize])
}

/// Rank the best 5-card hand from two hole cards plus the board.
///
/// The board may hold 3 to 5 cards; showdown settlement only calls this with
/// a complete 5-card board.
#[must_use]
pub fn showdown_rank(hole: [Card; 2], board: &[Card]) -> ShowdownRank {
    let mut hand = Hand::default();
    for &c in board {
        hand.insert(to_eval_card(c));
    }
    for c in hole {
        hand.insert(to_eval_card(c));
    }
    ShowdownRank(hand.rank())
}
