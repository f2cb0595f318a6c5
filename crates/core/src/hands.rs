//! Hole-card enumeration and canonical hand labels.

use crate::cards::Card;

/// All 1326 two-card combinations, each pair sorted by card index.
#[must_use]
pub fn all_hole_combos() -> Vec<[Card; 2]> {
    let mut combos = Vec::with_capacity(1326);
    for low in 0..52_u8 {
        for high in (low + 1)..52 {
            combos.push([Card::from_index(low), Card::from_index(high)]);
        }
    }
    combos
}

/// Canonical 169-type label: `"AA"`, `"AKs"`, `"T9o"`.
///
/// The higher rank prints first; pairs carry no suffix.
#[must_use]
pub fn canonical_label(hand: [Card; 2]) -> String {
    let (high, low) = if hand[0].rank() >= hand[1].rank() {
        (hand[0], hand[1])
    } else {
        (hand[1], hand[0])
    };
    let mut label = String::with_capacity(3);
    label.push(high.rank_char());
    label.push(low.rank_char());
    if high.rank() != low.rank() {
        label.push(if high.suit() == low.suit() { 's' } else { 'o' });
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn card(s: &str) -> Card {
        s.parse().expect("valid card")
    }

    #[test]
    fn there_are_1326_combos() {
        let combos = all_hole_combos();
        assert_eq!(combos.len(), 1326);
        let unique: HashSet<(u8, u8)> = combos
            .iter()
            .map(|h| (h[0].index(), h[1].index()))
            .collect();
        assert_eq!(unique.len(), 1326);
        assert!(combos.iter().all(|h| h[0] < h[1]));
    }

    #[test]
    fn labels_cover_169_types() {
        let labels: HashSet<String> = all_hole_combos()
            .into_iter()
            .map(canonical_label)
            .collect();
        assert_eq!(labels.len(), 169);
    }

    #[test]
    fn label_formats() {
        assert_eq!(canonical_label([card("As"), card("Ah")]), "AA");
        assert_eq!(canonical_label([card("As"), card("Ks")]), "AKs");
        assert_eq!(canonical_label([card("Kd"), card("As")]), "AKo");
        assert_eq!(canonical_label([card("2c"), card("7d")]), "72o");
        assert_eq!(canonical_label([card("9h"), card("Th")]), "T9s");
    }

    #[test]
    fn label_ignores_input_order() {
        assert_eq!(
            canonical_label([card("Kd"), card("As")]),
            canonical_label([card("As"), card("Kd")])
        );
    }
}
