//! JSON strategy export.
//!
//! For each exportable preflop position the exporter rebuilds the
//! fold-to-position context (UTG sees `s/b/`, MP sees `s/b/f/`, and so on),
//! sweeps all 1326 hole combinations through the explicit-components infoset
//! constructor, and collapses them onto the 169 canonical hand labels.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::SolverError;
use crate::game::{Action, GameState};
use crate::hands::{all_hole_combos, canonical_label};
use crate::info_set::InfoSet;
use crate::solver::CfrSolver;

/// Actions and average strategy for one canonical hand, index-aligned.
#[derive(Debug, Clone, Serialize)]
pub struct HandStrategy {
    pub actions: Vec<String>,
    pub strategy: Vec<f64>,
}

/// Position label → canonical hand → strategy.
pub type StrategyExport = BTreeMap<String, BTreeMap<String, HandStrategy>>;

/// Position labels with the number of folds that precede the seat's first
/// decision, in seat-action order.
fn positions(num_players: usize) -> Vec<(&'static str, usize)> {
    match num_players {
        2 => vec![("SB", 0)],
        _ => vec![("UTG", 0), ("MP", 1), ("CO", 2), ("BTN", 3), ("SB", 4)],
    }
}

/// Collect trained first-in strategies per position.
///
/// Hands whose infoset was never visited are omitted. Strategy values are
/// rounded to four decimal places.
///
/// # Errors
/// `InvalidConfig` when the game configuration cannot seat a table.
pub fn export_strategies(
    solver: &CfrSolver,
    num_players: usize,
    initial_stack: i64,
    ante: i64,
) -> Result<StrategyExport, SolverError> {
    let combos = all_hole_combos();
    let mut export = StrategyExport::new();

    for (label, folds_before) in positions(num_players) {
        let mut context = GameState::new(num_players, initial_stack, ante, 0)?;
        for _ in 0..folds_before {
            let Some(player) = context.current_player() else {
                break;
            };
            context.apply_action(Action::fold(player))?;
        }
        let Some(seat) = context.current_player() else {
            continue;
        };

        let mut grid: BTreeMap<String, HandStrategy> = BTreeMap::new();
        for &hand in &combos {
            let info =
                InfoSet::from_components(hand, context.history_string(), &context, seat);
            let found = solver.get_strategy_info(info.key());
            if !found.found {
                continue;
            }
            grid.insert(
                canonical_label(hand),
                HandStrategy {
                    actions: found.actions,
                    strategy: found.strategy.into_iter().map(round4).collect(),
                },
            );
        }
        if !grid.is_empty() {
            export.insert(label.to_owned(), grid);
        }
    }

    Ok(export)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::solver::TrainConfig;

    #[test]
    fn rounding_is_four_decimals() {
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
        assert_eq!(round4(0.000_04), 0.0);
    }

    #[test]
    fn positions_per_table_size() {
        assert_eq!(positions(2), vec![("SB", 0)]);
        assert_eq!(
            positions(6).iter().map(|p| p.0).collect::<Vec<_>>(),
            vec!["UTG", "MP", "CO", "BTN", "SB"]
        );
    }

    #[test]
    fn hu_export_contains_trained_sb_hands() {
        let solver = CfrSolver::new();
        let config = TrainConfig {
            iterations: 40,
            num_players: 2,
            initial_stack: 20,
            num_threads: 1,
            seed: Some(11),
            ..TrainConfig::default()
        };
        solver.train(&config).unwrap();

        let export = export_strategies(&solver, 2, 20, 0).unwrap();
        let sb = export.get("SB").expect("SB grid present");
        assert!(!sb.is_empty());
        for (hand, entry) in sb {
            assert_eq!(
                entry.actions,
                vec!["call", "raise_3bb", "raise_4bb"],
                "unexpected action set for {hand}"
            );
            let sum: f64 = entry.strategy.iter().sum();
            assert!((sum - 1.0).abs() < 1e-2, "{hand} strategy sums to {sum}");
        }
    }

    #[test]
    fn untrained_solver_exports_nothing() {
        let solver = CfrSolver::new();
        let export = export_strategies(&solver, 2, 100, 0).unwrap();
        assert!(export.is_empty());
    }

    #[test]
    fn export_serializes_to_the_documented_shape() {
        let mut grid = BTreeMap::new();
        grid.insert(
            "AKs".to_owned(),
            HandStrategy {
                actions: vec!["call".into(), "raise_3bb".into()],
                strategy: vec![0.25, 0.75],
            },
        );
        let mut export = StrategyExport::new();
        export.insert("SB".to_owned(), grid);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["SB"]["AKs"]["actions"][1], "raise_3bb");
        assert_eq!(json["SB"]["AKs"]["strategy"][1], 0.75);
    }
}
