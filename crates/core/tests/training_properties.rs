//! Quantified solver properties: simplex membership, key symmetry,
//! seeded determinism, and multi-threaded completion.

use holdem_solver_core::game::GameState;
use holdem_solver_core::info_set::InfoSet;
use holdem_solver_core::solver::{CfrSolver, TrainConfig};
use holdem_solver_core::Card;

fn card(s: &str) -> Card {
    s.parse().expect("valid card")
}

fn config(iterations: u64, threads: usize, seed: u64) -> TrainConfig {
    TrainConfig {
        iterations,
        num_players: 2,
        initial_stack: 20,
        num_threads: threads,
        seed: Some(seed),
        ..TrainConfig::default()
    }
}

#[test]
fn average_strategies_form_probability_distributions() {
    let solver = CfrSolver::new();
    solver.train(&config(40, 1, 3)).unwrap();

    assert!(!solver.nodes().is_empty());
    for (key, _) in solver.nodes().snapshot() {
        let info = solver.get_strategy_info(&key);
        assert!(info.found);
        assert_eq!(info.strategy.len(), info.actions.len());
        let sum: f64 = info.strategy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "strategy at {key} sums to {sum}");
        assert!(info.strategy.iter().all(|&p| p >= 0.0));
    }
}

#[test]
fn infoset_keys_ignore_hole_card_order() {
    let state = GameState::new(2, 100, 0, 0).unwrap();
    let ordered = InfoSet::from_components([card("Ah"), card("Kd")], "s/b/", &state, 0);
    let swapped = InfoSet::from_components([card("Kd"), card("Ah")], "s/b/", &state, 0);
    assert_eq!(ordered.key(), swapped.key());
}

#[test]
fn same_seed_single_thread_is_deterministic() {
    let first = CfrSolver::new();
    first.train(&config(30, 1, 77)).unwrap();
    let second = CfrSolver::new();
    second.train(&config(30, 1, 77)).unwrap();

    assert_eq!(
        first.nodes().total_created(),
        second.nodes().total_created()
    );
    for (key, node) in first.nodes().snapshot() {
        let twin = second
            .nodes()
            .get(&key)
            .unwrap_or_else(|| panic!("{key} missing from the twin run"));
        assert_eq!(node.visit_count(), twin.visit_count());
        let node_values = node.lock_values();
        let twin_values = twin.lock_values();
        for (a, b) in node_values
            .regret_sum
            .iter()
            .zip(twin_values.regret_sum.iter())
        {
            assert_eq!(a.to_bits(), b.to_bits(), "regret diverges at {key}");
        }
    }
}

#[test]
fn different_seeds_explore_different_trajectories() {
    let first = CfrSolver::new();
    first.train(&config(20, 1, 1)).unwrap();
    let second = CfrSolver::new();
    second.train(&config(20, 1, 2)).unwrap();

    // Not a strict guarantee, but with different deals the visit profile
    // diverging is overwhelmingly likely; equality here would point at a
    // seeding bug.
    let first_visits: u64 = first
        .nodes()
        .snapshot()
        .iter()
        .map(|(_, n)| n.visit_count())
        .sum();
    let second_visits: u64 = second
        .nodes()
        .snapshot()
        .iter()
        .map(|(_, n)| n.visit_count())
        .sum();
    assert!(
        first.nodes().total_created() != second.nodes().total_created()
            || first_visits != second_visits
    );
}

#[test]
fn multi_threaded_training_completes_every_iteration() {
    let solver = CfrSolver::new();
    solver.train(&config(40, 4, 9)).unwrap();
    assert_eq!(solver.completed_iterations(), 40);
    assert!(!solver.nodes().is_empty());

    // The table stays internally consistent under concurrent insertion.
    for (key, node) in solver.nodes().snapshot() {
        assert!(node.num_actions() > 0, "empty action list at {key}");
        assert_eq!(node.average_strategy().len(), node.num_actions());
    }
}
