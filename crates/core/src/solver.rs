//! CFR+ solver with external-sampling Monte Carlo traversal.
//!
//! Each worker thread owns a deck, an RNG, and a call stack; the only shared
//! state is the node table (fine-grained locks) and a handful of relaxed
//! atomics. At opponent nodes exactly one action is sampled from the current
//! strategy; at traverser nodes every action is expanded and the regret and
//! strategy sums are updated under the node lock. Regret updates happen only
//! at traverser nodes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::abstraction::ActionAbstraction;
use crate::cards::{full_deck, Card};
use crate::checkpoint;
use crate::error::SolverError;
use crate::game::GameState;
use crate::info_set::InfoSet;
use crate::node::{Node, NodeTable};

/// Reach probabilities below this are treated as zero.
const REACH_FLOOR: f64 = 1e-9;

/// Cap on the external-sampling importance weight.
const MAX_SAMPLE_WEIGHT: f64 = 100.0;

// ---------------------------------------------------------------------------
// Regret matching
// ---------------------------------------------------------------------------

/// Converts accumulated regrets to a strategy via regret matching.
///
/// Positive regrets are normalized to sum to one; if there are none the
/// strategy is uniform. A final renormalization guards against floating-point
/// drift, reverting to uniform if the mass collapses.
#[must_use]
pub fn regret_match(regrets: &[f64]) -> Vec<f64> {
    let k = regrets.len();
    if k == 0 {
        return Vec::new();
    }
    #[allow(clippy::cast_precision_loss)]
    let uniform = 1.0 / k as f64;

    let positive_sum: f64 = regrets.iter().filter(|&&r| r > 0.0).sum();
    let mut strategy: Vec<f64> = if positive_sum > 0.0 {
        regrets
            .iter()
            .map(|&r| if r > 0.0 { r / positive_sum } else { 0.0 })
            .collect()
    } else {
        return vec![uniform; k];
    };

    let total: f64 = strategy.iter().sum();
    if total > REACH_FLOOR {
        for p in &mut strategy {
            *p /= total;
        }
        strategy
    } else {
        warn!("degenerate strategy mass after normalization; reverting to uniform");
        vec![uniform; k]
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Training parameters.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Target total iterations, including any loaded from a checkpoint.
    pub iterations: u64,
    pub num_players: usize,
    pub initial_stack: i64,
    pub ante: i64,
    /// Worker count; 0 means hardware concurrency.
    pub num_threads: usize,
    /// Checkpoint destination; periodic and final saves go here.
    pub save_path: Option<PathBuf>,
    /// Iterations between periodic saves; 0 saves at the end only.
    pub checkpoint_interval: u64,
    /// Resume source.
    pub load_path: Option<PathBuf>,
    /// Base RNG seed; derived from the clock when unset.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            num_players: 2,
            initial_stack: 100,
            ante: 0,
            num_threads: 0,
            save_path: None,
            checkpoint_interval: 0,
            load_path: None,
            seed: None,
        }
    }
}

/// Average strategy and action labels for one infoset.
#[derive(Debug, Clone, Default)]
pub struct StrategyInfo {
    pub found: bool,
    pub strategy: Vec<f64>,
    pub actions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// CFR+ engine: node storage plus the training loop.
#[derive(Debug, Default)]
pub struct CfrSolver {
    nodes: NodeTable,
    abstraction: ActionAbstraction,
    completed_iterations: AtomicU64,
    last_logged_percent: AtomicI64,
    max_depth_reached: AtomicUsize,
}

impl CfrSolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_logged_percent: AtomicI64::new(-1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    #[must_use]
    pub fn abstraction(&self) -> &ActionAbstraction {
        &self.abstraction
    }

    #[must_use]
    pub fn completed_iterations(&self) -> u64 {
        self.completed_iterations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn max_depth_reached(&self) -> usize {
        self.max_depth_reached.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Training loop
    // -----------------------------------------------------------------------

    /// Run self-play until `config.iterations` total iterations complete.
    ///
    /// # Errors
    /// Configuration errors fail before any training; a `NodeMismatch`
    /// aborts its worker and is reported after the others finish. Checkpoint
    /// save failures are logged and never stop training.
    pub fn train(&self, config: &TrainConfig) -> Result<(), SolverError> {
        // Two hole cards per seat plus a five-card board must fit the deck.
        if config.num_players * 2 + 5 > 52 {
            return Err(SolverError::InvalidConfig(format!(
                "cannot deal {} players from a 52-card deck",
                config.num_players
            )));
        }
        // Validate the rest by constructing a throwaway root.
        GameState::new(config.num_players, config.initial_stack, config.ante, 0)?;

        if let Some(load_path) = &config.load_path {
            match checkpoint::load(load_path, &self.nodes) {
                Ok(loaded) => {
                    #[allow(clippy::cast_sign_loss)]
                    self.completed_iterations
                        .store(loaded.completed_iterations.max(0) as u64, Ordering::Relaxed);
                }
                Err(error) => {
                    warn!(
                        "failed to load checkpoint {}: {error}; starting from scratch",
                        load_path.display()
                    );
                }
            }
        }

        let completed = self.completed_iterations();
        if completed >= config.iterations {
            info!(
                "target of {} iterations already reached ({} completed); nothing to do",
                config.iterations, completed
            );
            return Ok(());
        }
        let remaining = config.iterations - completed;

        let hardware = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let threads = match config.num_threads {
            0 => hardware,
            n => n.min(hardware).max(1),
        };

        let base_seed = config.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(1, |d| d.as_millis() as u64)
        });

        self.last_logged_percent.store(-1, Ordering::Relaxed);
        info!(
            "training: {remaining} iterations remaining of {} across {threads} thread(s)",
            config.iterations
        );

        // Static split: contiguous global ranges, remainder to the first
        // workers. The global index drives the button rotation and the
        // per-iteration seed, so a resumed run replays the same schedule.
        let chunk = remaining / threads as u64;
        let leftover = remaining % threads as u64;

        let mut worker_results: Vec<Result<(), SolverError>> = Vec::with_capacity(threads);
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(threads);
            let mut next_start = completed;
            for worker_id in 0..threads {
                let count = chunk + u64::from((worker_id as u64) < leftover);
                let start = next_start;
                next_start += count;
                if count == 0 {
                    continue;
                }
                handles.push(scope.spawn(move || {
                    self.run_worker(config, worker_id, start, count, base_seed)
                }));
            }
            for handle in handles {
                match handle.join() {
                    Ok(result) => worker_results.push(result),
                    Err(_) => worker_results.push(Err(SolverError::IllegalAction(
                        "worker thread panicked".into(),
                    ))),
                }
            }
        });

        if self.last_logged_percent.load(Ordering::Relaxed) < 100
            && self.completed_iterations() >= config.iterations
        {
            info!("training progress: 100%");
        }
        info!(
            "training complete: {} iterations, {} nodes created, max depth {}",
            self.completed_iterations(),
            self.nodes.total_created(),
            self.max_depth_reached()
        );

        if let Some(save_path) = &config.save_path {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let iterations = self.completed_iterations().min(i32::MAX as u64) as i32;
            if let Err(error) =
                checkpoint::save_atomic(save_path, ".final.tmp", &self.nodes, iterations)
            {
                error!("final checkpoint save failed: {error}");
            }
        }

        worker_results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
    }

    fn run_worker(
        &self,
        config: &TrainConfig,
        worker_id: usize,
        start_global: u64,
        count: u64,
        base_seed: u64,
    ) -> Result<(), SolverError> {
        let n = config.num_players;
        let master_deck = full_deck();
        let mut last_saved_interval = match config.checkpoint_interval {
            0 => 0,
            interval => self.completed_iterations() / interval,
        };

        for offset in 0..count {
            let global = start_global + offset;
            // Reseeding per iteration from the global index keeps the card
            // schedule a function of (seed, iteration), so checkpoint
            // resumption replays the same deals an uninterrupted run sees.
            let mut rng = SmallRng::seed_from_u64(base_seed.wrapping_add(global));
            #[allow(clippy::cast_possible_truncation)]
            let button = (global % n as u64) as usize;

            let mut root = GameState::new(n, config.initial_stack, config.ante, button)?;
            let mut deck = master_deck.clone();
            deck.shuffle(&mut rng);

            let mut hands = Vec::with_capacity(n);
            let mut card_idx = 0;
            for _ in 0..n {
                let mut hand = [deck[card_idx], deck[card_idx + 1]];
                card_idx += 2;
                hand.sort_unstable();
                hands.push(hand);
            }
            root.deal_hands(&hands)?;

            for traverser in 0..n {
                let reach = vec![1.0_f64; n];
                let mut idx = card_idx;
                match self.cfr_recurse(root.clone(), traverser, &reach, &deck, &mut idx, &mut rng, 0)
                {
                    Ok(_) => {}
                    Err(error @ SolverError::NodeMismatch { .. }) => {
                        error!("worker {worker_id}: {error}; aborting worker");
                        return Err(error);
                    }
                    Err(error) => {
                        error!(
                            "worker {worker_id}: iteration {global} traverser {traverser} \
                             aborted: {error}"
                        );
                    }
                }
            }

            let completed = self.completed_iterations.fetch_add(1, Ordering::Relaxed) + 1;

            if worker_id == 0 {
                self.log_progress(completed, config.iterations);
                if let (Some(save_path), interval) =
                    (&config.save_path, config.checkpoint_interval)
                {
                    if interval > 0 && completed / interval > last_saved_interval {
                        last_saved_interval = completed / interval;
                        self.periodic_save(save_path, completed);
                    }
                }
            }
        }
        Ok(())
    }

    /// Log every 5% bucket exactly once; compare-exchange keeps concurrent
    /// callers from duplicating a line.
    fn log_progress(&self, completed: u64, target: u64) {
        if target == 0 {
            return;
        }
        #[allow(clippy::cast_possible_wrap)]
        let percent = (completed * 100 / target) as i64;
        let bucket = percent - percent % 5;
        let mut last = self.last_logged_percent.load(Ordering::Relaxed);
        while bucket > last {
            match self.last_logged_percent.compare_exchange(
                last,
                bucket,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    info!("training progress: {bucket}%");
                    break;
                }
                Err(actual) => last = actual,
            }
        }
    }

    fn periodic_save(&self, save_path: &Path, completed: u64) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let iterations = completed.min(i32::MAX as u64) as i32;
        if let Err(error) = checkpoint::save_atomic(save_path, ".tmp", &self.nodes, iterations) {
            error!("periodic checkpoint save failed: {error}; training continues");
        }
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Returns the utility of `state` for `traverser` under the current
    /// strategy profile, updating regrets at traverser decision points.
    #[allow(clippy::too_many_arguments)]
    fn cfr_recurse(
        &self,
        state: GameState,
        traverser: usize,
        reach: &[f64],
        deck: &[Card],
        card_idx: &mut usize,
        rng: &mut SmallRng,
        depth: usize,
    ) -> Result<f64, SolverError> {
        self.max_depth_reached.fetch_max(depth, Ordering::Relaxed);

        if state.is_terminal() {
            return Ok(state.settle(traverser));
        }

        let Some(player) = state.current_player() else {
            return Ok(0.0);
        };
        if state.hand(player).is_none() {
            debug!("player {player} has no hand at a decision point; pruning branch");
            return Ok(0.0);
        }

        let specs = self.abstraction.get_possible_action_specs(&state);
        if specs.is_empty() {
            debug!("no abstracted actions for player {player}; pruning branch");
            return Ok(0.0);
        }

        let key = InfoSet::from_state(&state, player)?.into_key();
        let node = self
            .nodes
            .get_or_create(&key, || Node::new(specs.to_vec()));
        if node.num_actions() != specs.len() {
            return Err(SolverError::NodeMismatch {
                key,
                node_actions: node.num_actions(),
                expected: specs.len(),
            });
        }

        let regrets = node.lock_values().regret_sum.clone();
        let strategy = regret_match(&regrets);
        let actions = node.legal_actions();

        if player != traverser {
            // External sampling: expand one opponent action, importance
            // weighted by its inverse probability.
            let sampled = sample_index(&strategy, rng);
            let probability = strategy[sampled];
            if probability <= REACH_FLOOR {
                return Ok(0.0);
            }
            let weight = (1.0 / probability).min(MAX_SAMPLE_WEIGHT);

            let mut child = state.clone();
            let action = self.abstraction.to_game_action(&actions[sampled], &state)?;
            child.apply_action(action)?;

            let saved_idx = *card_idx;
            if !deal_board_for_street(&mut child, deck, card_idx) {
                *card_idx = saved_idx;
                return Ok(0.0);
            }

            let mut child_reach = reach.to_vec();
            child_reach[player] *= probability;
            let result = self.cfr_recurse(
                child,
                traverser,
                &child_reach,
                deck,
                card_idx,
                rng,
                depth + 1,
            )?;
            *card_idx = saved_idx;
            return Ok(-result * weight);
        }

        // Traverser node: full-width expansion.
        let mut utilities = vec![0.0_f64; actions.len()];
        for (i, spec) in actions.iter().enumerate() {
            let mut child = state.clone();
            let action = self.abstraction.to_game_action(spec, &state)?;
            child.apply_action(action)?;

            let saved_idx = *card_idx;
            if !deal_board_for_street(&mut child, deck, card_idx) {
                *card_idx = saved_idx;
                continue;
            }
            let result =
                self.cfr_recurse(child, traverser, reach, deck, card_idx, rng, depth + 1)?;
            *card_idx = saved_idx;
            utilities[i] = -result;
        }

        let node_utility: f64 = utilities
            .iter()
            .zip(strategy.iter())
            .map(|(u, p)| u * p)
            .sum();

        let counterfactual_reach: f64 = reach
            .iter()
            .enumerate()
            .filter(|&(p, _)| p != player)
            .map(|(_, &r)| r)
            .product();
        let own_reach = reach[player];

        {
            let mut values = node.lock_values();
            if counterfactual_reach > REACH_FLOOR {
                for i in 0..utilities.len() {
                    let delta = counterfactual_reach * (utilities[i] - node_utility);
                    if delta.is_finite() {
                        values.regret_sum[i] += delta;
                        // CFR+: accumulated regret never goes negative.
                        if values.regret_sum[i] < 0.0 {
                            values.regret_sum[i] = 0.0;
                        }
                    } else {
                        warn!("skipping non-finite regret update at {}", &key);
                    }
                }
            }
            if own_reach > REACH_FLOOR {
                for i in 0..utilities.len() {
                    let delta = own_reach * strategy[i];
                    if delta.is_finite() {
                        values.strategy_sum[i] += delta;
                    } else {
                        warn!("skipping non-finite strategy update at {}", &key);
                    }
                }
            }
        }
        node.record_visit();

        Ok(node_utility)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The average strategy and action labels stored for an infoset key.
    #[must_use]
    pub fn get_strategy_info(&self, key: &str) -> StrategyInfo {
        match self.nodes.get(key) {
            Some(node) => StrategyInfo {
                found: true,
                strategy: node.average_strategy(),
                actions: node
                    .legal_actions()
                    .iter()
                    .map(crate::abstraction::ActionSpec::to_token)
                    .collect(),
            },
            None => StrategyInfo::default(),
        }
    }

    /// Write the current state to `path` (no atomic rename; see
    /// [`checkpoint::save_atomic`] for the crash-safe variant).
    ///
    /// # Errors
    /// I/O failures.
    pub fn save_checkpoint(&self, path: &Path) -> Result<(), SolverError> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let iterations = self.completed_iterations().min(i32::MAX as u64) as i32;
        checkpoint::save(path, &self.nodes, iterations)
    }

    /// Replace this solver's state with the checkpoint at `path`.
    ///
    /// # Errors
    /// Version mismatch, truncation, or corrupt contents.
    pub fn load_checkpoint(&self, path: &Path) -> Result<u64, SolverError> {
        let loaded = checkpoint::load(path, &self.nodes)?;
        #[allow(clippy::cast_sign_loss)]
        let iterations = loaded.completed_iterations.max(0) as u64;
        self.completed_iterations.store(iterations, Ordering::Relaxed);
        Ok(iterations)
    }
}

/// Sample an index from a probability vector; uniform fallback when the
/// distribution is degenerate.
fn sample_index(strategy: &[f64], rng: &mut SmallRng) -> usize {
    let total: f64 = strategy.iter().sum();
    if total <= REACH_FLOOR {
        return rng.gen_range(0..strategy.len());
    }
    let mut target = rng.gen::<f64>() * total;
    for (i, &p) in strategy.iter().enumerate() {
        target -= p;
        if target <= 0.0 {
            return i;
        }
    }
    strategy.len() - 1
}

/// Top the board up to the entered street's requirement, drawing from the
/// thread-local deck. Returns `false` (leaving the state short) when the
/// deck runs dry; the caller abandons the branch with zero utility.
fn deal_board_for_street(state: &mut GameState, deck: &[Card], card_idx: &mut usize) -> bool {
    let target = state.street().board_len();
    let have = state.board().len();
    if target <= have {
        return true;
    }
    let needed = target - have;
    if *card_idx + needed > deck.len() {
        warn!(
            "deck exhausted: needed {needed} cards at index {} of {}",
            *card_idx,
            deck.len()
        );
        return false;
    }
    state.deal_community(&deck[*card_idx..*card_idx + needed]);
    *card_idx += needed;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Regret matching
    // -----------------------------------------------------------------------

    #[test]
    fn positive_regrets_normalize() {
        let strategy = regret_match(&[1.0, 2.0, 3.0]);
        assert!((strategy[0] - 1.0 / 6.0).abs() < 1e-12);
        assert!((strategy[1] - 2.0 / 6.0).abs() < 1e-12);
        assert!((strategy[2] - 3.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn negative_regrets_are_ignored() {
        let strategy = regret_match(&[-5.0, 2.0, 2.0]);
        assert_eq!(strategy[0], 0.0);
        assert!((strategy[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_regrets_give_uniform() {
        let strategy = regret_match(&[0.0, 0.0, 0.0, 0.0]);
        for p in strategy {
            assert!((p - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn regret_match_handles_empty_input() {
        assert!(regret_match(&[]).is_empty());
    }

    #[test]
    fn strategies_always_sum_to_one() {
        let cases: Vec<Vec<f64>> = vec![
            vec![1.0],
            vec![1e-12, 1e-12],
            vec![f64::MAX / 4.0, 1.0],
            vec![-1.0, -2.0],
        ];
        for regrets in cases {
            let sum: f64 = regret_match(&regrets).iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "sum {sum} for {regrets:?}");
        }
    }

    // -----------------------------------------------------------------------
    // Sampling
    // -----------------------------------------------------------------------

    #[test]
    fn sample_index_respects_support() {
        let mut rng = SmallRng::seed_from_u64(7);
        let strategy = [0.0, 1.0, 0.0];
        for _ in 0..100 {
            assert_eq!(sample_index(&strategy, &mut rng), 1);
        }
    }

    #[test]
    fn sample_index_degenerate_falls_back_to_uniform() {
        let mut rng = SmallRng::seed_from_u64(7);
        let strategy = [0.0, 0.0, 0.0];
        for _ in 0..100 {
            assert!(sample_index(&strategy, &mut rng) < 3);
        }
    }

    // -----------------------------------------------------------------------
    // Training smoke tests
    // -----------------------------------------------------------------------

    fn quick_config(iterations: u64) -> TrainConfig {
        TrainConfig {
            iterations,
            num_players: 2,
            initial_stack: 20,
            num_threads: 1,
            seed: Some(42),
            ..TrainConfig::default()
        }
    }

    #[test]
    fn training_populates_the_node_table() {
        let solver = CfrSolver::new();
        solver.train(&quick_config(30)).unwrap();
        assert_eq!(solver.completed_iterations(), 30);
        assert!(!solver.nodes().is_empty());
        assert!(solver.max_depth_reached() > 0);
    }

    #[test]
    fn average_strategies_lie_on_the_simplex() {
        let solver = CfrSolver::new();
        solver.train(&quick_config(30)).unwrap();

        for (key, node) in solver.nodes().snapshot() {
            let avg = node.average_strategy();
            let sum: f64 = avg.iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-6,
                "strategy at {key} sums to {sum}"
            );
            assert!(avg.iter().all(|&p| p >= 0.0), "negative mass at {key}");
        }
    }

    #[test]
    fn cfr_plus_keeps_regrets_non_negative() {
        let solver = CfrSolver::new();
        solver.train(&quick_config(30)).unwrap();

        for (key, node) in solver.nodes().snapshot() {
            let values = node.lock_values();
            assert!(
                values.regret_sum.iter().all(|&r| r >= 0.0),
                "negative regret at {key}"
            );
        }
    }

    #[test]
    fn hu_root_node_exists_with_expected_actions() {
        let solver = CfrSolver::new();
        solver.train(&quick_config(30)).unwrap();

        // Some SB opening infoset must exist; every one offers exactly
        // call, raise 3bb, raise 4bb.
        let root_keys: Vec<String> = solver
            .nodes()
            .snapshot()
            .into_iter()
            .map(|(k, _)| k)
            .filter(|k| k.starts_with("P0:") && k.ends_with("|s/b/"))
            .collect();
        assert!(!root_keys.is_empty());
        for key in root_keys {
            let info = solver.get_strategy_info(&key);
            assert!(info.found);
            assert_eq!(info.actions, vec!["call", "raise_3bb", "raise_4bb"]);
            assert_eq!(info.strategy.len(), 3);
        }
    }

    #[test]
    fn strategy_info_reports_missing_keys() {
        let solver = CfrSolver::new();
        let info = solver.get_strategy_info("no-such-key");
        assert!(!info.found);
        assert!(info.strategy.is_empty());
        assert!(info.actions.is_empty());
    }

    #[test]
    fn invalid_config_fails_before_training() {
        let solver = CfrSolver::new();
        let config = TrainConfig {
            num_players: 1,
            ..quick_config(10)
        };
        assert!(matches!(
            solver.train(&config),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn six_max_training_runs() {
        let solver = CfrSolver::new();
        let config = TrainConfig {
            num_players: 6,
            iterations: 6,
            initial_stack: 40,
            num_threads: 1,
            seed: Some(9),
            ..TrainConfig::default()
        };
        solver.train(&config).unwrap();
        assert_eq!(solver.completed_iterations(), 6);
        assert!(!solver.nodes().is_empty());
    }
}
