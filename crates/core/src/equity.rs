//! Monte-Carlo equity estimation.
//!
//! Hero's hand plus a partial board against one uniformly sampled opponent
//! hand and runout. Used for quick strength probes, not by the CFR
//! traversal itself.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::cards::{full_deck, Card};
use crate::error::SolverError;
use crate::evaluator::showdown_rank;

/// Hero-versus-one-random-hand equity sampler.
#[derive(Debug)]
pub struct EquityEstimator {
    rng: SmallRng,
}

impl EquityEstimator {
    /// An estimator seeded from system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// A deterministically seeded estimator.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Estimate hero's equity as `(wins + ties / 2) / simulations`.
    ///
    /// # Errors
    /// `InvalidConfig` for a board larger than five cards or duplicate
    /// known cards. Zero simulations estimate to 0.
    pub fn estimate(
        &mut self,
        hero: [Card; 2],
        board: &[Card],
        simulations: u32,
    ) -> Result<f64, SolverError> {
        if board.len() > 5 {
            return Err(SolverError::InvalidConfig(format!(
                "board holds {} cards, at most 5 allowed",
                board.len()
            )));
        }
        let mut known: Vec<Card> = board.to_vec();
        known.extend_from_slice(&hero);
        let distinct: std::collections::HashSet<Card> = known.iter().copied().collect();
        if distinct.len() != known.len() {
            return Err(SolverError::InvalidConfig(
                "duplicate cards among hero hand and board".into(),
            ));
        }
        if simulations == 0 {
            return Ok(0.0);
        }

        let mut deck: Vec<Card> = full_deck()
            .into_iter()
            .filter(|c| !distinct.contains(c))
            .collect();
        let runout_len = 5 - board.len();

        let mut wins = 0_u32;
        let mut ties = 0_u32;
        for _ in 0..simulations {
            deck.shuffle(&mut self.rng);
            let opponent = [deck[0], deck[1]];
            let mut full_board = board.to_vec();
            full_board.extend_from_slice(&deck[2..2 + runout_len]);

            let hero_rank = showdown_rank(hero, &full_board);
            let opponent_rank = showdown_rank(opponent, &full_board);
            if hero_rank > opponent_rank {
                wins += 1;
            } else if hero_rank == opponent_rank {
                ties += 1;
            }
        }

        Ok((f64::from(wins) + 0.5 * f64::from(ties)) / f64::from(simulations))
    }
}

impl Default for EquityEstimator {
    fn default() -> Self {
        Self::new()
    }
}
