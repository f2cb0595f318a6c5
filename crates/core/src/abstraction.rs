//! Action abstraction.
//!
//! Projects the continuous bet-sizing space onto a small, context-dependent
//! set of [`ActionSpec`]s so the solver's tree stays finite. The abstraction
//! is policy; the rules live in [`GameState`]. Sizing contexts follow the
//! preflop/postflop ladder tables: RFI ladders banded by effective stack,
//! iso-raises over limpers, multiplier-based three-bets, and pot-fraction
//! postflop bets, with all-in always on the table postflop.

use std::cmp::Ordering;

use arrayvec::ArrayVec;
use log::warn;

use crate::cards::Street;
use crate::error::SolverError;
use crate::game::{Action, ActionKind, GameState, BIG_BLIND};

/// Maximum number of abstracted actions at any decision point.
///
/// Fold + check/call + three raise sizes + all-in preflop, or check + five
/// pot fractions + all-in postflop.
pub const MAX_ACTIONS: usize = 8;

/// Stack-allocated abstracted action list.
pub type ActionSpecs = ArrayVec<ActionSpec, MAX_ACTIONS>;

/// Tolerance for comparing sizing values.
const VALUE_EPSILON: f64 = 1e-5;

/// How an abstracted sizing value is denominated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizingUnit {
    /// Multiples of the big blind (total street commitment).
    BigBlinds,
    /// Percent of the pot.
    PercentPot,
    /// Multiples of the opponent's last aggressive total.
    MultiplierX,
    /// A literal chip amount.
    Absolute,
}

impl SizingUnit {
    /// On-disk code (BB = 0, PctPot = 1, MultX = 2, Absolute = 3).
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::BigBlinds => 0,
            Self::PercentPot => 1,
            Self::MultiplierX => 2,
            Self::Absolute => 3,
        }
    }

    /// Inverse of [`Self::as_i32`].
    #[must_use]
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::BigBlinds),
            1 => Some(Self::PercentPot),
            2 => Some(Self::MultiplierX),
            3 => Some(Self::Absolute),
            _ => None,
        }
    }
}

/// One abstracted action: a kind plus a sizing in some unit.
///
/// Equality compares `value` with a 1e-5 tolerance; ordering is lexicographic
/// on (kind, unit, value) so specs can key ordered containers.
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub kind: ActionKind,
    pub value: f64,
    pub unit: SizingUnit,
}

impl ActionSpec {
    #[must_use]
    pub fn fold() -> Self {
        Self { kind: ActionKind::Fold, value: 0.0, unit: SizingUnit::Absolute }
    }

    #[must_use]
    pub fn check() -> Self {
        Self { kind: ActionKind::Check, value: 0.0, unit: SizingUnit::Absolute }
    }

    #[must_use]
    pub fn call() -> Self {
        Self { kind: ActionKind::Call, value: 0.0, unit: SizingUnit::Absolute }
    }

    #[must_use]
    pub fn all_in() -> Self {
        Self { kind: ActionKind::AllIn, value: 0.0, unit: SizingUnit::Absolute }
    }

    #[must_use]
    pub fn bet(value: f64, unit: SizingUnit) -> Self {
        Self { kind: ActionKind::Bet, value, unit }
    }

    #[must_use]
    pub fn raise(value: f64, unit: SizingUnit) -> Self {
        Self { kind: ActionKind::Raise, value, unit }
    }

    /// Human-readable token, e.g. `"raise_2.5bb"`, `"bet_33pct"`, `"all_in"`.
    #[must_use]
    pub fn to_token(&self) -> String {
        let suffix = match self.unit {
            SizingUnit::BigBlinds => "bb",
            SizingUnit::PercentPot => "pct",
            SizingUnit::MultiplierX => "x",
            SizingUnit::Absolute => "",
        };
        let prefix = match self.kind {
            ActionKind::Fold => return "fold".into(),
            ActionKind::Check => return "check".into(),
            ActionKind::Call => return "call".into(),
            ActionKind::AllIn => return "all_in".into(),
            ActionKind::Bet => "bet",
            ActionKind::Raise => "raise",
        };
        if (self.value - self.value.round()).abs() < VALUE_EPSILON {
            format!("{prefix}_{}{suffix}", self.value.round() as i64)
        } else {
            format!("{prefix}_{:.1}{suffix}", self.value)
        }
    }
}

impl PartialEq for ActionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.unit == other.unit
            && (self.value - other.value).abs() < VALUE_EPSILON
    }
}

impl Eq for ActionSpec {}

impl Ord for ActionSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then(self.unit.cmp(&other.unit))
            .then_with(|| {
                if (self.value - other.value).abs() < VALUE_EPSILON {
                    Ordering::Equal
                } else {
                    self.value.total_cmp(&other.value)
                }
            })
    }
}

impl PartialOrd for ActionSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Enumerates legal abstracted actions and resolves them to chip amounts.
#[derive(Debug, Default, Clone)]
pub struct ActionAbstraction;

impl ActionAbstraction {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The deduplicated, sorted abstracted action set for the player to act.
    ///
    /// Empty when nobody can act. Any bet or raise whose resolved amount
    /// equals the player's full commitment is surfaced as `AllIn`; resolved
    /// amounts that collide are dropped, keeping the first (smallest) sizing.
    #[must_use]
    pub fn get_possible_action_specs(&self, state: &GameState) -> ActionSpecs {
        let Some(player) = state.current_player() else {
            return ActionSpecs::new();
        };
        let stack = state.stack(player);
        if stack <= 0 {
            return ActionSpecs::new();
        }

        let to_call = state.amount_to_call(player);
        let needed = state.max_bet() - state.bet_this_round(player);
        let mut candidates = ActionSpecs::new();

        if to_call > 0 && stack <= needed {
            // Cannot cover the bet: calling is an all-in for less.
            candidates.push(ActionSpec::fold());
            candidates.push(ActionSpec::all_in());
        } else {
            if to_call > 0 {
                candidates.push(ActionSpec::fold());
                candidates.push(ActionSpec::call());
            } else {
                candidates.push(ActionSpec::check());
            }

            if stack > to_call {
                if state.street() == Street::Preflop {
                    preflop_candidates(state, player, &mut candidates);
                } else {
                    postflop_candidates(to_call, &mut candidates);
                }
            }

            // The HU SB opening spot never offers a fold.
            if state.num_players() == 2
                && player == state.button()
                && state.is_unopened_preflop()
            {
                candidates.retain(|spec| spec.kind != ActionKind::Fold);
            }
        }

        self.resolve_and_sort(state, player, candidates)
    }

    /// Resolve chip amounts, apply the min-raise filter and amount dedup,
    /// and sort (fold, check, call, wagers by amount, all-in last).
    fn resolve_and_sort(
        &self,
        state: &GameState,
        player: usize,
        candidates: ActionSpecs,
    ) -> ActionSpecs {
        let all_in_amount = state.stack(player) + state.bet_this_round(player);
        let mut resolved: ArrayVec<(ActionSpec, i64), MAX_ACTIONS> = ArrayVec::new();

        for spec in candidates {
            match spec.kind {
                ActionKind::Fold | ActionKind::Check | ActionKind::Call => {
                    resolved.push((spec, -1));
                }
                ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn => {
                    let amount = if spec.kind == ActionKind::AllIn {
                        all_in_amount
                    } else {
                        self.get_action_amount(&spec, state)
                    };
                    if amount <= 0 {
                        warn!("could not resolve amount for {}", spec.to_token());
                        continue;
                    }
                    // A wager that resolves to the full commitment is an
                    // all-in, whatever sizing produced it.
                    let spec = if amount == all_in_amount {
                        ActionSpec::all_in()
                    } else {
                        spec
                    };
                    let duplicate = resolved.iter().any(|&(_, a)| a == amount);
                    if !duplicate {
                        resolved.push((spec, amount));
                    }
                }
            }
        }

        resolved.sort_by(|a, b| {
            let order = |kind: ActionKind| match kind {
                ActionKind::Fold => 0,
                ActionKind::Check => 1,
                ActionKind::Call => 2,
                ActionKind::Bet | ActionKind::Raise => 3,
                ActionKind::AllIn => 4,
            };
            order(a.0.kind)
                .cmp(&order(b.0.kind))
                .then(a.1.cmp(&b.1))
        });

        resolved.into_iter().map(|(spec, _)| spec).collect()
    }

    /// The total street commitment a spec resolves to, or `-1` for
    /// fold/check/call. Pure in `(spec, state)`.
    ///
    /// Wager targets are clamped up to the legal minimum and capped by the
    /// player's full commitment; percent-of-pot sizing uses half-up integer
    /// rounding so chip amounts are exact.
    #[must_use]
    pub fn get_action_amount(&self, spec: &ActionSpec, state: &GameState) -> i64 {
        let Some(player) = state.current_player() else {
            return -1;
        };
        let stack = state.stack(player);
        let street_bet = state.bet_this_round(player);
        let to_call = state.amount_to_call(player);
        let full_commitment = stack + street_bet;

        match spec.kind {
            ActionKind::Fold | ActionKind::Check | ActionKind::Call => -1,
            ActionKind::AllIn => full_commitment,
            ActionKind::Bet => {
                if to_call != 0 {
                    warn!("bet spec resolved while facing a bet");
                    return -1;
                }
                let target = match spec.unit {
                    SizingUnit::PercentPot => {
                        let increment = round_pct(state.pot(), spec.value).max(1);
                        street_bet + increment
                    }
                    SizingUnit::BigBlinds => round_bb(spec.value),
                    SizingUnit::MultiplierX | SizingUnit::Absolute => {
                        warn!("unsupported unit for bet spec: {:?}", spec.unit);
                        return -1;
                    }
                };
                let min_bet = street_bet + stack.min(BIG_BLIND);
                target.max(min_bet).min(full_commitment)
            }
            ActionKind::Raise => {
                let call_base = street_bet + to_call;
                let target = match spec.unit {
                    SizingUnit::BigBlinds => round_bb(spec.value),
                    SizingUnit::PercentPot => {
                        let pot_after_call = state.pot() + to_call;
                        call_base + round_pct(pot_after_call, spec.value).max(1)
                    }
                    SizingUnit::MultiplierX => {
                        // The reference is the opponent's last aggressive
                        // total, i.e. the bet this player must match.
                        let reference = call_base;
                        call_base + round_mult(spec.value, reference).max(1)
                    }
                    SizingUnit::Absolute => {
                        #[allow(clippy::cast_possible_truncation)]
                        let amount = spec.value.round() as i64;
                        amount
                    }
                };
                let min_increment = state.last_raise_size().max(BIG_BLIND);
                let min_legal = call_base + min_increment;
                target.max(min_legal).min(full_commitment)
            }
        }
    }

    /// Translate a spec into the concrete engine action for the player to
    /// act.
    ///
    /// # Errors
    /// `IllegalAction` when the spec cannot be resolved in this state.
    pub fn to_game_action(
        &self,
        spec: &ActionSpec,
        state: &GameState,
    ) -> Result<Action, SolverError> {
        let Some(player) = state.current_player() else {
            return Err(SolverError::IllegalAction(
                "no player to act for spec translation".into(),
            ));
        };
        match spec.kind {
            ActionKind::Fold => Ok(Action::fold(player)),
            ActionKind::Check => Ok(Action::check(player)),
            ActionKind::Call => Ok(Action::call(player)),
            ActionKind::AllIn => Ok(Action::all_in(player)),
            ActionKind::Bet | ActionKind::Raise => {
                let amount = self.get_action_amount(spec, state);
                if amount <= 0 {
                    return Err(SolverError::IllegalAction(format!(
                        "spec {} resolves to no legal amount",
                        spec.to_token()
                    )));
                }
                if state.amount_to_call(player) == 0 {
                    Ok(Action::bet(player, amount))
                } else {
                    Ok(Action::raise(player, amount))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sizing tables
// ---------------------------------------------------------------------------

fn preflop_candidates(state: &GameState, player: usize, out: &mut ActionSpecs) {
    let n = state.num_players();
    let sb = state.sb_index();
    let bb = state.bb_index();
    let raises = state.raises_this_hand();
    let limpers = state.num_limpers();
    let effective_bb = state.effective_stack(player) / BIG_BLIND;

    if raises == 0 {
        if limpers == 0 {
            if player == sb {
                // SB open (heads-up this is the button's first decision).
                out.push(ActionSpec::raise(3.0, SizingUnit::BigBlinds));
                out.push(ActionSpec::raise(4.0, SizingUnit::BigBlinds));
            } else {
                // RFI ladder, banded by effective stack.
                let small = if effective_bb < 25 {
                    2.0
                } else if effective_bb < 35 {
                    2.1
                } else {
                    2.2
                };
                out.push(ActionSpec::raise(small, SizingUnit::BigBlinds));
                out.push(ActionSpec::raise(2.5, SizingUnit::BigBlinds));
                out.push(ActionSpec::raise(3.0, SizingUnit::BigBlinds));
            }
        } else if n == 2 && player == bb {
            out.push(ActionSpec::raise(3.0, SizingUnit::BigBlinds));
            out.push(ActionSpec::raise(4.0, SizingUnit::BigBlinds));
        } else {
            // Isolate limpers: standard open plus one blind per limper.
            #[allow(clippy::cast_precision_loss)]
            let limpers = limpers as f64;
            out.push(ActionSpec::raise(3.0 + limpers, SizingUnit::BigBlinds));
            out.push(ActionSpec::raise(4.0 + limpers, SizingUnit::BigBlinds));
        }
    } else if raises == 1 {
        if n == 2 && player == bb {
            // HU BB versus the SB open: three-bet by multiplier, shove
            // always available.
            out.push(ActionSpec::raise(3.0, SizingUnit::MultiplierX));
            out.push(ActionSpec::raise(4.0, SizingUnit::MultiplierX));
            out.push(ActionSpec::all_in());
        } else if effective_bb <= 40 {
            out.push(ActionSpec::all_in());
        }
    } else if raises == 2 {
        // Facing the three-bet.
        out.push(ActionSpec::raise(2.5, SizingUnit::MultiplierX));
        out.push(ActionSpec::all_in());
    } else {
        // Four-bet pots and beyond: shove or pass.
        out.push(ActionSpec::all_in());
    }
}

fn postflop_candidates(to_call: i64, out: &mut ActionSpecs) {
    if to_call == 0 {
        for pct in [33.0, 50.0, 75.0, 100.0, 133.0] {
            out.push(ActionSpec::bet(pct, SizingUnit::PercentPot));
        }
    } else {
        out.push(ActionSpec::raise(2.2, SizingUnit::MultiplierX));
        out.push(ActionSpec::raise(3.0, SizingUnit::MultiplierX));
    }
    out.push(ActionSpec::all_in());
}

// ---------------------------------------------------------------------------
// Integer rounding
// ---------------------------------------------------------------------------

/// Half-up percent-of-pot: `(pot * pct + 50) / 100` in integer math.
fn round_pct(pot: i64, pct: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let pct = pct.round() as i64;
    (pot * pct + 50) / 100
}

/// Half-up big-blind multiples.
fn round_bb(value: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let amount = (value * BIG_BLIND as f64 + 0.5).floor() as i64;
    amount
}

/// Half-up multiplier of a reference bet.
fn round_mult(value: f64, reference: i64) -> i64 {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let amount = (value * reference as f64 + 0.5).floor() as i64;
    amount
}
