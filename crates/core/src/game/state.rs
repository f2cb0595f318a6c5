//! The table state machine.

use std::fmt::Write as _;

use log::{debug, warn};

use crate::cards::{Card, Street};
use crate::error::SolverError;
use crate::evaluator::showdown_rank;

use super::{Action, ActionKind, BIG_BLIND, SMALL_BLIND};

/// Complete state of one hand.
///
/// Created fresh at the root of each iteration, mutated in place along one
/// trajectory, and cloned before each recursive branch. The struct is a few
/// hundred bytes, so copy semantics are the intended exploration model.
#[derive(Debug, Clone)]
pub struct GameState {
    num_players: usize,
    button: usize,
    current_player: Option<usize>,
    /// Antes plus chips swept from completed streets. Live street bets are
    /// in `bets_this_round` until the round closes.
    swept_pot: i64,
    stacks: Vec<i64>,
    bets_this_round: Vec<i64>,
    contributions: Vec<i64>,
    folded: Vec<bool>,
    all_in: Vec<bool>,
    /// Whether the player has acted since the last aggression (or street start).
    acted: Vec<bool>,
    hands: Vec<Option<[Card; 2]>>,
    board: Vec<Card>,
    street: Street,
    game_over: bool,
    /// The most recent raise increment; the big blind until a voluntary raise.
    last_raise_size: i64,
    aggressor: Option<usize>,
    history: Vec<Action>,
    /// `/`-separated action tokens, opened by the blind prefix `s/b/`.
    history_str: String,
    initial_stack: i64,
    ante: i64,
}

impl GameState {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Create a hand with antes and blinds posted and the first actor set.
    ///
    /// Heads-up the button posts the small blind and acts first preflop;
    /// multi-way the blinds sit left of the button and UTG opens.
    ///
    /// # Errors
    /// `InvalidConfig` for fewer than two players or a button outside the
    /// table.
    pub fn new(
        num_players: usize,
        initial_stack: i64,
        ante: i64,
        button: usize,
    ) -> Result<Self, SolverError> {
        if num_players < 2 {
            return Err(SolverError::InvalidConfig(format!(
                "need at least 2 players, got {num_players}"
            )));
        }
        if button >= num_players {
            return Err(SolverError::InvalidConfig(format!(
                "button {button} out of range for {num_players} players"
            )));
        }
        if initial_stack <= 0 {
            return Err(SolverError::InvalidConfig(format!(
                "initial stack must be positive, got {initial_stack}"
            )));
        }
        if ante < 0 {
            return Err(SolverError::InvalidConfig(format!(
                "ante must be non-negative, got {ante}"
            )));
        }

        let mut state = Self {
            num_players,
            button,
            current_player: None,
            swept_pot: 0,
            stacks: vec![initial_stack; num_players],
            bets_this_round: vec![0; num_players],
            contributions: vec![0; num_players],
            folded: vec![false; num_players],
            all_in: vec![false; num_players],
            acted: vec![false; num_players],
            hands: vec![None; num_players],
            board: Vec::with_capacity(5),
            street: Street::Preflop,
            game_over: false,
            last_raise_size: BIG_BLIND,
            aggressor: None,
            history: Vec::new(),
            history_str: String::new(),
            initial_stack,
            ante,
        };

        state.post_antes_and_blinds();
        state.seat_first_preflop_actor();
        Ok(state)
    }

    fn post_antes_and_blinds(&mut self) {
        if self.ante > 0 {
            for p in 0..self.num_players {
                let posted = self.ante.min(self.stacks[p]);
                self.stacks[p] -= posted;
                self.contributions[p] += posted;
                self.swept_pot += posted;
                if self.stacks[p] == 0 {
                    self.all_in[p] = true;
                }
            }
        }

        let sb = self.sb_index();
        let bb = self.bb_index();
        for (seat, amount) in [(sb, SMALL_BLIND), (bb, BIG_BLIND)] {
            let posted = amount.min(self.stacks[seat]);
            self.stacks[seat] -= posted;
            self.bets_this_round[seat] += posted;
            self.contributions[seat] += posted;
            if self.stacks[seat] == 0 {
                self.all_in[seat] = true;
            }
        }

        // The big blind opens the preflop aggression sequence; posting a
        // blind does not count as having acted.
        self.last_raise_size = BIG_BLIND;
        self.aggressor = Some(bb);
        self.history_str.push_str("s/b/");
    }

    fn seat_first_preflop_actor(&mut self) {
        let first = if self.num_players == 2 {
            self.button
        } else {
            (self.bb_index() + 1) % self.num_players
        };

        let mut candidate = first;
        loop {
            if !self.folded[candidate] && !self.all_in[candidate] {
                self.current_player = Some(candidate);
                return;
            }
            candidate = (candidate + 1) % self.num_players;
            if candidate == first {
                warn!("all players all-in or folded after blinds and antes; hand is over");
                self.game_over = true;
                self.current_player = None;
                return;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn num_players(&self) -> usize {
        self.num_players
    }

    #[must_use]
    pub fn button(&self) -> usize {
        self.button
    }

    /// Small blind seat (the button itself heads-up).
    #[must_use]
    pub fn sb_index(&self) -> usize {
        if self.num_players == 2 {
            self.button
        } else {
            (self.button + 1) % self.num_players
        }
    }

    /// Big blind seat.
    #[must_use]
    pub fn bb_index(&self) -> usize {
        if self.num_players == 2 {
            (self.button + 1) % self.num_players
        } else {
            (self.button + 2) % self.num_players
        }
    }

    /// The player whose turn it is, `None` on terminal states.
    #[must_use]
    pub fn current_player(&self) -> Option<usize> {
        self.current_player
    }

    /// The observable pot: everything contributed so far, including live
    /// street bets.
    #[must_use]
    pub fn pot(&self) -> i64 {
        self.swept_pot + self.bets_this_round.iter().sum::<i64>()
    }

    /// Chips already swept from completed streets (plus antes).
    #[must_use]
    pub fn collected_pot(&self) -> i64 {
        self.swept_pot
    }

    #[must_use]
    pub fn stack(&self, player: usize) -> i64 {
        self.stacks[player]
    }

    #[must_use]
    pub fn stacks(&self) -> &[i64] {
        &self.stacks
    }

    #[must_use]
    pub fn bet_this_round(&self, player: usize) -> i64 {
        self.bets_this_round[player]
    }

    #[must_use]
    pub fn bets_this_round(&self) -> &[i64] {
        &self.bets_this_round
    }

    #[must_use]
    pub fn contribution(&self, player: usize) -> i64 {
        self.contributions[player]
    }

    #[must_use]
    pub fn street(&self) -> Street {
        self.street
    }

    #[must_use]
    pub fn board(&self) -> &[Card] {
        &self.board
    }

    #[must_use]
    pub fn hand(&self, player: usize) -> Option<[Card; 2]> {
        self.hands[player]
    }

    #[must_use]
    pub fn has_folded(&self, player: usize) -> bool {
        self.folded[player]
    }

    #[must_use]
    pub fn is_all_in(&self, player: usize) -> bool {
        self.all_in[player]
    }

    #[must_use]
    pub fn last_raise_size(&self) -> i64 {
        self.last_raise_size
    }

    /// The last player to bet or raise this street, if any. Preflop the big
    /// blind opens as the nominal aggressor.
    #[must_use]
    pub fn aggressor(&self) -> Option<usize> {
        self.aggressor
    }

    #[must_use]
    pub fn initial_stack(&self) -> i64 {
        self.initial_stack
    }

    #[must_use]
    pub fn history(&self) -> &[Action] {
        &self.history
    }

    /// The `/`-separated action token string, e.g. `"s/b/c/r12/"`.
    #[must_use]
    pub fn history_string(&self) -> &str {
        &self.history_str
    }

    /// The largest street bet any player has out.
    #[must_use]
    pub fn max_bet(&self) -> i64 {
        self.bets_this_round.iter().copied().max().unwrap_or(0)
    }

    /// Chips `player` must add to match the current bet, capped by stack.
    /// Zero for folded or all-in players.
    #[must_use]
    pub fn amount_to_call(&self, player: usize) -> i64 {
        if self.folded[player] || self.all_in[player] {
            return 0;
        }
        (self.max_bet() - self.bets_this_round[player]).min(self.stacks[player])
    }

    /// The smaller of this player's and the shortest live opponent's
    /// stack-plus-street-bet: the most that can realistically go in.
    #[must_use]
    pub fn effective_stack(&self, player: usize) -> i64 {
        let own = self.stacks[player] + self.bets_this_round[player];
        let shortest_opponent = (0..self.num_players)
            .filter(|&p| p != player && !self.folded[p])
            .map(|p| self.stacks[p] + self.bets_this_round[p])
            .min();
        match shortest_opponent {
            Some(opp) => own.min(opp),
            None => self.stacks[player],
        }
    }

    /// Number of voluntary bets/raises so far this hand.
    #[must_use]
    pub fn raises_this_hand(&self) -> usize {
        self.history
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::Bet | ActionKind::Raise))
            .count()
    }

    /// Whether no voluntary call or raise has happened yet preflop.
    #[must_use]
    pub fn is_unopened_preflop(&self) -> bool {
        self.street == Street::Preflop
            && !self
                .history
                .iter()
                .any(|a| matches!(a.kind, ActionKind::Call | ActionKind::Raise | ActionKind::Bet))
    }

    /// Preflop flat-callers (non-BB seats) before any raise.
    #[must_use]
    pub fn num_limpers(&self) -> usize {
        if self.street != Street::Preflop {
            return 0;
        }
        let bb = self.bb_index();
        let mut limpers = 0;
        for a in &self.history {
            match a.kind {
                ActionKind::Raise | ActionKind::Bet => return 0,
                ActionKind::Call if a.player != bb => limpers += 1,
                _ => {}
            }
        }
        limpers
    }

    /// Whether the hand has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.game_over || self.unfolded_count() <= 1 || self.street == Street::Showdown
    }

    fn unfolded_count(&self) -> usize {
        self.folded.iter().filter(|&&f| !f).count()
    }

    // -----------------------------------------------------------------------
    // Dealing
    // -----------------------------------------------------------------------

    /// Install hole cards for every seat.
    ///
    /// # Errors
    /// `InvalidConfig` if the slice length does not match the player count.
    pub fn deal_hands(&mut self, hands: &[[Card; 2]]) -> Result<(), SolverError> {
        if hands.len() != self.num_players {
            return Err(SolverError::InvalidConfig(format!(
                "dealt {} hands for {} players",
                hands.len(),
                self.num_players
            )));
        }
        for (slot, &hand) in self.hands.iter_mut().zip(hands) {
            *slot = Some(hand);
        }
        Ok(())
    }

    /// Append community cards to the board.
    pub fn deal_community(&mut self, cards: &[Card]) {
        self.board.extend_from_slice(cards);
    }

    // -----------------------------------------------------------------------
    // Action application
    // -----------------------------------------------------------------------

    /// Apply one action, then close the betting round or pass the turn.
    ///
    /// # Errors
    /// `IllegalAction` for out-of-turn play, a check facing a bet, or a
    /// non-all-in raise below the minimum increment. These indicate a logic
    /// bug in the caller, not a recoverable condition.
    pub fn apply_action(&mut self, action: Action) -> Result<(), SolverError> {
        if self.is_terminal() {
            return Err(SolverError::IllegalAction(
                "action applied to a terminal state".into(),
            ));
        }
        let Some(player) = self.current_player else {
            return Err(SolverError::IllegalAction("no player to act".into()));
        };
        if action.player != player {
            return Err(SolverError::IllegalAction(format!(
                "player {} acted out of turn (expected {player})",
                action.player
            )));
        }
        if self.folded[player] || self.all_in[player] {
            return Err(SolverError::IllegalAction(format!(
                "player {player} cannot act (folded or all-in)"
            )));
        }

        match action.kind {
            ActionKind::Fold => self.apply_fold(player),
            ActionKind::Check => self.apply_check(player)?,
            ActionKind::Call => self.apply_call(player),
            ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn => {
                self.apply_wager(player, action)?;
            }
        }

        self.resolve_turn(player);
        Ok(())
    }

    fn apply_fold(&mut self, player: usize) {
        self.folded[player] = true;
        self.acted[player] = true;
        self.record(Action::fold(player), "f");
    }

    fn apply_check(&mut self, player: usize) -> Result<(), SolverError> {
        if self.amount_to_call(player) > 0 {
            return Err(SolverError::IllegalAction(format!(
                "player {player} checked facing a bet"
            )));
        }
        self.acted[player] = true;
        // Checking through resets the aggression sequence.
        self.aggressor = None;
        self.record(Action::check(player), "k");
        Ok(())
    }

    fn apply_call(&mut self, player: usize) {
        let delta = self.amount_to_call(player);
        self.commit(player, delta);
        self.acted[player] = true;
        // A call never takes the lead, but re-derive the aggressor if a
        // check earlier in the sequence cleared it.
        if self.aggressor.is_none() {
            self.aggressor = (0..self.num_players)
                .filter(|&p| self.bets_this_round[p] > 0)
                .max_by_key(|&p| self.bets_this_round[p]);
        }
        self.record(Action::call(player), "c");
    }

    fn apply_wager(&mut self, player: usize, action: Action) -> Result<(), SolverError> {
        let to_call = self.amount_to_call(player);
        if action.kind == ActionKind::Bet && to_call > 0 {
            return Err(SolverError::IllegalAction(format!(
                "player {player} bet while facing a bet"
            )));
        }

        let mut total = if action.kind == ActionKind::AllIn {
            self.stacks[player] + self.bets_this_round[player]
        } else {
            action.amount
        };
        let mut delta = total - self.bets_this_round[player];
        if delta <= 0 {
            return Err(SolverError::IllegalAction(format!(
                "wager to {total} does not exceed player {player}'s current bet"
            )));
        }
        if delta > self.stacks[player] {
            debug!(
                "wager to {total} exceeds player {player}'s stack; treating as all-in"
            );
            delta = self.stacks[player];
            total = self.bets_this_round[player] + delta;
        }

        let is_all_in_commit = delta == self.stacks[player];
        let raise_increment = total - (self.bets_this_round[player] + to_call);

        if raise_increment <= 0 {
            // All-in short of (or exactly matching) the call level. Never a
            // raise: it reopens nothing and keeps the aggression state intact.
            if !is_all_in_commit {
                return Err(SolverError::IllegalAction(format!(
                    "wager to {total} does not reach the bet to match"
                )));
            }
            self.commit(player, delta);
            self.acted[player] = true;
            self.record(Action::call(player), "c");
            return Ok(());
        }

        let min_increment = self.last_raise_size.max(BIG_BLIND);
        if !is_all_in_commit && raise_increment < min_increment {
            return Err(SolverError::IllegalAction(format!(
                "raise increment {raise_increment} below minimum {min_increment}"
            )));
        }

        self.commit(player, delta);
        self.last_raise_size = raise_increment;
        self.aggressor = Some(player);
        self.acted.fill(false);
        self.acted[player] = true;

        let (kind, token) = if to_call == 0 {
            (ActionKind::Bet, 'b')
        } else {
            (ActionKind::Raise, 'r')
        };
        let mut tok = String::with_capacity(8);
        let _ = write!(tok, "{token}{total}");
        self.record(
            Action { kind, amount: total, player },
            &tok,
        );
        Ok(())
    }

    /// Move `delta` chips from the player's stack into their street bet.
    fn commit(&mut self, player: usize, delta: i64) {
        debug_assert!(delta >= 0 && delta <= self.stacks[player]);
        self.stacks[player] -= delta;
        self.bets_this_round[player] += delta;
        self.contributions[player] += delta;
        if self.stacks[player] == 0 {
            self.all_in[player] = true;
        }
    }

    fn record(&mut self, action: Action, token: &str) {
        self.history.push(action);
        self.history_str.push_str(token);
        self.history_str.push('/');
    }

    // -----------------------------------------------------------------------
    // Turn resolution and street advancement
    // -----------------------------------------------------------------------

    fn resolve_turn(&mut self, actor: usize) {
        if self.unfolded_count() <= 1 {
            self.game_over = true;
            self.current_player = None;
            return;
        }

        match self.next_actor_after(actor) {
            Some(next) => self.current_player = Some(next),
            None => self.close_round(),
        }
    }

    /// The next player who still owes an action this round, scanning
    /// clockwise from `actor`.
    fn next_actor_after(&self, actor: usize) -> Option<usize> {
        let max_bet = self.max_bet();
        (1..=self.num_players)
            .map(|offset| (actor + offset) % self.num_players)
            .find(|&p| {
                !self.folded[p]
                    && !self.all_in[p]
                    && (!self.acted[p] || self.bets_this_round[p] < max_bet)
            })
    }

    fn close_round(&mut self) {
        if self.street == Street::River {
            self.street = Street::Showdown;
            self.game_over = true;
            self.current_player = None;
            return;
        }
        self.advance_to_next_street();
    }

    /// Sweep the street and move on. When every remaining player is all-in
    /// the loop runs the board out street by street to Showdown, so callers
    /// observing the transition deal a complete board.
    fn advance_to_next_street(&mut self) {
        self.swept_pot += self.bets_this_round.iter().sum::<i64>();
        self.bets_this_round.fill(0);
        self.last_raise_size = 0;
        self.aggressor = None;
        self.acted.fill(false);

        loop {
            if self.street == Street::River {
                self.street = Street::Showdown;
                self.game_over = true;
                self.current_player = None;
                return;
            }
            self.street = self.street.next();

            if let Some(first) = self.first_actor_postflop() {
                self.current_player = Some(first);
                return;
            }
            debug!(
                "no player can act on {:?}; running out the board",
                self.street
            );
        }
    }

    /// First eligible actor for a postflop street: the button heads-up,
    /// otherwise the first live seat left of the button.
    fn first_actor_postflop(&self) -> Option<usize> {
        let start = if self.num_players == 2 {
            self.button
        } else {
            (self.button + 1) % self.num_players
        };
        (0..self.num_players)
            .map(|offset| (start + offset) % self.num_players)
            .find(|&p| !self.folded[p] && !self.all_in[p])
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Net chips won or lost by `player` at a terminal state.
    ///
    /// Side pots are built from the unfolded players' contribution levels;
    /// each level's pot is split among its best hands with remainder chips
    /// going to the earliest seats left of the button. A multi-way showdown
    /// on an incomplete board settles to 0 (callers deal the runout before
    /// settlement in normal operation).
    #[must_use]
    pub fn settle(&self, player: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let own_contribution = self.contributions[player] as f64;

        if self.folded[player] {
            return -own_contribution;
        }

        let live: Vec<usize> = (0..self.num_players).filter(|&p| !self.folded[p]).collect();
        if live.len() == 1 {
            // Everyone else folded; the survivor collects the whole pot.
            #[allow(clippy::cast_precision_loss)]
            let total = self.contributions.iter().sum::<i64>() as f64;
            return total - own_contribution;
        }

        if self.board.len() < 5 {
            warn!(
                "showdown settlement requested on a {}-card board; returning 0",
                self.board.len()
            );
            return 0.0;
        }

        let ranks: Vec<Option<crate::evaluator::ShowdownRank>> = (0..self.num_players)
            .map(|p| {
                if self.folded[p] {
                    None
                } else {
                    self.hands[p].map(|hole| showdown_rank(hole, &self.board))
                }
            })
            .collect();

        // Contribution levels, ascending; the defining seat leaves the
        // eligible set after its level pays out.
        let mut by_level: Vec<(i64, usize)> =
            live.iter().map(|&p| (self.contributions[p], p)).collect();
        by_level.sort_unstable();

        let mut eligible = live;
        let mut previous_level = 0_i64;
        let mut winnings = 0_i64;

        for &(level, defining_seat) in &by_level {
            if level > previous_level && !eligible.is_empty() {
                let pot = (level - previous_level) * eligible.len() as i64;
                winnings += self.pot_share(&eligible, &ranks, pot, player);
                previous_level = level;
            }
            eligible.retain(|&p| p != defining_seat);
        }

        #[allow(clippy::cast_precision_loss)]
        let winnings = winnings as f64;
        winnings - own_contribution
    }

    /// `player`'s cut of one pot level contested by `eligible`.
    fn pot_share(
        &self,
        eligible: &[usize],
        ranks: &[Option<crate::evaluator::ShowdownRank>],
        pot: i64,
        player: usize,
    ) -> i64 {
        let best = eligible.iter().filter_map(|&p| ranks[p]).max();
        let Some(best) = best else {
            return 0;
        };
        let mut winners: Vec<usize> = eligible
            .iter()
            .copied()
            .filter(|&p| ranks[p] == Some(best))
            .collect();

        // Remainder chips go to the earliest seats left of the button.
        let n = self.num_players;
        let first = (self.button + 1) % n;
        winners.sort_by_key(|&p| (p + n - first) % n);

        let share = pot / winners.len() as i64;
        let remainder = pot % winners.len() as i64;
        winners
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p == player)
            .map(|(i, _)| share + i64::from((i as i64) < remainder))
            .sum()
    }
}
