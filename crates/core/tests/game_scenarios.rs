//! End-to-end rules scenarios through the public API.

use holdem_solver_core::abstraction::ActionAbstraction;
use holdem_solver_core::game::{Action, GameState};
use holdem_solver_core::{Card, Street};

fn card(s: &str) -> Card {
    s.parse().expect("valid card")
}

fn hu_state() -> GameState {
    let mut state = GameState::new(2, 100, 0, 0).expect("valid config");
    state
        .deal_hands(&[[card("As"), card("Ks")], [card("Qh"), card("Qd")]])
        .unwrap();
    state
}

#[test]
fn hu_initial_state_matches_the_book() {
    let state = hu_state();
    assert_eq!(state.current_player(), Some(0));
    assert_eq!(state.pot(), 3);
    assert_eq!(state.stacks(), &[99, 98]);
    assert_eq!(state.bets_this_round(), &[1, 2]);
    assert_eq!(state.amount_to_call(0), 1);
    assert_eq!(state.amount_to_call(1), 0);
}

#[test]
fn hu_sb_fold_pays_out_the_blinds() {
    let mut state = hu_state();
    state.apply_action(Action::fold(0)).unwrap();
    assert!(state.is_terminal());
    assert_eq!(state.settle(0), -1.0);
    assert_eq!(state.settle(1), 1.0);
}

#[test]
fn hu_limp_check_flop_starts_with_the_button() {
    let mut state = hu_state();
    state.apply_action(Action::call(0)).unwrap();
    state.apply_action(Action::check(1)).unwrap();
    assert_eq!(state.street(), Street::Flop);
    assert_eq!(state.current_player(), Some(0));
    assert_eq!(state.bets_this_round(), &[0, 0]);
    assert_eq!(state.pot(), 4);
}

#[test]
fn min_raise_rule_rejects_three_and_accepts_four() {
    let mut state = hu_state();
    assert!(state.apply_action(Action::raise(0, 3)).is_err());

    let mut state = hu_state();
    assert!(state.apply_action(Action::raise(0, 4)).is_ok());
}

#[test]
fn six_max_utg_opens_the_action() {
    let state = GameState::new(6, 100, 0, 0).unwrap();
    assert_eq!(state.current_player(), Some(3));
    assert_eq!(state.bet_this_round(1), 1);
    assert_eq!(state.bet_this_round(2), 2);
    assert_eq!(state.pot(), 3);
}

#[test]
fn hu_flop_check_around_advances_to_turn() {
    let mut state = hu_state();
    state.apply_action(Action::call(0)).unwrap();
    state.apply_action(Action::check(1)).unwrap();
    state.deal_community(&[card("2c"), card("7d"), card("Jh")]);

    state.apply_action(Action::check(0)).unwrap();
    state.apply_action(Action::check(1)).unwrap();
    assert_eq!(state.street(), Street::Turn);
    assert_eq!(state.current_player(), Some(0));
}

#[test]
fn every_reachable_state_keeps_chip_identities() {
    // Play a full multi-street hand and assert the ledger invariants at
    // every step.
    let mut state = GameState::new(3, 100, 2, 1).unwrap();
    state
        .deal_hands(&[
            [card("As"), card("Ks")],
            [card("Qh"), card("Qd")],
            [card("9c"), card("9d")],
        ])
        .unwrap();

    let assert_ledger = |state: &GameState| {
        let contributed: i64 = (0..3).map(|p| state.contribution(p)).sum();
        assert_eq!(contributed, state.pot());
        for p in 0..3 {
            assert!(state.stack(p) >= 0);
            assert_eq!(state.stack(p) + state.contribution(p), 100);
        }
        if let Some(current) = state.current_player() {
            assert!(!state.has_folded(current));
            assert!(!state.is_all_in(current));
        }
    };

    assert_ledger(&state);
    state.apply_action(Action::raise(1, 6)).unwrap();
    assert_ledger(&state);
    state.apply_action(Action::call(2)).unwrap();
    assert_ledger(&state);
    state.apply_action(Action::fold(0)).unwrap();
    assert_ledger(&state);
    state.deal_community(&[card("2c"), card("7d"), card("Jh")]);
    state.apply_action(Action::check(2)).unwrap();
    assert_ledger(&state);
    state.apply_action(Action::bet(1, 8)).unwrap();
    assert_ledger(&state);
    state.apply_action(Action::call(2)).unwrap();
    assert_ledger(&state);
}

#[test]
fn hu_sb_opening_abstraction_is_exactly_call_and_two_raises() {
    let state = hu_state();
    let specs = ActionAbstraction::new().get_possible_action_specs(&state);
    let tokens: Vec<String> = specs.iter().map(|s| s.to_token()).collect();
    assert_eq!(tokens, vec!["call", "raise_3bb", "raise_4bb"]);
}

#[test]
fn action_amounts_are_stable_between_calls() {
    let state = hu_state();
    let abstraction = ActionAbstraction::new();
    let specs = abstraction.get_possible_action_specs(&state);
    for spec in &specs {
        assert_eq!(
            abstraction.get_action_amount(spec, &state),
            abstraction.get_action_amount(spec, &state)
        );
    }
}
