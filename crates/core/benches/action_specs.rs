use criterion::{black_box, criterion_group, criterion_main, Criterion};
use holdem_solver_core::abstraction::ActionAbstraction;
use holdem_solver_core::game::{Action, GameState};
use holdem_solver_core::Card;

fn card(s: &str) -> Card {
    s.parse().expect("valid card")
}

fn flop_state() -> GameState {
    let mut state = GameState::new(2, 200, 0, 0).expect("valid config");
    state
        .deal_hands(&[[card("As"), card("Ks")], [card("Qh"), card("Qd")]])
        .unwrap();
    state.apply_action(Action::raise(0, 10)).unwrap();
    state.apply_action(Action::call(1)).unwrap();
    state.deal_community(&[card("2c"), card("7d"), card("Jh")]);
    state
}

fn bench_action_enumeration(c: &mut Criterion) {
    let abstraction = ActionAbstraction::new();
    let preflop = GameState::new(6, 100, 0, 0).expect("valid config");
    let postflop = flop_state();

    c.bench_function("specs_preflop_6max_rfi", |b| {
        b.iter(|| abstraction.get_possible_action_specs(black_box(&preflop)));
    });
    c.bench_function("specs_postflop_unopened", |b| {
        b.iter(|| abstraction.get_possible_action_specs(black_box(&postflop)));
    });
}

criterion_group!(benches, bench_action_enumeration);
criterion_main!(benches);
