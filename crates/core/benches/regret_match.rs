use criterion::{black_box, criterion_group, criterion_main, Criterion};
use holdem_solver_core::solver::regret_match;

fn bench_regret_match(c: &mut Criterion) {
    let mixed: Vec<f64> = (0..8).map(|i| f64::from(i - 3) * 1.5).collect();
    let all_negative = vec![-1.0_f64; 8];

    c.bench_function("regret_match_mixed_8", |b| {
        b.iter(|| regret_match(black_box(&mixed)));
    });
    c.bench_function("regret_match_uniform_fallback_8", |b| {
        b.iter(|| regret_match(black_box(&all_negative)));
    });
}

criterion_group!(benches, bench_regret_match);
criterion_main!(benches);
