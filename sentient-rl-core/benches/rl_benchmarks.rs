//! Benchmarks for the trajectory-processing primitives every downstream
//! agent/learner crate builds on: transition insertion and the two
//! return-estimation recurrences (`returns`, `gae_advantages`).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sentient_rl_core::{Reward, Transition};

type SimpleTransition = Transition<Vec<f64>, usize, ()>;

fn build_trajectory(len: usize) -> sentient_rl_core::Trajectory<Vec<f64>, usize, ()> {
    let mut trajectory = sentient_rl_core::Trajectory::new(format!("bench-episode-{len}"));
    for i in 0..len {
        trajectory.push(SimpleTransition {
            observation: vec![i as f64, (i + 1) as f64],
            action: i % 4,
            reward: Reward::new(1.0),
            next_observation: vec![(i + 1) as f64, (i + 2) as f64],
            done: i + 1 == len,
            state: None,
            next_state: None,
        });
    }
    trajectory
}

fn bench_trajectory_push(c: &mut Criterion) {
    c.bench_function("trajectory_push_1024", |b| {
        b.iter(|| {
            let mut trajectory = sentient_rl_core::Trajectory::new("push-bench".to_string());
            for i in 0..1024 {
                trajectory.push(SimpleTransition {
                    observation: vec![i as f64],
                    action: i % 4,
                    reward: Reward::new(1.0),
                    next_observation: vec![(i + 1) as f64],
                    done: false,
                    state: None,
                    next_state: None,
                });
            }
            black_box(trajectory.len())
        });
    });
}

fn bench_returns(c: &mut Criterion) {
    let trajectory = build_trajectory(2048);
    c.bench_function("trajectory_returns_2048", |b| {
        b.iter(|| black_box(trajectory.returns(black_box(0.99))));
    });
}

fn bench_gae_advantages(c: &mut Criterion) {
    let trajectory = build_trajectory(2048);
    let values: Vec<f64> = (0..trajectory.len()).map(|i| i as f64 * 0.01).collect();
    c.bench_function("trajectory_gae_advantages_2048", |b| {
        b.iter(|| black_box(trajectory.gae_advantages(black_box(&values), black_box(0.99), black_box(0.95))));
    });
}

criterion_group!(benches, bench_trajectory_push, bench_returns, bench_gae_advantages);
criterion_main!(benches);
