//! Exercises the checkpoint/PBT surface a rollout-worker-facing controller
//! would actually drive: saving, rotating, restoring on worker startup, and
//! the PBT cross-policy load merge rule, all through the public API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use sentient_rl_learner::prelude::*;
use sentient_rl_learner::DefaultModelConfig;

fn unique_dir(label: &str) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64 as Counter, Ordering as CounterOrdering};
    static COUNTER: Counter = Counter::new(0);
    let unique = COUNTER.fetch_add(1, CounterOrdering::Relaxed);
    let mut dir = std::env::temp_dir();
    dir.push(format!("sentient-rl-learner-{label}-{}-{unique}", std::process::id()));
    dir
}

fn sample_state(policy_id: u32, train_step: u64, env_steps: u64) -> CheckpointState {
    CheckpointState {
        policy_id,
        train_step,
        env_steps,
        kl_coeff: 0.2,
        model_params: vec![1.0, 2.0, 3.0, 4.0],
        optimizer_state: OptimizerState::new(4),
    }
}

/// Like [`sample_state`], but with `model_params`/`optimizer_state` sized to
/// match a real model, for tests that restore the state into one.
fn sample_state_for_model(policy_id: u32, train_step: u64, env_steps: u64, num_params: usize) -> CheckpointState {
    CheckpointState {
        policy_id,
        train_step,
        env_steps,
        kl_coeff: 0.2,
        model_params: (0..num_params).map(|i| i as f64).collect(),
        optimizer_state: OptimizerState::new(num_params),
    }
}

#[test]
fn rotation_across_many_saves_keeps_only_the_newest() {
    let dir = unique_dir("rotation");
    let mut manager = CheckpointManager::new(&dir, 0, 2, 1000);
    for step in 1..=4u64 {
        manager.save(step, &sample_state(0, step, step * 100)).unwrap();
    }
    let loaded = manager.load_latest().unwrap().expect("a checkpoint must remain after rotation");
    assert_eq!(loaded.train_step, 4);
    assert_eq!(loaded.env_steps, 400);
}

#[test]
fn pbt_cross_policy_load_preserves_this_policys_progress_counters() {
    let dir = unique_dir("pbt-load");
    let mut source_mgr = CheckpointManager::new(&dir, 7, 3, 1000);
    source_mgr.save(50, &sample_state(7, 50, 5_000)).unwrap();

    let current = sample_state(3, 200, 20_000);
    let source = CheckpointManager::load_from_policy(&dir, 7).unwrap().expect("source policy has a checkpoint");
    let merged = apply_pbt_load(&current, &source);

    assert_eq!(merged.policy_id, 3, "policy identity never changes under a PBT load");
    assert_eq!(merged.train_step, 200, "train_step is this policy's own progress, not the source's");
    assert_eq!(merged.env_steps, 20_000);
    assert_eq!(merged.model_params, source.model_params);
    assert!((merged.kl_coeff - source.kl_coeff).abs() < 1e-12);
}

#[test]
fn training_worker_restores_shared_train_step_from_its_own_checkpoint() {
    let dir = unique_dir("worker-restore");

    let model = DefaultModel::new(DefaultModelConfig {
        obs_dim: 2,
        head_hidden_dims: vec![4],
        core_dim: 2,
        action_dim: 2,
        activation: "tanh".to_string(),
    });
    let num_params = model.num_parameters();

    let mut pre_save = CheckpointManager::new(&dir, 0, 3, 1000);
    pre_save
        .save(17, &sample_state_for_model(0, 17, 1_700, num_params))
        .unwrap();

    let cfg = LearnerConfig::default();
    let shared_train_step = Arc::new(AtomicU64::new(0));
    let mut worker = TrainingWorker::new(
        Box::new(model),
        cfg,
        0,
        dir,
        shared_train_step.clone(),
        Arc::new(AtomicU64::new(0)),
        Arc::new(AtomicBool::new(false)),
    );

    worker.restore_from_checkpoint().unwrap();
    assert_eq!(shared_train_step.load(Ordering::Relaxed), 17);
}
