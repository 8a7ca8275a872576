//! End-to-end exercise of the coordinator/training-worker pair: a task
//! announcing one completed rollout should flow through intake, macro-batch
//! assembly, training, and out the other side as a report with an advanced
//! `train_step`, entirely through the crate's public API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ndarray::{Array1, Array2};

use sentient_rl_learner::coordinator::{Coordinator, RolloutAnnouncement, TaskMessage, TrainingWorker};
use sentient_rl_learner::rollout::{RolloutTensors, TensorAttacher};
use sentient_rl_learner::types::{DType, FieldTree, PolicyVersion, SharedTensorHandle, SlotKey};
use sentient_rl_learner::{DefaultModel, DefaultModelConfig, LearnerConfig, TrajectoryRegistry};

const OBS_DIM: usize = 3;
const ACTION_DIM: usize = 2;
const CORE_DIM: usize = 4;

struct ZeroAttacher;

impl TensorAttacher for ZeroAttacher {
    fn attach(&self, _key: SlotKey, length: usize) -> sentient_rl_learner::Result<RolloutTensors> {
        Ok(RolloutTensors {
            observations: FieldTree::Leaf(Array2::zeros((length, OBS_DIM))),
            actions: Array2::zeros((length, 1)),
            action_logits: Array2::zeros((length, ACTION_DIM)),
            log_prob_actions: Array1::from_elem(length, -std::f64::consts::LN_2),
            values: Array1::zeros(length),
            rewards: Array1::from_elem(length, 1.0),
            dones: Array1::from_elem(length, false),
            rnn_states: Array2::zeros((length, CORE_DIM)),
            policy_version: Array1::zeros(length),
        })
    }
}

fn test_config() -> LearnerConfig {
    let mut cfg = LearnerConfig::default();
    cfg.macro_batch = 4;
    cfg.rollout = 4;
    cfg.recurrence = 4;
    cfg.batch_size = 4;
    // More than one epoch so the summary's 10% random-rejection gate (see
    // `TrainingEngine::should_sample_summary`) gets several independent
    // rolls before this test's assertion on `report.train` runs.
    cfg.ppo_epochs = 20;
    cfg.with_vtrace = true;
    cfg.validate().expect("test config must satisfy the divisibility preconditions");
    cfg
}

#[test]
fn one_rollout_flows_through_to_a_trained_report() {
    let cfg = test_config();
    let registry = Arc::new(TrajectoryRegistry::new());
    let shared_train_step = Arc::new(AtomicU64::new(0));
    let shared_discarded = Arc::new(AtomicU64::new(0));
    let terminate = Arc::new(AtomicBool::new(false));

    let (task_tx, task_rx) = crossbeam_channel::unbounded::<TaskMessage>();
    let (exp_tx, exp_rx) = crossbeam_channel::unbounded();
    let (pickup_tx, pickup_rx) = crossbeam_channel::unbounded();
    let (report_tx, report_rx) = crossbeam_channel::unbounded();

    let model = DefaultModel::new(DefaultModelConfig {
        obs_dim: OBS_DIM,
        head_hidden_dims: vec![8],
        core_dim: CORE_DIM,
        action_dim: ACTION_DIM,
        activation: "tanh".to_string(),
    });
    let experiment_dir = std::env::temp_dir().join(format!(
        "sentient-rl-learner-integration-test-{}",
        std::process::id()
    ));
    let worker = TrainingWorker::new(
        Box::new(model),
        cfg.clone(),
        0,
        experiment_dir,
        shared_train_step.clone(),
        shared_discarded.clone(),
        terminate.clone(),
    );
    let worker_handle = std::thread::spawn(move || worker.run(exp_rx, pickup_tx, report_tx));

    let mut coordinator = Coordinator::new(
        registry,
        cfg,
        0,
        Arc::new(ZeroAttacher),
        shared_train_step.clone(),
        shared_discarded,
        terminate,
        exp_tx,
        pickup_rx,
    );

    let mut tensors = HashMap::new();
    tensors.insert(
        (0u32, 0u32),
        SharedTensorHandle {
            region_id: 1,
            offset: 0,
            shape: vec![4],
            dtype: DType::F32,
        },
    );
    task_tx
        .send(TaskMessage::InitTensors {
            worker_idx: 0,
            split_idx: 0,
            traj_buffer_idx: 0,
            tensors,
            num_envs: 1,
            num_agents: 1,
            num_traj_buffers: 1,
        })
        .unwrap();
    task_tx
        .send(TaskMessage::Train {
            worker_idx: 0,
            split_idx: 0,
            traj_buffer_idx: 0,
            rollouts: vec![RolloutAnnouncement {
                env_idx: 0,
                agent_idx: 0,
                length: 4,
                env_steps: 4,
                min_policy_version: PolicyVersion(0),
            }],
        })
        .unwrap();

    // First iteration drains both queued tasks and assembles + dispatches
    // the one macro-batch they form.
    assert!(!coordinator.run_once(&task_rx, &mut |_| {}).unwrap());

    // Wait for the training worker to report back.
    let report = report_rx.recv_timeout(std::time::Duration::from_secs(5)).expect("worker must report");
    assert_eq!(report.policy_id, 0);
    assert_eq!(report.env_steps, 4);
    assert!(report.train.is_some());
    assert_eq!(shared_train_step.load(Ordering::Relaxed), 20);

    task_tx.send(TaskMessage::Terminate).unwrap();
    let done = coordinator.run_once(&task_rx, &mut |_| {}).unwrap();
    assert!(done);

    worker_handle.join().unwrap();
}
