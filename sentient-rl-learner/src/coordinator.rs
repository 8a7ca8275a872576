//! C8: Learner Coordinator.
//!
//! The single cooperative loop on the learner's main thread, plus the
//! dedicated training-worker thread it hands macro-batches off to.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::assembler;
use crate::broadcast::WeightBroadcaster;
use crate::checkpoint::{CheckpointManager, CheckpointState};
use crate::config::LearnerConfig;
use crate::engine::{TrainStats, TrainingEngine};
use crate::error::Result;
use crate::intake::{RolloutDescriptor, RolloutIntake};
use crate::model::ActorCriticModel;
use crate::pbt::{PbtLatch, PbtMessage};
use crate::registry::TrajectoryRegistry;
use crate::rollout::{ExperienceBuffer, TensorAttacher};
use crate::types::{PolicyVersion, SharedTensorHandle, SlotKey};

/// One rollout announcement within a `TRAIN` task.
#[derive(Debug, Clone)]
pub struct RolloutAnnouncement {
    /// Environment index within the split.
    pub env_idx: u32,
    /// Agent index within the environment.
    pub agent_idx: u32,
    /// Rollout length, in environment steps.
    pub length: usize,
    /// Environment-step count contributed.
    pub env_steps: u64,
    /// Minimum policy version stamped across the rollout's timesteps.
    pub min_policy_version: PolicyVersion,
}

/// Inbound task-queue messages.
#[derive(Debug, Clone)]
pub enum TaskMessage {
    /// Ensure the training worker has finished initialization.
    Init,
    /// Register a trajectory-slot storage region and its readiness bitmap.
    InitTensors {
        /// Worker process index.
        worker_idx: u32,
        /// Environment-split index.
        split_idx: u32,
        /// Trajectory-buffer slot index within the split.
        traj_buffer_idx: u32,
        /// Tensor handles keyed by `(env_idx, agent_idx)`.
        tensors: std::collections::HashMap<(u32, u32), SharedTensorHandle>,
        /// Number of environments in the split (for bitmap sizing).
        num_envs: u32,
        /// Number of agents per environment (for bitmap sizing).
        num_agents: u32,
        /// Number of trajectory-buffer slots per split (for bitmap sizing).
        num_traj_buffers: u32,
    },
    /// One or more completed rollouts ready for intake.
    Train {
        /// Worker process index.
        worker_idx: u32,
        /// Environment-split index.
        split_idx: u32,
        /// Trajectory-buffer slot index within the split.
        traj_buffer_idx: u32,
        /// The rollouts completed in this announcement.
        rollouts: Vec<RolloutAnnouncement>,
    },
    /// A mutation from the PBT controller.
    Pbt(PbtMessage),
    /// Begin cooperative shutdown.
    Terminate,
    /// No task this poll (never actually enqueued; a marker for callers
    /// distinguishing "queue empty" from a real message without using `Option`).
    Empty,
}

/// Outbound report-queue message.
#[derive(Debug, Clone)]
pub struct ReportMessage {
    /// Cumulative environment steps at report time.
    pub env_steps: u64,
    /// This learner's policy id.
    pub policy_id: u32,
    /// Training summary, if one was sampled this step.
    pub train: Option<TrainStats>,
    /// Process memory diagnostics, gathered alongside `train` whenever a
    /// summary was sampled (the original only collects these when it has
    /// training stats to report them next to).
    pub stats: Option<MemoryStats>,
}

/// Process-level memory diagnostics sampled once per reported training step.
/// The accelerator-resident memory the original also reports is out of scope
/// (no accelerator binding lives in this crate); this covers host memory only.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct MemoryStats {
    /// This process's resident memory, in bytes.
    pub used_bytes: u64,
    /// Total system memory, in bytes.
    pub total_bytes: u64,
}

/// Sample this process's current memory usage.
fn collect_memory_stats() -> MemoryStats {
    use sysinfo::{PidExt, ProcessExt, System, SystemExt};

    let mut system = System::new();
    let pid = sysinfo::Pid::from_u32(std::process::id());
    system.refresh_process(pid);
    system.refresh_memory();
    let used_bytes = system.process(pid).map_or(0, |p| p.memory());
    MemoryStats {
        used_bytes,
        total_bytes: system.total_memory(),
    }
}

/// One assembled macro-batch handed from the coordinator to the training
/// worker over the experience queue.
pub struct PendingBatch {
    /// The host-resident experience buffer assembled by [`crate::assembler`].
    pub buffer: ExperienceBuffer,
    /// Environment-step count contributed by this batch's rollouts.
    pub env_step_count: u64,
}

/// The dedicated training worker: owns the model, optimizer, checkpoint
/// manager, and weight broadcaster; drains the experience queue and applies
/// latched PBT mutations strictly between optimizer steps.
pub struct TrainingWorker {
    engine: TrainingEngine,
    broadcaster: WeightBroadcaster,
    checkpoints: CheckpointManager,
    pbt: PbtLatch,
    cfg: LearnerConfig,
    policy_id: u32,
    experiment_dir: PathBuf,
    shared_train_step: Arc<AtomicU64>,
    shared_discarded: Arc<AtomicU64>,
    terminate: Arc<AtomicBool>,
    last_cache_release: Instant,
    batches_processed: u64,
}

impl TrainingWorker {
    /// Construct a training worker. `shared_discarded` is the coordinator's
    /// running count of rollouts dropped for staleness, read here and
    /// reported to the broadcaster on every weight publish.
    #[must_use]
    pub fn new(
        model: Box<dyn ActorCriticModel>,
        cfg: LearnerConfig,
        policy_id: u32,
        experiment_dir: PathBuf,
        shared_train_step: Arc<AtomicU64>,
        shared_discarded: Arc<AtomicU64>,
        terminate: Arc<AtomicBool>,
    ) -> Self {
        let checkpoints = CheckpointManager::new(&experiment_dir, policy_id, cfg.keep_checkpoints, cfg.initial_save_rate);
        Self {
            engine: TrainingEngine::new(model, cfg.clone()),
            broadcaster: WeightBroadcaster::new(),
            checkpoints,
            pbt: PbtLatch::new(),
            cfg,
            policy_id,
            experiment_dir,
            shared_train_step,
            shared_discarded,
            terminate,
            last_cache_release: Instant::now(),
            batches_processed: 0,
        }
    }

    /// Register a policy-worker weight sink.
    pub fn register_sink(&mut self, sink: Box<dyn crate::broadcast::PolicyWorkerSink + Send>) {
        self.broadcaster.register(sink);
    }

    /// Restore from this policy's latest checkpoint, if any.
    pub fn restore_from_checkpoint(&mut self) -> Result<()> {
        if let Some(state) = self.checkpoints.load_latest()? {
            self.engine.model_mut_set_parameters(&state.model_params);
            self.engine.set_optimizer_state(state.optimizer_state);
            self.engine.set_kl_coeff(state.kl_coeff);
            self.shared_train_step.store(state.train_step, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Latch an incoming PBT message for application at the top of the next
    /// training iteration.
    pub fn latch_pbt(&mut self, message: PbtMessage) {
        self.pbt.latch(message);
    }

    fn apply_pending_pbt(&mut self) -> Result<()> {
        let Some(message) = self.pbt.take() else {
            return Ok(());
        };
        match message {
            PbtMessage::SaveModel { policy_id } if policy_id == self.policy_id => {
                debug!(target: "learner.pbt", policy_id, "applying latched SAVE_MODEL");
                self.checkpoints.request_save();
            }
            PbtMessage::LoadModel {
                self_policy_id,
                src_policy_id,
            } if self_policy_id == self.policy_id => {
                debug!(target: "learner.pbt", policy_id = self_policy_id, src_policy_id, "applying latched LOAD_MODEL");
                if let Some(source) = CheckpointManager::load_from_policy(&self.experiment_dir, src_policy_id)? {
                    self.engine.model_mut_set_parameters(&source.model_params);
                    self.engine.set_optimizer_state(source.optimizer_state);
                    self.engine.set_kl_coeff(source.kl_coeff);
                }
            }
            PbtMessage::UpdateCfg { policy_id, new_cfg } if policy_id == self.policy_id => {
                debug!(target: "learner.pbt", policy_id, "applying latched UPDATE_CFG");
                crate::pbt::apply_cfg_mutation(&mut self.cfg, &new_cfg);
            }
            _ => {}
        }
        Ok(())
    }

    /// Process one assembled macro-batch end to end: PBT mutation, training,
    /// checkpoint policy, weight broadcast. Returns the training summary, if
    /// one was sampled.
    pub fn process_batch(&mut self, batch: PendingBatch) -> Result<Option<TrainStats>> {
        self.apply_pending_pbt()?;

        let stats = self.engine.train_on_experience(&batch.buffer, batch.env_step_count);
        self.shared_train_step.store(self.engine.train_step(), Ordering::Relaxed);

        if self.checkpoints.should_save(self.engine.train_step()) {
            let state = CheckpointState {
                policy_id: self.policy_id,
                train_step: self.engine.train_step(),
                env_steps: self.engine.env_steps(),
                kl_coeff: self.engine.kl_coeff(),
                model_params: self.engine.model().get_parameters(),
                optimizer_state: self.engine.optimizer_state().clone(),
            };
            self.checkpoints.save(self.engine.train_step(), &state)?;
        }

        self.broadcaster
            .observe_discards(Instant::now(), self.shared_discarded.load(Ordering::Relaxed));
        self.broadcaster.broadcast(
            PolicyVersion(self.engine.train_step()),
            self.engine.model().get_parameters(),
        );

        self.maybe_release_cache();
        Ok(stats)
    }

    /// Release-accelerator-cache cadence: every 30s of wall time, or
    /// unconditionally for the first 50 processed batches of a non-benchmark
    /// run. The accelerator binding itself is out of scope; this only
    /// implements the cadence decision.
    fn maybe_release_cache(&mut self) {
        self.batches_processed += 1;
        let elapsed = self.last_cache_release.elapsed() >= Duration::from_secs(30);
        let early_in_run = !self.cfg.benchmark && self.batches_processed <= 50;
        if elapsed || early_in_run {
            self.last_cache_release = Instant::now();
            // accelerator cache release is an external-collaborator no-op here.
        }
    }

    /// Run the training-worker loop: pop batches until a sentinel or the
    /// terminate flag is observed.
    pub fn run(
        mut self,
        experience_rx: Receiver<Option<PendingBatch>>,
        batch_picked_up: Sender<()>,
        report_tx: Sender<ReportMessage>,
    ) {
        loop {
            match experience_rx.recv() {
                Ok(Some(batch)) => {
                    let _ = batch_picked_up.send(());
                    match self.process_batch(batch) {
                        Ok(train) => {
                            let stats = train.is_some().then(collect_memory_stats);
                            let _ = report_tx.send(ReportMessage {
                                env_steps: self.engine.env_steps(),
                                policy_id: self.policy_id,
                                train,
                                stats,
                            });
                        }
                        Err(err) => {
                            panic!("training worker hit a fatal error: {err}");
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => break,
            }
            if self.terminate.load(Ordering::Relaxed) {
                break;
            }
        }
        info!(policy_id = self.policy_id, "training worker exiting");
    }
}

/// Cross-thread handle for announcing experience batches and observing
/// back-pressure, shared between the coordinator and the training worker.
pub struct Coordinator {
    registry: Arc<TrajectoryRegistry>,
    intake: RolloutIntake,
    cfg: LearnerConfig,
    attacher: Arc<dyn TensorAttacher + Send + Sync>,
    shared_train_step: Arc<AtomicU64>,
    shared_discarded: Arc<AtomicU64>,
    terminate: Arc<AtomicBool>,
    experience_tx: Sender<Option<PendingBatch>>,
    batch_picked_up: Receiver<()>,
    in_flight: u32,
}

impl Coordinator {
    /// Construct a coordinator. `experience_tx`/`batch_picked_up` connect to
    /// a [`TrainingWorker`] running on its own thread. `shared_discarded` is
    /// published to that same worker so it can report a real discard rate
    /// alongside every weight broadcast.
    #[must_use]
    pub fn new(
        registry: Arc<TrajectoryRegistry>,
        cfg: LearnerConfig,
        policy_id: u32,
        attacher: Arc<dyn TensorAttacher + Send + Sync>,
        shared_train_step: Arc<AtomicU64>,
        shared_discarded: Arc<AtomicU64>,
        terminate: Arc<AtomicBool>,
        experience_tx: Sender<Option<PendingBatch>>,
        batch_picked_up: Receiver<()>,
    ) -> Self {
        Self {
            registry,
            intake: RolloutIntake::new(policy_id),
            cfg,
            attacher,
            shared_train_step,
            shared_discarded,
            terminate,
            experience_tx,
            batch_picked_up,
            in_flight: 0,
        }
    }

    /// Current optimizer step, as last observed from the training worker.
    fn train_step(&self) -> PolicyVersion {
        PolicyVersion(self.shared_train_step.load(Ordering::Relaxed))
    }

    /// Handle one drained task message.
    pub fn handle_task(&mut self, task: TaskMessage) -> Result<()> {
        match task {
            TaskMessage::Init | TaskMessage::Empty => {}
            TaskMessage::InitTensors {
                worker_idx,
                split_idx,
                traj_buffer_idx,
                tensors,
                num_envs,
                num_agents,
                num_traj_buffers,
            } => {
                self.registry.register_tensors(worker_idx, split_idx, traj_buffer_idx, tensors)?;
                self.registry
                    .ensure_bitmap(worker_idx, split_idx, num_envs, num_agents, num_traj_buffers);
            }
            TaskMessage::Train {
                worker_idx,
                split_idx,
                traj_buffer_idx,
                rollouts,
            } => {
                for r in rollouts {
                    self.intake.announce(RolloutDescriptor {
                        key: SlotKey {
                            worker_idx,
                            split_idx,
                            env_idx: r.env_idx,
                            agent_idx: r.agent_idx,
                            traj_buffer_idx,
                        },
                        length: r.length,
                        env_steps: r.env_steps,
                        min_policy_version: r.min_policy_version,
                    });
                }
            }
            TaskMessage::Pbt(_) | TaskMessage::Terminate => {
                unreachable!("handled by the caller before dispatch")
            }
        }
        Ok(())
    }

    /// Drain up to `max` pending tasks from `task_rx` non-blockingly,
    /// applying each. Returns whether any task was handled and whether
    /// termination was requested.
    fn drain_tasks(
        &mut self,
        task_rx: &Receiver<TaskMessage>,
        pbt_latcher: &mut impl FnMut(PbtMessage),
    ) -> Result<(bool, bool)> {
        let mut did_work = false;
        loop {
            match task_rx.try_recv() {
                Ok(TaskMessage::Terminate) => return Ok((true, true)),
                Ok(TaskMessage::Pbt(msg)) => {
                    pbt_latcher(msg);
                    did_work = true;
                }
                Ok(task) => {
                    self.handle_task(task)?;
                    did_work = true;
                }
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => return Ok((did_work, true)),
            }
        }
        Ok((did_work, false))
    }

    /// Attempt macro-batch formation: lag enforcement, then assembly if
    /// enough rollouts are pending.
    fn try_form_batch(&mut self) -> Result<bool> {
        self.intake.enforce_lag(&self.registry, self.train_step(), self.cfg.max_policy_lag);
        self.shared_discarded.store(self.intake.num_discarded(), Ordering::Relaxed);
        let Some(batch) = assembler::try_assemble(&mut self.intake, &self.registry, self.attacher.as_ref(), &self.cfg)? else {
            return Ok(false);
        };
        self.in_flight += 1;
        let _ = self.experience_tx.send(Some(PendingBatch {
            buffer: batch.buffer,
            env_step_count: batch.env_step_count,
        }));
        Ok(true)
    }

    /// Run one full iteration of the coordinator loop. Returns `true` if
    /// termination was observed.
    pub fn run_once(&mut self, task_rx: &Receiver<TaskMessage>, pbt_latcher: &mut impl FnMut(PbtMessage)) -> Result<bool> {
        trace!(target: "learner.coordinator", pending = self.intake.pending_len(), in_flight = self.in_flight, "iteration");

        // Drain the "batch picked up" signal, releasing back-pressure.
        while self.batch_picked_up.try_recv().is_ok() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }

        // Back-pressure: at most one batch in flight plus one staged.
        if self.in_flight > 1 {
            let _ = self.batch_picked_up.recv_timeout(Duration::from_millis(5));
            return Ok(false);
        }

        let (task_work, terminate) = self.drain_tasks(task_rx, pbt_latcher)?;
        if terminate {
            self.terminate.store(true, Ordering::Relaxed);
            let _ = self.experience_tx.send(None);
            return Ok(true);
        }

        let assembled = self.try_form_batch()?;

        if !task_work && !assembled {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(false)
    }
}

pub use PendingBatch as ExperienceMessage;

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("pending", &self.intake.pending_len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

/// The `(env_steps, policy_id, train, stats)` serialization helper for the
/// report queue, used when the transport requires a JSON-compatible payload.
#[must_use]
pub fn report_to_json(report: &ReportMessage) -> Value {
    serde_json::json!({
        "env_steps": report.env_steps,
        "policy_id": report.policy_id,
        "train": report.train,
        "stats": report.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoricalDistribution;
    use crate::rollout::RolloutTensors;
    use crate::types::{DType, FieldTree};
    use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

    struct NullModel(Vec<f64>);
    impl ActorCriticModel for NullModel {
        fn head_dim(&self) -> usize {
            2
        }
        fn core_dim(&self) -> usize {
            2
        }
        fn action_dim(&self) -> usize {
            2
        }
        fn forward_head(&self, observations: ArrayView2<f64>) -> Array2<f64> {
            Array2::zeros((observations.nrows(), 2))
        }
        fn step_core(&self, head_out: ArrayView2<f64>, rnn_state: ArrayView2<f64>) -> (Array2<f64>, Array2<f64>) {
            (head_out.to_owned(), rnn_state.to_owned())
        }
        fn tail(&self, core_out: ArrayView2<f64>) -> (Array1<f64>, Array2<f64>) {
            (Array1::zeros(core_out.nrows()), Array2::zeros((core_out.nrows(), 2)))
        }
        fn action_distribution(&self, logits: ArrayView1<f64>) -> CategoricalDistribution {
            CategoricalDistribution::from_logits(logits)
        }
        fn num_parameters(&self) -> usize {
            self.0.len()
        }
        fn get_parameters(&self) -> Vec<f64> {
            self.0.clone()
        }
        fn set_parameters(&mut self, params: &[f64]) {
            self.0 = params.to_vec();
        }
        fn apply_delta(&mut self, delta: &[f64]) {
            for (p, d) in self.0.iter_mut().zip(delta) {
                *p += d;
            }
        }
    }

    struct EmptyAttacher;
    impl TensorAttacher for EmptyAttacher {
        fn attach(&self, _key: SlotKey, length: usize) -> Result<RolloutTensors> {
            Ok(RolloutTensors {
                observations: FieldTree::Leaf(Array2::zeros((length, 1))),
                actions: Array2::zeros((length, 1)),
                action_logits: Array2::zeros((length, 2)),
                log_prob_actions: Array1::zeros(length),
                values: Array1::zeros(length),
                rewards: Array1::zeros(length),
                dones: Array1::from_elem(length, false),
                rnn_states: Array2::zeros((length, 2)),
                policy_version: Array1::zeros(length),
            })
        }
    }

    #[test]
    fn task_queue_drains_init_tensors_then_train() {
        let registry = Arc::new(TrajectoryRegistry::new());
        let mut cfg = LearnerConfig::default();
        cfg.macro_batch = 4;
        cfg.rollout = 4;
        cfg.recurrence = 4;
        cfg.batch_size = 4;

        let (exp_tx, _exp_rx) = crossbeam_channel::unbounded();
        let (_pickup_tx, pickup_rx) = crossbeam_channel::unbounded();
        let mut coordinator = Coordinator::new(
            registry,
            cfg,
            0,
            Arc::new(EmptyAttacher),
            Arc::new(AtomicU64::new(0)),
            Arc::new(AtomicU64::new(0)),
            Arc::new(AtomicBool::new(false)),
            exp_tx,
            pickup_rx,
        );

        let mut tensors = std::collections::HashMap::new();
        tensors.insert(
            (0, 0),
            SharedTensorHandle {
                region_id: 1,
                offset: 0,
                shape: vec![1],
                dtype: DType::F32,
            },
        );
        coordinator
            .handle_task(TaskMessage::InitTensors {
                worker_idx: 0,
                split_idx: 0,
                traj_buffer_idx: 0,
                tensors,
                num_envs: 1,
                num_agents: 1,
                num_traj_buffers: 1,
            })
            .unwrap();

        coordinator
            .handle_task(TaskMessage::Train {
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

        assert_eq!(coordinator.intake.pending_len(), 1);
    }

    #[test]
    fn terminate_pushes_sentinel_and_sets_flag() {
        let registry = Arc::new(TrajectoryRegistry::new());
        let cfg = LearnerConfig::default();
        let (exp_tx, exp_rx) = crossbeam_channel::unbounded();
        let (_pickup_tx, pickup_rx) = crossbeam_channel::unbounded();
        let terminate = Arc::new(AtomicBool::new(false));
        let mut coordinator = Coordinator::new(
            registry,
            cfg,
            0,
            Arc::new(EmptyAttacher),
            Arc::new(AtomicU64::new(0)),
            Arc::new(AtomicU64::new(0)),
            terminate.clone(),
            exp_tx,
            pickup_rx,
        );

        let (task_tx, task_rx) = crossbeam_channel::unbounded();
        task_tx.send(TaskMessage::Terminate).unwrap();
        let done = coordinator.run_once(&task_rx, &mut |_| {}).unwrap();
        assert!(done);
        assert!(terminate.load(Ordering::Relaxed));
        assert!(matches!(exp_rx.try_recv(), Ok(None)));
    }

    #[test]
    fn training_worker_processes_one_batch_and_advances_train_step() {
        let mut cfg = LearnerConfig::default();
        cfg.macro_batch = 4;
        cfg.rollout = 4;
        cfg.recurrence = 4;
        cfg.batch_size = 4;
        cfg.ppo_epochs = 1;

        let dir = std::env::temp_dir().join("sentient-rl-learner-coordinator-test");
        let shared_step = Arc::new(AtomicU64::new(0));
        let terminate = Arc::new(AtomicBool::new(false));
        let worker = TrainingWorker::new(
            Box::new(NullModel(vec![0.0; 4])),
            cfg,
            0,
            dir,
            shared_step.clone(),
            Arc::new(AtomicU64::new(0)),
            terminate,
        );

        let (exp_tx, exp_rx) = crossbeam_channel::unbounded();
        let (pickup_tx, _pickup_rx) = crossbeam_channel::unbounded();
        let (report_tx, report_rx) = crossbeam_channel::unbounded();

        let attacher = EmptyAttacher;
        let mut intake = RolloutIntake::new(0);
        let registry = TrajectoryRegistry::new();
        registry.ensure_bitmap(0, 0, 1, 1, 1);
        intake.announce(RolloutDescriptor {
            key: SlotKey {
                worker_idx: 0,
                split_idx: 0,
                env_idx: 0,
                agent_idx: 0,
                traj_buffer_idx: 0,
            },
            length: 4,
            env_steps: 4,
            min_policy_version: PolicyVersion(0),
        });
        let batch = assembler::try_assemble(&mut intake, &registry, &attacher, &worker.cfg.clone())
            .unwrap()
            .unwrap();
        exp_tx
            .send(Some(PendingBatch {
                buffer: batch.buffer,
                env_step_count: batch.env_step_count,
            }))
            .unwrap();
        exp_tx.send(None).unwrap();

        worker.run(exp_rx, pickup_tx, report_tx);
        assert_eq!(shared_step.load(Ordering::Relaxed), 1);
        assert!(report_rx.try_recv().is_ok());
    }
}
