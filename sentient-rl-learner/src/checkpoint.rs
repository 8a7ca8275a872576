//! C6: Checkpoint Manager.
//!
//! Atomic save-then-rename, rotation, load, and PBT-initiated cross-policy
//! load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::OptimizerState;
use crate::error::Result;
use crate::schedule::LinearDecay;

/// The full persisted learner state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Which policy (PBT population member) this checkpoint belongs to.
    pub policy_id: u32,
    /// Optimizer step at save time.
    pub train_step: u64,
    /// Cumulative environment steps at save time.
    pub env_steps: u64,
    /// Adaptive KL coefficient at save time.
    pub kl_coeff: f64,
    /// Flat model parameters.
    pub model_params: Vec<f64>,
    /// Optimizer moment state.
    pub optimizer_state: OptimizerState,
}

/// A file name parsed as `checkpoint_<train_step:09d>_<env_steps>.pth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CheckpointName {
    train_step: u64,
    env_steps: u64,
}

impl CheckpointName {
    fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_prefix("checkpoint_")?.strip_suffix(".pth")?;
        let (step_str, env_str) = stem.split_once('_')?;
        Some(Self {
            train_step: step_str.parse().ok()?,
            env_steps: env_str.parse().ok()?,
        })
    }

    fn file_name(self) -> String {
        format!("checkpoint_{:09}_{}.pth", self.train_step, self.env_steps)
    }
}

/// Manages one policy's checkpoint directory
/// (`<experiment_dir>/checkpoint_p<policy_id>/`).
pub struct CheckpointManager {
    dir: PathBuf,
    policy_id: u32,
    keep_checkpoints: usize,
    save_schedule: LinearDecay,
    last_save_step: u64,
    force_save: bool,
}

impl CheckpointManager {
    /// Construct a manager rooted at `experiment_dir/checkpoint_p<policy_id>`.
    #[must_use]
    pub fn new(experiment_dir: &Path, policy_id: u32, keep_checkpoints: usize, initial_save_rate: usize) -> Self {
        Self {
            dir: experiment_dir.join(format!("checkpoint_p{policy_id}")),
            policy_id,
            keep_checkpoints,
            save_schedule: LinearDecay::save_interval(initial_save_rate as f64),
            last_save_step: 0,
            force_save: false,
        }
    }

    /// Latch a forced save at the next opportunity (`SAVE_MODEL` from PBT).
    pub fn request_save(&mut self) {
        self.force_save = true;
    }

    /// Whether a save should happen now: either the decayed interval has
    /// elapsed, or an external save request is pending.
    #[must_use]
    pub fn should_save(&self, train_step: u64) -> bool {
        self.force_save || train_step.saturating_sub(self.last_save_step) >= self.save_schedule.value(train_step) as u64
    }

    /// Atomically save `state`: serialize to `checkpoint_tmp`, rename into
    /// place, then rotate old checkpoints. Returns the saved file's path.
    pub fn save(&mut self, train_step: u64, state: &CheckpointState) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let tmp_path = self.dir.join("checkpoint_tmp");
        let payload = serde_json::to_vec(state)?;
        fs::write(&tmp_path, payload)?;

        let name = CheckpointName {
            train_step: state.train_step,
            env_steps: state.env_steps,
        };
        let final_path = self.dir.join(name.file_name());
        fs::rename(&tmp_path, &final_path)?;
        info!(policy_id = self.policy_id, train_step, path = %final_path.display(), "saved checkpoint");

        self.rotate()?;
        self.last_save_step = train_step;
        self.force_save = false;
        Ok(final_path)
    }

    /// Delete the oldest checkpoints until at most `keep_checkpoints` remain.
    fn rotate(&self) -> Result<()> {
        let mut entries = self.list_checkpoints()?;
        entries.sort();
        while entries.len() > self.keep_checkpoints {
            let oldest = entries.remove(0);
            let path = self.dir.join(oldest.file_name());
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn list_checkpoints(&self) -> Result<Vec<CheckpointName>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = CheckpointName::parse(file_name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Load the most recent checkpoint in this manager's directory, if any.
    /// Logged and treated as "start from scratch" when the directory is
    /// missing or empty — never fatal.
    pub fn load_latest(&self) -> Result<Option<CheckpointState>> {
        let entries = self.list_checkpoints()?;
        let Some(latest) = entries.iter().max() else {
            warn!(policy_id = self.policy_id, dir = %self.dir.display(), "no checkpoint found, starting from scratch");
            return Ok(None);
        };
        let path = self.dir.join(latest.file_name());
        let bytes = fs::read(&path)?;
        let state: CheckpointState = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }

    /// Load the most recent checkpoint from a *different* policy's
    /// directory, for PBT's `LOAD_MODEL` cross-policy load. Returns the
    /// source state with `train_step`/`env_steps` left untouched by the
    /// caller: only `model_params`, `optimizer_state`, and `kl_coeff` are
    /// meant to be applied, per the PBT-load rule.
    pub fn load_from_policy(experiment_dir: &Path, src_policy_id: u32) -> Result<Option<CheckpointState>> {
        let manager = CheckpointManager::new(experiment_dir, src_policy_id, usize::MAX, 0);
        manager.load_latest()
    }
}

/// Apply a PBT cross-policy load onto the learner's own state: only
/// parameters, optimizer state, and `kl_coeff` are adopted; `train_step` and
/// `env_steps` are preserved from `current`.
#[must_use]
pub fn apply_pbt_load(current: &CheckpointState, source: &CheckpointState) -> CheckpointState {
    CheckpointState {
        policy_id: current.policy_id,
        train_step: current.train_step,
        env_steps: current.env_steps,
        kl_coeff: source.kl_coeff,
        model_params: source.model_params.clone(),
        optimizer_state: source.optimizer_state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(policy_id: u32, train_step: u64, env_steps: u64) -> CheckpointState {
        CheckpointState {
            policy_id,
            train_step,
            env_steps,
            kl_coeff: 0.2,
            model_params: vec![1.0, 2.0, 3.0],
            optimizer_state: OptimizerState::new(3),
        }
    }

    #[test]
    fn checkpoint_name_round_trips() {
        let name = CheckpointName { train_step: 42, env_steps: 1000 };
        let formatted = name.file_name();
        assert_eq!(formatted, "checkpoint_000000042_1000.pth");
        assert_eq!(CheckpointName::parse(&formatted), Some(name));
    }

    #[test]
    fn lexicographic_order_matches_numeric_order() {
        let a = CheckpointName { train_step: 9, env_steps: 0 }.file_name();
        let b = CheckpointName { train_step: 10, env_steps: 0 }.file_name();
        assert!(a < b, "zero-padding must keep lexicographic order == numeric order");
    }

    #[test]
    fn rotation_keeps_only_newest_n() {
        let dir = tempdir();
        let mut mgr = CheckpointManager::new(&dir, 0, 3, 120);
        for step in 1..=5u64 {
            mgr.save(step, &state(0, step, step * 10)).unwrap();
        }
        let remaining = mgr.list_checkpoints().unwrap();
        let mut steps: Vec<u64> = remaining.iter().map(|c| c.train_step).collect();
        steps.sort_unstable();
        assert_eq!(steps, vec![3, 4, 5]);
    }

    #[test]
    fn first_keep_minus_one_saves_perform_no_deletions() {
        let dir = tempdir();
        let mut mgr = CheckpointManager::new(&dir, 0, 3, 120);
        for step in 1..=2u64 {
            mgr.save(step, &state(0, step, step * 10)).unwrap();
        }
        assert_eq!(mgr.list_checkpoints().unwrap().len(), 2);
    }

    #[test]
    fn missing_directory_loads_as_none() {
        let dir = tempdir();
        let mgr = CheckpointManager::new(&dir, 7, 3, 120);
        assert!(mgr.load_latest().unwrap().is_none());
    }

    #[test]
    fn pbt_load_preserves_train_step_and_env_steps() {
        let current = state(0, 100, 10_000);
        let mut source = state(1, 80, 8_000);
        source.kl_coeff = 0.5;
        let merged = apply_pbt_load(&current, &source);
        assert_eq!(merged.train_step, 100);
        assert_eq!(merged.env_steps, 10_000);
        assert_eq!(merged.policy_id, 0);
        assert!((merged.kl_coeff - 0.5).abs() < 1e-9);
        assert_eq!(merged.model_params, source.model_params);
    }

    fn tempdir() -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut dir = std::env::temp_dir();
        dir.push(format!("sentient-rl-learner-test-{}-{unique}", std::process::id()));
        dir
    }
}
