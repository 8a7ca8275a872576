//! Learner configuration: the recognized key set and the divisibility
//! preconditions assembly and minibatch generation depend on.

use serde::{Deserialize, Serialize};

use crate::error::{LearnerError, Result};

/// Configuration recognized by the learner.
///
/// Parsing a `LearnerConfig` from TOML or JSON is the caller's job (the
/// command-line/config surface is an external collaborator); this type only
/// owns the recognized key set, its defaults, and the validation of the
/// divisibility preconditions assembly and minibatch generation depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Number of environment-steps worth of rollouts assembled per macro-batch.
    pub macro_batch: usize,
    /// Length of a single rollout, in environment steps.
    pub rollout: usize,
    /// Truncated-BPTT unroll window.
    pub recurrence: usize,
    /// SGD minibatch size.
    pub batch_size: usize,
    /// Maximum allowed `train_step - rollout.min_policy_version` before discard.
    pub max_policy_lag: u64,
    /// Whether to use V-trace off-policy correction (vs. plain GAE).
    pub with_vtrace: bool,
    /// Discount factor.
    pub gamma: f64,
    /// GAE lambda (used only when `with_vtrace` is false).
    pub gae_lambda: f64,
    /// Whether to normalize advantages to zero mean / unit variance.
    pub normalize_advantage: bool,
    /// PPO policy-ratio clip bound: the ratio is clipped to `[1/ppo_clip_ratio, ppo_clip_ratio]`.
    pub ppo_clip_ratio: f64,
    /// PPO value-function clip range.
    pub ppo_clip_value: f64,
    /// Value loss coefficient.
    pub value_loss_coeff: f64,
    /// Prior (behavioral-cloning-style) KL loss coefficient.
    pub prior_loss_coeff: f64,
    /// Initial adaptive KL penalty coefficient.
    pub initial_kl_coeff: f64,
    /// Target KL divergence for adaptive coefficient control.
    pub target_kl: f64,
    /// Number of optimization epochs per macro-batch.
    pub ppo_epochs: usize,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Adam beta1.
    pub adam_beta1: f64,
    /// Adam beta2.
    pub adam_beta2: f64,
    /// Adam epsilon.
    pub adam_eps: f64,
    /// Global gradient-norm clip threshold; `<= 0` disables clipping.
    pub max_grad_norm: f64,
    /// Minimum checkpoint-save interval (in steps) before decay relaxes it.
    pub initial_save_rate: usize,
    /// Number of checkpoints to retain after rotation.
    pub keep_checkpoints: usize,
    /// Random seed.
    pub seed: u64,
    /// Whether this is a benchmarking run (affects the cache-release cadence).
    pub benchmark: bool,
    /// Whether a PBT controller is attached.
    pub with_pbt: bool,
    /// Number of rollout workers the learner expects to hear from.
    pub num_workers: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            macro_batch: 2048,
            rollout: 32,
            recurrence: 32,
            batch_size: 1024,
            max_policy_lag: 20,
            with_vtrace: true,
            gamma: 0.99,
            gae_lambda: 0.95,
            normalize_advantage: true,
            ppo_clip_ratio: 1.1,
            ppo_clip_value: 0.2,
            value_loss_coeff: 0.5,
            prior_loss_coeff: 0.0,
            initial_kl_coeff: 0.2,
            target_kl: 0.01,
            ppo_epochs: 1,
            learning_rate: 3e-4,
            adam_beta1: 0.9,
            adam_beta2: 0.999,
            adam_eps: 1e-6,
            max_grad_norm: 4.0,
            initial_save_rate: 120,
            keep_checkpoints: 3,
            seed: 0,
            benchmark: false,
            with_pbt: false,
            num_workers: 1,
        }
    }
}

impl LearnerConfig {
    /// Validate the divisibility preconditions assembly and minibatch
    /// generation rely on. Violations are fatal misconfiguration.
    pub fn validate(&self) -> Result<()> {
        if self.rollout == 0 || self.recurrence == 0 || self.batch_size == 0 || self.macro_batch == 0 {
            return Err(LearnerError::Misconfigured(
                "macro_batch, rollout, recurrence, and batch_size must all be nonzero".into(),
            ));
        }
        if self.macro_batch % self.rollout != 0 {
            return Err(LearnerError::Misconfigured(format!(
                "macro_batch ({}) must be divisible by rollout ({})",
                self.macro_batch, self.rollout
            )));
        }
        if self.rollout % self.recurrence != 0 {
            return Err(LearnerError::Misconfigured(format!(
                "rollout ({}) must be divisible by recurrence ({})",
                self.rollout, self.recurrence
            )));
        }
        if self.macro_batch % self.recurrence != 0 {
            return Err(LearnerError::Misconfigured(format!(
                "macro_batch ({}) must be divisible by recurrence ({})",
                self.macro_batch, self.recurrence
            )));
        }
        if self.macro_batch % self.batch_size != 0 {
            return Err(LearnerError::Misconfigured(format!(
                "macro_batch ({}) must be divisible by batch_size ({})",
                self.macro_batch, self.batch_size
            )));
        }
        if self.batch_size % self.recurrence != 0 {
            return Err(LearnerError::Misconfigured(format!(
                "batch_size ({}) must be divisible by recurrence ({})",
                self.batch_size, self.recurrence
            )));
        }
        Ok(())
    }

    /// Number of rollout descriptors assembled into one macro-batch.
    #[must_use]
    pub fn rollouts_in_macro_batch(&self) -> usize {
        self.macro_batch / self.rollout
    }

    /// Number of minibatches a fully assembled macro-batch splits into.
    #[must_use]
    pub fn minibatches_per_macro_batch(&self) -> usize {
        self.macro_batch / self.batch_size
    }

    /// Number of `recurrence`-sized sub-trajectories in one minibatch.
    #[must_use]
    pub fn trajectories_per_minibatch(&self) -> usize {
        self.batch_size / self.recurrence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        LearnerConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_divisible_macro_batch() {
        let mut cfg = LearnerConfig::default();
        cfg.macro_batch = 100;
        cfg.rollout = 32;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_divisible_batch_size() {
        let mut cfg = LearnerConfig::default();
        cfg.macro_batch = 2048;
        cfg.batch_size = 300;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn derived_counts_match_spec_example() {
        let mut cfg = LearnerConfig::default();
        cfg.macro_batch = 2048;
        cfg.rollout = 32;
        cfg.recurrence = 32;
        cfg.batch_size = 1024;
        cfg.validate().unwrap();
        assert_eq!(cfg.rollouts_in_macro_batch(), 64);
        assert_eq!(cfg.minibatches_per_macro_batch(), 2);
        assert_eq!(cfg.trajectories_per_minibatch(), 32);
    }
}
