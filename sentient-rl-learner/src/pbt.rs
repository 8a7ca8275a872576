//! C7: PBT Handler.
//!
//! Responds to the three message kinds a population-based-training
//! controller may send; latched mutations are only ever applied from the
//! training thread, avoiding any read/write race with the optimizer state.

use serde_json::Value;

/// A mutation requested by the PBT controller.
#[derive(Debug, Clone)]
pub enum PbtMessage {
    /// Force a checkpoint save at the next opportunity.
    SaveModel {
        /// The policy this request targets (must match the learner's own).
        policy_id: u32,
    },
    /// Load another policy's latest checkpoint, adopting its parameters,
    /// optimizer state, and `kl_coeff` while preserving `train_step`/`env_steps`.
    LoadModel {
        /// This learner's own policy id.
        self_policy_id: u32,
        /// The policy id to copy weights from.
        src_policy_id: u32,
    },
    /// Overwrite recognized config keys, including optimizer hyperparameters.
    UpdateCfg {
        /// The policy this request targets.
        policy_id: u32,
        /// New values for recognized config keys.
        new_cfg: std::collections::HashMap<String, Value>,
    },
}

/// Holds the latched (but not yet applied) PBT mutation, if any. At most one
/// is pending at a time: a newer request overwrites an older unapplied one.
#[derive(Debug, Default)]
pub struct PbtLatch {
    pending: Option<PbtMessage>,
}

impl PbtLatch {
    /// Create an empty latch.
    #[must_use]
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Latch an incoming PBT message, received on the coordinator's task queue.
    pub fn latch(&mut self, message: PbtMessage) {
        self.pending = Some(message);
    }

    /// Take the pending mutation, if any, for application from the training
    /// thread at the top of the next training iteration.
    pub fn take(&mut self) -> Option<PbtMessage> {
        self.pending.take()
    }
}

/// Apply a recognized config-key mutation onto a [`crate::config::LearnerConfig`].
/// Unrecognized keys are ignored; optimizer hyperparameters
/// (`learning_rate`, `adam_beta1`, `adam_beta2`) take effect on the very
/// next optimizer step.
pub fn apply_cfg_mutation(cfg: &mut crate::config::LearnerConfig, new_cfg: &std::collections::HashMap<String, Value>) {
    macro_rules! apply_f64 {
        ($key:literal, $field:expr) => {
            if let Some(v) = new_cfg.get($key).and_then(Value::as_f64) {
                $field = v;
            }
        };
    }
    apply_f64!("learning_rate", cfg.learning_rate);
    apply_f64!("adam_beta1", cfg.adam_beta1);
    apply_f64!("adam_beta2", cfg.adam_beta2);
    apply_f64!("adam_eps", cfg.adam_eps);
    apply_f64!("target_kl", cfg.target_kl);
    apply_f64!("max_grad_norm", cfg.max_grad_norm);
    apply_f64!("ppo_clip_ratio", cfg.ppo_clip_ratio);
    apply_f64!("ppo_clip_value", cfg.ppo_clip_value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearnerConfig;

    #[test]
    fn latch_keeps_only_the_newest_request() {
        let mut latch = PbtLatch::new();
        latch.latch(PbtMessage::SaveModel { policy_id: 0 });
        latch.latch(PbtMessage::LoadModel {
            self_policy_id: 0,
            src_policy_id: 1,
        });
        match latch.take() {
            Some(PbtMessage::LoadModel { src_policy_id, .. }) => assert_eq!(src_policy_id, 1),
            other => panic!("expected LoadModel, got {other:?}"),
        }
        assert!(latch.take().is_none());
    }

    #[test]
    fn cfg_mutation_updates_recognized_keys_only() {
        let mut cfg = LearnerConfig::default();
        let mut new_cfg = std::collections::HashMap::new();
        new_cfg.insert("learning_rate".to_string(), Value::from(1e-5));
        new_cfg.insert("not_a_real_key".to_string(), Value::from(true));
        apply_cfg_mutation(&mut cfg, &new_cfg);
        assert!((cfg.learning_rate - 1e-5).abs() < 1e-12);
    }
}
