//! C3: Batch Assembler.
//!
//! Fires once `rollouts_in_macro_batch` descriptors are pending. Flattens
//! them into a host-resident [`ExperienceBuffer`], computing GAE advantages
//! when V-trace is disabled.

use ndarray::Array1;
use tracing::debug;

use crate::config::LearnerConfig;
use crate::intake::{RolloutDescriptor, RolloutIntake};
use crate::registry::TrajectoryRegistry;
use crate::rollout::{
    concat_field_trees, concat_time_axis_1d, concat_time_axis_2d, concat_time_axis_bool,
    concat_time_axis_u64, ExperienceBuffer, RolloutTensors, TensorAttacher,
};

/// Output of a successful macro-batch assembly: the buffer plus the
/// aggregate counts downstream consumers (the report queue) rely on.
pub struct ExperienceBatch {
    /// The flattened experience buffer.
    pub buffer: ExperienceBuffer,
    /// `E * T`, the number of samples in the buffer.
    pub sample_count: usize,
    /// Sum of each rollout's `env_steps`. Not necessarily equal to
    /// `sample_count` when rollouts report frame-skipped environment steps.
    pub env_step_count: u64,
}

/// Synthesize the final-step "next value" by extrapolating the last
/// observed reward/value pair backwards through the discount:
/// `v_T = (v_{T-1} - r_{T-1}) / gamma`. This makes the advantage of the
/// final action zero absent further correction.
fn synthesize_next_value(values: &Array1<f64>, rewards: &Array1<f64>, gamma: f64) -> f64 {
    let t = values.len();
    if t == 0 {
        return 0.0;
    }
    (values[t - 1] - rewards[t - 1]) / gamma
}

/// Run the standard GAE recurrence over one rollout, returning
/// `(advantages, returns)` both of length `T`.
fn gae_recurrence(
    rewards: &Array1<f64>,
    values: &Array1<f64>,
    dones: &ndarray::Array1<bool>,
    next_value: f64,
    gamma: f64,
    lambda: f64,
) -> (Array1<f64>, Array1<f64>) {
    let t = rewards.len();
    let mut advantages = Array1::zeros(t);
    let mut running_advantage = 0.0;
    for i in (0..t).rev() {
        let next_v = if i == t - 1 { next_value } else { values[i + 1] };
        let mask = if dones[i] { 0.0 } else { 1.0 };
        let td_error = rewards[i] + gamma * mask * next_v - values[i];
        running_advantage = td_error + gamma * lambda * mask * running_advantage;
        advantages[i] = running_advantage;
    }
    let returns = &advantages + values;
    (advantages, returns)
}

/// Normalize a batch of advantages: subtract the mean, divide by
/// `max(1e-2, std)`.
fn normalize(advantages: &mut Array1<f64>) {
    let n = advantages.len() as f64;
    if n == 0.0 {
        return;
    }
    let mean = advantages.sum() / n;
    let var = advantages.mapv(|x| (x - mean).powi(2)).sum() / n;
    let std = var.sqrt().max(1e-2);
    advantages.mapv_inplace(|x| (x - mean) / std);
}

/// Attempt to form and assemble one macro-batch from the pending list.
/// Returns `None` if fewer than `rollouts_in_macro_batch` rollouts are
/// pending yet.
pub fn try_assemble(
    intake: &mut RolloutIntake,
    registry: &TrajectoryRegistry,
    attacher: &dyn TensorAttacher,
    cfg: &LearnerConfig,
) -> crate::error::Result<Option<ExperienceBatch>> {
    let Some(descriptors) = intake.take_front(cfg.rollouts_in_macro_batch()) else {
        return Ok(None);
    };
    assemble(&descriptors, registry, attacher, cfg).map(Some)
}

fn assemble(
    descriptors: &[RolloutDescriptor],
    registry: &TrajectoryRegistry,
    attacher: &dyn TensorAttacher,
    cfg: &LearnerConfig,
) -> crate::error::Result<ExperienceBatch> {
    let mut tensors: Vec<RolloutTensors> = Vec::with_capacity(descriptors.len());
    for d in descriptors {
        tensors.push(attacher.attach(d.key, d.length)?);
    }

    let (advantages, returns) = if cfg.with_vtrace {
        (None, None)
    } else {
        let mut adv_parts = Vec::with_capacity(tensors.len());
        let mut ret_parts = Vec::with_capacity(tensors.len());
        for rt in &tensors {
            let next_value = synthesize_next_value(&rt.values, &rt.rewards, cfg.gamma);
            let (adv, ret) =
                gae_recurrence(&rt.rewards, &rt.values, &rt.dones, next_value, cfg.gamma, cfg.gae_lambda);
            adv_parts.push(adv);
            ret_parts.push(ret);
        }
        let mut advantages = concat_time_axis_1d(&adv_parts);
        if cfg.normalize_advantage {
            normalize(&mut advantages);
        }
        let returns = concat_time_axis_1d(&ret_parts);
        (Some(advantages), Some(returns))
    };

    let observations = concat_field_trees(&tensors.iter().map(|t| t.observations.clone()).collect::<Vec<_>>());
    let actions = concat_time_axis_2d(&tensors.iter().map(|t| t.actions.clone()).collect::<Vec<_>>());
    let action_logits =
        concat_time_axis_2d(&tensors.iter().map(|t| t.action_logits.clone()).collect::<Vec<_>>());
    let log_prob_actions =
        concat_time_axis_1d(&tensors.iter().map(|t| t.log_prob_actions.clone()).collect::<Vec<_>>());
    let values = concat_time_axis_1d(&tensors.iter().map(|t| t.values.clone()).collect::<Vec<_>>());
    let rewards = concat_time_axis_1d(&tensors.iter().map(|t| t.rewards.clone()).collect::<Vec<_>>());
    let dones = concat_time_axis_bool(&tensors.iter().map(|t| t.dones.clone()).collect::<Vec<_>>());
    let rnn_states =
        concat_time_axis_2d(&tensors.iter().map(|t| t.rnn_states.clone()).collect::<Vec<_>>());
    let policy_version =
        concat_time_axis_u64(&tensors.iter().map(|t| t.policy_version.clone()).collect::<Vec<_>>());

    let sample_count = rewards.len();
    let env_step_count: u64 = descriptors.iter().map(|d| d.env_steps).sum();

    // Step 5: release source slots only after every copy into the buffer
    // above has completed.
    for d in descriptors {
        registry.release(d.key);
    }

    let buffer = ExperienceBuffer {
        observations,
        actions,
        action_logits,
        log_prob_actions,
        values,
        rewards,
        dones,
        rnn_states,
        policy_version,
        num_rollouts: descriptors.len(),
        rollout_len: cfg.rollout,
        advantages,
        returns,
    };

    debug!(
        target: "learner.assembler",
        num_rollouts = descriptors.len(),
        sample_count,
        env_step_count,
        "assembled macro-batch"
    );

    Ok(ExperienceBatch {
        buffer,
        sample_count,
        env_step_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::RolloutIntake;
    use crate::types::{FieldTree, PolicyVersion, SlotKey};
    use ndarray::{array, Array2};

    struct FixedAttacher {
        rewards: Vec<f64>,
        values: Vec<f64>,
    }

    impl TensorAttacher for FixedAttacher {
        fn attach(&self, _key: SlotKey, length: usize) -> crate::error::Result<RolloutTensors> {
            assert_eq!(length, self.rewards.len());
            Ok(RolloutTensors {
                observations: FieldTree::Leaf(Array2::zeros((length, 1))),
                actions: Array2::zeros((length, 1)),
                action_logits: Array2::zeros((length, 1)),
                log_prob_actions: Array1::zeros(length),
                values: Array1::from_vec(self.values.clone()),
                rewards: Array1::from_vec(self.rewards.clone()),
                dones: Array1::from_elem(length, false),
                rnn_states: Array2::zeros((length, 1)),
                policy_version: Array1::zeros(length),
            })
        }
    }

    #[test]
    fn gae_sanity_scenario() {
        // rewards = all 1, values = all 0, dones = all 0, gamma = lambda = 1.0,
        // rollout length 4, one rollout. `synthesize_next_value` bootstraps the
        // missing terminal value as (value - reward) / gamma = (0 - 1) / 1 = -1,
        // which makes the final-step TD residual 1 + 1*(-1) - 0 = 0, so the
        // backward recursion gives returns = [3,2,1,0]; advantages == returns
        // (pre-normalization).
        let mut cfg = LearnerConfig::default();
        cfg.with_vtrace = false;
        cfg.normalize_advantage = false;
        cfg.gamma = 1.0;
        cfg.gae_lambda = 1.0;
        cfg.rollout = 4;
        cfg.macro_batch = 4;
        cfg.recurrence = 4;
        cfg.batch_size = 4;

        let registry = TrajectoryRegistry::new();
        registry.ensure_bitmap(0, 0, 1, 1, 1);
        let mut intake = RolloutIntake::new(0);
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

        let attacher = FixedAttacher {
            rewards: vec![1.0, 1.0, 1.0, 1.0],
            values: vec![0.0, 0.0, 0.0, 0.0],
        };

        let batch = try_assemble(&mut intake, &registry, &attacher, &cfg)
            .unwrap()
            .unwrap();
        let advantages = batch.buffer.advantages.unwrap();
        let returns = batch.buffer.returns.unwrap();
        assert_eq!(returns, array![3.0, 2.0, 1.0, 0.0]);
        assert_eq!(advantages, returns);
        assert_eq!(batch.sample_count, 4);
        assert_eq!(batch.env_step_count, 4);
        assert!(registry.is_free(SlotKey {
            worker_idx: 0,
            split_idx: 0,
            env_idx: 0,
            agent_idx: 0,
            traj_buffer_idx: 0,
        }));
    }

    #[test]
    fn vtrace_mode_skips_gae() {
        let mut cfg = LearnerConfig::default();
        cfg.with_vtrace = true;
        cfg.rollout = 2;
        cfg.macro_batch = 2;
        cfg.recurrence = 2;
        cfg.batch_size = 2;

        let registry = TrajectoryRegistry::new();
        registry.ensure_bitmap(0, 0, 1, 1, 1);
        let mut intake = RolloutIntake::new(0);
        intake.announce(RolloutDescriptor {
            key: SlotKey {
                worker_idx: 0,
                split_idx: 0,
                env_idx: 0,
                agent_idx: 0,
                traj_buffer_idx: 0,
            },
            length: 2,
            env_steps: 2,
            min_policy_version: PolicyVersion(0),
        });
        let attacher = FixedAttacher {
            rewards: vec![1.0, 1.0],
            values: vec![0.0, 0.0],
        };
        let batch = try_assemble(&mut intake, &registry, &attacher, &cfg)
            .unwrap()
            .unwrap();
        assert!(batch.buffer.advantages.is_none());
        assert!(batch.buffer.returns.is_none());
    }
}
