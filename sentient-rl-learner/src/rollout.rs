//! Per-timestep tensor layout for a single rollout, and the macro-batch
//! experience buffer assembled from many rollouts.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};

use crate::types::{FieldTree, SlotKey};

/// The materialized per-timestep fields of one rollout, attached from a
/// trajectory slot's shared-memory tensors.
///
/// Field shapes all share a leading time dimension of length `length()`.
#[derive(Debug, Clone)]
pub struct RolloutTensors {
    /// Observation fields, possibly nested, each `[T, D]`.
    pub observations: FieldTree<Array2<f64>>,
    /// Actions taken, `[T, A]`.
    pub actions: Array2<f64>,
    /// Behavior-policy logits at action-sample time, `[T, L]`.
    pub action_logits: Array2<f64>,
    /// Log-probability of the sampled action under the behavior policy, `[T]`.
    pub log_prob_actions: Array1<f64>,
    /// Value estimate at sample time, `[T]`.
    pub values: Array1<f64>,
    /// Reward received after each step, `[T]`.
    pub rewards: Array1<f64>,
    /// Episode-termination flags, `[T]`.
    pub dones: Array1<bool>,
    /// Recurrent-core state snapshots at each step, `[T, H]`.
    pub rnn_states: Array2<f64>,
    /// Per-step policy-version tag, `[T]`.
    pub policy_version: Array1<u64>,
}

impl RolloutTensors {
    /// Rollout length in environment steps.
    #[must_use]
    pub fn length(&self) -> usize {
        self.rewards.len()
    }
}

/// Something that can attach a trajectory slot's tensors for reading. The
/// actual shared-memory mapping is an external collaborator concern; this
/// trait is the seam the batch assembler depends on.
pub trait TensorAttacher {
    /// Attach and copy out the tensors for `key`, expected to span `length` steps.
    fn attach(&self, key: SlotKey, length: usize) -> crate::error::Result<RolloutTensors>;
}

/// Host-resident experience buffer assembled from a macro-batch of rollouts.
/// Field shapes share a leading sample dimension of `sample_count = E * T`.
#[derive(Debug, Clone)]
pub struct ExperienceBuffer {
    /// Observation fields, flattened along the sample axis.
    pub observations: FieldTree<Array2<f64>>,
    /// Actions, `[E*T, A]`.
    pub actions: Array2<f64>,
    /// Behavior-policy logits, `[E*T, L]`.
    pub action_logits: Array2<f64>,
    /// Behavior log-probabilities, `[E*T]`.
    pub log_prob_actions: Array1<f64>,
    /// Value estimates at sample time, `[E*T]`.
    pub values: Array1<f64>,
    /// Rewards, `[E*T]`.
    pub rewards: Array1<f64>,
    /// Done flags, `[E*T]`.
    pub dones: Array1<bool>,
    /// Recurrent-core state snapshots, `[E*T, H]`.
    pub rnn_states: Array2<f64>,
    /// Per-step policy-version tags, `[E*T]`.
    pub policy_version: Array1<u64>,
    /// Number of rollouts concatenated into this buffer (`E`).
    pub num_rollouts: usize,
    /// Rollout length (`T`).
    pub rollout_len: usize,
    /// GAE advantages, populated only when V-trace is disabled (assembled here).
    pub advantages: Option<Array1<f64>>,
    /// GAE value targets (`advantages + values`), populated alongside `advantages`.
    pub returns: Option<Array1<f64>>,
}

impl ExperienceBuffer {
    /// `E * T`.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.rewards.len()
    }

    /// Flatten the (possibly nested) observation field tree into one
    /// `[E*T, D]` array by concatenating every leaf along the feature axis,
    /// in a fixed order determined by the leaf paths. This is the boundary
    /// at which the open-ended named-tensor container is handed to a
    /// concrete model's head, which expects a single feature vector.
    #[must_use]
    pub fn observations_flat(&self) -> Array2<f64> {
        let mut leaves: Vec<(String, &Array2<f64>)> = Vec::new();
        self.observations.for_each_leaf(&mut |path, arr| leaves.push((path.to_string(), arr)));
        leaves.sort_by(|a, b| a.0.cmp(&b.0));
        let views: Vec<_> = leaves.iter().map(|(_, a)| a.view()).collect();
        ndarray::concatenate(Axis(1), &views).expect("all observation leaves share the sample axis length")
    }
}

/// Concatenate rollout-local arrays along the sample axis, rollout-major
/// (rollout 0's T steps, then rollout 1's T steps, ...). Matches the
/// "[E*T, ...]" layout convention in the component design.
pub fn concat_time_axis_1d(parts: &[Array1<f64>]) -> Array1<f64> {
    let views: Vec<_> = parts.iter().map(ndarray::ArrayBase::view).collect();
    ndarray::concatenate(Axis(0), &views).expect("rollouts share length by precondition")
}

/// As [`concat_time_axis_1d`], but for `bool` arrays.
pub fn concat_time_axis_bool(parts: &[Array1<bool>]) -> Array1<bool> {
    let views: Vec<_> = parts.iter().map(ndarray::ArrayBase::view).collect();
    ndarray::concatenate(Axis(0), &views).expect("rollouts share length by precondition")
}

/// As [`concat_time_axis_1d`], but for `u64` arrays.
pub fn concat_time_axis_u64(parts: &[Array1<u64>]) -> Array1<u64> {
    let views: Vec<_> = parts.iter().map(ndarray::ArrayBase::view).collect();
    ndarray::concatenate(Axis(0), &views).expect("rollouts share length by precondition")
}

/// As [`concat_time_axis_1d`], but for 2D `[T, D]` arrays.
pub fn concat_time_axis_2d(parts: &[Array2<f64>]) -> Array2<f64> {
    let views: Vec<_> = parts.iter().map(ndarray::ArrayBase::view).collect();
    ndarray::concatenate(Axis(0), &views).expect("rollouts share length by precondition")
}

/// Transpose a list-of-mappings into a mapping-of-lists, recursively, then
/// concatenate each leaf list along the sample axis. This is the "nested
/// observation mappings are transposed from list-of-mappings to
/// mapping-of-lists" step in the component design.
pub fn concat_field_trees(parts: &[FieldTree<Array2<f64>>]) -> FieldTree<Array2<f64>> {
    match parts.first() {
        Some(FieldTree::Leaf(_)) | None => {
            let leaves: Vec<Array2<f64>> = parts
                .iter()
                .map(|p| {
                    p.as_leaf()
                        .expect("all rollouts share one observation layout")
                        .clone()
                })
                .collect();
            FieldTree::Leaf(concat_time_axis_2d(&leaves))
        }
        Some(FieldTree::Node(first)) => {
            let mut out = BTreeMap::new();
            for name in first.keys() {
                let per_rollout: Vec<FieldTree<Array2<f64>>> = parts
                    .iter()
                    .map(|p| match p {
                        FieldTree::Node(m) => m
                            .get(name)
                            .expect("all rollouts share one observation layout")
                            .clone(),
                        FieldTree::Leaf(_) => {
                            panic!("observation layout mismatch across rollouts")
                        }
                    })
                    .collect();
                out.insert(name.clone(), concat_field_trees(&per_rollout));
            }
            FieldTree::Node(out)
        }
    }
}
