//! Shared data-model types for the learner: slot identities, the readiness
//! handshake, policy versioning, and the open-ended named-tensor container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a single trajectory slot leased from a rollout worker.
///
/// Mirrors the `(worker_idx, split_idx, env_idx, agent_idx, traj_buffer_idx)`
/// tuple rollout workers use to address shared-memory regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    /// Index of the rollout worker process that owns the slot.
    pub worker_idx: u32,
    /// Index of the worker's environment split.
    pub split_idx: u32,
    /// Index of the environment within the split.
    pub env_idx: u32,
    /// Index of the agent within a (possibly multi-agent) environment.
    pub agent_idx: u32,
    /// Index of the trajectory buffer slot within the split.
    pub traj_buffer_idx: u32,
}

impl SlotKey {
    /// Key identifying the tensor-storage region: one region is registered
    /// per `(worker_idx, split_idx, traj_buffer_idx)` at `INIT_TENSORS` time.
    #[must_use]
    pub fn storage_key(&self) -> (u32, u32, u32) {
        (self.worker_idx, self.split_idx, self.traj_buffer_idx)
    }

    /// Key identifying the readiness bitmap: one bitmap is registered per
    /// `(worker_idx, split_idx)`, indexed by `(env_idx, agent_idx, traj_buffer_idx)`.
    #[must_use]
    pub fn bitmap_key(&self) -> (u32, u32) {
        (self.worker_idx, self.split_idx)
    }

    /// Index into a bitmap's flat backing storage for this slot.
    #[must_use]
    pub fn bitmap_index(&self, num_agents: u32, num_traj_buffers: u32) -> usize {
        let env = self.env_idx as usize;
        let agent = self.agent_idx as usize;
        let buf = self.traj_buffer_idx as usize;
        (env * num_agents as usize + agent) * num_traj_buffers as usize + buf
    }
}

/// Monotonic learner step counter. Stamped on every weight broadcast and
/// used to measure rollout staleness (`train_step - rollout.min_policy_version`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyVersion(pub u64);

impl PolicyVersion {
    /// The initial version, before any optimizer step has run.
    pub const ZERO: PolicyVersion = PolicyVersion(0);

    /// Lag of a rollout stamped with `self` relative to the current version.
    #[must_use]
    pub fn lag_behind(&self, current: PolicyVersion) -> u64 {
        current.0.saturating_sub(self.0)
    }

    /// Advance to the next version. The learner's `train_step` increments
    /// by exactly one per optimizer step.
    #[must_use]
    pub fn next(&self) -> PolicyVersion {
        PolicyVersion(self.0 + 1)
    }
}

/// The adaptive KL penalty coefficient. Clamped to `>= 1e-6` on every write,
/// per the invariant in the component design.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct KlCoeff(f64);

impl KlCoeff {
    /// Floor below which the coefficient is never allowed to fall.
    pub const MIN: f64 = 1e-6;

    /// Construct a coefficient, clamping to the floor.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.max(Self::MIN))
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> f64 {
        self.0
    }

    /// Multiply by a factor, reclamping to the floor.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.0 * factor)
    }
}

/// Minimal element-type tag for a [`SharedTensorHandle`]. The learner only
/// ever interprets these as `f32` host tensors after attach; the tag exists
/// so the registry can validate that a rollout worker's announced layout
/// matches what was registered at `INIT_TENSORS` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
    /// Signed 64-bit integer (used for discrete actions, done flags).
    I64,
    /// Boolean.
    Bool,
}

/// A descriptor for a region of memory shared with a rollout-worker process.
///
/// The learner never maps this itself (the transport is an external
/// collaborator concern); it is carried end to end as an opaque handle and
/// attached by whatever glue code owns the actual shared-memory mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedTensorHandle {
    /// Identifier of the shared-memory region.
    pub region_id: u64,
    /// Byte offset of this field within the region.
    pub offset: usize,
    /// Tensor shape, outermost dimension first.
    pub shape: Vec<usize>,
    /// Element type.
    pub dtype: DType,
}

/// An open-ended, possibly nested mapping from field name to value.
///
/// Observations and per-timestep rollout fields form a dynamic container
/// that is discovered once at `INIT_TENSORS` time and frozen thereafter
/// (one level of nesting suffices in practice, but the type allows more).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldTree<T> {
    /// A leaf tensor.
    Leaf(T),
    /// A named group of sub-fields.
    Node(BTreeMap<String, FieldTree<T>>),
}

impl<T> FieldTree<T> {
    /// Borrow the leaf value, if this node is a leaf.
    #[must_use]
    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            FieldTree::Leaf(v) => Some(v),
            FieldTree::Node(_) => None,
        }
    }

    /// Visit every leaf in the tree along with its dotted path.
    pub fn for_each_leaf(&self, f: &mut impl FnMut(&str, &T)) {
        self.walk(String::new(), f);
    }

    fn walk(&self, prefix: String, f: &mut impl FnMut(&str, &T)) {
        match self {
            FieldTree::Leaf(v) => f(&prefix, v),
            FieldTree::Node(children) => {
                for (name, child) in children {
                    let path = if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    child.walk(path, f);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_key_bitmap_index_is_row_major() {
        let key = SlotKey {
            worker_idx: 0,
            split_idx: 0,
            env_idx: 2,
            agent_idx: 1,
            traj_buffer_idx: 0,
        };
        assert_eq!(key.bitmap_index(3, 2), (2 * 3 + 1) * 2);
    }

    #[test]
    fn policy_version_lag_saturates_at_zero() {
        let old = PolicyVersion(10);
        assert_eq!(old.lag_behind(PolicyVersion(5)), 0);
        assert_eq!(old.lag_behind(PolicyVersion(15)), 5);
    }

    #[test]
    fn kl_coeff_never_drops_below_floor() {
        let c = KlCoeff::new(1e-9);
        assert!((c.get() - KlCoeff::MIN).abs() < 1e-12);
        let c2 = KlCoeff::new(0.2).scaled(1.0 / 1.5).scaled(1.0 / 1.5).scaled(1.0 / 1.5)
            .scaled(1.0 / 1.5).scaled(1.0 / 1.5).scaled(1.0 / 1.5).scaled(1.0 / 1.5);
        assert!(c2.get() >= KlCoeff::MIN);
    }

    #[test]
    fn field_tree_walks_nested_paths() {
        let mut inner = BTreeMap::new();
        inner.insert("image".to_string(), FieldTree::Leaf(1_u32));
        let tree = FieldTree::Node({
            let mut m = BTreeMap::new();
            m.insert("obs".to_string(), FieldTree::Node(inner));
            m.insert("reward".to_string(), FieldTree::Leaf(2_u32));
            m
        });
        let mut paths = Vec::new();
        tree.for_each_leaf(&mut |path, _| paths.push(path.to_string()));
        paths.sort();
        assert_eq!(paths, vec!["obs.image", "reward"]);
    }
}
