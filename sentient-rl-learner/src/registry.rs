//! C1: Trajectory Registry.
//!
//! Tracks shared trajectory slots leased from rollout workers: one mapping
//! from storage key to tensor handle, one readiness bitmap per
//! `(worker_idx, split_idx)`. See the data-model invariant: a slot is either
//! referenced by exactly one live rollout descriptor, or marked free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{LearnerError, Result};
use crate::types::SharedTensorHandle;
use crate::types::SlotKey;

use tracing::trace;

/// A readiness bitmap for one `(worker_idx, split_idx)` pair. `true` means
/// free (available to the rollout worker for reuse); `false` means leased
/// to the learner.
struct ReadinessBitmap {
    num_agents: u32,
    num_traj_buffers: u32,
    bits: Vec<AtomicBool>,
}

impl ReadinessBitmap {
    fn new(num_envs: u32, num_agents: u32, num_traj_buffers: u32) -> Self {
        let len = num_envs as usize * num_agents as usize * num_traj_buffers as usize;
        let mut bits = Vec::with_capacity(len);
        bits.resize_with(len, || AtomicBool::new(true));
        Self {
            num_agents,
            num_traj_buffers,
            bits,
        }
    }

    fn release(&self, key: SlotKey) {
        let idx = key.bitmap_index(self.num_agents, self.num_traj_buffers);
        // Release-store: the rollout worker must observe this before
        // reclaiming the slot, per the readiness-bitmap handshake.
        self.bits[idx].store(true, Ordering::Release);
    }

    fn is_free(&self, key: SlotKey) -> bool {
        let idx = key.bitmap_index(self.num_agents, self.num_traj_buffers);
        self.bits[idx].load(Ordering::Acquire)
    }
}

/// Tracks registered tensor storage and readiness bitmaps for all trajectory
/// slots the learner has been told about.
pub struct TrajectoryRegistry {
    storage: RwLock<HashMap<(u32, u32, u32), HashMap<(u32, u32), SharedTensorHandle>>>,
    bitmaps: RwLock<HashMap<(u32, u32), ReadinessBitmap>>,
}

impl TrajectoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: RwLock::new(HashMap::new()),
            bitmaps: RwLock::new(HashMap::new()),
        }
    }

    /// Register the tensor storage for a `(worker_idx, split_idx, traj_buffer_idx)`
    /// region, keyed by `(env_idx, agent_idx)` within it. Fails if this exact
    /// storage key was already registered — `INIT_TENSORS` is sent once per
    /// region at rollout-worker startup.
    pub fn register_tensors(
        &self,
        worker_idx: u32,
        split_idx: u32,
        traj_buffer_idx: u32,
        tensors: HashMap<(u32, u32), SharedTensorHandle>,
    ) -> Result<()> {
        let storage_key = (worker_idx, split_idx, traj_buffer_idx);
        let mut storage = self.storage.write().expect("registry lock poisoned");
        if storage.contains_key(&storage_key) {
            return Err(LearnerError::DuplicateRegistration(SlotKey {
                worker_idx,
                split_idx,
                env_idx: 0,
                agent_idx: 0,
                traj_buffer_idx,
            }));
        }
        storage.insert(storage_key, tensors);
        trace!(target: "learner.registry", worker_idx, split_idx, traj_buffer_idx, "registered trajectory slot region");
        Ok(())
    }

    /// Ensure a readiness bitmap exists for `(worker_idx, split_idx)`, sized
    /// for `num_envs * num_agents * num_traj_buffers` slots. Idempotent.
    pub fn ensure_bitmap(
        &self,
        worker_idx: u32,
        split_idx: u32,
        num_envs: u32,
        num_agents: u32,
        num_traj_buffers: u32,
    ) {
        let mut bitmaps = self.bitmaps.write().expect("registry lock poisoned");
        bitmaps
            .entry((worker_idx, split_idx))
            .or_insert_with(|| ReadinessBitmap::new(num_envs, num_agents, num_traj_buffers));
    }

    /// Look up the tensor handle for a fully-qualified slot key.
    pub fn handle_for(&self, key: SlotKey) -> Result<SharedTensorHandle> {
        let storage = self.storage.read().expect("registry lock poisoned");
        storage
            .get(&key.storage_key())
            .and_then(|region| region.get(&(key.env_idx, key.agent_idx)))
            .cloned()
            .ok_or(LearnerError::UnknownSlot(key))
    }

    /// Release a leased slot: set its readiness bit to free. Idempotent on
    /// the learner side by construction (setting `true` twice is harmless).
    pub fn release(&self, key: SlotKey) {
        let bitmaps = self.bitmaps.read().expect("registry lock poisoned");
        if let Some(bitmap) = bitmaps.get(&key.bitmap_key()) {
            bitmap.release(key);
        }
    }

    /// Whether a slot is currently marked free (for diagnostics/tests only;
    /// the learner does not need to query this on its own hot path since it
    /// never re-reads slots it has already released).
    #[must_use]
    pub fn is_free(&self, key: SlotKey) -> bool {
        let bitmaps = self.bitmaps.read().expect("registry lock poisoned");
        bitmaps.get(&key.bitmap_key()).is_some_and(|b| b.is_free(key))
    }
}

impl Default for TrajectoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DType;

    fn handle(region_id: u64) -> SharedTensorHandle {
        SharedTensorHandle {
            region_id,
            offset: 0,
            shape: vec![1],
            dtype: DType::F32,
        }
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let reg = TrajectoryRegistry::new();
        let mut tensors = HashMap::new();
        tensors.insert((0, 0), handle(42));
        reg.register_tensors(1, 0, 0, tensors).unwrap();
        reg.ensure_bitmap(1, 0, 1, 1, 1);

        let key = SlotKey {
            worker_idx: 1,
            split_idx: 0,
            env_idx: 0,
            agent_idx: 0,
            traj_buffer_idx: 0,
        };
        assert_eq!(reg.handle_for(key).unwrap().region_id, 42);
    }

    #[test]
    fn duplicate_registration_fails() {
        let reg = TrajectoryRegistry::new();
        reg.register_tensors(0, 0, 0, HashMap::new()).unwrap();
        let err = reg.register_tensors(0, 0, 0, HashMap::new());
        assert!(err.is_err());
    }

    #[test]
    fn slot_starts_free_and_release_is_idempotent() {
        let reg = TrajectoryRegistry::new();
        reg.ensure_bitmap(0, 0, 1, 1, 1);
        let key = SlotKey {
            worker_idx: 0,
            split_idx: 0,
            env_idx: 0,
            agent_idx: 0,
            traj_buffer_idx: 0,
        };
        assert!(reg.is_free(key));
        reg.release(key);
        reg.release(key);
        assert!(reg.is_free(key));
    }
}
