//! C2: Rollout Intake.
//!
//! Turns `TRAIN` task announcements into rollout descriptors held in a FIFO
//! pending list, and enforces the lag bound before every assembly attempt.

use std::collections::VecDeque;

use tracing::warn;

use crate::registry::TrajectoryRegistry;
use crate::types::{PolicyVersion, SlotKey};

/// An in-process record referencing a leased trajectory slot.
#[derive(Debug, Clone)]
pub struct RolloutDescriptor {
    /// Identity of the leased slot.
    pub key: SlotKey,
    /// Rollout length, in environment steps.
    pub length: usize,
    /// Environment-step count contributed by this rollout (may differ from
    /// `length` for e.g. frame-skipped environments).
    pub env_steps: u64,
    /// The minimum `policy_version` stamped across this rollout's timesteps.
    pub min_policy_version: PolicyVersion,
}

/// The FIFO pending-rollouts list and lag-bound enforcement.
pub struct RolloutIntake {
    pending: VecDeque<RolloutDescriptor>,
    policy_id: u32,
    num_discarded: u64,
}

impl RolloutIntake {
    /// Create an intake for the given learner `policy_id` (used only for
    /// the discard warning log).
    #[must_use]
    pub fn new(policy_id: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            policy_id,
            num_discarded: 0,
        }
    }

    /// Append a rollout descriptor to the tail of the pending list. No
    /// copying occurs: the descriptor only carries the slot key and the
    /// handle is resolved lazily by the assembler.
    pub fn announce(&mut self, descriptor: RolloutDescriptor) {
        self.pending.push_back(descriptor);
    }

    /// Number of rollout descriptors currently pending.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total rollouts discarded for staleness so far.
    #[must_use]
    pub fn num_discarded(&self) -> u64 {
        self.num_discarded
    }

    /// Discard stale rollouts from the head of the pending list.
    ///
    /// While the oldest rollout's `min_policy_version` lags `train_step` by
    /// `>= max_policy_lag`, it is removed, its slot released, and the
    /// discard counter incremented. Discard stops at the first non-stale
    /// rollout — the list is never scanned past the head.
    pub fn enforce_lag(
        &mut self,
        registry: &TrajectoryRegistry,
        train_step: PolicyVersion,
        max_policy_lag: u64,
    ) {
        let mut discarded_this_call = 0_u64;
        while let Some(front) = self.pending.front() {
            if front.min_policy_version.lag_behind(train_step) < max_policy_lag {
                break;
            }
            let stale = self.pending.pop_front().expect("front just checked Some");
            registry.release(stale.key);
            self.num_discarded += 1;
            discarded_this_call += 1;
        }
        if discarded_this_call > 0 {
            warn!(
                policy_id = self.policy_id,
                discarded = discarded_this_call,
                "discarding stale rollouts"
            );
        }
    }

    /// Remove and return the oldest `count` descriptors, if at least that
    /// many are pending. Used by the batch assembler to form a macro-batch.
    pub fn take_front(&mut self, count: usize) -> Option<Vec<RolloutDescriptor>> {
        if self.pending.len() < count {
            return None;
        }
        Some(self.pending.drain(..count).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(worker_idx: u32, version: u64) -> RolloutDescriptor {
        RolloutDescriptor {
            key: SlotKey {
                worker_idx,
                split_idx: 0,
                env_idx: 0,
                agent_idx: 0,
                traj_buffer_idx: 0,
            },
            length: 32,
            env_steps: 32,
            min_policy_version: PolicyVersion(version),
        }
    }

    #[test]
    fn discard_under_lag_stops_at_first_fresh() {
        let registry = TrajectoryRegistry::new();
        registry.ensure_bitmap(0, 0, 1, 1, 1);
        registry.ensure_bitmap(1, 0, 1, 1, 1);
        registry.ensure_bitmap(2, 0, 1, 1, 1);

        let mut intake = RolloutIntake::new(0);
        intake.announce(descriptor(0, 0));
        intake.announce(descriptor(1, 0));
        intake.announce(descriptor(2, 0));
        intake.announce(descriptor(3, 10));
        intake.announce(descriptor(4, 10));
        intake.announce(descriptor(5, 10));

        intake.enforce_lag(&registry, PolicyVersion(10), 5);

        assert_eq!(intake.num_discarded(), 3);
        assert_eq!(intake.pending_len(), 3);
        let batch = intake.take_front(3).unwrap();
        assert_eq!(batch[0].key.worker_idx, 3);
    }

    #[test]
    fn take_front_returns_none_when_insufficient() {
        let mut intake = RolloutIntake::new(0);
        intake.announce(descriptor(0, 0));
        assert!(intake.take_front(2).is_none());
        assert_eq!(intake.pending_len(), 1);
    }

    #[test]
    fn non_stale_head_halts_scanning() {
        let registry = TrajectoryRegistry::new();
        registry.ensure_bitmap(0, 0, 1, 1, 1);
        registry.ensure_bitmap(1, 0, 1, 1, 1);

        let mut intake = RolloutIntake::new(0);
        // Fresh rollout at the head; stale one behind it must not be scanned.
        intake.announce(descriptor(0, 9));
        intake.announce(descriptor(1, 0));
        intake.enforce_lag(&registry, PolicyVersion(10), 5);
        assert_eq!(intake.num_discarded(), 0);
        assert_eq!(intake.pending_len(), 2);
    }
}
