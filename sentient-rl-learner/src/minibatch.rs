//! Minibatch index generation (component design, §4.4 "Minibatch generation").
//!
//! Produces `recurrence`-aligned contiguous windows, shuffled at the block
//! level so truncated BPTT always unrolls a real contiguous slice of a
//! rollout, never samples assembled across a shuffle boundary.

use rand::seq::SliceRandom;
use rand::Rng;

/// The index partition of one macro-batch into minibatches.
pub enum MinibatchPlan {
    /// `macro_batch == batch_size`: skip index generation and hand the full
    /// buffer through unmodified.
    Full,
    /// One index list per minibatch, each a concatenation of shuffled
    /// `recurrence`-sized blocks.
    Blocks(Vec<Vec<usize>>),
}

/// Generate the minibatch index partition for one macro-batch.
///
/// # Panics
/// If `experience_size % batch_size != 0` or `batch_size % recurrence != 0`
/// (both are fatal misconfiguration the caller must validate beforehand via
/// [`crate::config::LearnerConfig::validate`]).
pub fn generate(
    experience_size: usize,
    batch_size: usize,
    recurrence: usize,
    rng: &mut impl Rng,
) -> MinibatchPlan {
    assert_eq!(experience_size % batch_size, 0);
    assert_eq!(batch_size % recurrence, 0);

    if experience_size == batch_size {
        return MinibatchPlan::Full;
    }

    let num_blocks = experience_size / recurrence;
    let mut block_starts: Vec<usize> = (0..num_blocks).map(|i| i * recurrence).collect();
    block_starts.shuffle(rng);

    let flat: Vec<usize> = block_starts
        .iter()
        .flat_map(|&start| start..start + recurrence)
        .collect();

    let num_minibatches = experience_size / batch_size;
    let minibatches = flat
        .chunks(batch_size)
        .take(num_minibatches)
        .map(<[usize]>::to_vec)
        .collect();

    MinibatchPlan::Blocks(minibatches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn partition_covers_every_index_exactly_once() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let plan = generate(2048, 1024, 32, &mut rng);
        let MinibatchPlan::Blocks(minibatches) = plan else {
            panic!("expected Blocks plan");
        };
        assert_eq!(minibatches.len(), 2);
        let mut seen = vec![false; 2048];
        for mb in &minibatches {
            for &idx in mb {
                assert!(!seen[idx], "index {idx} covered twice");
                seen[idx] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn recurrence_equal_rollout_still_partitions_fully() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let plan = generate(128, 64, 64, &mut rng);
        let MinibatchPlan::Blocks(minibatches) = plan else {
            panic!("expected Blocks plan");
        };
        assert_eq!(minibatches.len(), 2);
        assert_eq!(minibatches[0].len(), 64);
    }

    #[test]
    fn macro_batch_equal_batch_size_uses_null_index_path() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let plan = generate(512, 512, 32, &mut rng);
        assert!(matches!(plan, MinibatchPlan::Full));
    }

    #[test]
    fn each_minibatch_preserves_recurrence_aligned_windows() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let plan = generate(256, 128, 32, &mut rng);
        let MinibatchPlan::Blocks(minibatches) = plan else {
            panic!("expected Blocks plan");
        };
        for mb in &minibatches {
            for block in mb.chunks(32) {
                let start = block[0];
                let expected: Vec<usize> = (start..start + 32).collect();
                assert_eq!(block, expected.as_slice());
            }
        }
    }
}
