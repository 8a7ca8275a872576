//! The actor-critic contract the training engine depends on: a head/core/tail
//! split network plus the action-distribution hook the component design
//! requires for prior and behavior-policy KL terms.
//!
//! The neural-network architecture itself is an external collaborator
//! concern (see the scope note): this module only fixes the *shape* of the
//! contract the learner drives. [`crate::default_model::DefaultModel`]
//! adapts `sentient_rl_agent`'s batched head/core/tail building blocks to
//! this contract.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// A categorical action distribution over logits, with the operations the
/// training engine's loss terms need: log-probability of a sampled action,
/// entropy, and KL divergence against another distribution or a prior.
#[derive(Debug, Clone)]
pub struct CategoricalDistribution {
    logits: Array1<f64>,
    log_probs: Array1<f64>,
}

impl CategoricalDistribution {
    /// Build from raw logits, precomputing the log-softmax.
    #[must_use]
    pub fn from_logits(logits: ArrayView1<f64>) -> Self {
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let shifted = logits.mapv(|x| x - max);
        let log_sum_exp = shifted.mapv(f64::exp).sum().ln();
        let log_probs = &shifted - log_sum_exp;
        Self {
            logits: logits.to_owned(),
            log_probs,
        }
    }

    /// Probability mass function.
    #[must_use]
    pub fn probs(&self) -> Array1<f64> {
        self.log_probs.mapv(f64::exp)
    }

    /// Log-probability of the action at the given index.
    #[must_use]
    pub fn log_prob(&self, action_idx: usize) -> f64 {
        self.log_probs[action_idx]
    }

    /// Shannon entropy of the distribution, in nats.
    #[must_use]
    pub fn entropy(&self) -> f64 {
        let probs = self.probs();
        -probs
            .iter()
            .zip(self.log_probs.iter())
            .map(|(p, lp)| p * lp)
            .sum::<f64>()
    }

    /// `KL(self || other)`, where `other` is another categorical
    /// distribution given by its raw logits. Used both for the behavior-KL
    /// penalty (reconstructed from stored `action_logits`) and, with a
    /// uniform prior, for the prior-KL term.
    #[must_use]
    pub fn kl_divergence(&self, other_logits: ArrayView1<f64>) -> f64 {
        let other = CategoricalDistribution::from_logits(other_logits);
        let probs = self.probs();
        probs
            .iter()
            .zip(self.log_probs.iter())
            .zip(other.log_probs.iter())
            .map(|((p, lp_self), lp_other)| p * (lp_self - lp_other))
            .sum()
    }

    /// `KL(self || prior)` where the default prior is uniform over the
    /// action space. The component design calls out this hook as one
    /// implementers must preserve regardless of policy family; for a
    /// discrete categorical policy the natural default is the uniform
    /// distribution over `self.logits.len()` actions.
    #[must_use]
    pub fn kl_prior(&self) -> f64 {
        let uniform_logit = 0.0; // softmax of all-equal logits is uniform regardless of value
        let uniform_logits = Array1::from_elem(self.logits.len(), uniform_logit);
        self.kl_divergence(uniform_logits.view())
    }

    /// Raw logits this distribution was built from.
    #[must_use]
    pub fn logits(&self) -> &Array1<f64> {
        &self.logits
    }
}

/// The head/core/tail actor-critic contract.
///
/// Forward passes are batched and host-resident (`ndarray`); moving to an
/// accelerator and back is the caller's concern (see the per-minibatch
/// computation in the component design, step 1).
pub trait ActorCriticModel: Send {
    /// Dimensionality of the head's output features.
    fn head_dim(&self) -> usize;
    /// Dimensionality of the recurrent core's hidden state.
    fn core_dim(&self) -> usize;
    /// Number of discrete actions.
    fn action_dim(&self) -> usize;

    /// Batched head forward pass: `[N, obs_dim] -> [N, head_dim]`.
    fn forward_head(&self, observations: ArrayView2<f64>) -> Array2<f64>;

    /// One recurrent-core step for a batch of `B` parallel sub-trajectories:
    /// `(head_out[B, head_dim], rnn_state[B, core_dim]) -> (core_out[B, core_dim], next_rnn_state[B, core_dim])`.
    fn step_core(
        &self,
        head_out: ArrayView2<f64>,
        rnn_state: ArrayView2<f64>,
    ) -> (Array2<f64>, Array2<f64>);

    /// Tail: `core_out[N, core_dim] -> (values[N], action_logits[N, action_dim])`.
    fn tail(&self, core_out: ArrayView2<f64>) -> (Array1<f64>, Array2<f64>);

    /// Build the action distribution for one row of logits.
    fn action_distribution(&self, logits: ArrayView1<f64>) -> CategoricalDistribution {
        CategoricalDistribution::from_logits(logits)
    }

    /// Total number of scalar parameters, for optimizer-state sizing.
    fn num_parameters(&self) -> usize;
    /// Flatten all parameters into a single vector, in a fixed, stable order.
    fn get_parameters(&self) -> Vec<f64>;
    /// Overwrite all parameters from a flat vector in the same order as `get_parameters`.
    fn set_parameters(&mut self, params: &[f64]);
    /// Apply an already-scaled flat parameter delta (`params += delta`).
    fn apply_delta(&mut self, delta: &[f64]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn uniform_logits_have_zero_kl_to_prior() {
        let dist = CategoricalDistribution::from_logits(array![0.0, 0.0, 0.0].view());
        assert!(dist.kl_prior().abs() < 1e-9);
    }

    #[test]
    fn entropy_is_maximal_for_uniform_distribution() {
        let uniform = CategoricalDistribution::from_logits(array![0.0, 0.0, 0.0, 0.0].view());
        let peaked = CategoricalDistribution::from_logits(array![5.0, 0.0, 0.0, 0.0].view());
        assert!(uniform.entropy() > peaked.entropy());
    }

    #[test]
    fn kl_divergence_to_self_is_zero() {
        let logits = array![0.3, -1.0, 2.0];
        let dist = CategoricalDistribution::from_logits(logits.view());
        assert!(dist.kl_divergence(logits.view()).abs() < 1e-9);
    }
}
