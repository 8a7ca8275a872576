//! The default [`ActorCriticModel`] used by tests and by callers who don't
//! bring their own network: a thin adapter over
//! `sentient_rl_agent::appo_model::MlpCore`'s batched head/core/tail.
//!
//! The adapter lives here rather than alongside `MlpCore` itself because
//! `ActorCriticModel` is this crate's trait; implementing a foreign trait for
//! a foreign type isn't allowed; implementing it here, for a newtype wrapper,
//! is.

use ndarray::{Array1, Array2, ArrayView2};
use sentient_rl_agent::{MlpCore, MlpCoreConfig};

use crate::model::ActorCriticModel;

/// Config for [`DefaultModel`], mirroring [`MlpCoreConfig`].
pub type DefaultModelConfig = MlpCoreConfig;

/// A ready-to-use recurrent actor-critic model wrapping
/// [`sentient_rl_agent::appo_model::MlpCore`].
pub struct DefaultModel {
    inner: MlpCore,
}

impl DefaultModel {
    /// Construct a new model with freshly xavier-initialized weights.
    #[must_use]
    pub fn new(config: DefaultModelConfig) -> Self {
        Self { inner: MlpCore::new(config) }
    }
}

impl ActorCriticModel for DefaultModel {
    fn head_dim(&self) -> usize {
        self.inner.head_dim()
    }

    fn core_dim(&self) -> usize {
        self.inner.core_dim()
    }

    fn action_dim(&self) -> usize {
        self.inner.action_dim()
    }

    fn forward_head(&self, observations: ArrayView2<f64>) -> Array2<f64> {
        self.inner.forward_head(observations)
    }

    fn step_core(&self, head_out: ArrayView2<f64>, rnn_state: ArrayView2<f64>) -> (Array2<f64>, Array2<f64>) {
        self.inner.step_core(head_out, rnn_state)
    }

    fn tail(&self, core_out: ArrayView2<f64>) -> (Array1<f64>, Array2<f64>) {
        self.inner.tail(core_out)
    }

    fn num_parameters(&self) -> usize {
        self.inner.num_parameters()
    }

    fn get_parameters(&self) -> Vec<f64> {
        self.inner.get_parameters()
    }

    fn set_parameters(&mut self, params: &[f64]) {
        self.inner.set_parameters(params);
    }

    fn apply_delta(&mut self, delta: &[f64]) {
        self.inner.apply_delta(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn default_model_satisfies_actor_critic_model() {
        let model = DefaultModel::new(DefaultModelConfig {
            obs_dim: 3,
            head_hidden_dims: vec![8],
            core_dim: 4,
            action_dim: 2,
            activation: "tanh".to_string(),
        });
        let obs = Array2::<f64>::zeros((2, 3));
        let head_out = model.forward_head(obs.view());
        let state = Array2::<f64>::zeros((2, 4));
        let (core_out, next_state) = model.step_core(head_out.view(), state.view());
        let (values, logits) = model.tail(core_out.view());
        assert_eq!(values.len(), 2);
        assert_eq!(logits.shape(), &[2, 2]);
        assert_eq!(next_state.shape(), &[2, 4]);
    }

    #[test]
    fn action_distribution_is_reachable_through_the_trait_default() {
        let model = DefaultModel::new(DefaultModelConfig {
            obs_dim: 1,
            head_hidden_dims: vec![],
            core_dim: 1,
            action_dim: 3,
            activation: "tanh".to_string(),
        });
        let dist = model.action_distribution(array![0.0, 0.0, 0.0].view());
        assert!((dist.probs().sum() - 1.0).abs() < 1e-9);
    }
}
