//! Batched, host-resident head/core/tail network building blocks.
//!
//! The async [`PolicyNetwork`](crate::policy::PolicyNetwork) trait and its
//! single-observation [`MLPPolicy`](crate::policy::MLPPolicy) model the
//! rollout-worker's step-by-step action selection. A batched learner instead
//! needs a synchronous, `f64` network that can run a whole minibatch through
//! a head, unroll a recurrent core one timestep at a time, and produce a
//! tail of values and action logits. [`MlpCore`] provides that shape, built
//! with the same xavier initialization and configurable activation as
//! [`MLPPolicy`](crate::policy::MLPPolicy), split into three stages instead
//! of one forward pass.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;

/// Hidden-layer sizes and activation for [`MlpCore`].
#[derive(Debug, Clone)]
pub struct MlpCoreConfig {
    /// Observation feature dimension (flattened across all named fields).
    pub obs_dim: usize,
    /// Hidden layer widths of the head MLP.
    pub head_hidden_dims: Vec<usize>,
    /// Recurrent core hidden-state width.
    pub core_dim: usize,
    /// Number of discrete actions.
    pub action_dim: usize,
    /// Activation used in the head and the core's input/hidden mix.
    pub activation: String,
}

impl Default for MlpCoreConfig {
    fn default() -> Self {
        Self {
            obs_dim: 4,
            head_hidden_dims: vec![64, 64],
            core_dim: 64,
            action_dim: 2,
            activation: "tanh".to_string(),
        }
    }
}

fn xavier_init(in_dim: usize, out_dim: usize) -> Array2<f64> {
    let limit = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let mut rng = rand::thread_rng();
    Array2::from_shape_fn((in_dim, out_dim), |_| rng.gen_range(-limit..limit))
}

fn activate(name: &str, x: &Array2<f64>) -> Array2<f64> {
    match name {
        "relu" => x.mapv(|v| v.max(0.0)),
        "sigmoid" => x.mapv(|v| 1.0 / (1.0 + (-v).exp())),
        _ => x.mapv(f64::tanh),
    }
}

/// A feed-forward head, a single-step Elman-style recurrent core, and a
/// linear value/logits tail, all operating on batched `ndarray` inputs.
///
/// Grounded on [`crate::policy::MLPPolicy`]'s weights/biases layout and
/// xavier initialization, generalized to a batched `f64` head/core/tail
/// split so a training engine can run a whole minibatch through the head,
/// then unroll the core row-by-row over a fixed recurrence window.
pub struct MlpCore {
    config: MlpCoreConfig,
    head_weights: Vec<Array2<f64>>,
    head_biases: Vec<Array1<f64>>,
    core_input_weight: Array2<f64>,
    core_state_weight: Array2<f64>,
    core_bias: Array1<f64>,
    value_weight: Array2<f64>,
    value_bias: Array1<f64>,
    logits_weight: Array2<f64>,
    logits_bias: Array1<f64>,
}

impl MlpCore {
    /// Build a new model with freshly xavier-initialized weights.
    #[must_use]
    pub fn new(config: MlpCoreConfig) -> Self {
        let mut head_weights = Vec::new();
        let mut head_biases = Vec::new();
        let mut prev_dim = config.obs_dim;
        for &hidden_dim in &config.head_hidden_dims {
            head_weights.push(xavier_init(prev_dim, hidden_dim));
            head_biases.push(Array1::zeros(hidden_dim));
            prev_dim = hidden_dim;
        }
        let head_dim = prev_dim;

        Self {
            core_input_weight: xavier_init(head_dim, config.core_dim),
            core_state_weight: xavier_init(config.core_dim, config.core_dim),
            core_bias: Array1::zeros(config.core_dim),
            value_weight: xavier_init(config.core_dim, 1),
            value_bias: Array1::zeros(1),
            logits_weight: xavier_init(config.core_dim, config.action_dim),
            logits_bias: Array1::zeros(config.action_dim),
            head_weights,
            head_biases,
            config,
        }
    }

    /// Feature dimension the head produces (the last hidden width, or
    /// `obs_dim` if the head has no hidden layers).
    #[must_use]
    pub fn head_dim(&self) -> usize {
        self.config.head_hidden_dims.last().copied().unwrap_or(self.config.obs_dim)
    }

    /// Recurrent hidden-state width.
    #[must_use]
    pub fn core_dim(&self) -> usize {
        self.config.core_dim
    }

    /// Number of discrete actions.
    #[must_use]
    pub fn action_dim(&self) -> usize {
        self.config.action_dim
    }

    /// Batched head forward pass: `[N, obs_dim] -> [N, head_dim]`.
    #[must_use]
    pub fn forward_head(&self, observations: ArrayView2<f64>) -> Array2<f64> {
        let mut hidden = observations.to_owned();
        for (w, b) in self.head_weights.iter().zip(self.head_biases.iter()) {
            hidden = hidden.dot(w) + b;
            hidden = activate(&self.config.activation, &hidden);
        }
        hidden
    }

    /// One recurrent-core step: `(head_out[B, head_dim], rnn_state[B, core_dim]) -> (core_out, next_rnn_state)`.
    #[must_use]
    pub fn step_core(&self, head_out: ArrayView2<f64>, rnn_state: ArrayView2<f64>) -> (Array2<f64>, Array2<f64>) {
        let mixed = head_out.dot(&self.core_input_weight) + rnn_state.dot(&self.core_state_weight) + &self.core_bias;
        let next_state = activate(&self.config.activation, &mixed);
        (next_state.clone(), next_state)
    }

    /// Tail: `core_out[N, core_dim] -> (values[N], action_logits[N, action_dim])`.
    #[must_use]
    pub fn tail(&self, core_out: ArrayView2<f64>) -> (Array1<f64>, Array2<f64>) {
        let values = (core_out.dot(&self.value_weight) + &self.value_bias).remove_axis(Axis(1));
        let logits = core_out.dot(&self.logits_weight) + &self.logits_bias;
        (values, logits)
    }

    /// Total number of scalar parameters.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.get_parameters().len()
    }

    /// Flatten all parameters into a single vector, in a fixed, stable order:
    /// head weights/biases layer by layer, then core input/state/bias, then
    /// value weight/bias, then logits weight/bias.
    #[must_use]
    pub fn get_parameters(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.num_parameters_upper_bound());
        for (w, b) in self.head_weights.iter().zip(self.head_biases.iter()) {
            out.extend(w.iter().copied());
            out.extend(b.iter().copied());
        }
        out.extend(self.core_input_weight.iter().copied());
        out.extend(self.core_state_weight.iter().copied());
        out.extend(self.core_bias.iter().copied());
        out.extend(self.value_weight.iter().copied());
        out.extend(self.value_bias.iter().copied());
        out.extend(self.logits_weight.iter().copied());
        out.extend(self.logits_bias.iter().copied());
        out
    }

    fn num_parameters_upper_bound(&self) -> usize {
        self.head_weights.iter().map(ndarray::ArrayBase::len).sum::<usize>()
            + self.head_biases.iter().map(ndarray::ArrayBase::len).sum::<usize>()
            + self.core_input_weight.len()
            + self.core_state_weight.len()
            + self.core_bias.len()
            + self.value_weight.len()
            + self.value_bias.len()
            + self.logits_weight.len()
            + self.logits_bias.len()
    }

    /// Overwrite all parameters from a flat vector in the same order as
    /// [`Self::get_parameters`].
    pub fn set_parameters(&mut self, params: &[f64]) {
        let mut cursor = 0;
        for (w, b) in self.head_weights.iter_mut().zip(self.head_biases.iter_mut()) {
            cursor = fill_from_slice(w, params, cursor);
            cursor = fill_1d_from_slice(b, params, cursor);
        }
        cursor = fill_from_slice(&mut self.core_input_weight, params, cursor);
        cursor = fill_from_slice(&mut self.core_state_weight, params, cursor);
        cursor = fill_1d_from_slice(&mut self.core_bias, params, cursor);
        cursor = fill_from_slice(&mut self.value_weight, params, cursor);
        cursor = fill_1d_from_slice(&mut self.value_bias, params, cursor);
        cursor = fill_from_slice(&mut self.logits_weight, params, cursor);
        let _ = fill_1d_from_slice(&mut self.logits_bias, params, cursor);
    }

    /// Apply an already-scaled flat parameter delta (`params += delta`).
    pub fn apply_delta(&mut self, delta: &[f64]) {
        let current = self.get_parameters();
        let updated: Vec<f64> = current.iter().zip(delta.iter()).map(|(p, d)| p + d).collect();
        self.set_parameters(&updated);
    }
}

fn fill_from_slice(dest: &mut Array2<f64>, src: &[f64], cursor: usize) -> usize {
    let len = dest.len();
    let flat = &src[cursor..cursor + len];
    for (d, s) in dest.iter_mut().zip(flat.iter()) {
        *d = *s;
    }
    cursor + len
}

fn fill_1d_from_slice(dest: &mut Array1<f64>, src: &[f64], cursor: usize) -> usize {
    let len = dest.len();
    let flat = &src[cursor..cursor + len];
    for (d, s) in dest.iter_mut().zip(flat.iter()) {
        *d = *s;
    }
    cursor + len
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn head_forward_preserves_batch_size() {
        let model = MlpCore::new(MlpCoreConfig {
            obs_dim: 3,
            head_hidden_dims: vec![8],
            core_dim: 4,
            action_dim: 2,
            activation: "tanh".to_string(),
        });
        let obs = Array2::zeros((5, 3));
        let head_out = model.forward_head(obs.view());
        assert_eq!(head_out.shape(), &[5, 8]);
    }

    #[test]
    fn tail_produces_scalar_values_and_action_logits() {
        let model = MlpCore::new(MlpCoreConfig {
            obs_dim: 2,
            head_hidden_dims: vec![],
            core_dim: 3,
            action_dim: 4,
            activation: "tanh".to_string(),
        });
        let core_out = Array2::zeros((2, 3));
        let (values, logits) = model.tail(core_out.view());
        assert_eq!(values.len(), 2);
        assert_eq!(logits.shape(), &[2, 4]);
    }

    #[test]
    fn parameters_round_trip_through_flatten_and_restore() {
        let mut model = MlpCore::new(MlpCoreConfig::default());
        let original = model.get_parameters();
        let mutated: Vec<f64> = original.iter().map(|p| p + 1.0).collect();
        model.set_parameters(&mutated);
        assert_eq!(model.get_parameters(), mutated);
    }

    #[test]
    fn apply_delta_adds_onto_existing_parameters() {
        let mut model = MlpCore::new(MlpCoreConfig {
            obs_dim: 2,
            head_hidden_dims: vec![4],
            core_dim: 3,
            action_dim: 2,
            activation: "relu".to_string(),
        });
        let before = model.get_parameters();
        let delta = vec![0.5; before.len()];
        model.apply_delta(&delta);
        let after = model.get_parameters();
        for (b, a) in before.iter().zip(after.iter()) {
            assert!((a - b - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn step_core_reacts_to_both_head_output_and_previous_state() {
        let model = MlpCore::new(MlpCoreConfig {
            obs_dim: 2,
            head_hidden_dims: vec![],
            core_dim: 2,
            action_dim: 2,
            activation: "tanh".to_string(),
        });
        let head_out = array![[1.0, -1.0]];
        let zero_state = Array2::zeros((1, 2));
        let (out_a, _) = model.step_core(head_out.view(), zero_state.view());
        let nonzero_state = array![[0.3, -0.2]];
        let (out_b, _) = model.step_core(head_out.view(), nonzero_state.view());
        assert_ne!(out_a, out_b);
    }
}
