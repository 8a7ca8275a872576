//! V-trace target computation (component design, §4.4 step 7).
//!
//! Operates on a minibatch laid out as `num_trajectories` contiguous blocks
//! of length `recurrence`, matching the reshape convention used by the
//! recurrent core unroll: trajectory `j`'s steps occupy
//! `[j*recurrence, (j+1)*recurrence)`.

use ndarray::Array1;

/// Clipping constants for importance-weighted V-trace; fixed at 1.0 per the
/// component design (`ρ̄ = c̄ = 1`).
pub const RHO_BAR: f64 = 1.0;
/// See [`RHO_BAR`].
pub const C_BAR: f64 = 1.0;

/// Result of a V-trace pass over one minibatch.
pub struct VTraceOutput {
    /// V-trace value targets, same layout as the inputs.
    pub vs: Array1<f64>,
    /// Policy-gradient advantages, normalized to zero mean and
    /// `max(1e-2, std)` scale.
    pub advantages: Array1<f64>,
}

/// Compute V-trace targets and advantages for one minibatch.
///
/// `rewards`, `values`, `dones`, `ratios` all have length
/// `num_trajectories * recurrence`; `ratios` is the current/behavior policy
/// probability ratio for the sampled action at each step.
pub fn compute(
    rewards: &Array1<f64>,
    values: &Array1<f64>,
    dones: &Array1<bool>,
    ratios: &Array1<f64>,
    recurrence: usize,
    gamma: f64,
) -> VTraceOutput {
    let n = rewards.len();
    assert_eq!(n % recurrence, 0, "minibatch must be a whole number of recurrence blocks");
    let num_trajectories = n / recurrence;

    let mut vs = Array1::zeros(n);
    let mut advantages = Array1::zeros(n);

    for traj in 0..num_trajectories {
        let base = traj * recurrence;
        let r = recurrence;

        let v_last = values[base + r - 1];
        let r_last = rewards[base + r - 1];
        let seed = (v_last - r_last) / gamma;

        let mut next_value = seed;
        let mut next_vs = seed;

        for i in (0..r).rev() {
            let idx = base + i;
            let rho = ratios[idx].min(RHO_BAR);
            let c = ratios[idx].min(C_BAR);
            let mask = if dones[idx] { 0.0 } else { 1.0 };

            let delta = rho * (rewards[idx] + gamma * mask * next_value - values[idx]);
            let adv = rho * (rewards[idx] + gamma * mask * next_vs - values[idx]);
            let vs_i = values[idx] + delta + gamma * mask * c * (next_vs - next_value);

            vs[idx] = vs_i;
            advantages[idx] = adv;

            next_value = values[idx];
            next_vs = vs_i;
        }
    }

    normalize(&mut advantages);
    VTraceOutput { vs, advantages }
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn all_zero_ratios_give_identity_recurrence() {
        // ratio = 0 everywhere -> rho = c = 0 -> vs == v, adv contribution
        // before normalization is zero at every step (identity element of
        // the recurrence).
        let rewards = array![1.0, 1.0, 1.0, 1.0];
        let values = array![0.5, 0.4, 0.3, 0.2];
        let dones = array![false, false, false, false];
        let ratios = array![0.0, 0.0, 0.0, 0.0];
        let out = compute(&rewards, &values, &dones, &ratios, 4, 0.99);
        for i in 0..4 {
            assert!((out.vs[i] - values[i]).abs() < 1e-9);
        }
        // adv is all-zero before normalization; after normalizing a
        // constant-zero vector the std floor keeps it at zero.
        for a in out.advantages.iter() {
            assert!(a.abs() < 1e-9);
        }
    }

    #[test]
    fn ratio_one_matches_plain_td_lambda_style_recursion() {
        let rewards = array![1.0, 1.0];
        let values = array![0.0, 0.0];
        let dones = array![false, false];
        let ratios = array![1.0, 1.0];
        let out = compute(&rewards, &values, &dones, &ratios, 2, 1.0);
        // seed = (0 - 1)/1 = -1
        // t=1: delta = 1*(1 + 1*(-1) - 0) = 0; adv = 0; vs_1 = 0 + 0 + 1*1*(-1 - -1) = 0
        // t=0: next_value=0 (v_1), next_vs=0 (vs_1)
        //      delta = 1*(1 + 1*0 - 0) = 1; adv = 1; vs_0 = 0 + 1 + 1*1*(0-0) = 1
        assert!((out.vs[1] - 0.0).abs() < 1e-9);
        assert!((out.vs[0] - 1.0).abs() < 1e-9);
    }
}
