//! C5: Weight Broadcaster.
//!
//! Publishes parameter snapshots with monotonic version tags to policy
//! workers, alongside a discarding-rate estimate derived from a sliding
//! window of discard-counter samples.

use std::collections::VecDeque;
use std::time::Instant;

use crate::types::PolicyVersion;

/// A published weight update, as delivered to each policy-worker inbound queue.
#[derive(Debug, Clone)]
pub struct UpdateWeights {
    /// The learner's `train_step` at publish time.
    pub policy_version: PolicyVersion,
    /// Flat model parameters. A reference to the in-shared-memory parameter
    /// store in the original design; here a plain owned snapshot, since the
    /// shared-memory transport is an external collaborator concern.
    pub parameters: Vec<f64>,
    /// Estimated rollouts/second being discarded for staleness.
    pub discarding_rate: f64,
}

/// Tracks a 30-point sliding window of `(timestamp, discarded_count)`
/// samples, taken at `>= 1 Hz`, and derives a discard rate from it.
pub struct DiscardRateTracker {
    window: VecDeque<(Instant, u64)>,
    capacity: usize,
    min_sample_interval: std::time::Duration,
}

impl DiscardRateTracker {
    /// Construct a tracker with a 30-point window and a `>= 1 Hz` sampling
    /// cadence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(30),
            capacity: 30,
            min_sample_interval: std::time::Duration::from_secs(1),
        }
    }

    /// Offer a new `(now, total_discarded)` observation. Ignored if it
    /// arrives before `min_sample_interval` has elapsed since the last
    /// recorded sample.
    pub fn sample(&mut self, now: Instant, total_discarded: u64) {
        if let Some((last_t, _)) = self.window.back() {
            if now.duration_since(*last_t) < self.min_sample_interval {
                return;
            }
        }
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back((now, total_discarded));
    }

    /// `(count_n - count_0) / (t_n - t_0)` over the current window, or `0.0`
    /// if fewer than two samples are available yet.
    #[must_use]
    pub fn rate(&self) -> f64 {
        let (Some(&(t0, c0)), Some(&(tn, cn))) = (self.window.front(), self.window.back()) else {
            return 0.0;
        };
        let dt = tn.duration_since(t0).as_secs_f64();
        if dt <= 0.0 {
            return 0.0;
        }
        (cn as f64 - c0 as f64) / dt
    }
}

impl Default for DiscardRateTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A policy worker's inbound weight-update queue. The transport is an
/// external collaborator concern; this is the seam the learner pushes
/// through.
pub trait PolicyWorkerSink {
    /// Deliver one weight update.
    fn send(&mut self, update: UpdateWeights);
}

/// Publishes weight snapshots to every registered policy-worker sink.
pub struct WeightBroadcaster {
    sinks: Vec<Box<dyn PolicyWorkerSink + Send>>,
    discard_rate: DiscardRateTracker,
}

impl WeightBroadcaster {
    /// Construct a broadcaster with no sinks yet registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            discard_rate: DiscardRateTracker::new(),
        }
    }

    /// Register a policy-worker sink.
    pub fn register(&mut self, sink: Box<dyn PolicyWorkerSink + Send>) {
        self.sinks.push(sink);
    }

    /// Offer a discard-count observation, feeding the rate estimate.
    pub fn observe_discards(&mut self, now: Instant, total_discarded: u64) {
        self.discard_rate.sample(now, total_discarded);
    }

    /// Broadcast a parameter snapshot to every registered sink.
    /// `policy_version` must strictly exceed the previous broadcast's
    /// version (the monotonicity invariant is enforced by the caller, which
    /// owns `train_step`).
    pub fn broadcast(&mut self, policy_version: PolicyVersion, parameters: Vec<f64>) {
        let discarding_rate = self.discard_rate.rate();
        for sink in &mut self.sinks {
            sink.send(UpdateWeights {
                policy_version,
                parameters: parameters.clone(),
                discarding_rate,
            });
        }
    }
}

impl Default for WeightBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collector(std::sync::Arc<std::sync::Mutex<Vec<UpdateWeights>>>);

    impl PolicyWorkerSink for Collector {
        fn send(&mut self, update: UpdateWeights) {
            self.0.lock().unwrap().push(update);
        }
    }

    #[test]
    fn broadcast_reaches_every_registered_sink() {
        let mut broadcaster = WeightBroadcaster::new();
        let received = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        broadcaster.register(Box::new(Collector(received.clone())));
        broadcaster.register(Box::new(Collector(received.clone())));

        broadcaster.broadcast(PolicyVersion(1), vec![1.0, 2.0]);
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[test]
    fn discard_rate_tracks_counter_slope() {
        let mut tracker = DiscardRateTracker::new();
        let t0 = Instant::now();
        tracker.sample(t0, 0);
        tracker.sample(t0 + std::time::Duration::from_secs(10), 100);
        assert!((tracker.rate() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn sub_hz_samples_are_ignored() {
        let mut tracker = DiscardRateTracker::new();
        let t0 = Instant::now();
        tracker.sample(t0, 0);
        tracker.sample(t0 + std::time::Duration::from_millis(100), 50);
        // second sample too soon; window should still have only one entry.
        assert_eq!(tracker.rate(), 0.0);
    }
}
