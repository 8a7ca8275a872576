//! Deep Q-Network (DQN) agent implementation

use serde::{Deserialize, Serialize};

/// DQN-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DQNConfig {
    /// Base agent configuration
    #[serde(flatten)]
    pub base: sentient_rl_core::AgentConfig,
    /// Epsilon for exploration
    pub epsilon_start: f64,
    /// Final epsilon value
    pub epsilon_end: f64,
    /// Epsilon decay steps
    pub epsilon_decay_steps: usize,
    /// Update target network every N steps
    pub target_update_freq: usize,
    /// Use double DQN
    pub double_dqn: bool,
    /// Use dueling DQN
    pub dueling_dqn: bool,
}

impl Default for DQNConfig {
    fn default() -> Self {
        Self {
            base: sentient_rl_core::AgentConfig::default(),
            epsilon_start: 1.0,
            epsilon_end: 0.01,
            epsilon_decay_steps: 10000,
            target_update_freq: 1000,
            double_dqn: true,
            dueling_dqn: false,
        }
    }
}

/// DQN Agent placeholder
/// TODO: Implement full DQN agent with neural network support
pub struct DQNAgent {
    config: DQNConfig,
}

impl DQNAgent {
    /// Create a new DQN agent
    pub fn new(config: DQNConfig) -> Self {
        Self { config }
    }
}

// Full implementation would include:
// - Neural network Q-function
// - Experience replay buffer integration
// - Epsilon-greedy exploration
// - Target network updates
// - Training loop
// - Double DQN and Dueling DQN variants