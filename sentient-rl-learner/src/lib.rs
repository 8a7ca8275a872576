//! Distributed APPO learner: the training-side counterpart to a population
//! of rollout workers.
//!
//! A [`coordinator::Coordinator`] owns a [`registry::TrajectoryRegistry`] of
//! shared trajectory slots and an [`intake::RolloutIntake`] per policy.
//! Completed rollouts are assembled into macro-batches
//! ([`assembler`]), split into recurrence-aligned minibatches
//! ([`minibatch`]), and optimized by a [`coordinator::TrainingWorker`]
//! running a [`engine::TrainingEngine`] on a dedicated thread. Checkpoints
//! ([`checkpoint`]), weight broadcasts ([`broadcast`]), and population-based
//! training mutations ([`pbt`]) round out the loop.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assembler;
pub mod broadcast;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod default_model;
pub mod engine;
pub mod error;
pub mod intake;
pub mod minibatch;
pub mod model;
pub mod pbt;
pub mod registry;
pub mod rollout;
pub mod schedule;
pub mod types;
pub mod vtrace;

pub use config::LearnerConfig;
pub use coordinator::{Coordinator, ReportMessage, TaskMessage, TrainingWorker};
pub use default_model::{DefaultModel, DefaultModelConfig};
pub use engine::{OptimizerState, TrainStats, TrainingEngine};
pub use error::{LearnerError, Result};
pub use model::{ActorCriticModel, CategoricalDistribution};
pub use registry::TrajectoryRegistry;
pub use types::{DType, FieldTree, KlCoeff, PolicyVersion, SharedTensorHandle, SlotKey};

/// Convenience re-exports for wiring a coordinator and its training worker.
pub mod prelude {
    pub use crate::assembler::{try_assemble, ExperienceBatch};
    pub use crate::broadcast::{PolicyWorkerSink, UpdateWeights, WeightBroadcaster};
    pub use crate::checkpoint::{apply_pbt_load, CheckpointManager, CheckpointState};
    pub use crate::config::LearnerConfig;
    pub use crate::coordinator::{Coordinator, ReportMessage, TaskMessage, TrainingWorker};
    pub use crate::default_model::DefaultModel;
    pub use crate::engine::{OptimizerState, TrainingEngine};
    pub use crate::error::{LearnerError, Result};
    pub use crate::intake::RolloutIntake;
    pub use crate::model::ActorCriticModel;
    pub use crate::pbt::{PbtLatch, PbtMessage};
    pub use crate::registry::TrajectoryRegistry;
    pub use crate::rollout::{ExperienceBuffer, RolloutTensors, TensorAttacher};
    pub use crate::types::{FieldTree, PolicyVersion, SlotKey};
}
