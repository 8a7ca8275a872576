//! Error types for the learner subsystem.

use thiserror::Error;

/// Learner error taxonomy.
///
/// Only correctness-critical conditions are modeled as `Err` variants here.
/// Transient, expected conditions (an empty experience queue, a stale
/// rollout, a missing checkpoint directory) are not errors at all in this
/// design — they are counted and logged at the call site, never returned as
/// `Result::Err`. See the error-handling design for the full taxonomy.
#[derive(Error, Debug)]
pub enum LearnerError {
    /// A slot-key was registered twice for the same storage region.
    #[error("trajectory slot storage already registered for key {0:?}")]
    DuplicateRegistration(crate::types::SlotKey),

    /// A slot was referenced that was never registered.
    #[error("unknown trajectory slot storage for key {0:?}")]
    UnknownSlot(crate::types::SlotKey),

    /// A config divisibility precondition was violated
    /// (`macro_batch % rollout`, `rollout % recurrence`, `macro_batch % recurrence`,
    /// `experience_size % batch_size`). Fatal: the learner is misconfigured.
    #[error("misconfigured: {0}")]
    Misconfigured(String),

    /// Checkpoint save or rename failed.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint (de)serialization failed.
    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for conditions not otherwise modeled, wrapping lower layers.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for learner operations.
pub type Result<T> = std::result::Result<T, LearnerError>;
