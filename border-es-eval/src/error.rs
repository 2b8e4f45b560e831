//! Errors in the library.
use thiserror::Error;

/// Errors raised by the evaluator.
///
/// Missing checkpoints, logs or evaluations are not errors; they are reported as
/// unavailable results with a warning, see [`TrainingRun`](crate::TrainingRun).
#[derive(Debug, Error)]
pub enum EvalError {
    /// The number of rollouts per checkpoint must be positive.
    #[error("Invalid repeat count: {0}, at least one rollout per checkpoint is required")]
    InvalidRepeatCount(usize),

    /// The checkpoint stride must be positive.
    #[error("Invalid checkpoint stride: {0}")]
    InvalidStride(usize),

    /// A worker died before returning the result of a job.
    #[error("Worker thread was lost before returning the result of job {0}")]
    WorkerLost(usize),

    /// A row of a persisted evaluation does not match its header.
    #[error("Malformed evaluation row {row}: {reason}")]
    MalformedEvaluation {
        /// Index of the row, starting from 0.
        row: usize,
        /// What is wrong with the row.
        reason: String,
    },
}
