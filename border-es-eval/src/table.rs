//! Tables of evaluation results, training logs and their aggregates.
//!
//! All tables are keyed by generation number:
//!
//! * [`EvaluationTable`] - one [`GenerationStats`] row per evaluated checkpoint
//! * [`LogTable`] - one [`LogRow`] per training iteration
//! * [`MergedTable`] - inner join of the two on the generation number
//! * [`CrossRunStats`] - mean and standard deviation across runs per generation
mod cross_run;
mod evaluation;
mod merged;
mod training_log;
pub use cross_run::{CrossRunStats, GenerationSummary, Series};
pub use evaluation::{EvaluationTable, GenerationStats};
pub use merged::{MergedRow, MergedTable};
pub use training_log::{LogRow, LogTable};

/// Column of generation numbers.
pub const GENERATION: &str = "Generation";

/// Column of the number of rollouts per checkpoint.
pub const EVAL_PER_GEN: &str = "Eval_per_Gen";

/// Column of the mean episode return over the rollouts of a checkpoint.
pub const EVAL_REW_MEAN: &str = "Eval_Rew_Mean";

/// Column of the standard deviation of the episode return over the rollouts of a checkpoint.
pub const EVAL_REW_STD: &str = "Eval_Rew_Std";

/// Column of the mean episode length over the rollouts of a checkpoint.
pub const EVAL_LEN_MEAN: &str = "Eval_Len_Mean";

/// Column of environment steps taken by the training so far.
pub const TIMESTEPS_SO_FAR: &str = "TimestepsSoFar";

/// Column of the mean return estimated during training.
pub const EVAL_GEN_REWARD_MEAN: &str = "EvalGenRewardMean";

/// Column of wall-clock seconds since the start of the training.
pub const TIME_ELAPSED: &str = "TimeElapsed";

/// Column of the return of the `i`-th rollout.
pub fn reward_column(i: usize) -> String {
    format!("Rew_{}", i)
}

/// Column of the length of the `i`-th rollout.
pub fn length_column(i: usize) -> String {
    format!("Len_{}", i)
}

/// A row with numeric columns that can be averaged across runs.
pub trait NumericRow {
    /// Generation of the row, `None` if unknown.
    fn generation(&self) -> Option<u64>;

    /// Values of the row by column name, `None` for a missing value.
    fn columns(&self) -> Vec<(String, Option<f64>)>;
}

/// Parses a non-negative integer, also when written as a float like `10.0`.
pub(crate) fn parse_integral(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<u64>() {
        return Some(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => Some(v as u64),
        _ => None,
    }
}
