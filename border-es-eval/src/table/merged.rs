//! Training log joined with evaluation results.
use super::{
    EvaluationTable, GenerationStats, LogRow, LogTable, NumericRow, EVAL_LEN_MEAN, EVAL_REW_MEAN,
    EVAL_REW_STD,
};
use std::collections::HashMap;

/// A training iteration with the evaluation of the checkpoint saved at its end.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    /// The training iteration.
    pub log: LogRow,

    /// Mean episode return over the rollouts of the checkpoint.
    pub reward_mean: f64,

    /// Standard deviation of the episode return over the rollouts of the checkpoint.
    pub reward_std: f64,

    /// Mean episode length over the rollouts of the checkpoint.
    pub length_mean: f64,
}

impl MergedRow {
    fn new(log: &LogRow, stats: &GenerationStats) -> Self {
        Self {
            log: log.clone(),
            reward_mean: stats.reward_mean,
            reward_std: stats.reward_std,
            length_mean: stats.length_mean,
        }
    }
}

impl NumericRow for MergedRow {
    fn generation(&self) -> Option<u64> {
        Some(self.log.generation)
    }

    fn columns(&self) -> Vec<(String, Option<f64>)> {
        let mut columns = self.log.columns();
        columns.push((EVAL_REW_MEAN.to_string(), Some(self.reward_mean)));
        columns.push((EVAL_REW_STD.to_string(), Some(self.reward_std)));
        columns.push((EVAL_LEN_MEAN.to_string(), Some(self.length_mean)));
        columns
    }
}

/// Inner join of a [`LogTable`] and an [`EvaluationTable`] on the generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedTable {
    rows: Vec<MergedRow>,
}

impl MergedTable {
    /// Joins the tables.
    ///
    /// Only generations present in both tables are kept, in the order of the log.
    /// Evaluations of an unknown generation are never joined.
    pub fn merge(log: &LogTable, evaluation: &EvaluationTable) -> Self {
        let mut evals = HashMap::<u64, Vec<&GenerationStats>>::new();
        for row in evaluation.rows() {
            if let Some(g) = row.generation {
                evals.entry(g).or_default().push(row);
            }
        }

        let mut rows = vec![];
        for l in log.rows() {
            if let Some(matches) = evals.get(&l.generation) {
                rows.extend(matches.iter().map(|e| MergedRow::new(l, e)));
            }
        }

        Self { rows }
    }

    /// Rows of the table.
    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    /// The number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
