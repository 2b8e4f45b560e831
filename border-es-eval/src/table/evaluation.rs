//! Evaluation results of the checkpoints of a run.
use super::{
    length_column, parse_integral, reward_column, NumericRow, EVAL_LEN_MEAN, EVAL_PER_GEN,
    EVAL_REW_MEAN, EVAL_REW_STD, GENERATION,
};
use crate::{stats, EvalError};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::{fs::File, path::Path};

/// Statistics of the rollouts of one checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationStats {
    /// Generation of the checkpoint, `None` if it could not be parsed.
    pub generation: Option<u64>,

    /// The number of rollouts.
    pub n_rollouts: usize,

    /// Mean episode return.
    pub reward_mean: f64,

    /// Population standard deviation of the episode return.
    pub reward_std: f64,

    /// Mean episode length.
    pub length_mean: f64,

    /// `(return, length)` of each rollout.
    pub rollouts: Vec<(f64, usize)>,
}

impl GenerationStats {
    /// Computes the statistics of rollouts.
    pub fn from_rollouts(generation: Option<u64>, rollouts: Vec<(f64, usize)>) -> Self {
        let rewards = rollouts.iter().map(|r| r.0).collect::<Vec<_>>();
        let lengths = rollouts.iter().map(|r| r.1 as f64).collect::<Vec<_>>();

        Self {
            generation,
            n_rollouts: rollouts.len(),
            reward_mean: stats::mean(&rewards),
            reward_std: stats::std(&rewards, 0),
            length_mean: stats::mean(&lengths),
            rollouts,
        }
    }
}

impl NumericRow for GenerationStats {
    fn generation(&self) -> Option<u64> {
        self.generation
    }

    fn columns(&self) -> Vec<(String, Option<f64>)> {
        let mut columns = vec![
            (EVAL_PER_GEN.to_string(), Some(self.n_rollouts as f64)),
            (EVAL_REW_MEAN.to_string(), Some(self.reward_mean)),
            (EVAL_REW_STD.to_string(), Some(self.reward_std)),
            (EVAL_LEN_MEAN.to_string(), Some(self.length_mean)),
        ];
        for (i, (reward, length)) in self.rollouts.iter().enumerate() {
            columns.push((reward_column(i), Some(*reward)));
            columns.push((length_column(i), Some(*length as f64)));
        }
        columns
    }
}

/// Evaluation of a run, one row per checkpoint in checkpoint order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationTable {
    rows: Vec<GenerationStats>,
}

impl EvaluationTable {
    /// Constructs a table from rows.
    pub fn from_rows(rows: Vec<GenerationStats>) -> Self {
        Self { rows }
    }

    /// Rows of the table.
    pub fn rows(&self) -> &[GenerationStats] {
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

    /// Returns the row of the given generation.
    pub fn get(&self, generation: u64) -> Option<&GenerationStats> {
        self.rows.iter().find(|r| r.generation == Some(generation))
    }

    /// Header of the persisted table for `repeat_count` rollouts per checkpoint.
    pub fn header(repeat_count: usize) -> Vec<String> {
        let mut header = [
            GENERATION,
            EVAL_PER_GEN,
            EVAL_REW_MEAN,
            EVAL_REW_STD,
            EVAL_LEN_MEAN,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
        for i in 0..repeat_count {
            header.push(reward_column(i));
            header.push(length_column(i));
        }
        header
    }

    /// Writes the table as a CSV file.
    ///
    /// An unknown generation is written as an empty field.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
        let repeat_count = self.rows.first().map_or(0, |r| r.n_rollouts);

        wtr.write_record(Self::header(repeat_count))?;
        for row in self.rows.iter() {
            let mut record = vec![
                row.generation.map_or(String::new(), |g| g.to_string()),
                row.n_rollouts.to_string(),
                row.reward_mean.to_string(),
                row.reward_std.to_string(),
                row.length_mean.to_string(),
            ];
            for (reward, length) in row.rollouts.iter() {
                record.push(reward.to_string());
                record.push(length.to_string());
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;

        Ok(())
    }

    /// Reads a table written by [`EvaluationTable::save`].
    ///
    /// Columns are looked up by name, so an additional index column is ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .from_path(path)
            .with_context(|| format!("Failed to open {:?}", path))?;
        let header = rdr.headers()?.clone();
        let column = |name: &str| header.iter().position(|h| h == name);
        let required = |name: &str| {
            column(name).with_context(|| format!("Column {} is missing in {:?}", name, path))
        };

        let ix_gen = required(GENERATION)?;
        let ix_rew_mean = required(EVAL_REW_MEAN)?;
        let ix_rew_std = required(EVAL_REW_STD)?;
        let ix_len_mean = required(EVAL_LEN_MEAN)?;
        let mut ix_rollouts = vec![];
        while let (Some(r), Some(l)) = (
            column(&reward_column(ix_rollouts.len())),
            column(&length_column(ix_rollouts.len())),
        ) {
            ix_rollouts.push((r, l));
        }

        let mut rows = vec![];
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let rollouts = ix_rollouts
                .iter()
                .map(|(r, l)| Ok((parse_f64(&record, *r, i)?, parse_length(&record, *l, i)?)))
                .collect::<Result<Vec<_>, EvalError>>()?;
            rows.push(GenerationStats {
                generation: parse_generation(&record, ix_gen, i)?,
                n_rollouts: rollouts.len(),
                reward_mean: parse_f64(&record, ix_rew_mean, i)?,
                reward_std: parse_f64(&record, ix_rew_std, i)?,
                length_mean: parse_f64(&record, ix_len_mean, i)?,
                rollouts,
            });
        }

        Ok(Self { rows })
    }
}

fn field(record: &StringRecord, ix: usize, row: usize) -> Result<&str, EvalError> {
    record
        .get(ix)
        .ok_or_else(|| EvalError::MalformedEvaluation {
            row,
            reason: format!("missing field {}", ix),
        })
}

fn parse_f64(record: &StringRecord, ix: usize, row: usize) -> Result<f64, EvalError> {
    let s = field(record, ix, row)?;
    s.trim()
        .parse()
        .map_err(|_| EvalError::MalformedEvaluation {
            row,
            reason: format!("{:?} is not a number", s),
        })
}

fn parse_length(record: &StringRecord, ix: usize, row: usize) -> Result<usize, EvalError> {
    let s = field(record, ix, row)?;
    parse_integral(s)
        .map(|l| l as usize)
        .ok_or_else(|| EvalError::MalformedEvaluation {
            row,
            reason: format!("{:?} is not an episode length", s),
        })
}

/// Generations written by other tools can be floats like `10.0`.
fn parse_generation(
    record: &StringRecord,
    ix: usize,
    row: usize,
) -> Result<Option<u64>, EvalError> {
    let s = field(record, ix, row)?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    parse_integral(s)
        .map(Some)
        .ok_or_else(|| EvalError::MalformedEvaluation {
            row,
            reason: format!("{:?} is not a generation number", s),
        })
}
