//! Training log of a run.
use super::{
    parse_integral, NumericRow, EVAL_GEN_REWARD_MEAN, GENERATION, TIMESTEPS_SO_FAR, TIME_ELAPSED,
};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::Path;

/// A training iteration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogRow {
    /// Generation at the end of the iteration.
    #[serde(rename = "Generation", deserialize_with = "integral")]
    pub generation: u64,

    /// Environment steps taken by the training so far.
    #[serde(rename = "TimestepsSoFar", deserialize_with = "integral")]
    pub timesteps_so_far: u64,

    /// Mean return estimated during training, missing for some iterations.
    #[serde(rename = "EvalGenRewardMean", deserialize_with = "csv::invalid_option")]
    pub eval_gen_reward_mean: Option<f64>,

    /// Wall-clock seconds since the start of the training.
    #[serde(rename = "TimeElapsed")]
    pub time_elapsed: f64,
}

/// Integer columns can be written as floats like `10.0` by other tools.
fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_integral(&s)
        .ok_or_else(|| de::Error::custom(format!("{:?} is not a non-negative integer", s)))
}

impl NumericRow for LogRow {
    fn generation(&self) -> Option<u64> {
        Some(self.generation)
    }

    fn columns(&self) -> Vec<(String, Option<f64>)> {
        vec![
            (TIMESTEPS_SO_FAR.to_string(), Some(self.timesteps_so_far as f64)),
            (EVAL_GEN_REWARD_MEAN.to_string(), self.eval_gen_reward_mean),
            (TIME_ELAPSED.to_string(), Some(self.time_elapsed)),
        ]
    }
}

/// Time series of training iterations, ordered by generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogTable {
    rows: Vec<LogRow>,
}

impl LogTable {
    /// Constructs a table from rows.
    pub fn from_rows(rows: Vec<LogRow>) -> Self {
        Self { rows }
    }

    /// Rows of the table.
    pub fn rows(&self) -> &[LogRow] {
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

    /// Reads the log written by the training.
    ///
    /// Columns other than those of [`LogRow`] are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open {:?}", path))?;
        let rows = rdr
            .deserialize()
            .collect::<Result<Vec<LogRow>, _>>()
            .with_context(|| {
                format!(
                    "Malformed log {:?}, expects columns {}, {}, {} and {}",
                    path, GENERATION, TIMESTEPS_SO_FAR, EVAL_GEN_REWARD_MEAN, TIME_ELAPSED
                )
            })?;
        Ok(Self { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_load_log() -> Result<()> {
        let dir = TempDir::new("log_table")?;
        let path = dir.path().join("log.csv");
        std::fs::write(
            &path,
            "Generation,TimestepsSoFar,EvalGenRewardMean,TimeElapsed,UnusedColumn\n\
             0,1000,-120.5,3.5,a\n\
             1,2000,,7.0,b\n",
        )?;

        let log = LogTable::load(&path)?;
        assert_eq!(log.len(), 2);
        assert_eq!(log.rows()[0].eval_gen_reward_mean, Some(-120.5));
        assert_eq!(log.rows()[1].eval_gen_reward_mean, None);
        assert_eq!(log.rows()[1].timesteps_so_far, 2000);
        Ok(())
    }

    #[test]
    fn test_load_log_with_float_integers() -> Result<()> {
        let dir = TempDir::new("log_table_float")?;
        let path = dir.path().join("log.csv");
        std::fs::write(
            &path,
            "Generation,TimestepsSoFar,EvalGenRewardMean,TimeElapsed\n\
             10.0,25000.0,1.5,3.0\n",
        )?;

        let log = LogTable::load(&path)?;
        assert_eq!(log.rows()[0].generation, 10);
        assert_eq!(log.rows()[0].timesteps_so_far, 25000);

        std::fs::write(
            &path,
            "Generation,TimestepsSoFar,EvalGenRewardMean,TimeElapsed\n\
             10.5,25000,1.5,3.0\n",
        )?;
        assert!(LogTable::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_load_log_missing_column() -> Result<()> {
        let dir = TempDir::new("log_table_missing")?;
        let path = dir.path().join("log.csv");
        std::fs::write(&path, "Generation,TimeElapsed\n0,1.0\n")?;
        assert!(LogTable::load(&path).is_err());
        Ok(())
    }
}
