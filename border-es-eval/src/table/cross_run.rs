//! Statistics across runs differing only by random seed.
use super::{NumericRow, GENERATION};
use crate::stats;
use std::collections::{BTreeMap, HashMap};

/// Values of the numeric columns for one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    /// Generation.
    pub generation: u64,

    /// Values by column name, in the order the columns first appeared.
    pub values: Vec<(String, f64)>,
}

impl GenerationSummary {
    /// Returns the value of a column.
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| *v)
    }
}

/// A curve to be plotted, with an optional band of one standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Values on the horizontal axis.
    pub x: Vec<f64>,

    /// Values on the vertical axis.
    pub y: Vec<f64>,

    /// Standard deviation of `y`, `None` if it is not defined.
    pub y_std: Option<Vec<f64>>,
}

/// Mean and sample standard deviation of each numeric column across runs,
/// per generation.
///
/// Rows of an unknown generation are ignored, as are missing or `NaN` values.
/// The standard deviation of a generation observed in a single run is `NaN`;
/// consumers should treat it as "no band" rather than as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossRunStats {
    n_runs: usize,
    mean: Vec<GenerationSummary>,
    std: Vec<GenerationSummary>,
}

impl CrossRunStats {
    /// Computes the statistics from the rows of each run.
    pub fn compute(runs: &[Vec<&dyn NumericRow>]) -> Self {
        let mut columns = Vec::<String>::new();
        let mut groups = BTreeMap::<u64, HashMap<String, Vec<f64>>>::new();

        for row in runs.iter().flatten() {
            let generation = match row.generation() {
                Some(g) => g,
                None => continue,
            };
            let group = groups.entry(generation).or_default();

            for (column, value) in row.columns() {
                if !columns.contains(&column) {
                    columns.push(column.clone());
                }
                let values = group.entry(column).or_default();
                match value {
                    Some(v) if !v.is_nan() => values.push(v),
                    _ => {}
                }
            }
        }

        let no_values = vec![];
        let mut mean = Vec::with_capacity(groups.len());
        let mut std = Vec::with_capacity(groups.len());

        for (generation, group) in groups {
            let samples = columns
                .iter()
                .map(|c| (c, group.get(c).unwrap_or(&no_values)))
                .collect::<Vec<_>>();
            mean.push(GenerationSummary {
                generation,
                values: samples
                    .iter()
                    .map(|(c, vs)| (c.to_string(), stats::mean(vs)))
                    .collect(),
            });
            std.push(GenerationSummary {
                generation,
                values: samples
                    .iter()
                    .map(|(c, vs)| (c.to_string(), stats::std(vs, 1)))
                    .collect(),
            });
        }

        Self {
            n_runs: runs.len(),
            mean,
            std,
        }
    }

    /// The number of runs the statistics were computed from.
    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    /// Per-generation mean, ordered by generation.
    pub fn mean(&self) -> &[GenerationSummary] {
        &self.mean
    }

    /// Per-generation sample standard deviation, ordered by generation.
    pub fn std(&self) -> &[GenerationSummary] {
        &self.std
    }

    /// Generations in the statistics.
    pub fn generations(&self) -> Vec<u64> {
        self.mean.iter().map(|s| s.generation).collect()
    }

    /// Mean of a column at a generation.
    pub fn mean_of(&self, generation: u64, column: &str) -> Option<f64> {
        Self::lookup(&self.mean, generation, column)
    }

    /// Standard deviation of a column at a generation.
    pub fn std_of(&self, generation: u64, column: &str) -> Option<f64> {
        Self::lookup(&self.std, generation, column)
    }

    fn lookup(summaries: &[GenerationSummary], generation: u64, column: &str) -> Option<f64> {
        summaries
            .iter()
            .find(|s| s.generation == generation)
            .and_then(|s| s.get(column))
    }

    /// Mean of column `y` against column `x`, with the standard deviation of `y`
    /// as band if there is more than one run.
    ///
    /// [`GENERATION`] can be used as a column. Returns `None` if a column is absent.
    pub fn series(&self, x: &str, y: &str) -> Option<Series> {
        let value = |s: &GenerationSummary, c: &str| {
            if c == GENERATION {
                Some(s.generation as f64)
            } else {
                s.get(c)
            }
        };

        let mut series = Series {
            x: vec![],
            y: vec![],
            y_std: if self.n_runs > 1 { Some(vec![]) } else { None },
        };
        for (m, s) in self.mean.iter().zip(self.std.iter()) {
            series.x.push(value(m, x)?);
            series.y.push(value(m, y)?);
            if let Some(band) = series.y_std.as_mut() {
                band.push(value(s, y)?);
            }
        }

        Some(series)
    }
}
