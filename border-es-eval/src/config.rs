//! Configuration of the evaluator.
use crate::EvalError;
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of the evaluator, shared by all runs of an experiment.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// The number of worker threads executing rollouts.
    ///
    /// If `None`, the number of logical CPUs of the host is used.
    pub n_workers: Option<usize>,

    /// Marker preceding the generation number in checkpoint file names.
    pub checkpoint_marker: String,

    /// Extension of checkpoint files, including the leading dot.
    pub checkpoint_extension: String,

    /// Extension of recorded video files, including the leading dot.
    pub video_extension: String,

    /// File name of the training log in a run directory.
    pub log_file: String,

    /// File name of the persisted evaluation in a run directory.
    pub evaluation_file: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            n_workers: None,
            checkpoint_marker: "snapshot_".to_string(),
            checkpoint_extension: ".h5".to_string(),
            video_extension: ".mp4".to_string(),
            log_file: "log.csv".to_string(),
            evaluation_file: "evaluation.csv".to_string(),
        }
    }
}

impl EvaluatorConfig {
    /// Sets the number of worker threads.
    pub fn n_workers(mut self, v: usize) -> Self {
        self.n_workers = Some(v);
        self
    }

    /// Sets the marker preceding the generation number in checkpoint file names.
    pub fn checkpoint_marker(mut self, v: impl Into<String>) -> Self {
        self.checkpoint_marker = v.into();
        self
    }

    /// Sets the extension of checkpoint files.
    pub fn checkpoint_extension(mut self, v: impl Into<String>) -> Self {
        self.checkpoint_extension = v.into();
        self
    }

    /// Sets the extension of video files.
    pub fn video_extension(mut self, v: impl Into<String>) -> Self {
        self.video_extension = v.into();
        self
    }

    /// Returns the number of worker threads used for rollouts.
    pub fn workers(&self) -> usize {
        self.n_workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Configuration of an experiment, i.e., a group of runs differing only by
/// random seed.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ExperimentConfig<C> {
    /// Configuration of the environment the policies are evaluated on.
    pub env_config: C,

    /// Configuration of the evaluator.
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

impl<C> ExperimentConfig<C> {
    /// Constructs a configuration with the default evaluator settings.
    pub fn new(env_config: C) -> Self {
        Self {
            env_config,
            evaluator: EvaluatorConfig::default(),
        }
    }

    /// Sets the configuration of the evaluator.
    pub fn evaluator(mut self, v: EvaluatorConfig) -> Self {
        self.evaluator = v;
        self
    }
}

impl<C: Serialize + DeserializeOwned> ExperimentConfig<C> {
    /// Constructs [`ExperimentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ExperimentConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.to_yaml()?.as_bytes())?;
        Ok(())
    }

    /// Returns the configuration as a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self)?)
    }
}

/// Parameters of [`TrainingRun::evaluate`](crate::TrainingRun::evaluate).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EvaluateOptions {
    /// Re-evaluate even if an evaluation is cached.
    pub force: bool,

    /// The number of rollouts per checkpoint.
    pub repeat_count: usize,

    /// Evaluate every `stride`-th checkpoint, starting from the first one.
    pub stride: Option<usize>,

    /// Write the evaluation to the run directory.
    pub persist: bool,

    /// Remove checkpoint files after a successful evaluation.
    pub delete_checkpoints: bool,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            force: false,
            repeat_count: 5,
            stride: None,
            persist: false,
            delete_checkpoints: false,
        }
    }
}

impl EvaluateOptions {
    /// Sets if cached evaluations are ignored.
    pub fn force(mut self, v: bool) -> Self {
        self.force = v;
        self
    }

    /// Sets the number of rollouts per checkpoint.
    pub fn repeat_count(mut self, v: usize) -> Self {
        self.repeat_count = v;
        self
    }

    /// Sets the checkpoint stride.
    pub fn stride(mut self, v: usize) -> Self {
        self.stride = Some(v);
        self
    }

    /// Sets if the evaluation is written to the run directory.
    pub fn persist(mut self, v: bool) -> Self {
        self.persist = v;
        self
    }

    /// Sets if checkpoint files are removed after evaluation.
    pub fn delete_checkpoints(mut self, v: bool) -> Self {
        self.delete_checkpoints = v;
        self
    }

    /// Checks the values of the options.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.repeat_count == 0 {
            return Err(EvalError::InvalidRepeatCount(self.repeat_count));
        }
        if let Some(0) = self.stride {
            return Err(EvalError::InvalidStride(0));
        }
        Ok(())
    }
}
