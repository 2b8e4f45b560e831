//! Evaluation of a single training run.
use crate::{
    checkpoint::{discover_checkpoints, select_checkpoints, Checkpoint},
    table::{EvaluationTable, GenerationStats, LogTable, MergedTable, NumericRow, Series},
    EvaluateOptions, ExperimentConfig, RolloutExecutor, RolloutResult, WorkerPool,
};
use anyhow::{Context, Result};
use border_core::{Env, PolicyLoader};
use log::{info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Data of an evaluated run.
///
/// The tables are shared, so cloning is cheap and a cached result is handed out
/// as the same table object.
#[derive(Debug, Clone)]
pub enum RunData {
    /// Evaluation joined with the training log.
    Merged(Arc<MergedTable>),

    /// Evaluation of a run without a training log.
    Evaluation(Arc<EvaluationTable>),
}

impl RunData {
    /// Rows with numeric columns, used for aggregation across runs.
    pub fn numeric_rows(&self) -> Vec<&dyn NumericRow> {
        match self {
            Self::Merged(t) => t.rows().iter().map(|r| r as &dyn NumericRow).collect(),
            Self::Evaluation(t) => t.rows().iter().map(|r| r as &dyn NumericRow).collect(),
        }
    }

    /// Returns the merged table, if any.
    pub fn merged(&self) -> Option<&MergedTable> {
        match self {
            Self::Merged(t) => Some(t),
            Self::Evaluation(_) => None,
        }
    }

    /// Returns `true` if both refer to the same table object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Merged(a), Self::Merged(b)) => Arc::ptr_eq(a, b),
            (Self::Evaluation(a), Self::Evaluation(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// A training run, i.e., one training process with a fixed random seed.
///
/// A run owns the directory where the training saved its checkpoints and log.
/// It evaluates the checkpoints with fresh rollouts and records a video of the
/// latest policy:
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Idle
///     Idle --> Evaluating: evaluate
///     Evaluating --> Idle: evaluation table or no data
///     Idle --> Visualizing: visualize
///     Visualizing --> Idle: video file
/// ```
///
/// # Evaluation
///
/// [`TrainingRun::evaluate`] queues `repeat_count` rollouts of every selected
/// checkpoint to a [`WorkerPool`] before waiting for any result, then collects
/// the results checkpoint by checkpoint in submission order. A rollout ending
/// with a non-finite action stops the whole evaluation, discarding the results
/// collected so far.
///
/// The result is cached. It is returned as is by later calls unless
/// [`EvaluateOptions::force`] is set.
///
/// Evaluating or visualizing the same run from multiple threads is not
/// supported, as recordings are found by listing the run directory.
pub struct TrainingRun<E, L>
where
    E: Env,
    L: PolicyLoader<E>,
{
    save_dir: PathBuf,
    config: Arc<ExperimentConfig<E::Config>>,
    loader: Arc<L>,
    log: Option<LogTable>,
    checkpoints: Vec<Checkpoint>,
    evaluation: Option<Arc<EvaluationTable>>,
    data: Option<RunData>,
    video_file: Option<PathBuf>,
}

impl<E, L> TrainingRun<E, L>
where
    E: Env,
    L: PolicyLoader<E>,
{
    /// Constructs a run without checkpoints, log or evaluation.
    pub fn new(
        save_dir: impl Into<PathBuf>,
        config: Arc<ExperimentConfig<E::Config>>,
        loader: Arc<L>,
    ) -> Self {
        Self {
            save_dir: save_dir.into(),
            config,
            loader,
            log: None,
            checkpoints: vec![],
            evaluation: None,
            data: None,
            video_file: None,
        }
    }

    /// Sets the training log.
    pub fn with_log(mut self, log: LogTable) -> Self {
        self.log = Some(log);
        self.data = self.merge_log_eval();
        self
    }

    /// Sets the checkpoint files, relative to the run directory, oldest first.
    pub fn with_checkpoints<P: AsRef<Path>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        let evaluator = &self.config.evaluator;
        let save_dir = &self.save_dir;
        self.checkpoints = paths
            .into_iter()
            .map(|p| Checkpoint::new(save_dir.join(p), evaluator))
            .collect();
        self
    }

    /// Sets an evaluation computed before.
    pub fn with_evaluation(mut self, evaluation: EvaluationTable) -> Self {
        self.evaluation = Some(Arc::new(evaluation));
        self.data = self.merge_log_eval();
        self
    }

    /// Sets a video recorded before.
    pub fn with_video_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.video_file = Some(path.into());
        self
    }

    /// Restores a run from its directory.
    ///
    /// Checkpoints, the training log, a persisted evaluation and a recorded video
    /// are picked up if present. Files that exist but can not be parsed are errors.
    pub fn load(
        save_dir: impl Into<PathBuf>,
        config: Arc<ExperimentConfig<E::Config>>,
        loader: Arc<L>,
    ) -> Result<Self> {
        let mut run = Self::new(save_dir, config, loader);
        let evaluator = &run.config.evaluator;

        run.checkpoints = discover_checkpoints(&run.save_dir, evaluator)?;
        if run.checkpoints.is_empty() {
            info!("No checkpoints found in {:?}", run.save_dir);
        }

        let log_path = run.save_dir.join(&evaluator.log_file);
        if log_path.is_file() {
            run.log = Some(LogTable::load(&log_path)?);
        } else {
            warn!(
                "The run in {:?} is missing the training log {:?}. It will not work as expected.",
                run.save_dir, evaluator.log_file
            );
        }

        let evaluation_path = run.save_dir.join(&evaluator.evaluation_file);
        if evaluation_path.is_file() {
            run.evaluation = Some(Arc::new(EvaluationTable::load(&evaluation_path)?));
        }

        run.video_file = list_files(&run.save_dir, &evaluator.video_extension)?.pop();
        run.data = run.merge_log_eval();

        Ok(run)
    }

    /// Directory of the run.
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Configuration shared with the other runs of the experiment.
    pub fn config(&self) -> &ExperimentConfig<E::Config> {
        &self.config
    }

    /// Training log.
    pub fn log(&self) -> Option<&LogTable> {
        self.log.as_ref()
    }

    /// Checkpoints, oldest first.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Returns `true` if the run has checkpoints to evaluate.
    pub fn has_checkpoints(&self) -> bool {
        !self.checkpoints.is_empty()
    }

    /// The latest evaluation.
    pub fn evaluation(&self) -> Option<&EvaluationTable> {
        self.evaluation.as_deref()
    }

    /// The latest evaluation joined with the log, if both exist.
    pub fn merged(&self) -> Option<&MergedTable> {
        self.data.as_ref().and_then(|d| d.merged())
    }

    /// The cached result of [`TrainingRun::evaluate`].
    pub fn data(&self) -> Option<&RunData> {
        self.data.as_ref()
    }

    /// The recorded video.
    pub fn video_file(&self) -> Option<&Path> {
        self.video_file.as_deref()
    }

    fn merge_log_eval(&self) -> Option<RunData> {
        let evaluation = self.evaluation.as_ref()?;
        Some(match &self.log {
            Some(log) => RunData::Merged(Arc::new(MergedTable::merge(log, evaluation))),
            None => RunData::Evaluation(evaluation.clone()),
        })
    }

    /// Writes the latest evaluation to the run directory.
    pub fn save_evaluation(&self) -> Result<()> {
        match &self.evaluation {
            Some(evaluation) => self.write_evaluation(evaluation)?,
            None => warn!("The run in {:?} has no evaluation to save", self.save_dir),
        }
        Ok(())
    }

    fn write_evaluation(&self, evaluation: &EvaluationTable) -> Result<()> {
        let path = self.save_dir.join(&self.config.evaluator.evaluation_file);
        evaluation.save(&path)?;
        info!("Saved evaluation to {:?}", path);
        Ok(())
    }

    /// Removes the checkpoint files of the run.
    ///
    /// If `save_last` is `true`, the latest checkpoint is kept, i.e., the one
    /// [`TrainingRun::visualize`] records.
    pub fn delete_checkpoint_files(&mut self, save_last: bool) -> Result<()> {
        let keep = if save_last {
            latest_checkpoint(&self.checkpoints).map(|c| c.path.clone())
        } else {
            None
        };

        let result = self
            .checkpoints
            .iter()
            .filter(|c| Some(&c.path) != keep.as_ref())
            .try_for_each(|c| -> Result<()> {
                fs::remove_file(&c.path)
                    .with_context(|| format!("Failed to delete {:?}", c.path))?;
                info!("Deleted checkpoint {:?}", c.path);
                Ok(())
            });
        self.checkpoints.retain(|c| c.path.exists());

        result
    }

    /// Returns episode returns against environment steps.
    ///
    /// Uses the evaluation if it is merged with the log. Otherwise falls back to
    /// the return estimated during training.
    pub fn reward_over_timesteps(&self) -> Option<Series> {
        if let Some(merged) = self.merged() {
            return Some(Series {
                x: merged
                    .rows()
                    .iter()
                    .map(|r| r.log.timesteps_so_far as f64)
                    .collect(),
                y: merged.rows().iter().map(|r| r.reward_mean).collect(),
                y_std: None,
            });
        }

        match &self.log {
            Some(log) => {
                warn!(
                    "The run in {:?} is not evaluated. The mean reward was computed during \
                     training and can have missing values!",
                    self.save_dir
                );
                Some(Series {
                    x: log.rows().iter().map(|r| r.timesteps_so_far as f64).collect(),
                    y: log
                        .rows()
                        .iter()
                        .map(|r| r.eval_gen_reward_mean.unwrap_or(f64::NAN))
                        .collect(),
                    y_std: None,
                })
            }
            None => {
                warn!(
                    "The run in {:?} has neither a merged evaluation nor a log",
                    self.save_dir
                );
                None
            }
        }
    }
}

impl<E, L> TrainingRun<E, L>
where
    E: Env + 'static,
    E::Config: Send + 'static,
    L: PolicyLoader<E> + 'static,
{
    /// Evaluates the checkpoints of the run.
    ///
    /// Returns `None`, with a warning, if there is no checkpoint or a rollout
    /// produced a non-finite action. Errors of the environment or of policy
    /// loading are returned as is.
    pub fn evaluate(&mut self, opts: &EvaluateOptions) -> Result<Option<RunData>> {
        opts.validate()?;

        if !opts.force {
            if let Some(data) = &self.data {
                return Ok(Some(data.clone()));
            }
        }

        if self.checkpoints.is_empty() {
            warn!(
                "No checkpoints given for the run in {:?}, so no new evaluation is possible. \
                 You can still use its log or a persisted evaluation.",
                self.save_dir
            );
            return Ok(None);
        }

        let evaluation = match self.run_rollouts(opts)? {
            Some(evaluation) => evaluation,
            None => return Ok(None),
        };
        // The cached evaluation and its merge are replaced only once persisted
        if opts.persist {
            self.write_evaluation(&evaluation)?;
        }
        self.evaluation = Some(Arc::new(evaluation));
        self.data = self.merge_log_eval();
        if opts.delete_checkpoints {
            self.delete_checkpoint_files(false)?;
        }

        Ok(self.data.clone())
    }

    fn executor(&self) -> RolloutExecutor<E, L> {
        RolloutExecutor::new(self.config.env_config.clone(), self.loader.clone())
    }

    fn run_rollouts(&self, opts: &EvaluateOptions) -> Result<Option<EvaluationTable>> {
        let selected = select_checkpoints(&self.checkpoints, opts.stride)?;
        let n_workers = self.config.evaluator.workers();
        info!(
            "Evaluate {} checkpoints in {:?}, {} rollouts each, on {} workers",
            selected.len(),
            self.save_dir,
            opts.repeat_count,
            n_workers
        );

        let executor = self.executor();
        let pool = WorkerPool::new(n_workers);

        // Queues all rollouts before waiting for any of them
        let mut batches = Vec::with_capacity(selected.len());
        for checkpoint in selected.iter() {
            let handles = (0..opts.repeat_count)
                .map(|_| {
                    let executor = executor.clone();
                    let path = checkpoint.path.clone();
                    pool.submit(move || executor.run(&path, None))
                })
                .collect::<Vec<_>>();
            batches.push((checkpoint.generation, handles));
        }

        let mut rows = Vec::with_capacity(batches.len());
        for (generation, handles) in batches {
            let mut rollouts = Vec::with_capacity(handles.len());
            let mut non_finite = false;

            // Drains all rollouts of the checkpoint even after a failure
            for handle in handles {
                match handle.join()?? {
                    RolloutResult::Completed { reward, length } => rollouts.push((reward, length)),
                    RolloutResult::NonFinite => non_finite = true,
                }
            }

            if non_finite {
                pool.cancel_pending();
                warn!(
                    "The checkpoint of generation {:?} in {:?} produces non-finite numbers. Stopping.",
                    generation, self.save_dir
                );
                return Ok(None);
            }

            let row = GenerationStats::from_rollouts(generation, rollouts);
            info!(
                "Generation {:?}: reward = {:.3} (std {:.3}), length = {:.1}",
                generation, row.reward_mean, row.reward_std, row.length_mean
            );
            rows.push(row);
        }
        pool.join();

        Ok(Some(EvaluationTable::from_rows(rows)))
    }

    /// Records a video of a rollout of the latest checkpoint.
    ///
    /// Returns the video recorded before unless `force` is set. Returns `None` if
    /// the run has no checkpoint.
    pub fn visualize(&mut self, force: bool) -> Result<Option<PathBuf>> {
        let latest = match latest_checkpoint(&self.checkpoints) {
            Some(checkpoint) => checkpoint.path.clone(),
            None => {
                warn!(
                    "No checkpoints given for the run in {:?}, so no video can be recorded",
                    self.save_dir
                );
                return Ok(None);
            }
        };

        if !force {
            if let Some(video_file) = &self.video_file {
                return Ok(Some(video_file.clone()));
            }
        }

        let extension = &self.config.evaluator.video_extension;
        let before = list_files(&self.save_dir, extension)?;

        let executor = self.executor();
        let dir = self.save_dir.clone();
        let pool = WorkerPool::new(1);
        let result = pool
            .submit(move || executor.run(&latest, Some(&dir)))
            .join()??;
        pool.join();

        if result == RolloutResult::NonFinite {
            warn!("The recorded rollout stopped at a non-finite action");
        }

        let after = list_files(&self.save_dir, extension)?;
        let recorded = after
            .iter()
            .filter(|p| !before.contains(p))
            .last()
            .or_else(|| after.last());
        match recorded {
            Some(path) => {
                info!("Recorded video {:?}", path);
                self.video_file = Some(path.clone());
            }
            None => warn!("No video file was found in {:?}", self.save_dir),
        }

        Ok(self.video_file.clone())
    }
}

/// The checkpoint of the highest generation, or the last one if no generation is known.
fn latest_checkpoint(checkpoints: &[Checkpoint]) -> Option<&Checkpoint> {
    checkpoints
        .iter()
        .filter(|c| c.generation.is_some())
        .max_by_key(|c| c.generation)
        .or_else(|| checkpoints.last())
}

/// Lists files in `dir` ending with `extension`, ordered by name.
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.ends_with(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
