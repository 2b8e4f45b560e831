//! Aggregation of runs differing only by random seed.
use crate::{
    table::{
        CrossRunStats, EvaluationTable, LogTable, Series, EVAL_REW_MEAN, GENERATION,
        TIMESTEPS_SO_FAR, TIME_ELAPSED,
    },
    EvaluateOptions, ExperimentConfig, TrainingRun,
};
use anyhow::Result;
use border_core::{Env, PolicyLoader};
use log::{info, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// A group of [`TrainingRun`]s sharing one configuration.
///
/// If every run already has an evaluation when the experiment is constructed,
/// the statistics across runs are computed right away.
pub struct Experiment<E, L>
where
    E: Env,
    L: PolicyLoader<E>,
{
    config: Arc<ExperimentConfig<E::Config>>,
    runs: Vec<TrainingRun<E, L>>,
    stats: Option<CrossRunStats>,
    video_file: Option<PathBuf>,
}

impl<E, L> Experiment<E, L>
where
    E: Env,
    L: PolicyLoader<E>,
{
    /// Constructs an experiment from runs.
    pub fn new(config: Arc<ExperimentConfig<E::Config>>, runs: Vec<TrainingRun<E, L>>) -> Self {
        let mut experiment = Self {
            config,
            runs,
            stats: None,
            video_file: None,
        };

        let all_evaluated =
            !experiment.runs.is_empty() && experiment.runs.iter().all(|r| r.data().is_some());
        if all_evaluated {
            experiment.aggregate();
        }

        experiment
    }

    /// Restores the runs in the given directories, see [`TrainingRun::load`].
    pub fn load<P: AsRef<Path>>(
        config: Arc<ExperimentConfig<E::Config>>,
        loader: Arc<L>,
        run_dirs: impl IntoIterator<Item = P>,
    ) -> Result<Self> {
        let runs = run_dirs
            .into_iter()
            .map(|dir| TrainingRun::load(dir.as_ref(), config.clone(), loader.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(config, runs))
    }

    fn aggregate(&mut self) {
        let data = self.runs.iter().filter_map(|r| r.data()).collect::<Vec<_>>();
        let rows = data.iter().map(|d| d.numeric_rows()).collect::<Vec<_>>();
        let stats = CrossRunStats::compute(&rows);
        info!(
            "Aggregated {} runs over {} generations",
            stats.n_runs(),
            stats.mean().len()
        );
        self.stats = Some(stats);
    }

    /// Removes checkpoint files of all runs.
    ///
    /// Every run is processed even if one fails; the first error is returned.
    pub fn delete_checkpoint_files(&mut self, save_last: bool) -> Result<()> {
        let mut result = Ok(());
        for run in self.runs.iter_mut() {
            let r = run.delete_checkpoint_files(save_last);
            if result.is_ok() {
                result = r;
            }
        }
        result
    }

    /// The number of runs.
    pub fn n_runs(&self) -> usize {
        self.runs.len()
    }

    /// The runs.
    pub fn runs(&self) -> &[TrainingRun<E, L>] {
        &self.runs
    }

    /// Training logs of the runs.
    pub fn logs(&self) -> Vec<Option<&LogTable>> {
        self.runs.iter().map(|r| r.log()).collect()
    }

    /// Evaluations of the runs.
    pub fn evaluations(&self) -> Vec<Option<&EvaluationTable>> {
        self.runs.iter().map(|r| r.evaluation()).collect()
    }

    /// Configuration shared by the runs.
    pub fn config(&self) -> &ExperimentConfig<E::Config> {
        &self.config
    }

    /// Statistics across runs, if the runs are evaluated.
    pub fn stats(&self) -> Option<&CrossRunStats> {
        self.stats.as_ref()
    }

    /// The video recorded by [`Experiment::visualize`].
    pub fn video_file(&self) -> Option<&Path> {
        self.video_file.as_deref()
    }

    fn series(&self, x: &str, y: &str) -> Option<Series> {
        match &self.stats {
            Some(stats) => {
                let series = stats.series(x, y);
                if series.is_none() {
                    warn!("The evaluated data has no column {} or {}", x, y);
                }
                series
            }
            None => {
                warn!(
                    "The runs are not evaluated. Please run evaluate() on this experiment, \
                     or use the logs of the runs."
                );
                None
            }
        }
    }

    /// Mean episode return against environment steps, across runs.
    ///
    /// The band is the standard deviation across runs, if there is more than one run.
    pub fn reward_over_timesteps(&self) -> Option<Series> {
        self.series(TIMESTEPS_SO_FAR, EVAL_REW_MEAN)
    }

    /// Mean episode return against generations, across runs.
    pub fn reward_over_generations(&self) -> Option<Series> {
        self.series(GENERATION, EVAL_REW_MEAN)
    }

    /// Environment steps against elapsed time, across runs.
    pub fn timesteps_over_time_elapsed(&self) -> Option<Series> {
        self.series(TIME_ELAPSED, TIMESTEPS_SO_FAR)
    }
}

impl<E, L> Experiment<E, L>
where
    E: Env + 'static,
    E::Config: Send + 'static,
    L: PolicyLoader<E> + 'static,
{
    /// Evaluates all runs and computes the statistics across runs.
    ///
    /// Runs are evaluated one after another with the same options. Returns `None`
    /// if any run can not be evaluated; no partial aggregate is computed.
    pub fn evaluate(&mut self, opts: &EvaluateOptions) -> Result<Option<&CrossRunStats>> {
        opts.validate()?;

        if self.runs.is_empty() {
            warn!("The experiment has no runs to evaluate");
            return Ok(None);
        }

        let needs_rollouts = opts.force || self.runs.iter().any(|r| r.data().is_none());
        if needs_rollouts && self.runs.iter().any(|r| !r.has_checkpoints()) {
            warn!(
                "Some runs do not provide checkpoint files, therefore the experiment can not \
                 be evaluated. Please provide at least one checkpoint file per run."
            );
            return Ok(None);
        }

        for run in self.runs.iter_mut() {
            if run.evaluate(opts)?.is_none() {
                warn!(
                    "The run in {:?} could not be evaluated. Stopping.",
                    run.save_dir()
                );
                return Ok(None);
            }
        }

        self.aggregate();
        Ok(self.stats.as_ref())
    }

    /// Records a video with the first run able to do so.
    pub fn visualize(&mut self, force: bool) -> Result<Option<PathBuf>> {
        for run in self.runs.iter_mut() {
            if let Some(video_file) = run.visualize(force)? {
                self.video_file = Some(video_file.clone());
                return Ok(Some(video_file));
            }
        }

        warn!(
            "The runs do not provide checkpoint files, therefore the experiment can not be \
             visualized. Please provide at least one checkpoint file so a video can be recorded."
        );
        Ok(None)
    }
}
