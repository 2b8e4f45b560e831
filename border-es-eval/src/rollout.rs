//! Execution of a single rollout of a checkpointed policy.
use anyhow::Result;
use border_core::{Act, Env, Policy, PolicyLoader};
use log::debug;
use std::{marker::PhantomData, path::Path, sync::Arc};

/// Outcome of a rollout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RolloutResult {
    /// The episode ended normally.
    Completed {
        /// Sum of the rewards over the episode.
        reward: f64,

        /// The number of steps in the episode.
        length: usize,
    },

    /// The policy emitted an invalid action, e.g., one containing `NaN`.
    NonFinite,
}

/// Runs one episode of a checkpointed policy on a fresh environment.
///
/// The executor is cheap to clone and is sent to worker threads. The environment
/// and the policy are constructed on the thread running the rollout.
pub struct RolloutExecutor<E, L>
where
    E: Env,
    L: PolicyLoader<E>,
{
    env_config: E::Config,
    loader: Arc<L>,
    phantom: PhantomData<fn() -> E>,
}

impl<E, L> Clone for RolloutExecutor<E, L>
where
    E: Env,
    L: PolicyLoader<E>,
{
    fn clone(&self) -> Self {
        Self {
            env_config: self.env_config.clone(),
            loader: self.loader.clone(),
            phantom: PhantomData,
        }
    }
}

impl<E, L> RolloutExecutor<E, L>
where
    E: Env,
    L: PolicyLoader<E>,
{
    /// Constructs an executor.
    pub fn new(env_config: E::Config, loader: Arc<L>) -> Self {
        Self {
            env_config,
            loader,
            phantom: PhantomData,
        }
    }

    /// Runs an episode with the policy restored from `checkpoint`.
    ///
    /// If `video_dir` is given, the environment writes a video of the episode into
    /// that directory.
    ///
    /// An invalid action ends the rollout with [`RolloutResult::NonFinite`].
    /// Failures to construct the environment or to load the policy are returned
    /// as errors.
    pub fn run(&self, checkpoint: &Path, video_dir: Option<&Path>) -> Result<RolloutResult> {
        let seed = fastrand::i64(0..i64::MAX);
        let mut env = E::build(&self.env_config, seed)?;
        if let Some(dir) = video_dir {
            env.record_video(dir)?;
        }
        let mut policy = self.loader.load(checkpoint)?;

        let mut obs = env.reset()?;
        let mut r_total = 0f64;
        let mut length = 0;

        loop {
            let act = policy.sample(&obs);
            if !act.is_valid() {
                debug!(
                    "Invalid action {:?} at step {} of {:?}",
                    act, length, checkpoint
                );
                return Ok(RolloutResult::NonFinite);
            }

            let step = env.step(&act);
            r_total += step.reward as f64;
            length += 1;
            if step.is_done() {
                break;
            }
            obs = step.obs;
        }

        debug!(
            "Rollout of {:?} (seed {}): reward = {}, length = {}",
            checkpoint, seed, r_total, length
        );
        Ok(RolloutResult::Completed {
            reward: r_total,
            length,
        })
    }
}
