//! Scripted environment and policy, used in tests.
//!
//! [`DummyEnv`] pays the sum of the action values as reward at every step and
//! truncates the episode after a fixed number of steps. [`DummyPolicyLoader`]
//! reads a checkpoint file holding whitespace-separated action values, so a test
//! controls the outcome of a rollout by the content of the file. A checkpoint
//! containing `NaN` yields a policy emitting invalid actions.
//!
//! A checkpoint file can hold one line of action values per rollout. The `i`-th
//! load of the file, counted by the loader, reads line `i` modulo the number of
//! lines.
use crate::{Act, Env, Obs, Policy, PolicyLoader, Step};
use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

#[derive(Clone, Debug)]
/// Dummy observation, holding the number of steps taken in the episode.
pub struct DummyObs(pub usize);

impl Obs for DummyObs {}

#[derive(Clone, Debug)]
/// Dummy action.
pub struct DummyAct(pub Vec<f32>);

impl Act for DummyAct {
    fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|v| v.is_finite())
    }
}

/// Configuration of [`DummyEnv`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DummyEnvConfig {
    /// Number of steps before the episode is truncated.
    pub episode_len: usize,

    /// Amplitude of uniform noise added to the reward of each step.
    pub reward_noise: f32,

    /// If `true`, [`DummyEnv::build`] fails.
    pub fail_on_build: bool,
}

impl Default for DummyEnvConfig {
    fn default() -> Self {
        Self {
            episode_len: 10,
            reward_noise: 0.0,
            fail_on_build: false,
        }
    }
}

impl DummyEnvConfig {
    /// Sets the episode length.
    pub fn episode_len(mut self, v: usize) -> Self {
        self.episode_len = v;
        self
    }

    /// Sets the amplitude of reward noise.
    pub fn reward_noise(mut self, v: f32) -> Self {
        self.reward_noise = v;
        self
    }

    /// Makes the construction of the environment fail.
    pub fn fail_on_build(mut self, v: bool) -> Self {
        self.fail_on_build = v;
        self
    }
}

/// Dummy env.
pub struct DummyEnv {
    config: DummyEnvConfig,
    seed: i64,
    n_steps: usize,
    rng: fastrand::Rng,
    video_dir: Option<PathBuf>,
}

impl DummyEnv {
    /// Writes the video file if recording was requested.
    fn write_video(&mut self) {
        if let Some(dir) = self.video_dir.take() {
            let path = dir.join(format!("dummy.video.{}.mp4", self.seed));
            if let Err(e) = fs::write(&path, format!("{} steps", self.n_steps)) {
                warn!("Failed to write video file {:?}: {}", path, e);
            }
        }
    }
}

impl Env for DummyEnv {
    type Config = DummyEnvConfig;
    type Obs = DummyObs;
    type Act = DummyAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if config.fail_on_build {
            return Err(anyhow!("DummyEnv is configured to fail on build"));
        }

        Ok(Self {
            config: config.clone(),
            seed,
            n_steps: 0,
            rng: fastrand::Rng::with_seed(seed as u64),
            video_dir: None,
        })
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.n_steps = 0;
        Ok(DummyObs(0))
    }

    fn step(&mut self, a: &Self::Act) -> Step<Self> {
        self.n_steps += 1;
        let noise = self.config.reward_noise * (2.0 * self.rng.f32() - 1.0);
        let reward = a.0.iter().sum::<f32>() + noise;
        let is_truncated = self.n_steps >= self.config.episode_len;

        if is_truncated {
            self.write_video();
        }

        Step::new(DummyObs(self.n_steps), reward, false, is_truncated, ())
    }

    fn record_video(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(anyhow!("Video directory {:?} does not exist", dir));
        }
        self.video_dir = Some(dir.to_path_buf());
        Ok(())
    }
}

/// Policy emitting a constant action.
pub struct DummyPolicy {
    act: DummyAct,
}

impl Policy<DummyEnv> for DummyPolicy {
    fn sample(&mut self, _obs: &DummyObs) -> DummyAct {
        self.act.clone()
    }
}

/// Loads [`DummyPolicy`] from a text file of action values.
///
/// Clones share the count of loads per checkpoint file.
#[derive(Clone, Debug, Default)]
pub struct DummyPolicyLoader {
    n_loads: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl DummyPolicyLoader {
    /// Saves a checkpoint file from which [`DummyPolicy`] emitting `act` is loaded.
    pub fn save(path: impl AsRef<Path>, act: &[f32]) -> Result<()> {
        Self::save_script(path, &[act.to_vec()])
    }

    /// Saves a checkpoint file whose `i`-th load emits `acts[i % acts.len()]`.
    pub fn save_script(path: impl AsRef<Path>, acts: &[Vec<f32>]) -> Result<()> {
        let text = acts
            .iter()
            .map(|act| {
                act.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(path.as_ref(), text)
            .with_context(|| format!("Failed to write checkpoint {:?}", path.as_ref()))
    }

    fn next_index(&self, path: &Path) -> Result<usize> {
        let mut n_loads = self
            .n_loads
            .lock()
            .map_err(|_| anyhow!("Load counter of DummyPolicyLoader is poisoned"))?;
        let n = n_loads.entry(path.to_path_buf()).or_insert(0);
        *n += 1;
        Ok(*n - 1)
    }
}

impl PolicyLoader<DummyEnv> for DummyPolicyLoader {
    type Policy = DummyPolicy;

    fn load(&self, path: &Path) -> Result<Self::Policy> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint {:?}", path))?;
        let lines = text.lines().collect::<Vec<_>>();
        let ix = self.next_index(path)?;
        let line = match lines.len() {
            0 => "",
            n => lines[ix % n],
        };
        let act = line
            .split_whitespace()
            .map(|s| s.parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Malformed checkpoint {:?}", path))?;
        Ok(DummyPolicy { act: DummyAct(act) })
    }
}
