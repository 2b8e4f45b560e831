//! Environment.
use super::{Act, Info, Obs, Step};
use anyhow::{anyhow, Result};
use std::path::Path;

/// Represents an environment, typically an MDP.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    ///
    /// A failure here means the environment itself is broken, and is never
    /// treated as a property of the evaluated policy.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performes an environment step.
    fn step(&mut self, a: &Self::Act) -> Step<Self>
    where
        Self: Sized;

    /// Switches the environment into recording mode.
    ///
    /// After this call, the environment writes exactly one video file into `dir`
    /// when the current episode ends. The file name is chosen by the environment;
    /// callers find the file by listing `dir`.
    ///
    /// The default implementation returns an error, as most environments can not
    /// render.
    fn record_video(&mut self, dir: &Path) -> Result<()> {
        Err(anyhow!(
            "Recording is not supported by this environment (requested {:?})",
            dir
        ))
    }
}
