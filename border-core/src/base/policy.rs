//! Policy.
use super::Env;
use anyhow::Result;
use std::path::Path;

/// A policy on an environment.
///
/// Policy is a mapping from an observation to an action.
/// The mapping can be either of deterministic or stochastic.
pub trait Policy<E: Env> {
    /// Sample an action given an observation.
    fn sample(&mut self, obs: &E::Obs) -> E::Act;
}

/// Restores a [`Policy`] from a checkpoint file.
///
/// A single loader is shared by all worker threads of an evaluation, hence the
/// `Send + Sync` bound. Each call returns a fresh policy owned by the caller.
pub trait PolicyLoader<E: Env>: Send + Sync {
    /// The policy restored from a checkpoint.
    type Policy: Policy<E>;

    /// Loads the policy saved in `path`.
    fn load(&self, path: &Path) -> Result<Self::Policy>;
}
