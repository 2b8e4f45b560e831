#![warn(missing_docs)]
//! Evaluation of checkpointed policies and aggregation across training runs.
//!
//! A training run saves a checkpoint of its policy at the end of some
//! generations, together with a log of the training. This crate
//!
//! 1. runs several stochastic rollouts of each checkpoint on a pool of worker
//!    threads ([`RolloutExecutor`], [`WorkerPool`]),
//! 2. reduces the rollouts of a checkpoint to one row of statistics and joins
//!    the rows with the training log ([`TrainingRun`]),
//! 3. computes the mean and standard deviation across runs differing only by
//!    random seed ([`Experiment`]).
//!
//! Environments and policies are accessed through the traits of [`border_core`].
//!
//! ```no_run
//! use anyhow::Result;
//! use border_core::dummy::{DummyEnv, DummyEnvConfig, DummyPolicyLoader};
//! use border_es_eval::{EvaluateOptions, Experiment, ExperimentConfig};
//! use std::sync::Arc;
//!
//! fn main() -> Result<()> {
//!     env_logger::init();
//!
//!     let config = Arc::new(ExperimentConfig::new(DummyEnvConfig::default()));
//!     let loader = Arc::new(DummyPolicyLoader::default());
//!     let mut experiment = Experiment::<DummyEnv, _>::load(
//!         config,
//!         loader,
//!         &["runs/seed0", "runs/seed1", "runs/seed2"],
//!     )?;
//!
//!     let opts = EvaluateOptions::default().repeat_count(5).persist(true);
//!     if let Some(stats) = experiment.evaluate(&opts)? {
//!         for (m, s) in stats.mean().iter().zip(stats.std().iter()) {
//!             println!("{:?} {:?}", m, s);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
pub mod checkpoint;
mod config;
mod error;
mod experiment;
mod pool;
mod rollout;
mod run;
pub mod stats;
pub mod table;
pub use config::{EvaluateOptions, EvaluatorConfig, ExperimentConfig};
pub use error::EvalError;
pub use experiment::Experiment;
pub use pool::{JobHandle, WorkerPool};
pub use rollout::{RolloutExecutor, RolloutResult};
pub use run::{RunData, TrainingRun};
