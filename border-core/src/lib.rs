#![warn(missing_docs)]
//! Interfaces between a checkpoint evaluator and the simulated environments
//! and policies it drives.
//!
//! The evaluator in `border-es-eval` never constructs environments or reads
//! checkpoint files by itself. It goes through the traits defined here:
//!
//! * [`Env`] - a simulated environment, built from a configuration and a seed
//! * [`Policy`] - a mapping from observations to actions
//! * [`PolicyLoader`] - restores a [`Policy`] from a checkpoint file
//!
//! The [`dummy`] module provides scripted implementations used in tests.
mod base;
pub use base::{Act, Env, Info, Obs, Policy, PolicyLoader, Step};

pub mod dummy;
