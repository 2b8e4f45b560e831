//! Core functionalities.
mod env;
mod policy;
mod step;
pub use env::Env;
pub use policy::{Policy, PolicyLoader};
use std::fmt::Debug;
pub use step::{Info, Step};

/// An observation of an environment.
pub trait Obs: Clone + Debug {}

/// An action applied to an environment.
pub trait Act: Clone + Debug {
    /// Returns `false` if the action can not be applied to the environment.
    ///
    /// A trained policy can emit actions containing non-finite values, for example
    /// when its parameters diverged during training. Such an action is invalid and
    /// ends the rollout with a failure instead of being passed to [`Env::step`].
    fn is_valid(&self) -> bool;
}
