//! Stage execution: the [`Runner`] interface the scheduler drives, plus
//! container image reference parsing.
//!
//! The scheduler treats a run as an opaque, exit-code-returning activity:
//! one `init → start → wait → destroy` cycle per dispatched stage. Image
//! pulling and container execution proper live behind this boundary.

pub mod image;
pub mod runner;

pub use image::{ImageError, ImageRef};
pub use runner::{
    DryRunFactory, DryRunner, ProcessRunner, ProcessRunnerFactory, Runner, RunnerConfig,
    RunnerError, RunnerFactory,
};
