#![deny(missing_docs)]
//! Resumable experiment runner.
//!
//! An [`ExperimentRunner`] resolves the output directory of a run, loads or
//! creates its input data and parameter tree, decides between a fresh solve,
//! a resumed solve and reusing a prior result, and hands the settled run to
//! the [`Experiment`] hooks. All state lives in the output directory, so the
//! same invocation against the same directory is cumulative and restartable.

/// YAML runner configuration and plot modes.
pub mod config;
/// Injected clock, registry and interrupt flag.
pub mod context;
pub mod experiment;
pub mod logging;
pub mod runner;

pub use config::{PlotMode, RunnerConfig};
pub use context::RunContext;
pub use experiment::{Experiment, RunView, TruthReport};
pub use logging::{RunLog, LOG_ENV};
pub use runner::{ExperimentRunner, RunAction, RunOutcome, RunPhase, RunRequest};
