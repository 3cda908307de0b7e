//! Hooks run after the result of an experiment is settled.

use std::path::Path;

use rep_core::{ParameterTree, RepError};
use rep_models::InputData;
use rep_solve::norm2;
use rep_store::{RunResult, Snapshot};
use tracing::info;

use crate::config::PlotMode;

/// Settled state of a run, as seen by the hooks.
#[derive(Debug, Clone, Copy)]
pub struct RunView<'a> {
    /// Output directory of the run.
    pub output_dir: &'a Path,
    /// Persisted parameter tree.
    pub params: &'a ParameterTree,
    /// Input data.
    pub data: &'a InputData,
    /// Final result.
    pub result: &'a RunResult,
    /// Snapshots in creation order.
    pub snapshots: &'a [Snapshot],
}

/// Extension points of a concrete experiment.
///
/// The runner calls `postprocess` and then `plot`, each exactly once, after
/// data, parameters and result are final.
pub trait Experiment {
    /// Derives secondary quantities from the result.
    fn postprocess(&mut self, _run: &RunView<'_>) -> Result<(), RepError> {
        Ok(())
    }

    /// Renders figures according to `mode`.
    fn plot(&mut self, _run: &RunView<'_>, _mode: PlotMode) -> Result<(), RepError> {
        Ok(())
    }
}

/// Logs how far the solution is from the known ground truth.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruthReport;

impl Experiment for TruthReport {
    fn postprocess(&mut self, run: &RunView<'_>) -> Result<(), RepError> {
        let Some(truth) = run.data.truth.as_deref() else {
            return Ok(());
        };
        let estimate = &run.result.data.primal;
        if estimate.len() != truth.len() {
            return Ok(());
        }
        let error: Vec<f64> = estimate.iter().zip(truth).map(|(a, b)| a - b).collect();
        let relative = norm2(&error) / norm2(truth).max(f64::EPSILON);
        info!(
            relative_error = relative,
            objective = ?run.result.details.objective,
            snapshots = run.snapshots.len(),
            "distance to ground truth"
        );
        Ok(())
    }
}
