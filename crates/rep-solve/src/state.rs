use serde::{Deserialize, Serialize};

/// Primal/dual iterate shared by every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PrimalDual {
    /// Primal variables.
    pub primal: Vec<f64>,
    /// Dual variables (multipliers or saddle-point duals).
    pub dual: Vec<f64>,
}

impl PrimalDual {
    /// Zero state of the given shape.
    pub fn zeros(primal: usize, dual: usize) -> Self {
        Self {
            primal: vec![0.0; primal],
            dual: vec![0.0; dual],
        }
    }

    /// Copies as much of `prior` as fits into the current shape.
    ///
    /// Entries beyond the overlap keep their current value, so a prior state of a
    /// different dimension still provides a best-effort warm start.
    pub fn warm_from(&mut self, prior: &PrimalDual) {
        copy_overlap(&mut self.primal, &prior.primal);
        copy_overlap(&mut self.dual, &prior.dual);
    }

    /// `(primal, dual)` lengths.
    pub fn shape(&self) -> (usize, usize) {
        (self.primal.len(), self.dual.len())
    }
}

fn copy_overlap(dest: &mut [f64], src: &[f64]) {
    let n = dest.len().min(src.len());
    dest[..n].copy_from_slice(&src[..n]);
}

/// Terminal status reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStatus {
    /// Convergence criterion met.
    Converged,
    /// Iteration budget exhausted before convergence.
    MaxIterations,
    /// Stopped by an interrupt; the state holds the best-known iterate, if any.
    Interrupted,
    /// The backend proved the problem infeasible.
    Infeasible,
    /// The backend proved the problem unbounded.
    Unbounded,
    /// Iterates stopped being finite; the state holds the last recorded finite iterate.
    Diverged,
}

impl SolveStatus {
    /// Whether the status denotes an inconclusive solve.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SolveStatus::Interrupted
                | SolveStatus::Infeasible
                | SolveStatus::Unbounded
                | SolveStatus::Diverged
        )
    }

    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Converged => "converged",
            SolveStatus::MaxIterations => "max-iterations",
            SolveStatus::Interrupted => "interrupted",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Diverged => "diverged",
        }
    }
}

/// Diagnostics reported alongside a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    /// Backend that produced the diagnostics.
    pub backend: String,
    /// Terminal (or current) status.
    pub status: SolveStatus,
    /// Objective value at the reported state.
    pub objective: Option<f64>,
    /// Iterations performed in this solve call.
    pub iterations: usize,
    /// Convergence residual at the reported state.
    pub residual: Option<f64>,
}
