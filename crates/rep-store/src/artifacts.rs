use rep_core::RunProvenance;
use rep_solve::{PrimalDual, SolverDiagnostics};
use serde::{Deserialize, Serialize};

/// Final outcome of a solve, persisted as `result.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Raw solver state.
    pub data: PrimalDual,
    /// Diagnostics reported by the backend.
    pub details: SolverDiagnostics,
    /// Hashes and timestamp identifying the inputs.
    #[serde(default)]
    pub provenance: RunProvenance,
}

/// Intermediate iterate captured while solving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Iteration at which the snapshot was taken.
    pub index: usize,
    /// Post-processed state.
    pub data: PrimalDual,
    /// Diagnostics reported so far.
    pub details: SolverDiagnostics,
}
