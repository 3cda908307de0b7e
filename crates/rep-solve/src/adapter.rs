use std::fmt;
use std::str::FromStr;

use rep_core::{ErrorInfo, ParamMap, ParamSchema, RepError};

use crate::direct::{self, DirectSolver};
use crate::interrupt::InterruptFlag;
use crate::pdhg::{self, PdhgSolver};
use crate::problem::{QuadraticProgram, SaddlePoint};
use crate::state::{PrimalDual, SolverDiagnostics};

/// Available solver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Iterative primal-dual hybrid gradient.
    Pdhg,
    /// Batch KKT factorization.
    Direct,
}

impl BackendKind {
    /// Every backend, in listing order.
    pub fn all() -> [BackendKind; 2] {
        [BackendKind::Pdhg, BackendKind::Direct]
    }

    /// Registry name of the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Pdhg => "pdhg",
            BackendKind::Direct => "direct",
        }
    }

    /// Options the backend accepts.
    pub fn schema(&self) -> ParamSchema {
        match self {
            BackendKind::Pdhg => pdhg::schema(),
            BackendKind::Direct => direct::schema(),
        }
    }

    /// Validates `options` against the schema and the backend's value ranges.
    pub fn check_options(&self, options: &ParamMap) -> Result<(), RepError> {
        match self {
            BackendKind::Pdhg => pdhg::check_options(options),
            BackendKind::Direct => direct::schema().resolve(options).map(drop),
        }
    }

    /// Whether the backend iterates and can report snapshots.
    pub fn is_iterative(&self) -> bool {
        matches!(self, BackendKind::Pdhg)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = RepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdhg" => Ok(BackendKind::Pdhg),
            "direct" => Ok(BackendKind::Direct),
            other => Err(RepError::Config(
                ErrorInfo::new("unknown-solver", format!("unknown solver '{other}'"))
                    .with_hint("available solvers: pdhg, direct"),
            )),
        }
    }
}

/// Options handed to a solve call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverParams {
    /// Backend options, validated against [`BackendKind::schema`].
    pub options: ParamMap,
    /// Prior state to continue from.
    pub continue_at: Option<PrimalDual>,
}

impl SolverParams {
    /// Options without a continuation state.
    pub fn new(options: ParamMap) -> Self {
        Self {
            options,
            continue_at: None,
        }
    }

    /// Sets the continuation state.
    pub fn continue_at(mut self, state: PrimalDual) -> Self {
        self.continue_at = Some(state);
        self
    }
}

/// Receives intermediate iterates while an iterative backend runs.
pub trait SnapshotObserver {
    /// Called with the iteration index, the raw state and the diagnostics so far.
    fn on_iteration(
        &mut self,
        iteration: usize,
        state: &PrimalDual,
        diagnostics: &SolverDiagnostics,
    );
}

impl<F> SnapshotObserver for F
where
    F: FnMut(usize, &PrimalDual, &SolverDiagnostics),
{
    fn on_iteration(
        &mut self,
        iteration: usize,
        state: &PrimalDual,
        diagnostics: &SolverDiagnostics,
    ) {
        self(iteration, state, diagnostics)
    }
}

/// A backend after setup.
#[derive(Debug, Clone)]
pub enum SolverAdapter {
    /// Iterative backend.
    Pdhg(PdhgSolver),
    /// Batch backend.
    Direct(DirectSolver),
}

impl SolverAdapter {
    /// Sets up the iterative backend.
    pub fn pdhg(problem: SaddlePoint) -> Result<Self, RepError> {
        PdhgSolver::new(problem).map(SolverAdapter::Pdhg)
    }

    /// Sets up the batch backend.
    pub fn direct(program: QuadraticProgram) -> Result<Self, RepError> {
        DirectSolver::new(program).map(SolverAdapter::Direct)
    }

    /// Backend kind.
    pub fn kind(&self) -> BackendKind {
        match self {
            SolverAdapter::Pdhg(_) => BackendKind::Pdhg,
            SolverAdapter::Direct(_) => BackendKind::Direct,
        }
    }

    /// Current raw state.
    pub fn state(&self) -> &PrimalDual {
        match self {
            SolverAdapter::Pdhg(solver) => solver.state(),
            SolverAdapter::Direct(solver) => solver.state(),
        }
    }

    /// Solves, reporting intermediate iterates to `observer` where supported.
    ///
    /// Infeasible and unbounded problems are reported through the returned
    /// diagnostics, never as an error.
    pub fn solve(
        &mut self,
        params: &SolverParams,
        observer: Option<&mut dyn SnapshotObserver>,
        interrupt: &InterruptFlag,
    ) -> Result<SolverDiagnostics, RepError> {
        match self {
            SolverAdapter::Pdhg(solver) => solver.solve(params, observer, interrupt),
            SolverAdapter::Direct(solver) => solver.solve(params, interrupt),
        }
    }
}
