//! Batch backend: one dense KKT factorization per solve.
//!
//! The system
//!
//! ```text
//! [ Q  Eᵀ ] [x]   [c]
//! [ E  0  ] [ν] = [d]
//! ```
//!
//! is solved in one call. A warm start only pre-loads the variables; there is
//! no iterate to snapshot and an interrupt cannot preserve partial progress.

use rep_core::{param_f64, ErrorInfo, ParamSchema, ParamSpec, RepError};
use tracing::{debug, info, warn};

use crate::adapter::SolverParams;
use crate::interrupt::InterruptFlag;
use crate::linalg::{solve_dense, Matrix};
use crate::problem::QuadraticProgram;
use crate::state::{PrimalDual, SolveStatus, SolverDiagnostics};

const BACKEND: &str = "direct";

/// Options declared by the batch backend.
pub fn schema() -> ParamSchema {
    ParamSchema::new(BACKEND).with(ParamSpec::float(
        "pivot_tol",
        1e-12,
        "pivots below this magnitude mark the system singular",
    ))
}

/// Batch backend holding its program and current variables.
#[derive(Debug, Clone)]
pub struct DirectSolver {
    program: QuadraticProgram,
    state: PrimalDual,
}

impl DirectSolver {
    /// Sets up the backend for `program`.
    pub fn new(program: QuadraticProgram) -> Result<Self, RepError> {
        let n = program.num_variables();
        if program.q.rows() != n || program.q.cols() != n {
            return Err(RepError::Solver(
                ErrorInfo::new("qp-shape", "Q must be square and match c")
                    .with_context("q", format!("{}x{}", program.q.rows(), program.q.cols()))
                    .with_context("c", n.to_string()),
            ));
        }
        if let Some((e, d)) = &program.equality {
            if e.cols() != n || e.rows() != d.len() {
                return Err(RepError::Solver(
                    ErrorInfo::new("qp-shape", "equality constraints do not match")
                        .with_context("e", format!("{}x{}", e.rows(), e.cols()))
                        .with_context("d", d.len().to_string()),
                ));
            }
        }
        let state = PrimalDual::zeros(n, program.num_constraints());
        Ok(Self { program, state })
    }

    /// Current variables.
    pub fn state(&self) -> &PrimalDual {
        &self.state
    }

    /// Program being solved.
    pub fn program(&self) -> &QuadraticProgram {
        &self.program
    }

    /// Factorizes and solves the KKT system.
    pub fn solve(
        &mut self,
        params: &SolverParams,
        interrupt: &InterruptFlag,
    ) -> Result<SolverDiagnostics, RepError> {
        let resolved = schema().resolve(&params.options)?;
        let pivot_tol = param_f64(&resolved, BACKEND, "pivot_tol")?;
        if let Some(prior) = &params.continue_at {
            debug!(prior = ?prior.shape(), "direct pre-load");
            self.state.warm_from(prior);
        }

        if interrupt.is_raised() {
            info!("direct solve interrupted before factorization");
            return Ok(self.diagnostics(SolveStatus::Interrupted, 0));
        }

        let n = self.program.num_variables();
        let m = self.program.num_constraints();
        let (kkt, rhs) = self.assemble();
        match solve_dense(&kkt, &rhs, pivot_tol) {
            Some(solution) => {
                self.state = PrimalDual {
                    primal: solution[..n].to_vec(),
                    dual: solution[n..n + m].to_vec(),
                };
                Ok(self.diagnostics(SolveStatus::Converged, 1))
            }
            None => {
                let status = if m > 0 {
                    SolveStatus::Infeasible
                } else {
                    SolveStatus::Unbounded
                };
                warn!(status = status.as_str(), "direct KKT system is singular");
                Ok(self.diagnostics(status, 1))
            }
        }
    }

    fn assemble(&self) -> (Matrix, Vec<f64>) {
        let n = self.program.num_variables();
        let m = self.program.num_constraints();
        let mut kkt = Matrix::zeros(n + m, n + m);
        for i in 0..n {
            for j in 0..n {
                kkt.set(i, j, self.program.q.get(i, j));
            }
        }
        let mut rhs = self.program.c.clone();
        if let Some((e, d)) = &self.program.equality {
            for r in 0..m {
                for j in 0..n {
                    let value = e.get(r, j);
                    kkt.set(n + r, j, value);
                    kkt.set(j, n + r, value);
                }
            }
            rhs.extend_from_slice(d);
        }
        (kkt, rhs)
    }

    fn diagnostics(&self, status: SolveStatus, iterations: usize) -> SolverDiagnostics {
        SolverDiagnostics {
            backend: BACKEND.to_string(),
            status,
            objective: Some(self.program.objective(&self.state.primal)),
            iterations,
            residual: None,
        }
    }
}
