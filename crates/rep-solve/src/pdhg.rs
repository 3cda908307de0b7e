//! Iterative primal-dual hybrid gradient backend.
//!
//! Solves `min_x G(x) + F(Kx)` through the saddle-point iteration
//!
//! ```text
//! y⁺ = prox_{σF*}(y + σ K x̄)
//! x⁺ = prox_{τG}(x − τ Kᵀ y⁺)
//! x̄  = 2x⁺ − x
//! ```
//!
//! with `τ = σ = step_scale / ‖K‖`. Every `granularity` iterations the
//! convergence test runs and the observer, if any, sees the current iterate.
//! An interrupt stops the loop at the next iteration and keeps the last
//! iterate, so partial progress is never lost. An iterate that is no longer
//! finite stops the loop with status `diverged`, keeping the iterate before it.

use rep_core::{
    param_f64, param_usize, ErrorInfo, ParamMap, ParamSchema, ParamSpec, RepError,
};
use tracing::{debug, info, warn};

use crate::adapter::{SnapshotObserver, SolverParams};
use crate::interrupt::InterruptFlag;
use crate::linalg::{distance, norm2};
use crate::problem::SaddlePoint;
use crate::state::{PrimalDual, SolveStatus, SolverDiagnostics};

const BACKEND: &str = "pdhg";
const NORM_ITERATIONS: usize = 64;

/// Options declared by the iterative backend.
pub fn schema() -> ParamSchema {
    ParamSchema::new(BACKEND)
        .with(ParamSpec::int("iterations", 5000, "maximum number of iterations"))
        .with(ParamSpec::float("tol", 1e-6, "relative change at which to stop"))
        .with(ParamSpec::int(
            "granularity",
            50,
            "iterations between convergence checks and snapshots",
        ))
        .with(ParamSpec::float("step_scale", 0.95, "step size as a fraction of 1/‖K‖"))
}

#[derive(Debug, Clone, PartialEq)]
struct PdhgConfig {
    iterations: usize,
    tol: f64,
    granularity: usize,
    step_scale: f64,
}

impl PdhgConfig {
    fn from_params(options: &ParamMap) -> Result<Self, RepError> {
        let resolved = schema().resolve(options)?;
        let step_scale = param_f64(&resolved, BACKEND, "step_scale")?;
        if !(step_scale > 0.0 && step_scale <= 1.0) {
            return Err(RepError::Params(
                ErrorInfo::new("param-range", "parameter 'step_scale' must lie in (0, 1]")
                    .with_context("owner", BACKEND)
                    .with_context("value", step_scale.to_string()),
            ));
        }
        Ok(Self {
            iterations: param_usize(&resolved, BACKEND, "iterations")?,
            tol: param_f64(&resolved, BACKEND, "tol")?,
            granularity: param_usize(&resolved, BACKEND, "granularity")?.max(1),
            step_scale,
        })
    }
}

/// Checks iterative backend options, including value ranges, without solving.
pub fn check_options(options: &ParamMap) -> Result<(), RepError> {
    PdhgConfig::from_params(options).map(drop)
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|value| value.is_finite())
}

/// Iterative backend holding its problem and current iterate.
#[derive(Debug, Clone)]
pub struct PdhgSolver {
    problem: SaddlePoint,
    state: PrimalDual,
    op_norm: f64,
}

impl PdhgSolver {
    /// Sets up the backend for `problem`.
    pub fn new(problem: SaddlePoint) -> Result<Self, RepError> {
        problem.validate()?;
        let op_norm = problem.op.norm_estimate(NORM_ITERATIONS);
        debug!(op_norm, rows = problem.op.rows(), cols = problem.op.cols(), "pdhg setup");
        let state = PrimalDual::zeros(problem.op.cols(), problem.op.rows());
        Ok(Self {
            problem,
            state,
            op_norm,
        })
    }

    /// Current iterate.
    pub fn state(&self) -> &PrimalDual {
        &self.state
    }

    /// Problem being solved.
    pub fn problem(&self) -> &SaddlePoint {
        &self.problem
    }

    /// Runs the iteration until convergence, the iteration cap or an interrupt.
    pub fn solve(
        &mut self,
        params: &SolverParams,
        mut observer: Option<&mut dyn SnapshotObserver>,
        interrupt: &InterruptFlag,
    ) -> Result<SolverDiagnostics, RepError> {
        let config = PdhgConfig::from_params(&params.options)?;
        if let Some(prior) = &params.continue_at {
            debug!(prior = ?prior.shape(), current = ?self.state.shape(), "pdhg warm start");
            self.state.warm_from(prior);
        }

        let step = if self.op_norm > 0.0 {
            config.step_scale / self.op_norm
        } else {
            1.0
        };
        let (tau, sigma) = (step, step);

        let mut x = self.state.primal.clone();
        let mut y = self.state.dual.clone();
        let mut x_bar = x.clone();
        let mut status = SolveStatus::MaxIterations;
        let mut residual = None;
        let mut performed = 0;

        for iteration in 1..=config.iterations {
            if interrupt.is_raised() {
                info!(iteration, "pdhg interrupted, keeping last iterate");
                status = SolveStatus::Interrupted;
                break;
            }

            let k_x = self.problem.op.apply(&x_bar);
            let mut y_next: Vec<f64> = y.iter().zip(&k_x).map(|(a, b)| a + sigma * b).collect();
            self.problem.conj_prox(&mut y_next, sigma);

            let kt_y = self.problem.op.apply_transpose(&y_next);
            let mut x_next: Vec<f64> = x.iter().zip(&kt_y).map(|(a, b)| a - tau * b).collect();
            self.problem.g.prox(&mut x_next, tau);

            if !all_finite(&x_next) || !all_finite(&y_next) {
                warn!(iteration, "pdhg iterate is no longer finite, stopping");
                status = SolveStatus::Diverged;
                residual = None;
                break;
            }

            x_bar = x_next
                .iter()
                .zip(&x)
                .map(|(new, old)| 2.0 * new - old)
                .collect();
            performed = iteration;

            let checkpoint = iteration % config.granularity == 0 || iteration == config.iterations;
            if checkpoint {
                let change = relative_change(&x_next, &x).max(relative_change(&y_next, &y));
                residual = Some(change).filter(|value| value.is_finite());
                self.state = PrimalDual {
                    primal: x_next.clone(),
                    dual: y_next.clone(),
                };
                let converged = change < config.tol;
                if converged {
                    status = SolveStatus::Converged;
                }
                if let Some(observer) = observer.as_deref_mut() {
                    let progress = self.diagnostics(status, iteration, residual);
                    observer.on_iteration(iteration, &self.state, &progress);
                }
                debug!(iteration, change, "pdhg progress");
                if converged {
                    x = x_next;
                    y = y_next;
                    break;
                }
            }
            x = x_next;
            y = y_next;
        }

        self.state = PrimalDual { primal: x, dual: y };
        Ok(self.diagnostics(status, performed, residual))
    }

    fn diagnostics(
        &self,
        status: SolveStatus,
        iterations: usize,
        residual: Option<f64>,
    ) -> SolverDiagnostics {
        SolverDiagnostics {
            backend: BACKEND.to_string(),
            status,
            objective: Some(self.problem.objective(&self.state.primal))
                .filter(|value| value.is_finite()),
            iterations,
            residual,
        }
    }
}

fn relative_change(next: &[f64], prev: &[f64]) -> f64 {
    distance(next, prev) / norm2(next).max(1.0)
}
