//! Model formulations and the solve lifecycle around them.

use std::fmt;

use rep_core::{param_f64, ErrorInfo, ParamMap, ParamSchema, ParamSpec, RepError, RngHandle};
use rep_solve::{
    BackendKind, DualBlock, InterruptFlag, Matrix, PrimalDual, PrimalTerm, QuadraticProgram,
    SaddlePoint, SnapshotObserver, SolveStatus, SolverAdapter, SolverDiagnostics, SolverParams,
};
use tracing::{debug, info, warn};

use crate::data::InputData;

const SELF_TEST_TRIALS: usize = 8;

/// Problem math of a model, independent of any backend.
pub trait Formulation: fmt::Debug + Send {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Encoding for the iterative backend.
    fn saddle_point(&self) -> Result<SaddlePoint, RepError>;

    /// Encoding for the batch backend, `None` when the model has none.
    fn quadratic_program(&self) -> Option<QuadraticProgram> {
        None
    }

    /// Maps a user-facing warm start into backend space.
    fn pre(&self, _backend: BackendKind, state: PrimalDual) -> PrimalDual {
        state
    }

    /// Maps a raw backend state into its user-facing form.
    fn post(&self, _backend: BackendKind, raw: &PrimalDual) -> PrimalDual {
        raw.clone()
    }
}

fn lambda_schema(owner: &str, default: f64) -> ParamSchema {
    ParamSchema::new(owner).with(ParamSpec::float("lambda", default, "regularization weight"))
}

fn read_lambda(owner: &str, schema: &ParamSchema, params: &ParamMap) -> Result<f64, RepError> {
    let resolved = schema.resolve(params)?;
    let lambda = param_f64(&resolved, owner, "lambda")?;
    if lambda < 0.0 || !lambda.is_finite() {
        return Err(RepError::Params(
            ErrorInfo::new("param-range", "parameter 'lambda' must be non-negative")
                .with_context("owner", owner)
                .with_context("value", lambda.to_string()),
        ));
    }
    Ok(lambda)
}

fn fit_residual(operator: &Matrix, observations: &[f64], raw: &PrimalDual) -> PrimalDual {
    let fitted = operator.apply(&raw.primal);
    PrimalDual {
        primal: raw.primal.clone(),
        dual: fitted
            .iter()
            .zip(observations)
            .map(|(fit, obs)| fit - obs)
            .collect(),
    }
}

/// `½‖Ax − b‖² + ½λ‖x‖²`.
#[derive(Debug, Clone)]
pub struct Ridge {
    operator: Matrix,
    observations: Vec<f64>,
    lambda: f64,
}

impl Ridge {
    /// Registry name.
    pub const NAME: &'static str = "ridge";

    /// Declared options.
    pub fn schema() -> ParamSchema {
        lambda_schema(Self::NAME, 1e-2)
    }

    /// Builds the model for `data`.
    pub fn new(data: &InputData, params: &ParamMap) -> Result<Self, RepError> {
        data.validate()?;
        Ok(Self {
            operator: data.operator.clone(),
            observations: data.observations.clone(),
            lambda: read_lambda(Self::NAME, &Self::schema(), params)?,
        })
    }
}

impl Formulation for Ridge {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn saddle_point(&self) -> Result<SaddlePoint, RepError> {
        let problem = SaddlePoint {
            op: self.operator.clone(),
            g: PrimalTerm::SquaredNorm {
                weight: self.lambda,
            },
            f: vec![DualBlock::SquaredDistance {
                target: self.observations.clone(),
            }],
        };
        problem.validate()?;
        Ok(problem)
    }

    fn quadratic_program(&self) -> Option<QuadraticProgram> {
        let mut q = self.operator.gram();
        q.add_diagonal(self.lambda);
        Some(QuadraticProgram {
            q,
            c: self.operator.apply_transpose(&self.observations),
            equality: None,
            offset: 0.5 * rep_solve::dot(&self.observations, &self.observations),
        })
    }

    fn post(&self, _backend: BackendKind, raw: &PrimalDual) -> PrimalDual {
        fit_residual(&self.operator, &self.observations, raw)
    }
}

/// `½‖Ax − b‖² + λ‖Dx‖₁` with forward differences `D`.
#[derive(Debug, Clone)]
pub struct TotalVariation {
    operator: Matrix,
    observations: Vec<f64>,
    lambda: f64,
}

impl TotalVariation {
    /// Registry name.
    pub const NAME: &'static str = "tv";

    /// Declared options.
    pub fn schema() -> ParamSchema {
        lambda_schema(Self::NAME, 1e-1)
    }

    /// Builds the model for `data`.
    pub fn new(data: &InputData, params: &ParamMap) -> Result<Self, RepError> {
        data.validate()?;
        Ok(Self {
            operator: data.operator.clone(),
            observations: data.observations.clone(),
            lambda: read_lambda(Self::NAME, &Self::schema(), params)?,
        })
    }
}

impl Formulation for TotalVariation {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn saddle_point(&self) -> Result<SaddlePoint, RepError> {
        let n = self.operator.cols();
        let problem = SaddlePoint {
            op: self.operator.vstack(&Matrix::forward_differences(n))?,
            g: PrimalTerm::Zero,
            f: vec![
                DualBlock::SquaredDistance {
                    target: self.observations.clone(),
                },
                DualBlock::L1 {
                    weight: self.lambda,
                    len: n.saturating_sub(1),
                },
            ],
        };
        problem.validate()?;
        Ok(problem)
    }

    fn post(&self, _backend: BackendKind, raw: &PrimalDual) -> PrimalDual {
        fit_residual(&self.operator, &self.observations, raw)
    }
}

/// A formulation together with its backend and current state.
///
/// `setup_solver` must run once before `solve`; the state keeps its
/// pre-solve value when the backend reports an infeasible or unbounded
/// problem.
#[derive(Debug)]
pub struct Model {
    formulation: Box<dyn Formulation>,
    solver: Option<SolverAdapter>,
    state: PrimalDual,
}

impl Model {
    /// Wraps a formulation with no backend yet.
    pub fn new(formulation: Box<dyn Formulation>) -> Self {
        Self {
            formulation,
            solver: None,
            state: PrimalDual::default(),
        }
    }

    /// Underlying formulation.
    pub fn formulation(&self) -> &dyn Formulation {
        self.formulation.as_ref()
    }

    /// Backend chosen at setup, if any.
    pub fn backend(&self) -> Option<BackendKind> {
        self.solver.as_ref().map(SolverAdapter::kind)
    }

    /// Builds the backend-specific encoding.
    pub fn setup_solver(&mut self, kind: BackendKind) -> Result<(), RepError> {
        let adapter = match kind {
            BackendKind::Pdhg => SolverAdapter::pdhg(self.formulation.saddle_point()?)?,
            BackendKind::Direct => {
                let name = self.formulation.name();
                let program = self.formulation.quadratic_program().ok_or_else(|| {
                    RepError::Config(
                        ErrorInfo::new(
                            "unsupported-solver",
                            format!("model '{name}' cannot use solver '{kind}'"),
                        )
                        .with_hint("try --solver pdhg"),
                    )
                })?;
                SolverAdapter::direct(program)?
            }
        };
        debug!(model = self.formulation.name(), backend = %kind, "solver set up");
        self.state = adapter.state().clone();
        self.solver = Some(adapter);
        Ok(())
    }

    /// Solves from `params.continue_at`, or from the current state when unset.
    ///
    /// The observer sees every reported iterate after [`Formulation::post`].
    pub fn solve(
        &mut self,
        params: &SolverParams,
        observer: Option<&mut dyn SnapshotObserver>,
        interrupt: &InterruptFlag,
    ) -> Result<SolverDiagnostics, RepError> {
        let Model {
            formulation,
            solver,
            state,
        } = self;
        let solver = solver.as_mut().ok_or_else(|| {
            RepError::Solver(ErrorInfo::new(
                "solver-not-setup",
                "setup_solver must be called before solve",
            ))
        })?;
        let kind = solver.kind();
        let start = params.continue_at.clone().unwrap_or_else(|| state.clone());
        let effective = SolverParams {
            options: params.options.clone(),
            continue_at: Some(formulation.pre(kind, start)),
        };
        let mut post = observer.map(|inner| PostProcessed {
            formulation: formulation.as_ref(),
            kind,
            inner,
        });
        let observer = post
            .as_mut()
            .map(|post| post as &mut dyn SnapshotObserver);
        let diagnostics = solver.solve(&effective, observer, interrupt)?;
        match diagnostics.status {
            SolveStatus::Infeasible | SolveStatus::Unbounded => {
                warn!(
                    model = formulation.name(),
                    status = diagnostics.status.as_str(),
                    "solver failed, keeping previous state"
                );
            }
            _ => *state = solver.state().clone(),
        }
        Ok(diagnostics)
    }

    /// Adjoint and prox checks of the saddle-point encoding.
    pub fn self_test(&self, rng: &mut RngHandle) -> Result<f64, RepError> {
        let worst = self.formulation.saddle_point()?.self_test(rng, SELF_TEST_TRIALS)?;
        info!(model = self.formulation.name(), worst, "self test passed");
        Ok(worst)
    }

    /// Current raw state.
    pub fn state(&self) -> &PrimalDual {
        &self.state
    }

    /// User-facing form of a raw state.
    pub fn post(&self, raw: &PrimalDual) -> PrimalDual {
        let kind = self.backend().unwrap_or(BackendKind::Pdhg);
        self.formulation.post(kind, raw)
    }
}

struct PostProcessed<'a> {
    formulation: &'a dyn Formulation,
    kind: BackendKind,
    inner: &'a mut dyn SnapshotObserver,
}

impl SnapshotObserver for PostProcessed<'_> {
    fn on_iteration(
        &mut self,
        iteration: usize,
        state: &PrimalDual,
        diagnostics: &SolverDiagnostics,
    ) {
        let user = self.formulation.post(self.kind, state);
        self.inner.on_iteration(iteration, &user, diagnostics);
    }
}
