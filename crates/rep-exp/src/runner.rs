//! Lifecycle of one experiment invocation.
//!
//! ```text
//! START → RESOLVE_OUTPUT → LOAD_OR_CREATE_DATA → LOAD_OR_CREATE_PARAMS → LOAD_RESULT
//!       → { SKIP | RESUME | FRESH_RUN } → POSTPROCESS → PLOT → DONE
//! ```
//!
//! Everything the invocation names is validated before the output directory
//! is touched. Data is persisted before parameters are resolved against it,
//! parameters before solving starts, and the result only once the backend
//! has returned.

use std::fmt;
use std::path::PathBuf;

use rep_core::{
    stable_hash_string, ErrorInfo, Overrides, ParamMap, ParamSchema, ParamValue, ParameterTree,
    RepError, RngHandle, RunProvenance,
};
use rep_models::{DataGenerator, InputData, ModelEntry};
use rep_solve::{BackendKind, PrimalDual, SnapshotObserver, SolverDiagnostics, SolverParams};
use rep_store::{
    write_source_archive, ArtifactKind, CheckpointStore, LoadOutcome, OutputLayout, RunResult,
    Snapshot,
};
use tracing::{debug, info, warn};

use crate::config::PlotMode;
use crate::context::RunContext;
use crate::experiment::{Experiment, RunView};

/// States of the lifecycle, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Invocation received.
    Start,
    /// Output directory chosen and created.
    ResolveOutput,
    /// Input data loaded or generated and persisted.
    LoadOrCreateData,
    /// Parameter tree resolved and persisted.
    LoadOrCreateParams,
    /// Prior result looked up.
    LoadResult,
    /// Prior result reused verbatim.
    Skip,
    /// Solving continued from the prior result.
    Resume,
    /// Solving from scratch.
    FreshRun,
    /// Post-processing hook.
    Postprocess,
    /// Plot hook.
    Plot,
    /// Finished.
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunPhase::Start => "start",
            RunPhase::ResolveOutput => "resolve-output",
            RunPhase::LoadOrCreateData => "load-or-create-data",
            RunPhase::LoadOrCreateParams => "load-or-create-params",
            RunPhase::LoadResult => "load-result",
            RunPhase::Skip => "skip",
            RunPhase::Resume => "resume",
            RunPhase::FreshRun => "fresh-run",
            RunPhase::Postprocess => "postprocess",
            RunPhase::Plot => "plot",
            RunPhase::Done => "done",
        };
        f.write_str(label)
    }
}

/// What happens to the solver once the prior result is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    /// No prior result: solve from scratch.
    Fresh,
    /// Prior result and `--resume`: solve again starting at its state.
    Resume,
    /// Prior result without `--resume`: reuse it, do not solve.
    Skip,
}

impl RunAction {
    /// Decision table over "prior result present" and "resume requested".
    pub fn decide(prior_present: bool, resume: bool) -> Self {
        match (prior_present, resume) {
            (false, _) => RunAction::Fresh,
            (true, false) => RunAction::Skip,
            (true, true) => RunAction::Resume,
        }
    }

    fn phase(&self) -> RunPhase {
        match self {
            RunAction::Fresh => RunPhase::FreshRun,
            RunAction::Resume => RunPhase::Resume,
            RunAction::Skip => RunPhase::Skip,
        }
    }
}

/// One invocation, as given on the command line or through the API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    /// Registry key of the data generator.
    pub dataset: String,
    /// Registry key of the model.
    pub model: String,
    /// Solver backend; the configured default when unset.
    pub solver: Option<String>,
    /// Existing or new output directory; generated when unset.
    pub output: Option<PathBuf>,
    /// Continue from a prior result instead of reusing it.
    pub resume: bool,
    /// Plot mode; the configured default when unset.
    pub plot: Option<PlotMode>,
    /// Explicit parameter overrides.
    pub overrides: Overrides,
    /// Persist intermediate iterates.
    pub snapshots: bool,
    /// Run the operator self test before solving.
    pub self_test: bool,
}

impl RunRequest {
    /// Request for `dataset` and `model` with every option at its default.
    pub fn new(dataset: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            model: model.into(),
            ..Self::default()
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Output directory holding the checkpoints.
    pub output_dir: PathBuf,
    /// Branch taken after loading the prior result.
    pub action: RunAction,
    /// Persisted parameter tree.
    pub params: ParameterTree,
    /// Persisted result.
    pub result: RunResult,
    /// Snapshots found after solving, in creation order.
    pub snapshots: Vec<Snapshot>,
    /// Phases entered, in order.
    pub phases: Vec<RunPhase>,
}

struct Plan<'r> {
    generator: &'r dyn DataGenerator,
    model: &'r ModelEntry,
    backend: BackendKind,
    overrides: Overrides,
}

/// Drives one experiment through its lifecycle.
#[derive(Debug, Clone)]
pub struct ExperimentRunner {
    ctx: RunContext,
}

impl ExperimentRunner {
    /// Runner operating in `ctx`.
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Context the runner operates in.
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Runs `request` to completion, calling the hooks of `experiment`.
    pub fn run(
        &self,
        request: &RunRequest,
        experiment: &mut dyn Experiment,
    ) -> Result<RunOutcome, RepError> {
        let mut phases = Vec::new();
        enter(&mut phases, RunPhase::Start);
        let plan = self.validate(request)?;

        enter(&mut phases, RunPhase::ResolveOutput);
        let label = format!("{}-{}", request.dataset, request.model);
        let layout = OutputLayout::resolve(
            request.output.as_deref(),
            &label,
            &self.ctx.config.results_root,
            self.ctx.clock.as_ref(),
        )?;
        let store = CheckpointStore::new(layout.dir.clone(), self.ctx.clock.clone());
        let stored_data = load_stored_data(&store, &plan)?;
        if let Some(run_log) = &self.ctx.run_log {
            run_log.attach(&store.timestamped("rep.log"))?;
        }
        info!(
            dataset = %request.dataset,
            model = %request.model,
            solver = %plan.backend,
            dir = %store.dir().display(),
            "applying model to dataset"
        );
        self.archive_source(&store)?;
        let stored = load_stored_params(&store, &plan);

        enter(&mut phases, RunPhase::LoadOrCreateData);
        let data = self.load_or_create_data(&store, &plan, stored_data, stored.as_ref())?;

        enter(&mut phases, RunPhase::LoadOrCreateParams);
        let params = self.load_or_create_params(&store, &plan, stored.as_ref(), &data)?;

        enter(&mut phases, RunPhase::LoadResult);
        let prior: Option<RunResult> = store.load(ArtifactKind::Result);
        let action = RunAction::decide(prior.is_some(), request.resume);
        let solver_params = SolverParams {
            options: params.solver.clone(),
            continue_at: prior.as_ref().map(|result| result.data.clone()),
        };
        if request.self_test {
            self_test(&plan, &data, &params)?;
        }

        enter(&mut phases, action.phase());
        let result = match prior {
            Some(prior) if action == RunAction::Skip => {
                info!(
                    status = prior.details.status.as_str(),
                    "result exists, skipping solve (pass --resume to continue)"
                );
                prior
            }
            _ => self.solve(&store, &plan, request, &data, &params, &solver_params)?,
        };

        let snapshots = store.list_snapshots()?;
        let view = RunView {
            output_dir: store.dir(),
            params: &params,
            data: &data,
            result: &result,
            snapshots: &snapshots,
        };
        enter(&mut phases, RunPhase::Postprocess);
        experiment.postprocess(&view)?;
        enter(&mut phases, RunPhase::Plot);
        experiment.plot(&view, request.plot.unwrap_or(self.ctx.config.plot))?;
        enter(&mut phases, RunPhase::Done);

        Ok(RunOutcome {
            output_dir: layout.dir,
            action,
            params,
            result,
            snapshots,
            phases,
        })
    }

    fn validate(&self, request: &RunRequest) -> Result<Plan<'_>, RepError> {
        let registry = self.ctx.registry.as_ref();
        let generator = registry.dataset(&request.dataset)?;
        let model = registry.model(&request.model)?;
        let solver = request
            .solver
            .as_deref()
            .unwrap_or(&self.ctx.config.default_solver);
        let backend: BackendKind = solver.parse()?;
        if !model.supports(backend) {
            let supported = model
                .backends()
                .iter()
                .map(BackendKind::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(RepError::Config(
                ErrorInfo::new(
                    "unsupported-solver",
                    format!("model '{}' cannot use solver '{backend}'", model.name()),
                )
                .with_hint(format!("supported solvers: {supported}")),
            ));
        }
        let overrides = Overrides {
            data: generator.schema().coerce(&request.overrides.data)?,
            model: model.schema().coerce(&request.overrides.model)?,
            solver: backend.schema().coerce(&request.overrides.solver)?,
        };
        backend.check_options(&overrides.solver)?;
        Ok(Plan {
            generator,
            model,
            backend,
            overrides,
        })
    }

    fn archive_source(&self, store: &CheckpointStore) -> Result<(), RepError> {
        let config = &self.ctx.config;
        if !config.archive_source || config.source_roots.is_empty() {
            return Ok(());
        }
        let dest = store.timestamped("source.zip");
        let entries = write_source_archive(&config.source_roots, &dest)?;
        info!(files = entries.len(), archive = %dest.display(), "archived source");
        Ok(())
    }

    fn load_or_create_data(
        &self,
        store: &CheckpointStore,
        plan: &Plan<'_>,
        stored_data: Option<InputData>,
        stored: Option<&ParameterTree>,
    ) -> Result<InputData, RepError> {
        let name = plan.generator.name();
        if let Some(data) = stored_data {
            if !plan.overrides.data.is_empty() {
                warn!("input data exists, data parameters do not regenerate it");
            }
            info!(dataset = name, seed = data.seed, "loaded input data");
            return Ok(data);
        }

        let mut tree = fresh_tree(plan);
        if let Some(stored) = stored {
            tree.merge_from(stored);
        }
        tree.apply_overrides(&plan.overrides);
        drop_unknown(plan.generator.schema(), &mut tree.data, "data");
        let data = plan.generator.generate(&tree.data)?;
        data.validate()?;
        store.save(ArtifactKind::Data, &data)?;
        info!(dataset = name, seed = data.seed, "generated input data");
        Ok(data)
    }

    fn load_or_create_params(
        &self,
        store: &CheckpointStore,
        plan: &Plan<'_>,
        stored: Option<&ParameterTree>,
        data: &InputData,
    ) -> Result<ParameterTree, RepError> {
        let mut tree = fresh_tree(plan);
        plan.generator.apply_default_params(&mut tree);
        if let Some(stored) = stored {
            tree.merge_from(stored);
        }
        drop_unknown(plan.generator.schema(), &mut tree.data, "data");
        drop_unknown(plan.model.schema().clone(), &mut tree.model, "model");
        drop_unknown(plan.backend.schema(), &mut tree.solver, "solver");
        tree.apply_overrides(&plan.overrides);
        if plan.generator.schema().get("seed").is_some() {
            if let Ok(seed) = i64::try_from(data.seed) {
                tree.data.insert("seed".to_string(), ParamValue::Int(seed));
            }
        }
        plan.backend.check_options(&tree.solver)?;
        store.save(ArtifactKind::Params, &tree)?;
        debug!(
            model = %rep_core::format_assignments(&tree.model),
            solver = %rep_core::format_assignments(&tree.solver),
            "resolved parameters"
        );
        Ok(tree)
    }

    fn solve(
        &self,
        store: &CheckpointStore,
        plan: &Plan<'_>,
        request: &RunRequest,
        data: &InputData,
        params: &ParameterTree,
        solver_params: &SolverParams,
    ) -> Result<RunResult, RepError> {
        let mut model = plan.model.build(data, &params.model)?;
        model.setup_solver(plan.backend)?;
        if let Some(prior) = &solver_params.continue_at {
            info!(shape = ?prior.shape(), "continuing at prior state");
        }

        let capture = request.snapshots && plan.backend.is_iterative();
        if request.snapshots && !capture {
            warn!(solver = %plan.backend, "solver reports no intermediate iterates, no snapshots");
        }
        let mut snapshot_error: Option<RepError> = None;
        let mut record = |iteration: usize, state: &PrimalDual, details: &SolverDiagnostics| {
            if snapshot_error.is_some() {
                return;
            }
            let snapshot = Snapshot {
                index: iteration,
                data: state.clone(),
                details: details.clone(),
            };
            if let Err(err) = store.save_snapshot(&snapshot) {
                warn!(%err, "snapshot write failed");
                snapshot_error = Some(err);
            }
        };
        let observer: Option<&mut dyn SnapshotObserver> = if capture {
            Some(&mut record)
        } else {
            None
        };
        let details = model.solve(solver_params, observer, &self.ctx.interrupt)?;
        if let Some(err) = snapshot_error {
            return Err(err);
        }

        if details.status.is_failure() {
            warn!(
                status = details.status.as_str(),
                iterations = details.iterations,
                "solve inconclusive, recording result as is"
            );
        } else {
            info!(
                status = details.status.as_str(),
                iterations = details.iterations,
                objective = ?details.objective,
                "solve finished"
            );
        }
        let result = RunResult {
            data: model.state().clone(),
            details,
            provenance: RunProvenance {
                params_hash: stable_hash_string(params)?,
                data_hash: stable_hash_string(data)?,
                created_at: self.ctx.clock.now().to_rfc3339(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        store.save(ArtifactKind::Result, &result)?;
        Ok(result)
    }
}

fn enter(phases: &mut Vec<RunPhase>, phase: RunPhase) {
    debug!(%phase, "entering phase");
    phases.push(phase);
}

fn fresh_tree(plan: &Plan<'_>) -> ParameterTree {
    let mut tree = ParameterTree::new(
        plan.generator.name(),
        plan.model.name(),
        plan.backend.as_str(),
    );
    tree.data = plan.generator.schema().defaults();
    tree.model = plan.model.schema().defaults();
    tree.solver = plan.backend.schema().defaults();
    tree
}

/// Stored input data usable for this run.
///
/// Data of another dataset is refused before anything is written into the
/// directory; data that decodes but is inconsistent counts as absent.
fn load_stored_data(
    store: &CheckpointStore,
    plan: &Plan<'_>,
) -> Result<Option<InputData>, RepError> {
    let Some(data) = store.load::<InputData>(ArtifactKind::Data) else {
        return Ok(None);
    };
    let name = plan.generator.name();
    if data.dataset != name {
        return Err(RepError::Config(
            ErrorInfo::new(
                "output-mismatch",
                format!("output directory holds data of dataset '{}'", data.dataset),
            )
            .with_context("dir", store.dir().display().to_string())
            .with_hint(format!("choose another --output for dataset '{name}'")),
        ));
    }
    if let Err(err) = data.validate() {
        warn!(%err, "stored input data is inconsistent, regenerating");
        return Ok(None);
    }
    Ok(Some(data))
}

fn load_stored_params(store: &CheckpointStore, plan: &Plan<'_>) -> Option<ParameterTree> {
    let stored = match store.probe::<ParameterTree>(ArtifactKind::Params) {
        LoadOutcome::Loaded(tree) => tree,
        LoadOutcome::Missing => {
            debug!("no stored parameters");
            return None;
        }
        LoadOutcome::Corrupt(reason) => {
            warn!(%reason, "stored parameters unreadable, starting from defaults");
            return None;
        }
    };
    if stored.data_name != plan.generator.name() || stored.model_name != plan.model.name() {
        warn!(
            stored_data = %stored.data_name,
            stored_model = %stored.model_name,
            "stored parameters were written for other collaborators"
        );
    }
    if stored.solver_name != plan.backend.as_str() {
        info!(
            stored = %stored.solver_name,
            current = %plan.backend,
            "solver changed since the parameters were stored"
        );
    }
    Some(stored)
}

fn drop_unknown(schema: ParamSchema, map: &mut ParamMap, section: &str) {
    for key in schema.retain_known(map) {
        warn!(section, key = %key, "dropping stored parameter not declared by the collaborator");
    }
}

fn self_test(plan: &Plan<'_>, data: &InputData, params: &ParameterTree) -> Result<(), RepError> {
    let model = plan.model.build(data, &params.model)?;
    let mut rng = RngHandle::from_seed(data.seed);
    model.self_test(&mut rng)?;
    Ok(())
}
