use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rep_core::{parse_assignments, Overrides, ParamMap, RepError};
use rep_exp::{
    logging, ExperimentRunner, PlotMode, RunContext, RunLog, RunRequest, RunnerConfig, TruthReport,
};
use tracing::{error, info, warn};

mod list;

const USAGE_HINT: &str = "usage: rep [OPTIONS] DATASET MODEL (rep --list shows what is available)";

#[derive(Parser, Debug)]
#[command(
    name = "rep",
    version,
    about = "Apply a model to a dataset, resuming from checkpoints in the output directory"
)]
struct Cli {
    /// Registered data generator.
    #[arg(required_unless_present = "list")]
    dataset: Option<String>,
    /// Registered model.
    #[arg(required_unless_present = "list")]
    model: Option<String>,
    /// YAML file with runner settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// List datasets, models and solvers with their parameters, then exit.
    #[arg(long)]
    list: bool,
    /// Output directory; created when missing, generated when omitted.
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Continue solving from the stored result instead of reusing it.
    #[arg(long)]
    resume: bool,
    /// Plot mode.
    #[arg(long)]
    plot: Option<PlotMode>,
    /// Data generator options, `key=value,key=value`.
    #[arg(long, value_name = "K=V,..")]
    data_params: Option<String>,
    /// Model options, `key=value,key=value`.
    #[arg(long, value_name = "K=V,..")]
    model_params: Option<String>,
    /// Solver backend.
    #[arg(long)]
    solver: Option<String>,
    /// Solver options, `key=value,key=value`.
    #[arg(long, value_name = "K=V,..")]
    solver_params: Option<String>,
    /// Persist intermediate iterates of iterative solvers.
    #[arg(long)]
    snapshots: bool,
    /// Check the model's operators before solving.
    #[arg(long = "test")]
    self_test: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn run(cli: Cli) -> Result<(), RepError> {
    let config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    let run_log = RunLog::new();
    logging::init(&run_log);
    let ctx = RunContext::new(config).with_run_log(run_log);

    if cli.list {
        list::print(&ctx.registry);
        return Ok(());
    }

    let request = request_from(&cli)?;
    install_interrupt_handler(&ctx);
    let runner = ExperimentRunner::new(ctx);
    let outcome = runner.run(&request, &mut TruthReport)?;
    info!(
        dir = %outcome.output_dir.display(),
        status = outcome.result.details.status.as_str(),
        "done"
    );
    Ok(())
}

fn request_from(cli: &Cli) -> Result<RunRequest, RepError> {
    let (Some(dataset), Some(model)) = (&cli.dataset, &cli.model) else {
        return Err(RepError::Config(rep_core::ErrorInfo::new(
            "missing-argument",
            "DATASET and MODEL are required",
        )));
    };
    let mut request = RunRequest::new(dataset.as_str(), model.as_str());
    request.solver = cli.solver.clone();
    request.output = cli.output.clone();
    request.resume = cli.resume;
    request.plot = cli.plot;
    request.snapshots = cli.snapshots;
    request.self_test = cli.self_test;
    request.overrides = Overrides {
        data: assignments(cli.data_params.as_deref())?,
        model: assignments(cli.model_params.as_deref())?,
        solver: assignments(cli.solver_params.as_deref())?,
    };
    Ok(request)
}

fn assignments(raw: Option<&str>) -> Result<ParamMap, RepError> {
    raw.map_or_else(|| Ok(ParamMap::new()), parse_assignments)
}

/// First Ctrl-C stops the solver at its next iteration, a second one exits.
fn install_interrupt_handler(ctx: &RunContext) {
    let flag = ctx.interrupt.clone();
    let installed = ctrlc::set_handler(move || {
        if flag.is_raised() {
            std::process::exit(130);
        }
        flag.raise();
    });
    if let Err(err) = installed {
        warn!(%err, "could not install the Ctrl-C handler");
    }
}

fn report(err: &RepError) -> ExitCode {
    if err.is_config() {
        let info = err.info();
        eprintln!("rep: {}", info.message);
        if let Some(hint) = &info.hint {
            eprintln!("  hint: {hint}");
        }
        eprintln!("{USAGE_HINT}");
        ExitCode::from(2)
    } else {
        error!(%err, "run failed");
        eprintln!("rep: {err}");
        ExitCode::from(1)
    }
}
