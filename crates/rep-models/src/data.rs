//! Input data and the generators that create it.

use rand::seq::SliceRandom;
use rep_core::{
    apply_defaults, param_f64, param_map, param_seed, param_usize, DefaultTable, ErrorInfo,
    ParamMap, ParamSchema, ParamSpec, ParameterTree, RepError, RngHandle,
};
use rep_solve::Matrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPERATOR_STREAM: u64 = 0;
const TRUTH_STREAM: u64 = 1;
const NOISE_STREAM: u64 = 2;

/// Problem instance persisted as `data.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputData {
    /// Generator that produced the instance.
    pub dataset: String,
    /// Seed actually used.
    pub seed: u64,
    /// Forward operator `A`.
    pub operator: Matrix,
    /// Observations `b`.
    pub observations: Vec<f64>,
    /// Ground truth, when known.
    #[serde(default)]
    pub truth: Option<Vec<f64>>,
}

impl InputData {
    /// Checks that the operator and observations agree.
    pub fn validate(&self) -> Result<(), RepError> {
        if self.operator.rows() != self.observations.len() {
            return Err(RepError::Data(
                ErrorInfo::new("data-shape", "observations do not match operator rows")
                    .with_context("rows", self.operator.rows().to_string())
                    .with_context("observations", self.observations.len().to_string()),
            ));
        }
        if let Some(truth) = &self.truth {
            if truth.len() != self.operator.cols() {
                return Err(RepError::Data(
                    ErrorInfo::new("data-shape", "ground truth does not match operator columns")
                        .with_context("cols", self.operator.cols().to_string())
                        .with_context("truth", truth.len().to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Number of unknowns.
    pub fn unknowns(&self) -> usize {
        self.operator.cols()
    }
}

/// A named source of problem instances.
pub trait DataGenerator: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Options the generator accepts.
    fn schema(&self) -> ParamSchema;

    /// Model, solver and plot defaults suited to this data.
    fn defaults(&self) -> DefaultTable {
        DefaultTable::new()
    }

    /// Builds an instance from resolved options.
    fn generate(&self, params: &ParamMap) -> Result<InputData, RepError>;

    /// Layers this generator's defaults into `tree`.
    fn apply_default_params(&self, tree: &mut ParameterTree) {
        apply_defaults(tree, &self.defaults());
    }
}

fn resolve_seed(params: &ParamMap) -> u64 {
    match param_seed(params, "seed") {
        Some(seed) => seed,
        None => {
            let seed = u64::from(rand::random::<u32>());
            debug!(seed, "drew fresh data seed");
            seed
        }
    }
}

fn noisy(clean: Vec<f64>, noise: f64, rng: &mut RngHandle) -> Vec<f64> {
    clean
        .into_iter()
        .map(|value| value + noise * rng.standard_normal())
        .collect()
}

fn non_negative(owner: &str, key: &str, params: &ParamMap) -> Result<f64, RepError> {
    let value = param_f64(params, owner, key)?;
    if value < 0.0 || !value.is_finite() {
        return Err(RepError::Params(
            ErrorInfo::new("param-range", format!("parameter '{key}' must be non-negative"))
                .with_context("owner", owner)
                .with_context("value", value.to_string()),
        ));
    }
    Ok(value)
}

/// Dense Gaussian operator with a sparse ground truth.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearData;

impl DataGenerator for LinearData {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn schema(&self) -> ParamSchema {
        ParamSchema::new(self.name())
            .with(ParamSpec::int("rows", 40, "number of observations"))
            .with(ParamSpec::int("cols", 20, "number of unknowns"))
            .with(ParamSpec::float("sparsity", 0.2, "fraction of non-zero unknowns"))
            .with(ParamSpec::float("noise", 0.01, "standard deviation of the noise"))
            .with(ParamSpec::int("seed", 0, "random seed, negative draws a fresh one"))
    }

    fn defaults(&self) -> DefaultTable {
        DefaultTable::new()
            .model("*", param_map! { "lambda" => 0.1_f64 })
            .model("tv", param_map! { "lambda" => 0.05_f64 })
            .solver("pdhg", "*", param_map! { "iterations" => 2000_i64 })
            .solver(
                "pdhg",
                "tv",
                param_map! { "iterations" => 5000_i64, "granularity" => 100_i64 },
            )
            .plot(param_map! { "kind" => "stem" })
    }

    fn generate(&self, params: &ParamMap) -> Result<InputData, RepError> {
        let params = self.schema().resolve(params)?;
        let rows = param_usize(&params, self.name(), "rows")?;
        let cols = param_usize(&params, self.name(), "cols")?;
        let sparsity = non_negative(self.name(), "sparsity", &params)?;
        let noise = non_negative(self.name(), "noise", &params)?;
        if rows == 0 || cols == 0 {
            return Err(RepError::Params(
                ErrorInfo::new("param-range", "rows and cols must be positive")
                    .with_context("owner", self.name()),
            ));
        }
        let seed = resolve_seed(&params);

        let mut rng = RngHandle::substream(seed, OPERATOR_STREAM);
        let scale = 1.0 / (rows as f64).sqrt();
        let entries = (0..rows * cols)
            .map(|_| scale * rng.standard_normal())
            .collect();
        let operator = Matrix::from_vec(rows, cols, entries)?;

        let mut rng = RngHandle::substream(seed, TRUTH_STREAM);
        let support = ((sparsity.min(1.0) * cols as f64).round() as usize).clamp(1, cols);
        let mut positions: Vec<usize> = (0..cols).collect();
        positions.shuffle(&mut rng);
        let mut truth = vec![0.0; cols];
        for &position in &positions[..support] {
            truth[position] = rng.standard_normal();
        }

        let mut rng = RngHandle::substream(seed, NOISE_STREAM);
        let observations = noisy(operator.apply(&truth), noise, &mut rng);
        debug!(rows, cols, support, seed, "generated linear data");
        Ok(InputData {
            dataset: self.name().to_string(),
            seed,
            operator,
            observations,
            truth: Some(truth),
        })
    }
}

/// Noisy piecewise constant 1-D signal observed through the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalData;

impl DataGenerator for SignalData {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn schema(&self) -> ParamSchema {
        ParamSchema::new(self.name())
            .with(ParamSpec::int("length", 64, "number of samples"))
            .with(ParamSpec::int("jumps", 4, "number of discontinuities"))
            .with(ParamSpec::float("noise", 0.05, "standard deviation of the noise"))
            .with(ParamSpec::int("seed", 0, "random seed, negative draws a fresh one"))
    }

    fn defaults(&self) -> DefaultTable {
        DefaultTable::new()
            .model("*", param_map! { "lambda" => 0.5_f64 })
            .model("tv", param_map! { "lambda" => 0.2_f64 })
            .solver("pdhg", "tv", param_map! { "iterations" => 8000_i64 })
            .plot(param_map! { "kind" => "line" })
    }

    fn generate(&self, params: &ParamMap) -> Result<InputData, RepError> {
        let params = self.schema().resolve(params)?;
        let length = param_usize(&params, self.name(), "length")?;
        let jumps = param_usize(&params, self.name(), "jumps")?;
        let noise = non_negative(self.name(), "noise", &params)?;
        if length < 2 {
            return Err(RepError::Params(
                ErrorInfo::new("param-range", "length must be at least 2")
                    .with_context("owner", self.name()),
            ));
        }
        let seed = resolve_seed(&params);

        let mut rng = RngHandle::substream(seed, TRUTH_STREAM);
        let mut cuts: Vec<usize> = (1..length).collect();
        cuts.shuffle(&mut rng);
        let mut cuts = cuts[..jumps.min(length - 1)].to_vec();
        cuts.sort_unstable();
        let mut truth = Vec::with_capacity(length);
        let mut level = rng.uniform(-1.0, 1.0);
        let mut next_cut = cuts.iter().peekable();
        for i in 0..length {
            if next_cut.peek() == Some(&&i) {
                next_cut.next();
                level = rng.uniform(-1.0, 1.0);
            }
            truth.push(level);
        }

        let mut rng = RngHandle::substream(seed, NOISE_STREAM);
        let observations = noisy(truth.clone(), noise, &mut rng);
        debug!(length, jumps = cuts.len(), seed, "generated signal data");
        Ok(InputData {
            dataset: self.name().to_string(),
            seed,
            operator: Matrix::identity(length),
            observations,
            truth: Some(truth),
        })
    }
}
