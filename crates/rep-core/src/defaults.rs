//! Layered parameter defaults owned by data generators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::params::{extend, ParamMap, ParameterTree};

/// Key selecting the layer that applies to every model.
pub const WILDCARD: &str = "*";

/// Default tables keyed by model name, solver name and plot.
///
/// Layers are applied with update semantics in a fixed order, so a later layer
/// wins at a key shared with an earlier one:
///
/// 1. `model["*"]`
/// 2. `model[model_name]`
/// 3. `solver[solver_name]["*"]`
/// 4. `solver[solver_name][model_name]`
/// 5. `plot`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultTable {
    /// Model defaults by model name or `*`.
    #[serde(default)]
    pub model: BTreeMap<String, ParamMap>,
    /// Solver defaults by solver name, then by model name or `*`.
    #[serde(default)]
    pub solver: BTreeMap<String, BTreeMap<String, ParamMap>>,
    /// Plot defaults.
    #[serde(default)]
    pub plot: ParamMap,
}

impl DefaultTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds model defaults for `model` (or [`WILDCARD`]).
    pub fn model(mut self, model: &str, values: ParamMap) -> Self {
        extend(self.model.entry(model.to_string()).or_default(), &values);
        self
    }

    /// Adds solver defaults for `(solver, model)`; `model` may be [`WILDCARD`].
    pub fn solver(mut self, solver: &str, model: &str, values: ParamMap) -> Self {
        let per_model = self.solver.entry(solver.to_string()).or_default();
        extend(per_model.entry(model.to_string()).or_default(), &values);
        self
    }

    /// Adds plot defaults.
    pub fn plot(mut self, values: ParamMap) -> Self {
        extend(&mut self.plot, &values);
        self
    }
}

/// Merges the default layers of `table` into `tree`.
///
/// Unknown model or solver names contribute empty layers.
pub fn apply_defaults(tree: &mut ParameterTree, table: &DefaultTable) {
    if let Some(layer) = table.model.get(WILDCARD) {
        extend(&mut tree.model, layer);
    }
    if let Some(layer) = table.model.get(&tree.model_name) {
        extend(&mut tree.model, layer);
    }
    if let Some(per_model) = table.solver.get(&tree.solver_name) {
        if let Some(layer) = per_model.get(WILDCARD) {
            extend(&mut tree.solver, layer);
        }
        if let Some(layer) = per_model.get(&tree.model_name) {
            extend(&mut tree.solver, layer);
        }
    }
    extend(&mut tree.plot, &table.plot);
}
