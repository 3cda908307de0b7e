//! Parameter values, the per-run parameter tree and declared parameter schemas.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, RepError};

/// Scalar option value accepted by collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free-form string.
    Str(String),
}

impl ParamValue {
    /// Returns the value as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(value) => Some(*value),
            ParamValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Kind of the stored value.
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::Str,
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{value:?}"),
            ParamValue::Str(value) => write!(f, "'{value}'"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

/// Ordered option map for one collaborator.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Renders a map in the `key=value,...` form accepted on the command line.
pub fn format_assignments(map: &ParamMap) -> String {
    map.iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Canonical parameter tree for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTree {
    /// Registry key of the data generator.
    pub data_name: String,
    /// Options forwarded to the data generator.
    #[serde(default)]
    pub data: ParamMap,
    /// Registry key of the model.
    pub model_name: String,
    /// Options forwarded to the model.
    #[serde(default)]
    pub model: ParamMap,
    /// Name of the solver backend.
    pub solver_name: String,
    /// Options forwarded to the solver backend.
    #[serde(default)]
    pub solver: ParamMap,
    /// Options consumed by the plot hook.
    #[serde(default)]
    pub plot: ParamMap,
}

impl ParameterTree {
    /// Creates an empty tree for the given collaborator names.
    pub fn new(
        data_name: impl Into<String>,
        model_name: impl Into<String>,
        solver_name: impl Into<String>,
    ) -> Self {
        Self {
            data_name: data_name.into(),
            data: ParamMap::new(),
            model_name: model_name.into(),
            model: ParamMap::new(),
            solver_name: solver_name.into(),
            solver: ParamMap::new(),
            plot: ParamMap::new(),
        }
    }

    /// Updates every sub-map with the entries of `other`, key by key.
    ///
    /// Sub-maps are extended, never replaced, and the names of `self` are kept.
    pub fn merge_from(&mut self, other: &ParameterTree) {
        extend(&mut self.data, &other.data);
        extend(&mut self.model, &other.model);
        extend(&mut self.solver, &other.solver);
        extend(&mut self.plot, &other.plot);
    }

    /// Re-applies caller supplied overrides on top of the tree.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        extend(&mut self.data, &overrides.data);
        extend(&mut self.model, &overrides.model);
        extend(&mut self.solver, &overrides.solver);
    }
}

pub(crate) fn extend(dest: &mut ParamMap, src: &ParamMap) {
    for (key, value) in src {
        dest.insert(key.clone(), value.clone());
    }
}

/// Explicit overrides given on the command line or through the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    /// Data generator overrides.
    #[serde(default)]
    pub data: ParamMap,
    /// Model overrides.
    #[serde(default)]
    pub model: ParamMap,
    /// Solver overrides.
    #[serde(default)]
    pub solver: ParamMap,
}

/// Kinds of values a schema entry may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// `true` or `false`.
    Bool,
    /// Integer.
    Int,
    /// Float (integers are widened).
    Float,
    /// String.
    Str,
}

impl Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "str",
        };
        f.write_str(label)
    }
}

/// A single declared option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Option name as used in `key=value` strings.
    pub name: String,
    /// Declared kind.
    pub kind: ParamKind,
    /// Constructor default.
    pub default: ParamValue,
    /// One line description.
    pub help: String,
}

impl ParamSpec {
    /// Declares a float option.
    pub fn float(name: &str, default: f64, help: &str) -> Self {
        Self::new(name, ParamKind::Float, ParamValue::Float(default), help)
    }

    /// Declares an integer option.
    pub fn int(name: &str, default: i64, help: &str) -> Self {
        Self::new(name, ParamKind::Int, ParamValue::Int(default), help)
    }

    /// Declares a boolean option.
    pub fn bool(name: &str, default: bool, help: &str) -> Self {
        Self::new(name, ParamKind::Bool, ParamValue::Bool(default), help)
    }

    /// Declares a string option.
    pub fn string(name: &str, default: &str, help: &str) -> Self {
        Self::new(name, ParamKind::Str, ParamValue::from(default), help)
    }

    fn new(name: &str, kind: ParamKind, default: ParamValue, help: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default,
            help: help.to_string(),
        }
    }

    fn accept(&self, owner: &str, value: &ParamValue) -> Result<ParamValue, RepError> {
        match (self.kind, value) {
            (ParamKind::Float, ParamValue::Int(raw)) => Ok(ParamValue::Float(*raw as f64)),
            (kind, value) if kind == value.kind() => Ok(value.clone()),
            (kind, value) => Err(RepError::Params(
                ErrorInfo::new("param-type", format!("parameter '{}' expects {kind}", self.name))
                    .with_context("owner", owner)
                    .with_context("value", value.to_string())
                    .with_hint(self.help.clone()),
            )),
        }
    }
}

/// Declared option set of one collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    /// Collaborator the schema belongs to, used in diagnostics.
    pub owner: String,
    /// Declared options, in declaration order.
    pub specs: Vec<ParamSpec>,
}

impl ParamSchema {
    /// Creates an empty schema.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            specs: Vec::new(),
        }
    }

    /// Adds an option to the schema.
    pub fn with(mut self, spec: ParamSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Looks up an option by name.
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Constructor defaults of every declared option.
    pub fn defaults(&self) -> ParamMap {
        self.specs
            .iter()
            .map(|spec| (spec.name.clone(), spec.default.clone()))
            .collect()
    }

    /// Validates `map` against the schema, widening integers where floats are declared.
    pub fn coerce(&self, map: &ParamMap) -> Result<ParamMap, RepError> {
        let mut out = ParamMap::new();
        for (key, value) in map {
            let Some(spec) = self.get(key) else {
                return Err(self.unknown(key));
            };
            out.insert(key.clone(), spec.accept(&self.owner, value)?);
        }
        Ok(out)
    }

    /// Defaults overlaid with the validated entries of `map`.
    pub fn resolve(&self, map: &ParamMap) -> Result<ParamMap, RepError> {
        let mut out = self.defaults();
        extend(&mut out, &self.coerce(map)?);
        Ok(out)
    }

    /// Drops entries that are not declared or do not type-check, returning their keys.
    pub fn retain_known(&self, map: &mut ParamMap) -> Vec<String> {
        let mut dropped = Vec::new();
        map.retain(|key, value| {
            let keep = match self.get(key) {
                Some(spec) => match spec.accept(&self.owner, value) {
                    Ok(accepted) => {
                        *value = accepted;
                        true
                    }
                    Err(_) => false,
                },
                None => false,
            };
            if !keep {
                dropped.push(key.clone());
            }
            keep
        });
        dropped
    }

    fn unknown(&self, key: &str) -> RepError {
        let known = self
            .specs
            .iter()
            .map(|spec| spec.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        RepError::Params(
            ErrorInfo::new(
                "unknown-parameter",
                format!("'{}' does not accept parameter '{key}'", self.owner),
            )
            .with_context("owner", self.owner.clone())
            .with_hint(format!("recognized parameters: {known}")),
        )
    }
}

fn missing(map_owner: &str, key: &str) -> RepError {
    RepError::Params(
        ErrorInfo::new("param-missing", format!("parameter '{key}' is not set"))
            .with_context("owner", map_owner),
    )
}

/// Reads a float option from a resolved map.
pub fn param_f64(map: &ParamMap, owner: &str, key: &str) -> Result<f64, RepError> {
    map.get(key)
        .and_then(ParamValue::as_f64)
        .ok_or_else(|| missing(owner, key))
}

/// Reads a non-negative integer option from a resolved map.
pub fn param_usize(map: &ParamMap, owner: &str, key: &str) -> Result<usize, RepError> {
    let raw = map
        .get(key)
        .and_then(ParamValue::as_i64)
        .ok_or_else(|| missing(owner, key))?;
    usize::try_from(raw).map_err(|_| {
        RepError::Params(
            ErrorInfo::new("param-range", format!("parameter '{key}' must be non-negative"))
                .with_context("owner", owner)
                .with_context("value", raw.to_string()),
        )
    })
}

/// Reads an optional seed; any negative value means "unseeded".
pub fn param_seed(map: &ParamMap, key: &str) -> Option<u64> {
    map.get(key)
        .and_then(ParamValue::as_i64)
        .and_then(|raw| u64::try_from(raw).ok())
}
