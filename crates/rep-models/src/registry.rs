//! Name-keyed factories for data generators and models.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rep_core::{ErrorInfo, ParamMap, ParamSchema, RepError};
use rep_solve::BackendKind;

use crate::data::{DataGenerator, InputData, LinearData, SignalData};
use crate::model::{Formulation, Model, Ridge, TotalVariation};

/// Builds a formulation from input data and resolved model options.
pub type ModelFactory =
    Arc<dyn Fn(&InputData, &ParamMap) -> Result<Box<dyn Formulation>, RepError> + Send + Sync>;

/// A registered model.
#[derive(Clone)]
pub struct ModelEntry {
    name: String,
    schema: ParamSchema,
    backends: Vec<BackendKind>,
    factory: ModelFactory,
}

impl ModelEntry {
    /// Declares a model under `name`.
    pub fn new(
        name: impl Into<String>,
        schema: ParamSchema,
        backends: &[BackendKind],
        factory: ModelFactory,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            backends: backends.to_vec(),
            factory,
        }
    }

    /// Registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared options.
    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    /// Backends the model has an encoding for.
    pub fn backends(&self) -> &[BackendKind] {
        &self.backends
    }

    /// Whether `backend` can solve this model.
    pub fn supports(&self, backend: BackendKind) -> bool {
        self.backends.contains(&backend)
    }

    /// Builds an un-setup model for `data`.
    pub fn build(&self, data: &InputData, params: &ParamMap) -> Result<Model, RepError> {
        let formulation = (self.factory)(data, params)?;
        Ok(Model::new(formulation))
    }
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("name", &self.name)
            .field("backends", &self.backends)
            .finish_non_exhaustive()
    }
}

/// Collaborators selectable by name.
#[derive(Clone, Default)]
pub struct Registry {
    datasets: BTreeMap<String, Arc<dyn DataGenerator>>,
    models: BTreeMap<String, ModelEntry>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled datasets and models.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_dataset(LinearData);
        registry.register_dataset(SignalData);
        registry.register_model(ModelEntry::new(
            Ridge::NAME,
            Ridge::schema(),
            &[BackendKind::Pdhg, BackendKind::Direct],
            Arc::new(ridge),
        ));
        registry.register_model(ModelEntry::new(
            TotalVariation::NAME,
            TotalVariation::schema(),
            &[BackendKind::Pdhg],
            Arc::new(total_variation),
        ));
        registry
    }

    /// Adds or replaces a data generator under its own name.
    pub fn register_dataset(&mut self, generator: impl DataGenerator + 'static) {
        self.datasets
            .insert(generator.name().to_string(), Arc::new(generator));
    }

    /// Adds or replaces a model.
    pub fn register_model(&mut self, entry: ModelEntry) {
        self.models.insert(entry.name.clone(), entry);
    }

    /// Registered dataset names, sorted.
    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.keys().map(String::as_str).collect()
    }

    /// Registered model names, sorted.
    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Looks up a data generator.
    pub fn dataset(&self, name: &str) -> Result<&dyn DataGenerator, RepError> {
        self.datasets
            .get(name)
            .map(|generator| generator.as_ref())
            .ok_or_else(|| unknown("dataset", name, &self.dataset_names()))
    }

    /// Looks up a model.
    pub fn model(&self, name: &str) -> Result<&ModelEntry, RepError> {
        self.models
            .get(name)
            .ok_or_else(|| unknown("model", name, &self.model_names()))
    }

    /// Whether model `model` can be solved by `backend`.
    pub fn supports(&self, model: &str, backend: BackendKind) -> Result<bool, RepError> {
        Ok(self.model(model)?.supports(backend))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("datasets", &self.dataset_names())
            .field("models", &self.model_names())
            .finish()
    }
}

fn ridge(data: &InputData, params: &ParamMap) -> Result<Box<dyn Formulation>, RepError> {
    Ok(Box::new(Ridge::new(data, params)?))
}

fn total_variation(data: &InputData, params: &ParamMap) -> Result<Box<dyn Formulation>, RepError> {
    Ok(Box::new(TotalVariation::new(data, params)?))
}

fn unknown(kind: &str, name: &str, available: &[&str]) -> RepError {
    RepError::Config(
        ErrorInfo::new(format!("unknown-{kind}"), format!("unknown {kind} '{name}'"))
            .with_hint(format!("available: {}", available.join(", "))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lists_sorted_names() {
        let registry = Registry::builtin();
        assert_eq!(registry.dataset_names(), vec!["linear", "signal"]);
        assert_eq!(registry.model_names(), vec!["ridge", "tv"]);
    }

    #[test]
    fn unknown_names_are_config_errors() {
        let registry = Registry::builtin();
        let err = registry.model("lasso").unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.info().code, "unknown-model");
        assert_eq!(err.info().hint.as_deref(), Some("available: ridge, tv"));
        assert!(registry.dataset("mnist").err().unwrap().is_config());
    }

    #[test]
    fn backend_support_follows_encodings() {
        let registry = Registry::builtin();
        assert!(registry.supports("ridge", BackendKind::Direct).unwrap());
        assert!(!registry.supports("tv", BackendKind::Direct).unwrap());
        assert!(registry.supports("tv", BackendKind::Pdhg).unwrap());
    }
}
