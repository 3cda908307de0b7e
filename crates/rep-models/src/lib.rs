#![deny(missing_docs)]
//! Data generators, model formulations and the registry selecting them by name.

pub mod data;
pub mod model;
pub mod registry;

pub use data::{DataGenerator, InputData, LinearData, SignalData};
pub use model::{Formulation, Model, Ridge, TotalVariation};
pub use registry::{ModelEntry, ModelFactory, Registry};
