#![deny(missing_docs)]
//! Core parameter, error and provenance types for reproducible experiment runs.
//!
//! Every run is described by a [`ParameterTree`]. Collaborators declare the
//! options they accept through a [`ParamSchema`]; data generators additionally
//! own a [`DefaultTable`] whose layers are merged by [`apply_defaults`].

pub mod defaults;
pub mod errors;
pub mod params;
pub mod parse;
pub mod provenance;
pub mod rng;

pub use defaults::{apply_defaults, DefaultTable, WILDCARD};
pub use errors::{ErrorInfo, RepError};
pub use params::{
    format_assignments, param_f64, param_seed, param_usize, Overrides, ParamKind, ParamMap,
    ParamSchema, ParamSpec, ParamValue, ParameterTree,
};
pub use parse::{parse_assignments, parse_value};
pub use provenance::{stable_hash_string, to_canonical_json_bytes, RunProvenance};
pub use rng::{derive_substream_seed, RngHandle};

/// Builds a [`ParamMap`] from `key => value` pairs.
#[macro_export]
macro_rules! param_map {
    () => { $crate::ParamMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ParamMap::new();
        $( map.insert(($key).to_string(), $crate::ParamValue::from($value)); )+
        map
    }};
}
