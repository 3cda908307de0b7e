#![deny(missing_docs)]
//! Persistence for experiment runs: checkpoint artifacts, output directory
//! naming and the source archive.

pub mod archive;
/// Result and snapshot payloads.
pub mod artifacts;
pub mod clock;
/// Output directory resolution.
pub mod layout;
pub mod store;

pub use archive::write_source_archive;
pub use artifacts::{RunResult, Snapshot};
pub use clock::{
    Clock, FixedClock, SteppingClock, SystemClock, SNAPSHOT_STAMP_FORMAT, STAMP_FORMAT,
};
pub use layout::OutputLayout;
pub use store::{ArtifactKind, CheckpointStore, LoadOutcome};
