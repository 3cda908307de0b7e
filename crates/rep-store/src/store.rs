//! Checkpoint artifacts of one output directory.
//!
//! Loads are lenient: a missing or undecodable artifact is reported as absent
//! so a rerun starts over instead of crashing. Saves are atomic and any
//! failure is fatal.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rep_core::{ErrorInfo, RepError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::artifacts::Snapshot;
use crate::clock::{Clock, SNAPSHOT_STAMP_FORMAT};

const SNAPSHOT_PREFIX: &str = "snapshot-";
const EXTENSION: &str = ".json";

/// Primary artifacts of an output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Input data.
    Data,
    /// Resolved parameter tree.
    Params,
    /// Final solver result.
    Result,
}

impl ArtifactKind {
    /// File name inside the output directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Data => "data.json",
            ArtifactKind::Params => "params.json",
            ArtifactKind::Result => "result.json",
        }
    }
}

/// Result of probing for an artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<T> {
    /// Decoded successfully.
    Loaded(T),
    /// No file.
    Missing,
    /// File present but unreadable or undecodable.
    Corrupt(String),
}

impl<T> LoadOutcome<T> {
    /// Collapses the outcome into the lenient `Option` view.
    pub fn into_option(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            LoadOutcome::Missing | LoadOutcome::Corrupt(_) => None,
        }
    }
}

/// Reads and writes the checkpoint files of one output directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl CheckpointStore {
    /// Store rooted at an existing output directory.
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a primary artifact.
    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// `<dir>/<timestamp>-<suffix>` for logs and archives.
    pub fn timestamped(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}-{suffix}", self.clock.stamp()))
    }

    /// Distinguishes missing from corrupt artifacts.
    pub fn probe<T: DeserializeOwned>(&self, kind: ArtifactKind) -> LoadOutcome<T> {
        probe_path(&self.path(kind))
    }

    /// Lenient load: anything but a clean decode is absent.
    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Option<T> {
        let path = self.path(kind);
        match probe_path(&path) {
            LoadOutcome::Loaded(value) => {
                debug!(path = %path.display(), "loaded checkpoint");
                Some(value)
            }
            LoadOutcome::Missing => {
                debug!(path = %path.display(), "no checkpoint");
                None
            }
            LoadOutcome::Corrupt(reason) => {
                warn!(path = %path.display(), %reason, "ignoring unreadable checkpoint");
                None
            }
        }
    }

    /// Atomically replaces a primary artifact.
    pub fn save<T: Serialize>(&self, kind: ArtifactKind, value: &T) -> Result<PathBuf, RepError> {
        let path = self.path(kind);
        let tmp = self.write_temp(&encode(value, &path)?, &path)?;
        tmp.persist(&path)
            .map_err(|err| store_error("checkpoint-persist", &path, err.error))?;
        debug!(path = %path.display(), "saved checkpoint");
        Ok(path)
    }

    /// Writes a new snapshot file; never overwrites an existing one.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf, RepError> {
        let stamp = self.clock.now().format(SNAPSHOT_STAMP_FORMAT);
        let path = self.dir.join(format!(
            "{SNAPSHOT_PREFIX}{stamp}-{:06}{EXTENSION}",
            snapshot.index
        ));
        let tmp = self.write_temp(&encode(snapshot, &path)?, &path)?;
        tmp.persist_noclobber(&path)
            .map_err(|err| store_error("snapshot-persist", &path, err.error))?;
        debug!(path = %path.display(), index = snapshot.index, "saved snapshot");
        Ok(path)
    }

    /// Every readable snapshot in creation order.
    pub fn list_snapshots(&self) -> Result<Vec<Snapshot>, RepError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(store_error("snapshot-list", &self.dir, err)),
        };
        let mut named = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| store_error("snapshot-list", &self.dir, err))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(key) = snapshot_key(&name) {
                named.push((key, entry.path()));
            }
        }
        named.sort();

        let mut snapshots = Vec::with_capacity(named.len());
        for (_, path) in named {
            match probe_path::<Snapshot>(&path) {
                LoadOutcome::Loaded(snapshot) => snapshots.push(snapshot),
                LoadOutcome::Missing => {}
                LoadOutcome::Corrupt(reason) => {
                    warn!(path = %path.display(), %reason, "skipping unreadable snapshot");
                }
            }
        }
        Ok(snapshots)
    }

    fn write_temp(&self, bytes: &[u8], path: &Path) -> Result<NamedTempFile, RepError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|err| store_error("checkpoint-tempfile", path, err))?;
        tmp.write_all(bytes)
            .map_err(|err| store_error("checkpoint-write", path, err))?;
        tmp.as_file()
            .sync_all()
            .map_err(|err| store_error("checkpoint-sync", path, err))?;
        Ok(tmp)
    }
}

fn probe_path<T: DeserializeOwned>(path: &Path) -> LoadOutcome<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(err) => return LoadOutcome::Corrupt(err.to_string()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => LoadOutcome::Loaded(value),
        Err(err) => LoadOutcome::Corrupt(err.to_string()),
    }
}

fn encode<T: Serialize>(value: &T, path: &Path) -> Result<Vec<u8>, RepError> {
    serde_json::to_vec_pretty(value).map_err(|err| {
        RepError::Serde(
            ErrorInfo::new("checkpoint-serialize", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

/// `(timestamp, index)` of a snapshot file name.
fn snapshot_key(name: &str) -> Option<(String, u64)> {
    let stem = name.strip_prefix(SNAPSHOT_PREFIX)?.strip_suffix(EXTENSION)?;
    let (stamp, index) = stem.split_once('-')?;
    if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((stamp.to_string(), index.parse().ok()?))
}

pub(crate) fn store_error(code: &str, path: &Path, err: impl ToString) -> RepError {
    RepError::Store(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::snapshot_key;

    #[test]
    fn snapshot_names_parse() {
        assert_eq!(
            snapshot_key("snapshot-20240102030405006-000042.json"),
            Some(("20240102030405006".to_string(), 42))
        );
        assert_eq!(snapshot_key("snapshot-x-1.json"), None);
        assert_eq!(snapshot_key("result.json"), None);
        assert_eq!(snapshot_key("snapshot-2024-1.json.tmp"), None);
    }
}
