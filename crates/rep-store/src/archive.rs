//! Zip archive of the source tree a run was produced with.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use rep_core::RepError;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::store::store_error;

const EXCLUDED: [&str; 6] = [
    "target/**",
    "**/target/**",
    ".git/**",
    "**/.git/**",
    "results/**",
    "**/results/**",
];

fn excluded_set() -> Result<GlobSet, RepError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in EXCLUDED {
        let glob = Glob::new(pattern)
            .map_err(|err| store_error("archive-glob", Path::new(pattern), err))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| store_error("archive-glob", Path::new("excludes"), err))
}

fn normalise(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn inside(path: &Path, dir: Option<&Path>) -> bool {
    match (dir, path.canonicalize()) {
        (Some(dir), Ok(path)) => path.starts_with(dir),
        _ => false,
    }
}

/// Zips every file below `roots` into `dest` and returns the archived entry names.
///
/// Build output, version control metadata, result directories and the
/// directory receiving the archive are skipped.
/// Missing roots are logged and ignored.
pub fn write_source_archive(roots: &[PathBuf], dest: &Path) -> Result<Vec<String>, RepError> {
    let excluded = excluded_set()?;
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let tmp = NamedTempFile::new_in(parent)
        .map_err(|err| store_error("archive-tempfile", dest, err))?;
    let mut writer = ZipWriter::new(tmp);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let output_dir = parent.canonicalize().ok();
    let mut entries = Vec::new();

    for root in roots {
        if !root.exists() {
            warn!(root = %root.display(), "source root does not exist, skipping");
            continue;
        }
        let prefix = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            if excluded.is_match(rel) || inside(entry.path(), output_dir.as_deref()) {
                continue;
            }
            let name = format!("{prefix}/{}", normalise(rel));
            let bytes = fs::read(entry.path())
                .map_err(|err| store_error("archive-read", entry.path(), err))?;
            writer
                .start_file(name.as_str(), options)
                .map_err(|err| store_error("archive-write", dest, err))?;
            writer
                .write_all(&bytes)
                .map_err(|err| store_error("archive-write", dest, err))?;
            entries.push(name);
        }
    }

    let tmp = writer
        .finish()
        .map_err(|err| store_error("archive-write", dest, err))?;
    tmp.persist(dest)
        .map_err(|err| store_error("archive-persist", dest, err.error))?;
    debug!(dest = %dest.display(), files = entries.len(), "wrote source archive");
    Ok(entries)
}
