use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rep_core::RepError;
use tracing::info;

use crate::clock::Clock;
use crate::store::store_error;

/// Output directory chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Directory holding every artifact of the run.
    pub dir: PathBuf,
    /// Whether the directory was supplied by the caller.
    pub explicit: bool,
}

impl OutputLayout {
    /// Resolves and creates the output directory.
    ///
    /// An explicit directory is reused as-is. Otherwise a fresh
    /// `<root>/<timestamp>-<label>` is claimed, adding `-1`, `-2`, ... until the
    /// name is unused.
    pub fn resolve(
        explicit: Option<&Path>,
        label: &str,
        root: &Path,
        clock: &dyn Clock,
    ) -> Result<Self, RepError> {
        if let Some(dir) = explicit {
            fs::create_dir_all(dir).map_err(|err| store_error("output-mkdir", dir, err))?;
            info!(dir = %dir.display(), "reusing output directory");
            return Ok(Self {
                dir: dir.to_path_buf(),
                explicit: true,
            });
        }

        fs::create_dir_all(root).map_err(|err| store_error("output-mkdir", root, err))?;
        let base = format!("{}-{label}", clock.stamp());
        let mut attempt = 0usize;
        loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}-{attempt}")
            };
            let dir = root.join(name);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    info!(dir = %dir.display(), "created output directory");
                    return Ok(Self {
                        dir,
                        explicit: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(store_error("output-mkdir", &dir, err)),
            }
        }
    }
}
