//! Runner configuration loaded from YAML.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rep_core::{ErrorInfo, RepError};
use serde::{Deserialize, Serialize};

/// What the plot hook should do with its figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotMode {
    /// Render and display.
    #[default]
    Show,
    /// Render without displaying.
    Hide,
    /// Skip rendering.
    No,
}

impl PlotMode {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotMode::Show => "show",
            PlotMode::Hide => "hide",
            PlotMode::No => "no",
        }
    }
}

impl fmt::Display for PlotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlotMode {
    type Err = RepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "show" => Ok(PlotMode::Show),
            "hide" => Ok(PlotMode::Hide),
            "no" => Ok(PlotMode::No),
            other => Err(RepError::Config(
                ErrorInfo::new("plot-mode", format!("unknown plot mode '{other}'"))
                    .with_hint("use one of show, hide, no"),
            )),
        }
    }
}

/// YAML-configurable settings shared by every run of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Parent of generated output directories.
    #[serde(default = "default_results_root")]
    pub results_root: PathBuf,
    /// Solver used when the invocation names none.
    #[serde(default = "default_solver")]
    pub default_solver: String,
    /// Plot mode used when the invocation names none.
    #[serde(default)]
    pub plot: PlotMode,
    /// Directories archived into `<timestamp>-source.zip`; the crates of this
    /// workspace by default.
    #[serde(default = "default_source_roots")]
    pub source_roots: Vec<PathBuf>,
    /// Whether to write the source archive at all.
    #[serde(default = "default_archive_source")]
    pub archive_source: bool,
}

fn default_results_root() -> PathBuf {
    PathBuf::from("./results")
}

fn default_solver() -> String {
    "pdhg".to_string()
}

fn default_source_roots() -> Vec<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .into_iter()
        .collect()
}

fn default_archive_source() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            results_root: default_results_root(),
            default_solver: default_solver(),
            plot: PlotMode::default(),
            source_roots: default_source_roots(),
            archive_source: default_archive_source(),
        }
    }
}

impl RunnerConfig {
    /// Parses a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, RepError> {
        serde_yaml::from_str(text).map_err(|err| {
            RepError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_hint("see RunnerConfig for the accepted keys"),
            )
        })
    }

    /// Reads and parses a YAML file; a missing file is a configuration error.
    pub fn load(path: &Path) -> Result<Self, RepError> {
        let text = fs::read_to_string(path).map_err(|err| {
            RepError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml(&text).map_err(|err| {
            RepError::Config(
                err.info()
                    .clone()
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
