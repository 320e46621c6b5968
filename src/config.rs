//! Configuration file handling.
//!
//! Settings come from `casestats.toml` (or `--config FILE`); command-line
//! flags override them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::Palette;
use crate::error::CaseError;
use crate::output::WriteFormat;

pub const DEFAULT_CONFIG_FILE: &str = "casestats.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub palette: Palette,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Case export to load.
    #[serde(default = "default_cases_path")]
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_cases_path(),
        }
    }
}

fn default_cases_path() -> PathBuf {
    PathBuf::from("vitaldb_cases.csv")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: WriteFormat,
}

impl Config {
    /// Load `explicit` if given, else the default file when it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CaseError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CaseError> {
        let content = std::fs::read_to_string(path).map_err(|e| CaseError::io(path, e))?;
        let config = toml::from_str(&content).map_err(|source| CaseError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }
}
