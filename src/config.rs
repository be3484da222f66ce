// Configuration module
// TOML settings from an explicit path or <config dir>/passfail/config.toml; every field has a default

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::hash::scan::DEFAULT_PROGRESS_INTERVAL;
use crate::hash::VerifyError;

const CONFIG_DIR_NAME: &str = "passfail";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Verification engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Raw lines processed per dictionary between progress ticks
    pub progress_interval: u64,
    /// Count lines of file dictionaries up front so progress has a total
    pub count_lines: bool,
    /// Folder searched for `.txt` wordlists when none are given explicitly
    pub wordlist_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            count_lines: true,
            wordlist_dir: None,
        }
    }
}

impl EngineConfig {
    /// Default location of the config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from an explicit path; the file must exist
    pub fn load(path: &Path) -> Result<Self, VerifyError> {
        let content = fs::read_to_string(path).map_err(|source| VerifyError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load_default() -> Result<Self, VerifyError> {
        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content, &path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(VerifyError::ConfigRead { path, source }),
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, VerifyError> {
        let mut config: EngineConfig =
            toml::from_str(content).map_err(|e| VerifyError::ConfigParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.progress_interval = config.progress_interval.max(1);
        Ok(config)
    }
}
