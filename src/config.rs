// Store configuration: data location, target database and conventions

use crate::identity::NamingConvention;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_DATABASE: &str = "TeaCollection";
pub const DEFAULT_MAX_REQUESTS_PER_SESSION: u32 = 30;
const CONFIG_FILE: &str = "teastore.yml";

/// Conventions every session of a store follows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conventions {
    pub naming: NamingConvention,
    pub max_requests_per_session: u32,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            naming: NamingConvention::default(),
            max_requests_per_session: DEFAULT_MAX_REQUESTS_PER_SESSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per database
    pub data_dir: PathBuf,
    /// Database sessions open by default
    pub database: String,
    pub conventions: Conventions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: DEFAULT_DATABASE.to_string(),
            conventions: Conventions::default(),
        }
    }
}

impl StoreConfig {
    /// A config rooted at `data_dir` with default database and conventions
    pub fn at<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.conventions.naming = naming;
        self
    }

    /// Load config from `path`, or from the default location if it exists,
    /// falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: StoreConfig =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(config = ?path, database = config.database.as_str(), "Loaded config");
        Ok(config)
    }
}

/// `<config dir>/teastore/teastore.yml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("teastore").join(CONFIG_FILE))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("teastore"))
        .unwrap_or_else(|| PathBuf::from(".teastore"))
}
