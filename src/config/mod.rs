use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::utils::{ensure_dir, PathResolver};
use crate::errors::StorageResult;
use crate::utils::persistence::{read_json, write_json_atomic};

const DEFAULT_BACKUP_RETENTION: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Treat batches whose receipt reported errors as paid out.
    pub accept_receipts_with_errors: bool,
    /// Let a simulation that would create an overpayment pass control.
    pub allow_overpayment_in_simulation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub backup_retention: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accept_receipts_with_errors: false,
            allow_overpayment_in_simulation: true,
            data_dir: None,
            backup_retention: DEFAULT_BACKUP_RETENTION,
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        PathResolver::resolve_base(self.data_dir.clone())
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> StorageResult<Self> {
        Self::with_base_dir(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> StorageResult<Self> {
        ensure_dir(&PathResolver::config_dir_in(&base))?;
        Ok(Self {
            path: PathResolver::config_file_in(&base),
        })
    }

    /// A missing file yields the defaults.
    pub fn load(&self) -> StorageResult<Config> {
        if self.path.exists() {
            read_json(&self.path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, config: &Config) -> StorageResult<()> {
        write_json_atomic(&self.path, config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
