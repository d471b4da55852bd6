use super::types::ConfigOverrides;
use crate::error_handling::types::ConfigError;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration of the ingestion pipeline.
///
/// Values are resolved in three layers: built-in defaults, then an optional TOML
/// file (`Config::from_file`), then command-line flags or environment variables
/// (`Config::apply_overrides`). Call `validate` once the final value is known.
///
/// # Fields Overview
///
/// - `storage_dir`: base directory for the numbered `<prefix><N>` capture folders
/// - `staging_dir`: scratch area for copies made by `ingest --keep-source`
/// - `database_path`: SQLite file backing the analysis store
/// - `max_upload_mb`: uploads above this size are rejected before any side effect
/// - `tshark_path`: explicit decoder location, checked before well-known paths and `PATH`
/// - `decoder_timeout_secs`: optional wall-clock limit for one decoder run
/// - `folder_prefix`: prefix of the capture folder names (`pcap` gives `pcap1`, `pcap2`, ...)
///
/// # Examples
///
/// ```
/// use pcapvault::configuration::config::Config;
///
/// let config = Config::from_toml_str("max_upload_mb = 50").unwrap();
/// assert_eq!(config.max_upload_bytes(), 50 * 1024 * 1024);
/// assert_eq!(config.folder_prefix, "pcap");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub storage_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub database_path: PathBuf,
    pub max_upload_mb: u64,
    pub tshark_path: Option<PathBuf>,
    pub decoder_timeout_secs: Option<u64>,
    pub folder_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("uploads").join("pcaps"),
            staging_dir: PathBuf::from("uploads").join("pcap"),
            database_path: PathBuf::from("pcapvault.sqlite3"),
            max_upload_mb: Self::DEFAULT_MAX_UPLOAD_MB,
            tshark_path: None,
            decoder_timeout_secs: None,
            folder_prefix: String::from("pcap"),
        }
    }
}

impl Config {
    pub const DEFAULT_MAX_UPLOAD_MB: u64 = 200;
    const MAX_UPLOAD_MB_CEILING: u64 = 10 * 1024;

    /// Reads and parses a TOML configuration file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// Applies every `Some` field of `overrides` on top of the current values.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(dir) = &overrides.storage_dir {
            self.storage_dir = dir.clone();
        }
        if let Some(dir) = &overrides.staging_dir {
            self.staging_dir = dir.clone();
        }
        if let Some(path) = &overrides.database_path {
            self.database_path = path.clone();
        }
        if let Some(mb) = overrides.max_upload_mb {
            self.max_upload_mb = mb;
        }
        if let Some(path) = &overrides.tshark_path {
            self.tshark_path = Some(path.clone());
        }
        if let Some(secs) = overrides.decoder_timeout_secs {
            self.decoder_timeout_secs = Some(secs);
        }
        if let Some(prefix) = &overrides.folder_prefix {
            self.folder_prefix = prefix.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=Self::MAX_UPLOAD_MB_CEILING).contains(&self.max_upload_mb) {
            return Err(ConfigError::NotInRange(format!(
                "max_upload_mb must be between 1 and {}, got {}",
                Self::MAX_UPLOAD_MB_CEILING,
                self.max_upload_mb
            )));
        }
        if self.decoder_timeout_secs == Some(0) {
            return Err(ConfigError::NotInRange(
                "decoder_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.folder_prefix.is_empty()
            || !self.folder_prefix.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::InvalidValue(format!(
                "folder_prefix must be a non-empty ASCII alphabetic string, got {:?}",
                self.folder_prefix
            )));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "storage_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn decoder_timeout(&self) -> Option<Duration> {
        self.decoder_timeout_secs.map(Duration::from_secs)
    }
}
