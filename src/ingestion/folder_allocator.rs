use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::configuration::Config;
use crate::error_handling::types::{AllocationError, ConfigError};

/// Upper bound on directory creation attempts for one allocation.
pub const MAX_ALLOCATION_ATTEMPTS: u64 = 1_000_000_000;

pub const MAX_FILE_NAME_LEN: usize = 255;

const FALLBACK_FILE_NAME: &str = "upload.pcap";

/// A reserved `<prefix><N>` directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageFolder {
    pub name: String,
    pub path: PathBuf,
}

/// A file relocated into its storage folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredUpload {
    pub folder: StorageFolder,
    pub file_path: PathBuf,
}

/// Reserves numbered storage folders and moves uploads into them.
///
/// Reservation relies on `create_dir` failing with `AlreadyExists` when the
/// name is taken, so concurrent allocators (threads or processes) sharing a
/// base directory never hand out the same folder. There is no in-process
/// counter: each allocation scans for the highest existing number and probes
/// upward from there. All methods block and belong on `spawn_blocking` in
/// async code.
#[derive(Debug, Clone)]
pub struct FolderAllocator {
    base_dir: PathBuf,
    prefix: String,
    max_attempts: u64,
    pattern: Regex,
}

impl FolderAllocator {
    pub fn new<P: Into<PathBuf>>(base_dir: P, prefix: &str) -> Result<Self, ConfigError> {
        if prefix.is_empty() {
            return Err(ConfigError::InvalidValue(
                "folder prefix must not be empty".to_string(),
            ));
        }
        let pattern = Regex::new(&format!(r"^{}[0-9]+$", regex::escape(prefix)))
            .map_err(|e| ConfigError::InvalidValue(format!("folder prefix '{}': {}", prefix, e)))?;
        Ok(Self {
            base_dir: base_dir.into(),
            prefix: prefix.to_string(),
            max_attempts: MAX_ALLOCATION_ATTEMPTS,
            pattern,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.storage_dir.clone(), &config.folder_prefix)
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True for names of the form `<prefix><digits>`.
    pub fn is_folder_name(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    fn folder_number(&self, name: &str) -> Option<u64> {
        if !self.is_folder_name(name) {
            return None;
        }
        name[self.prefix.len()..].parse().ok()
    }

    /// One past the highest existing `<prefix><N>` directory, or 1.
    fn first_candidate(&self) -> io::Result<u64> {
        let mut highest = 0u64;
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(n) = entry.file_name().to_str().and_then(|n| self.folder_number(n)) {
                highest = highest.max(n);
            }
        }
        Ok(highest.saturating_add(1))
    }

    /// Reserves the next free storage folder.
    pub fn allocate(&self) -> Result<StorageFolder, AllocationError> {
        fs::create_dir_all(&self.base_dir).map_err(|source| AllocationError::Io {
            path: self.base_dir.clone(),
            source,
        })?;
        let start = self.first_candidate().map_err(|source| AllocationError::Io {
            path: self.base_dir.clone(),
            source,
        })?;

        for attempt in 0..self.max_attempts {
            let Some(n) = start.checked_add(attempt) else {
                break;
            };
            let name = format!("{}{}", self.prefix, n);
            let path = self.base_dir.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => {
                    info!("Reserved storage folder {}", path.display());
                    return Ok(StorageFolder { name, path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Storage folder {} already taken", name);
                }
                Err(source) => return Err(AllocationError::Io { path, source }),
            }
        }

        warn!(
            "Folder allocation exhausted after {} attempts in {}",
            self.max_attempts,
            self.base_dir.display()
        );
        Err(AllocationError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    /// Moves `source` into `folder` under its sanitized original name.
    pub fn relocate(
        &self,
        folder: &StorageFolder,
        source: &Path,
        original_name: &str,
    ) -> Result<PathBuf, AllocationError> {
        let destination = folder.path.join(sanitize_file_name(original_name, source));
        move_file(source, &destination).map_err(|e| AllocationError::Io {
            path: destination.clone(),
            source: e,
        })?;
        debug!("Moved {} to {}", source.display(), destination.display());
        Ok(destination)
    }

    /// Reserves a folder and moves the upload into it. A folder whose
    /// relocation failed stays reserved.
    pub fn allocate_and_relocate(
        &self,
        source: &Path,
        original_name: &str,
    ) -> Result<StoredUpload, AllocationError> {
        let folder = self.allocate()?;
        match self.relocate(&folder, source, original_name) {
            Ok(file_path) => Ok(StoredUpload { folder, file_path }),
            Err(e) => {
                warn!("Leaving empty storage folder {}: {}", folder.name, e);
                Err(e)
            }
        }
    }

    /// Where an upload named `original_name` lives inside `folder_name`.
    pub fn stored_file_path(&self, folder_name: &str, original_name: &str) -> PathBuf {
        self.base_dir
            .join(folder_name)
            .join(sanitize_file_name(original_name, Path::new("")))
    }
}

/// Maps a client-supplied name to a safe single path component.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`, the result is cut to 255
/// characters, and names made only of dots are neutralized. An empty result
/// falls back to the basename of `source`.
pub fn sanitize_file_name(name: &str, source: &Path) -> String {
    let sanitized = sanitize_component(name);
    if !sanitized.is_empty() {
        return sanitized;
    }
    let fallback = source
        .file_name()
        .map(|n| sanitize_component(&n.to_string_lossy()))
        .unwrap_or_default();
    if fallback.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        fallback
    }
}

fn sanitize_component(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();
    if !out.is_empty() && out.chars().all(|c| c == '.') {
        out = out.replace('.', "_");
    }
    out
}

/// Rename, or copy then delete when source and destination are on different filesystems.
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(
                "Cross-device move of {}, copying instead",
                source.display()
            );
            copy_then_remove(source, destination)
        }
        Err(e) => Err(e),
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination)?;
    fs::remove_file(source)
}

fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices
}
