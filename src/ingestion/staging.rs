use chrono::Utc;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::folder_allocator::{sanitize_file_name, MAX_FILE_NAME_LEN};

/// Copies `source` into `staging_dir` under a unique name, leaving the
/// original untouched. The copy is what gets relocated into storage.
///
/// Staged names look like `20250101T120000Z_1a2b3c4d_trace.pcap`. Long names
/// keep their tail so the whole name stays within `MAX_FILE_NAME_LEN`.
pub fn stage_copy(source: &Path, staging_dir: &Path, original_name: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(staging_dir)?;
    let token = Uuid::new_v4().simple().to_string();
    let prefix = format!("{}_{}_", Utc::now().format("%Y%m%dT%H%M%SZ"), &token[..8]);
    let sanitized = sanitize_file_name(original_name, source);
    // sanitized names are ASCII, so any byte offset is a char boundary
    let budget = MAX_FILE_NAME_LEN - prefix.len();
    let tail = &sanitized[sanitized.len().saturating_sub(budget)..];
    let staged = staging_dir.join(format!("{}{}", prefix, tail));
    fs::copy(source, &staged)?;
    debug!("Staged {} as {}", source.display(), staged.display());
    Ok(staged)
}
