//! Ingestion subsystem
//!
//! Takes an uploaded capture file from intake to a persisted analysis.
//!
//! Components:
//! - `validation`: extension and size checks performed before any side effect.
//! - `folder_allocator`: reserves `<prefix><N>` storage folders and relocates uploads.
//! - `hasher`: streaming SHA-256 fingerprint of file content.
//! - `staging`: copies a caller's file aside so the original is left untouched.
//! - `pipeline`: the `Ingestor` orchestrating the steps above with decoding,
//!   aggregation and the analysis store.

pub mod folder_allocator;
pub mod hasher;
pub mod pipeline;
pub mod staging;
pub mod validation;

#[cfg(test)]
mod tests;

pub use folder_allocator::{FolderAllocator, StorageFolder, StoredUpload};
pub use hasher::sha256_file;
pub use pipeline::{Ingested, Ingestor, Upload};
pub use staging::stage_copy;
pub use validation::{check_extension, validate_upload};
