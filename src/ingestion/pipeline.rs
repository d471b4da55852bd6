use log::{debug, error, info, warn};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::folder_allocator::FolderAllocator;
use super::hasher::sha256_file;
use super::validation::{check_extension, validate_upload};
use crate::analysis::{Aggregator, AnalysisResult};
use crate::configuration::Config;
use crate::decoding::{map_packet, TsharkDecoder};
use crate::error_handling::types::{ConfigError, IngestError, ValidationError};
use crate::storage::{AnalysisStore, UploadMeta};

/// A capture file handed to the pipeline.
///
/// `path` is consumed: on success the file has been moved into storage.
#[derive(Debug, Clone)]
pub struct Upload {
    pub path: PathBuf,
    pub original_name: String,
    pub uploaded_by_id: Option<i64>,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingested {
    pub record_id: i32,
    pub folder: String,
    pub stored_path: PathBuf,
    pub analysis: AnalysisResult,
}

/// Drives one upload from intake to a persisted analysis.
///
/// Steps run strictly in order: validate, reserve a folder and move the file
/// into it, fingerprint, decode, aggregate, upsert. Any failure ends the
/// ingestion; a folder reserved before the failure stays on disk and nothing
/// is persisted.
pub struct Ingestor<S: AnalysisStore> {
    store: Arc<S>,
    decoder: TsharkDecoder,
    allocator: FolderAllocator,
    max_upload_bytes: u64,
}

impl<S: AnalysisStore> Clone for Ingestor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            decoder: self.decoder.clone(),
            allocator: self.allocator.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

// Runs blocking filesystem work off the async workers.
async fn blocking<T, F>(context: &Path, work: F) -> Result<T, IngestError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, IngestError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!("Blocking task for {} did not complete: {}", context.display(), e);
        IngestError::io(context, io::Error::other(e))
    })?
}

impl<S: AnalysisStore> Ingestor<S> {
    pub fn new(
        store: Arc<S>,
        decoder: TsharkDecoder,
        allocator: FolderAllocator,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            store,
            decoder,
            allocator,
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &Config, store: Arc<S>) -> Result<Self, ConfigError> {
        Ok(Self::new(
            store,
            TsharkDecoder::from_config(config),
            FolderAllocator::from_config(config)?,
            config.max_upload_bytes(),
        ))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn allocator(&self) -> &FolderAllocator {
        &self.allocator
    }

    pub async fn ingest(&self, upload: Upload) -> Result<Ingested, IngestError> {
        let reject = |e: ValidationError| {
            warn!("Rejected upload {}: {}", upload.original_name, e);
            e
        };
        check_extension(&upload.original_name).map_err(reject)?;
        let size = tokio::fs::metadata(&upload.path)
            .await
            .map_err(|e| IngestError::io(&upload.path, e))?
            .len();
        validate_upload(&upload.original_name, size, self.max_upload_bytes).map_err(reject)?;
        info!("Ingesting {} ({} bytes)", upload.original_name, size);

        let allocator = self.allocator.clone();
        let source = upload.path.clone();
        let name = upload.original_name.clone();
        let stored = blocking(&upload.path, move || {
            allocator
                .allocate_and_relocate(&source, &name)
                .map_err(IngestError::from)
        })
        .await?;

        let analysis = match self
            .analyze_file(&stored.file_path, &upload.original_name)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(
                    "Analysis failed, storage folder {} left in place: {}",
                    stored.folder.name, e
                );
                return Err(e);
            }
        };

        let meta = UploadMeta {
            uploaded_by_id: upload.uploaded_by_id,
            folder_name: Some(stored.folder.name.clone()),
        };
        let record = self.store.upsert_analysis(&analysis, &meta).await?;
        info!(
            "Stored {} as record {} in {} ({} packets)",
            analysis.sha256, record.id, stored.folder.name, analysis.packet_count
        );

        Ok(Ingested {
            record_id: record.id,
            folder: stored.folder.name,
            stored_path: stored.file_path,
            analysis,
        })
    }

    /// Fingerprints, decodes and summarizes a file in place. Nothing is
    /// allocated or persisted.
    pub async fn analyze_file(
        &self,
        path: &Path,
        original_name: &str,
    ) -> Result<AnalysisResult, IngestError> {
        let target = path.to_path_buf();
        let (sha256, size) = blocking(path, move || {
            let size = std::fs::metadata(&target)
                .map_err(|e| IngestError::io(&target, e))?
                .len();
            let sha256 = sha256_file(&target).map_err(|e| IngestError::io(&target, e))?;
            Ok((sha256, size))
        })
        .await?;
        debug!("Fingerprint of {} is {}", path.display(), sha256);

        let frames = self.decoder.decode(path).await?;

        let summary = blocking(path, move || {
            let mut aggregator = Aggregator::new();
            for (position, frame) in frames.iter().enumerate() {
                aggregator.observe(map_packet(frame, position));
            }
            Ok(aggregator.finish())
        })
        .await?;
        info!(
            "Analyzed {}: {} packets, {} protocols",
            original_name,
            summary.packet_count,
            summary.protocols.len()
        );

        Ok(AnalysisResult::new(
            sha256,
            original_name.to_string(),
            size,
            summary,
        ))
    }

    /// Path of the file kept in `folder_name`, checked to exist on disk.
    pub async fn locate_stored_file(&self, folder_name: &str) -> Result<PathBuf, IngestError> {
        if !self.allocator.is_folder_name(folder_name) {
            return Err(IngestError::InvalidFolderName(folder_name.to_string()));
        }
        let listing = self
            .store
            .find_by_folder(folder_name)
            .await?
            .ok_or_else(|| IngestError::RecordNotFound(folder_name.to_string()))?;

        let path = self
            .allocator
            .stored_file_path(folder_name, &listing.original_name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => {
                warn!("Stored file {} is missing", path.display());
                Err(IngestError::StoredFileMissing(path))
            }
        }
    }
}
