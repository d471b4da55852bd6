//! Analysis store trait
//!
//! Defines `AnalysisStore`, the persistence seam between the ingestion
//! pipeline and a backend. Implementors are responsible for:
//! - Upserting analysis results keyed by content fingerprint
//! - Serving record lookups by fingerprint and by storage folder
//! - Paginated listings of captures and of storage folders
//!
//! Reads never have side effects. Absence is reported as `Ok(None)`, not as an error.

use std::future::Future;

use crate::analysis::AnalysisResult;
use crate::error_handling::types::StorageError;
use crate::storage::types::{FolderOrder, PageRequest, PcapListing, PcapRecord, UploadMeta};

pub trait AnalysisStore: Send + Sync {
    /// Inserts the result, or updates the existing row with the same fingerprint.
    ///
    /// On update the name, size, summary and `updated_at` are replaced. The
    /// uploader and folder are only replaced when `meta` supplies them;
    /// `created_at` is never touched.
    fn upsert_analysis(
        &self,
        result: &AnalysisResult,
        meta: &UploadMeta,
    ) -> impl Future<Output = Result<PcapRecord, StorageError>> + Send;

    fn find_by_sha256(
        &self,
        sha256: &str,
    ) -> impl Future<Output = Result<Option<PcapRecord>, StorageError>> + Send;

    /// Listing owning the given storage folder.
    fn find_by_folder(
        &self,
        folder_name: &str,
    ) -> impl Future<Output = Result<Option<PcapListing>, StorageError>> + Send;

    /// Newest first by id.
    fn list_pcaps(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<PcapListing>, StorageError>> + Send;

    /// Records that own a storage folder, ordered by creation time.
    fn list_folders(
        &self,
        order: FolderOrder,
        limit: Option<u64>,
    ) -> impl Future<Output = Result<Vec<PcapListing>, StorageError>> + Send;

    fn latest_folder(
        &self,
    ) -> impl Future<Output = Result<Option<PcapListing>, StorageError>> + Send {
        async move {
            Ok(self
                .list_folders(FolderOrder::Desc, Some(1))
                .await?
                .into_iter()
                .next())
        }
    }

    fn oldest_folder(
        &self,
    ) -> impl Future<Output = Result<Option<PcapListing>, StorageError>> + Send {
        async move {
            Ok(self
                .list_folders(FolderOrder::Asc, Some(1))
                .await?
                .into_iter()
                .next())
        }
    }
}
