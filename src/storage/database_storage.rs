use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, error, info};
use sea_orm::sea_query::{Index, OnConflict};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, Order, QueryFilter, QueryOrder, QuerySelect, Schema, Select,
};

use crate::analysis::AnalysisResult;
use crate::error_handling::types::StorageError;
use crate::storage::db_entities as pcaps;
use crate::storage::storage_trait::AnalysisStore;
use crate::storage::types::{
    clamp_limit, FolderOrder, PageRequest, PcapListing, PcapRecord, UploadMeta,
    DEFAULT_FOLDER_LIMIT,
};

const LISTING_COLUMNS: [pcaps::Column; 8] = [
    pcaps::Column::Id,
    pcaps::Column::Sha256,
    pcaps::Column::OriginalName,
    pcaps::Column::Size,
    pcaps::Column::UploadedById,
    pcaps::Column::FolderName,
    pcaps::Column::CreatedAt,
    pcaps::Column::UpdatedAt,
];

// Row projection for listings, skips the summary payload
#[derive(Debug, FromQueryResult)]
struct ListingRow {
    id: i32,
    sha256: String,
    original_name: String,
    size: i64,
    uploaded_by_id: Option<i64>,
    folder_name: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ListingRow {
    fn into_listing(self) -> Result<PcapListing, StorageError> {
        Ok(PcapListing {
            id: self.id,
            size: stored_size(self.size, &self.sha256)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            sha256: self.sha256,
            original_name: self.original_name,
            uploaded_by_id: self.uploaded_by_id,
            folder_name: self.folder_name,
        })
    }
}

fn into_record(model: pcaps::Model) -> Result<PcapRecord, StorageError> {
    let summary: AnalysisResult = serde_json::from_str(&model.summary_json).map_err(|e| {
        error!("Failed to decode stored summary for {}: {}", model.sha256, e);
        StorageError::CorruptRecord(format!("summary of {}: {}", model.sha256, e))
    })?;
    Ok(PcapRecord {
        id: model.id,
        size: stored_size(model.size, &model.sha256)?,
        created_at: parse_timestamp(&model.created_at)?,
        updated_at: parse_timestamp(&model.updated_at)?,
        sha256: model.sha256,
        original_name: model.original_name,
        summary,
        uploaded_by_id: model.uploaded_by_id,
        folder_name: model.folder_name,
    })
}

fn stored_size(size: i64, sha256: &str) -> Result<u64, StorageError> {
    u64::try_from(size)
        .map_err(|_| StorageError::CorruptRecord(format!("negative size for {}", sha256)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRecord(format!("timestamp '{}': {}", value, e)))
}

// Fixed-width UTC timestamps sort lexicographically in time order
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite-backed `AnalysisStore` built on SeaORM.
///
/// The schema is created idempotently when the store is opened. The
/// connection pool is shared, so the store can be used from concurrent
/// ingestion tasks.
#[derive(Debug, Clone)]
pub struct DatabaseStorage {
    db: DatabaseConnection,
    path: PathBuf,
}

impl DatabaseStorage {
    /// Default database filename used in the application's working directory
    pub const DEFAULT_DB_FILE: &'static str = "pcapvault.sqlite3";

    /// Creates or opens the database file at `path`, creating parent directories.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create database dir {}: {}", parent.display(), e);
                StorageError::ConnectionFailed(DbErr::Custom(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
        options.max_connections(5).sqlx_logging(false);
        let db = Database::connect(options).await.map_err(|e| {
            error!("Failed to open database {}: {}", path.display(), e);
            StorageError::ConnectionFailed(e)
        })?;

        Self::ensure_schema(&db).await.map_err(|e| {
            error!("Failed to create schema in {}: {}", path.display(), e);
            StorageError::WriteFailed(e)
        })?;
        info!("Analysis store ready at {}", path.display());

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
        let backend = db.get_database_backend();
        let schema = Schema::new(backend);

        let mut table = schema.create_table_from_entity(pcaps::Entity);
        table.if_not_exists();
        db.execute(backend.build(&table)).await?;

        let created_at_index = Index::create()
            .if_not_exists()
            .name("idx_pcaps_created_at")
            .table(pcaps::Entity)
            .col(pcaps::Column::CreatedAt)
            .to_owned();
        db.execute(backend.build(&created_at_index)).await?;
        Ok(())
    }

    fn listing_query() -> Select<pcaps::Entity> {
        pcaps::Entity::find().select_only().columns(LISTING_COLUMNS)
    }

    async fn fetch_listings(
        &self,
        query: Select<pcaps::Entity>,
    ) -> Result<Vec<PcapListing>, StorageError> {
        let rows = query
            .into_model::<ListingRow>()
            .all(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to list pcaps: {}", e);
                StorageError::ReadFailed(e)
            })?;
        rows.into_iter().map(ListingRow::into_listing).collect()
    }
}

impl AnalysisStore for DatabaseStorage {
    async fn upsert_analysis(
        &self,
        result: &AnalysisResult,
        meta: &UploadMeta,
    ) -> Result<PcapRecord, StorageError> {
        let size = i64::try_from(result.size).map_err(|_| {
            StorageError::WriteFailed(DbErr::Custom(format!(
                "size {} does not fit the schema",
                result.size
            )))
        })?;
        let summary_json = serde_json::to_string(result)
            .map_err(|e| StorageError::WriteFailed(DbErr::Custom(e.to_string())))?;
        let now = now_timestamp();

        let row = pcaps::ActiveModel {
            id: NotSet,
            sha256: Set(result.sha256.clone()),
            original_name: Set(result.original_name.clone()),
            size: Set(size),
            summary_json: Set(summary_json),
            uploaded_by_id: Set(meta.uploaded_by_id),
            folder_name: Set(meta.folder_name.clone()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let mut update_columns = vec![
            pcaps::Column::OriginalName,
            pcaps::Column::Size,
            pcaps::Column::SummaryJson,
            pcaps::Column::UpdatedAt,
        ];
        if meta.uploaded_by_id.is_some() {
            update_columns.push(pcaps::Column::UploadedById);
        }
        if meta.folder_name.is_some() {
            update_columns.push(pcaps::Column::FolderName);
        }

        pcaps::Entity::insert(row)
            .on_conflict(
                OnConflict::column(pcaps::Column::Sha256)
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to upsert analysis {}: {}", result.sha256, e);
                StorageError::WriteFailed(e)
            })?;
        debug!(
            "Upserted analysis {} (folder {:?})",
            result.sha256, meta.folder_name
        );

        self.find_by_sha256(&result.sha256).await?.ok_or_else(|| {
            StorageError::CorruptRecord(format!("row for {} missing after upsert", result.sha256))
        })
    }

    async fn find_by_sha256(&self, sha256: &str) -> Result<Option<PcapRecord>, StorageError> {
        let model = pcaps::Entity::find()
            .filter(pcaps::Column::Sha256.eq(sha256))
            .one(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to read pcap {}: {}", sha256, e);
                StorageError::ReadFailed(e)
            })?;
        model.map(into_record).transpose()
    }

    async fn find_by_folder(&self, folder_name: &str) -> Result<Option<PcapListing>, StorageError> {
        let query = Self::listing_query()
            .filter(pcaps::Column::FolderName.eq(folder_name))
            .order_by_desc(pcaps::Column::Id)
            .limit(1);
        Ok(self.fetch_listings(query).await?.into_iter().next())
    }

    async fn list_pcaps(&self, page: PageRequest) -> Result<Vec<PcapListing>, StorageError> {
        let mut query = Self::listing_query().order_by_desc(pcaps::Column::Id);
        if let Some(cursor) = page.cursor {
            query = query.filter(pcaps::Column::Id.lt(cursor));
        }
        self.fetch_listings(query.limit(page.effective_limit()))
            .await
    }

    async fn list_folders(
        &self,
        order: FolderOrder,
        limit: Option<u64>,
    ) -> Result<Vec<PcapListing>, StorageError> {
        let direction = match order {
            FolderOrder::Asc => Order::Asc,
            FolderOrder::Desc => Order::Desc,
        };
        let query = Self::listing_query()
            .filter(pcaps::Column::FolderName.is_not_null())
            .order_by(pcaps::Column::CreatedAt, direction.clone())
            .order_by(pcaps::Column::Id, direction)
            .limit(clamp_limit(limit, DEFAULT_FOLDER_LIMIT));
        self.fetch_listings(query).await
    }
}
