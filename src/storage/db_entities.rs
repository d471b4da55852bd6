//! SeaORM entity model used by the database storage backend.
//!
//! Maps to the `pcaps` table created by `database_storage`: one row per
//! distinct capture content, keyed by its SHA-256 fingerprint.

use sea_orm::entity::prelude::*;

/// Pcaps table entity model.
///
/// Timestamps are stored as RFC3339 strings and the analysis summary as a JSON
/// string, like the rest of the schema.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pcaps")]
pub struct Model {
    /// Auto-increment row id, also the pagination cursor
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Hex SHA-256 of the file content
    #[sea_orm(unique)]
    pub sha256: String,
    pub original_name: String,
    /// File size in bytes
    pub size: i64,
    /// camelCase JSON `AnalysisResult`
    #[sea_orm(column_type = "Text")]
    pub summary_json: String,
    pub uploaded_by_id: Option<i64>,
    /// Name of the storage folder holding the relocated file
    pub folder_name: Option<String>,
    /// RFC3339 timestamp of the first insert
    pub created_at: String,
    /// RFC3339 timestamp of the last upsert
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
