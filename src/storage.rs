//! Storage subsystem
//!
//! Persists analysis results and answers lookups over them.
//!
//! Components:
//! - `storage_trait`: the `AnalysisStore` trait defining a uniform async API.
//! - `types`: stored record, listing and pagination types shared by backends.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `db_entities`: SeaORM entity model for the database backend.

pub mod database_storage;
pub mod db_entities;
pub mod storage_trait;
pub mod types;

pub use database_storage::DatabaseStorage;
pub use storage_trait::AnalysisStore;
pub use types::{FolderOrder, PageRequest, PcapListing, PcapRecord, UploadMeta};
