use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::analysis::AnalysisResult;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const DEFAULT_FOLDER_LIMIT: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 200;

/// Out-of-band attributes attached to an ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMeta {
    pub uploaded_by_id: Option<i64>,
    pub folder_name: Option<String>,
}

/// A stored analysis, summary included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcapRecord {
    pub id: i32,
    pub sha256: String,
    pub original_name: String,
    pub size: u64,
    pub summary: AnalysisResult,
    pub uploaded_by_id: Option<i64>,
    pub folder_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored analysis without its summary payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcapListing {
    pub id: i32,
    pub sha256: String,
    pub original_name: String,
    pub size: u64,
    pub uploaded_by_id: Option<i64>,
    pub folder_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&PcapRecord> for PcapListing {
    fn from(record: &PcapRecord) -> Self {
        Self {
            id: record.id,
            sha256: record.sha256.clone(),
            original_name: record.original_name.clone(),
            size: record.size,
            uploaded_by_id: record.uploaded_by_id,
            folder_name: record.folder_name.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// One page of the id-descending listing. `cursor` is an exclusive upper id bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u64>,
    pub cursor: Option<i32>,
}

impl PageRequest {
    pub fn effective_limit(&self) -> u64 {
        clamp_limit(self.limit, DEFAULT_PAGE_SIZE)
    }
}

/// Clamps a requested page size to `1..=MAX_PAGE_SIZE`, using `default` when absent.
pub fn clamp_limit(requested: Option<u64>, default: u64) -> u64 {
    requested.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FolderOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for FolderOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "oldest" => Ok(FolderOrder::Asc),
            "desc" | "latest" | "newest" => Ok(FolderOrder::Desc),
            other => Err(format!("unknown folder order '{}', expected asc or desc", other)),
        }
    }
}

impl fmt::Display for FolderOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderOrder::Asc => write!(f, "asc"),
            FolderOrder::Desc => write!(f, "desc"),
        }
    }
}
