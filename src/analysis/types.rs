//! Result types of one analysis pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::decoding::PacketRecord;

/// Number of entries kept in the top talkers / top connections rankings.
pub const TOP_N: usize = 10;

/// Number of leading records kept in the preview.
pub const PREVIEW_LIMIT: usize = 100;

/// Traffic statistics computed from a decoded record stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrafficSummary {
    pub packet_count: u64,
    pub protocols: BTreeMap<String, u64>,
    pub top_talkers: Vec<(String, u64)>,
    pub top_connections: Vec<(String, u64)>,
    pub preview: Vec<PacketRecord>,
}

/// Durable outcome of analysing one capture file.
///
/// Serialized in camelCase; this JSON document is the summary payload stored
/// alongside each capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Hex-encoded SHA-256 of the file content
    pub sha256: String,
    pub original_name: String,
    /// File size in bytes
    pub size: u64,
    pub packet_count: u64,
    pub protocols: BTreeMap<String, u64>,
    pub top_talkers: Vec<(String, u64)>,
    pub top_connections: Vec<(String, u64)>,
    pub preview: Vec<PacketRecord>,
}

impl AnalysisResult {
    pub fn new(sha256: String, original_name: String, size: u64, summary: TrafficSummary) -> Self {
        Self {
            sha256,
            original_name,
            size,
            packet_count: summary.packet_count,
            protocols: summary.protocols,
            top_talkers: summary.top_talkers,
            top_connections: summary.top_connections,
            preview: summary.preview,
        }
    }
}
