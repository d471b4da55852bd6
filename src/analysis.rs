//! Traffic statistics over decoded packet records.

pub mod aggregator;
pub mod types;

pub use aggregator::{summarize, Aggregator};
pub use types::{AnalysisResult, TrafficSummary, PREVIEW_LIMIT, TOP_N};
