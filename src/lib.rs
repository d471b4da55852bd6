pub mod analysis;
pub mod configuration;
pub mod decoding;
pub mod error_handling;
pub mod ingestion;
pub mod storage;

pub use analysis::AnalysisResult;
pub use configuration::Config;
pub use ingestion::{Ingestor, Upload};
pub use storage::{AnalysisStore, DatabaseStorage};
