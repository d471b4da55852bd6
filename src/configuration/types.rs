use clap::Args;
use std::path::PathBuf;

/// Command-line / environment overrides applied on top of the file configuration.
///
/// Every field is optional: a `None` leaves the value loaded from the configuration
/// file (or its default) untouched.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    /// Base directory holding the numbered capture folders
    #[arg(long, env = "PCAP_BASE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Directory where `--keep-source` copies are staged before ingestion
    #[arg(long, env = "PCAP_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "PCAP_DB_PATH")]
    pub database_path: Option<PathBuf>,

    /// Maximum accepted capture size, in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB")]
    pub max_upload_mb: Option<u64>,

    /// Explicit path to the tshark executable
    #[arg(long, env = "TSHARK_PATH")]
    pub tshark_path: Option<PathBuf>,

    /// Kill the decoder if it runs longer than this many seconds
    #[arg(long, env = "DECODER_TIMEOUT_SECS")]
    pub decoder_timeout_secs: Option<u64>,

    /// Prefix of the numbered capture folders
    #[arg(long, env = "PCAP_FOLDER_PREFIX")]
    pub folder_prefix: Option<String>,
}
