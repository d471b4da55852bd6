use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Rejections raised before any side effect of an ingestion takes place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    UnsupportedExtension(String),
    FileTooLarge { size: u64, max_bytes: u64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnsupportedExtension(name) => write!(
                f,
                "Unsupported file type for {}. Only .pcap and .pcapng are allowed.",
                name
            ),
            ValidationError::FileTooLarge { max_bytes, .. } => {
                write!(f, "File too large. Max {}MB", max_bytes / (1024 * 1024))
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub enum DecoderError {
    /// The decoder executable could not be located. `hint` tells the operator how to fix it.
    NotFound { binary: PathBuf, hint: String },
    SpawnFailed(io::Error),
    ExitFailure { code: Option<i32> },
    UnparseableOutput(serde_json::Error),
    TimedOut(Duration),
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderError::NotFound { binary, hint } => {
                write!(f, "decoder not found ({}). {}", binary.display(), hint)
            }
            DecoderError::SpawnFailed(e) => write!(f, "failed to spawn decoder: {}", e),
            DecoderError::ExitFailure { code: Some(code) } => {
                write!(f, "decoder exited with failure status, code={}", code)
            }
            DecoderError::ExitFailure { code: None } => {
                write!(f, "decoder exited with failure status, code=unknown")
            }
            DecoderError::UnparseableOutput(e) => {
                write!(f, "decoder produced unparseable output: {}", e)
            }
            DecoderError::TimedOut(d) => write!(f, "decoder timed out after {:?}", d),
        }
    }
}

impl std::error::Error for DecoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecoderError::SpawnFailed(e) => Some(e),
            DecoderError::UnparseableOutput(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum AllocationError {
    Exhausted { attempts: u64 },
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::Exhausted { attempts } => write!(
                f,
                "folder allocation exhausted after {} attempts",
                attempts
            ),
            AllocationError::Io { path, source } => {
                write!(f, "storage folder IO error at {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for AllocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AllocationError::Io { source, .. } => Some(source),
            AllocationError::Exhausted { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed(sea_orm::DbErr),
    WriteFailed(sea_orm::DbErr),
    ReadFailed(sea_orm::DbErr),
    /// A stored row could not be turned back into its domain type.
    CorruptRecord(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
            StorageError::CorruptRecord(e) => write!(f, "Stored record is corrupt: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::ConnectionFailed(e)
            | StorageError::WriteFailed(e)
            | StorageError::ReadFailed(e) => Some(e),
            StorageError::CorruptRecord(_) => None,
        }
    }
}

/// Terminal failure of one ingestion attempt (or of a lookup served by the ingestor).
#[derive(Debug)]
pub enum IngestError {
    Validation(ValidationError),
    Io { path: PathBuf, source: io::Error },
    Decoder(DecoderError),
    Allocation(AllocationError),
    Storage(StorageError),
    InvalidFolderName(String),
    RecordNotFound(String),
    StoredFileMissing(PathBuf),
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable, machine-readable kind of the failure.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Validation(ValidationError::UnsupportedExtension(_)) => {
                "unsupported_extension"
            }
            IngestError::Validation(ValidationError::FileTooLarge { .. }) => "file_too_large",
            IngestError::Io { .. } => "io",
            IngestError::Decoder(DecoderError::NotFound { .. }) => "decoder_not_found",
            IngestError::Decoder(DecoderError::SpawnFailed(_)) => "decoder_spawn_failed",
            IngestError::Decoder(DecoderError::ExitFailure { .. }) => "decoder_exit_failure",
            IngestError::Decoder(DecoderError::UnparseableOutput(_)) => "decoder_unparseable",
            IngestError::Decoder(DecoderError::TimedOut(_)) => "decoder_timeout",
            IngestError::Allocation(AllocationError::Exhausted { .. }) => "allocation_exhausted",
            IngestError::Allocation(AllocationError::Io { .. }) => "allocation_io",
            IngestError::Storage(_) => "storage",
            IngestError::InvalidFolderName(_) => "invalid_folder_name",
            IngestError::RecordNotFound(_) => "not_found",
            IngestError::StoredFileMissing(_) => "stored_file_missing",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, IngestError::Validation(_))
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Validation(e) => write!(f, "{}", e),
            IngestError::Io { path, source } => {
                write!(f, "IO error at {}: {}", path.display(), source)
            }
            IngestError::Decoder(e) => write!(f, "{}", e),
            IngestError::Allocation(e) => write!(f, "{}", e),
            IngestError::Storage(e) => write!(f, "{}", e),
            IngestError::InvalidFolderName(name) => write!(f, "Invalid folder name: {}", name),
            IngestError::RecordNotFound(key) => write!(f, "PCAP not found: {}", key),
            IngestError::StoredFileMissing(path) => {
                write!(f, "File not found on disk: {}", path.display())
            }
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Validation(e) => Some(e),
            IngestError::Io { source, .. } => Some(source),
            IngestError::Decoder(e) => Some(e),
            IngestError::Allocation(e) => Some(e),
            IngestError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for IngestError {
    fn from(err: ValidationError) -> Self {
        IngestError::Validation(err)
    }
}

impl From<DecoderError> for IngestError {
    fn from(err: DecoderError) -> Self {
        IngestError::Decoder(err)
    }
}

impl From<AllocationError> for IngestError {
    fn from(err: AllocationError) -> Self {
        IngestError::Allocation(err)
    }
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        IngestError::Storage(err)
    }
}
