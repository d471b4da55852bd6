use log::{debug, error, info, warn};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::configuration::Config;
use crate::error_handling::types::DecoderError;

#[cfg(windows)]
const WELL_KNOWN_LOCATIONS: &[&str] = &[
    r"C:\Program Files\Wireshark\tshark.exe",
    r"C:\Program Files (x86)\Wireshark\tshark.exe",
];
#[cfg(target_os = "macos")]
const WELL_KNOWN_LOCATIONS: &[&str] = &["/Applications/Wireshark.app/Contents/MacOS/tshark"];
#[cfg(not(any(windows, target_os = "macos")))]
const WELL_KNOWN_LOCATIONS: &[&str] = &[];

/// Runs `tshark` against a capture file and returns its full JSON decode.
///
/// No field projection (`-e`) is passed: `-T json` ignores it on most tshark
/// versions. The complete layer tree is parsed downstream by the record mapper.
///
/// The child process is killed when the decoding future is dropped, so an
/// aborted ingestion never leaves an orphaned decoder behind.
#[derive(Debug, Clone)]
pub struct TsharkDecoder {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl TsharkDecoder {
    /// Name looked up on `PATH` when nothing better is configured.
    pub const DEFAULT_BINARY: &'static str = "tshark";

    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Builds a decoder from the runtime configuration: resolves the binary and
    /// applies the optional timeout.
    pub fn from_config(config: &Config) -> Self {
        let binary = Self::resolve_binary(config.tshark_path.as_deref());
        info!("Using decoder binary {}", binary.display());
        Self {
            binary,
            timeout: config.decoder_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Resolution order: configured path if it exists, well-known install
    /// locations for the platform, then the bare name resolved through `PATH`.
    pub fn resolve_binary(configured: Option<&Path>) -> PathBuf {
        if let Some(path) = configured {
            if path.exists() {
                return path.to_path_buf();
            }
            warn!(
                "Configured decoder path {} does not exist, falling back",
                path.display()
            );
        }
        for candidate in WELL_KNOWN_LOCATIONS {
            let candidate = Path::new(candidate);
            if candidate.exists() {
                debug!("Found decoder at well-known location {}", candidate.display());
                return candidate.to_path_buf();
            }
        }
        PathBuf::from(Self::DEFAULT_BINARY)
    }

    fn not_found_hint() -> &'static str {
        if cfg!(windows) {
            r#"Set TSHARK_PATH="C:\Program Files\Wireshark\tshark.exe" or add Wireshark to PATH."#
        } else {
            "Install tshark and/or add it to PATH, or set TSHARK_PATH."
        }
    }

    /// Decodes `capture` and returns one JSON value per frame.
    pub async fn decode(&self, capture: &Path) -> Result<Vec<Value>, DecoderError> {
        let stdout = self.run(capture).await?;
        let frames = Self::parse_output(&stdout)?;
        debug!(
            "Decoder returned {} frame(s) for {}",
            frames.len(),
            capture.display()
        );
        Ok(frames)
    }

    /// Spawns the decoder, captures stdout, discards stderr and waits for exit.
    async fn run(&self, capture: &Path) -> Result<Vec<u8>, DecoderError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-r")
            .arg(capture)
            .arg("-T")
            .arg("json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        debug!(
            "Spawning decoder {} for {}",
            self.binary.display(),
            capture.display()
        );
        let started = Instant::now();

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                error!("Decoder executable {} not found", self.binary.display());
                DecoderError::NotFound {
                    binary: self.binary.clone(),
                    hint: Self::not_found_hint().to_string(),
                }
            } else {
                error!("Failed to spawn decoder {}: {}", self.binary.display(), e);
                DecoderError::SpawnFailed(e)
            }
        })?;

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    // The child was owned by the dropped future; kill_on_drop reaps it.
                    error!(
                        "Decoder timed out after {:?} on {}",
                        limit,
                        capture.display()
                    );
                    return Err(DecoderError::TimedOut(limit));
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(DecoderError::SpawnFailed)?;

        if !output.status.success() {
            error!(
                "Decoder exited with status {:?} on {}",
                output.status.code(),
                capture.display()
            );
            return Err(DecoderError::ExitFailure {
                code: output.status.code(),
            });
        }

        info!(
            "Decoder finished on {} in {:?} ({} byte(s) of output)",
            capture.display(),
            started.elapsed(),
            output.stdout.len()
        );
        Ok(output.stdout)
    }

    /// Parses the decoder's stdout. Anything but a JSON array is rejected.
    pub fn parse_output(stdout: &[u8]) -> Result<Vec<Value>, DecoderError> {
        serde_json::from_slice::<Vec<Value>>(stdout).map_err(|e| {
            error!("Decoder output is not a JSON array: {}", e);
            DecoderError::UnparseableOutput(e)
        })
    }
}
