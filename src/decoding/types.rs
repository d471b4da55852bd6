//! Common data types produced by the decoding subsystem.

use serde::{Deserialize, Serialize};

/// Address placeholder used when a frame carries no IP layer.
pub const UNKNOWN_ADDRESS: &str = "Unknown";

/// Protocol placeholder used when the decoder reports no protocol column.
pub const UNKNOWN_PROTOCOL: &str = "UNKNOWN";

/// One decoded frame, normalized from the decoder's per-frame layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Frame number as reported by the decoder (1-based stream position when absent)
    pub no: u64,
    /// Capture timestamp, seconds since the epoch
    pub time: f64,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    /// Frame length in bytes
    pub length: u64,
    /// Short transport summary, e.g. `TCP 1234->80 [SYN]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// TCP flag bits in display order.
pub(crate) const TCP_FLAGS: [(u32, &str); 6] = [
    (0x02, "SYN"),
    (0x10, "ACK"),
    (0x04, "RST"),
    (0x01, "FIN"),
    (0x08, "PSH"),
    (0x20, "URG"),
];
