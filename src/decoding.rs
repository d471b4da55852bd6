//! Decoding subsystem
//!
//! Bridges the external `tshark` process and the rest of the pipeline.
//!
//! Components:
//! - `decoder`: resolves and runs the decoder, mapping spawn, exit-status,
//!   timeout and parse failures to distinct errors.
//! - `layers`: tolerant accessor over the decoder's per-frame JSON layers.
//! - `mapper`: turns decoder items into `PacketRecord`s, one per item.
//! - `types`: the `PacketRecord` type and its placeholder values.

pub mod decoder;
pub mod layers;
pub mod mapper;
pub mod types;

pub use decoder::TsharkDecoder;
pub use mapper::{map_packet, map_packets};
pub use types::{PacketRecord, UNKNOWN_ADDRESS, UNKNOWN_PROTOCOL};
