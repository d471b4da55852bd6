//! Normalization of raw decoder items into `PacketRecord`s.
//!
//! Mapping is total: every input item yields exactly one record, in order,
//! with placeholders substituted for whatever the decoder left out. The
//! aggregate packet count relies on that one-to-one correspondence.

use serde_json::Value;

use super::layers::Layers;
use super::types::{PacketRecord, TCP_FLAGS, UNKNOWN_ADDRESS, UNKNOWN_PROTOCOL};

/// Maps a full decoder output, preserving order and count.
pub fn map_packets(raw: &[Value]) -> Vec<PacketRecord> {
    raw.iter()
        .enumerate()
        .map(|(position, item)| map_packet(item, position))
        .collect()
}

/// Maps one decoder item. `position` is its 0-based index in the stream.
pub fn map_packet(item: &Value, position: usize) -> PacketRecord {
    let layers = Layers::of(item);

    let no = layers
        .parse::<u64>("frame.number")
        .filter(|n| *n > 0)
        .unwrap_or(position as u64 + 1);
    let time = layers
        .parse::<f64>("frame.time_epoch")
        .filter(|t| t.is_finite())
        .unwrap_or(0.0);
    let length = layers.parse::<u64>("frame.len").unwrap_or(0);

    let source = address(&layers, "ip.src", "ipv6.src");
    let destination = address(&layers, "ip.dst", "ipv6.dst");

    PacketRecord {
        no,
        time,
        source,
        destination,
        protocol: protocol(&layers),
        length,
        info: transport_info(&layers),
    }
}

fn address(layers: &Layers<'_>, v4_key: &str, v6_key: &str) -> String {
    layers
        .text(v4_key)
        .or_else(|| layers.text(v6_key))
        .map(|a| a.into_owned())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

/// Prefers the decoder's protocol column; otherwise the innermost entry of
/// `frame.protocols` (`eth:ethertype:ip:tcp` gives `TCP`).
fn protocol(layers: &Layers<'_>) -> String {
    if let Some(column) = layers.text("_ws.col.Protocol") {
        return column.into_owned();
    }
    layers
        .text("frame.protocols")
        .and_then(|stack| {
            stack
                .rsplit(':')
                .next()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_uppercase)
        })
        .unwrap_or_else(|| UNKNOWN_PROTOCOL.to_string())
}

fn transport_info(layers: &Layers<'_>) -> Option<String> {
    let tcp_src = layers.text("tcp.srcport");
    let tcp_dst = layers.text("tcp.dstport");
    if tcp_src.is_some() || tcp_dst.is_some() {
        let mut info = format!(
            "TCP {}->{}",
            tcp_src.as_deref().unwrap_or("?"),
            tcp_dst.as_deref().unwrap_or("?")
        );
        let flags = layers
            .text("tcp.flags")
            .and_then(|raw| parse_hex(&raw))
            .map(flag_names)
            .unwrap_or_default();
        if !flags.is_empty() {
            info.push_str(&format!(" [{}]", flags.join(",")));
        }
        return Some(info);
    }

    let udp_src = layers.text("udp.srcport");
    let udp_dst = layers.text("udp.dstport");
    if udp_src.is_some() || udp_dst.is_some() {
        return Some(format!(
            "UDP {}->{}",
            udp_src.as_deref().unwrap_or("?"),
            udp_dst.as_deref().unwrap_or("?")
        ));
    }
    None
}

fn parse_hex(raw: &str) -> Option<u32> {
    let digits = raw.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    u32::from_str_radix(digits, 16).ok()
}

fn flag_names(bits: u32) -> Vec<&'static str> {
    TCP_FLAGS
        .iter()
        .filter(|(mask, _)| bits & mask != 0)
        .map(|(_, name)| *name)
        .collect()
}
