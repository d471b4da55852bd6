use std::collections::{BTreeMap, HashMap};

use super::types::{TrafficSummary, PREVIEW_LIMIT, TOP_N};
use crate::decoding::{PacketRecord, UNKNOWN_ADDRESS};

/// Insertion-ordered counter: keys remember when they were first seen so
/// equal counts rank in first-seen order.
#[derive(Debug, Default)]
struct Tally {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Tally {
    fn bump(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    /// Highest counts first; `sort_by` is stable, which keeps first-seen order for ties.
    fn top(mut self, n: usize) -> Vec<(String, u64)> {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries.truncate(n);
        self.entries
    }

    fn into_map(self) -> BTreeMap<String, u64> {
        self.entries.into_iter().collect()
    }
}

/// Single-pass traffic statistics over a decoded record stream.
///
/// Records are fed one at a time with [`Aggregator::observe`]; only the first
/// `preview_limit` records are retained, everything else is reduced to counters.
///
/// ```
/// use pcapvault::analysis::Aggregator;
/// use pcapvault::decoding::PacketRecord;
///
/// let mut aggregator = Aggregator::new();
/// aggregator.observe(PacketRecord {
///     no: 1,
///     time: 0.0,
///     source: "10.0.0.1".into(),
///     destination: "10.0.0.2".into(),
///     protocol: "TCP".into(),
///     length: 60,
///     info: None,
/// });
/// let summary = aggregator.finish();
/// assert_eq!(summary.packet_count, 1);
/// assert_eq!(summary.top_connections[0].0, "10.0.0.1 -> 10.0.0.2");
/// ```
#[derive(Debug)]
pub struct Aggregator {
    protocols: Tally,
    talkers: Tally,
    connections: Tally,
    preview: Vec<PacketRecord>,
    packet_count: u64,
    preview_limit: usize,
    top_n: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::with_limits(PREVIEW_LIMIT, TOP_N)
    }

    pub fn with_limits(preview_limit: usize, top_n: usize) -> Self {
        Self {
            protocols: Tally::default(),
            talkers: Tally::default(),
            connections: Tally::default(),
            preview: Vec::with_capacity(preview_limit.min(PREVIEW_LIMIT)),
            packet_count: 0,
            preview_limit,
            top_n,
        }
    }

    pub fn observe(&mut self, record: PacketRecord) {
        self.packet_count += 1;
        self.protocols.bump(&record.protocol);

        if record.source != UNKNOWN_ADDRESS {
            self.talkers.bump(&record.source);
        }
        if record.destination != UNKNOWN_ADDRESS {
            self.talkers.bump(&record.destination);
        }
        self.connections
            .bump(&format!("{} -> {}", record.source, record.destination));

        if self.preview.len() < self.preview_limit {
            self.preview.push(record);
        }
    }

    pub fn finish(self) -> TrafficSummary {
        TrafficSummary {
            packet_count: self.packet_count,
            protocols: self.protocols.into_map(),
            top_talkers: self.talkers.top(self.top_n),
            top_connections: self.connections.top(self.top_n),
            preview: self.preview,
        }
    }
}

/// Summarizes a complete record sequence with the default limits.
pub fn summarize<I>(records: I) -> TrafficSummary
where
    I: IntoIterator<Item = PacketRecord>,
{
    let mut aggregator = Aggregator::new();
    for record in records {
        aggregator.observe(record);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::UNKNOWN_PROTOCOL;

    fn packet(no: u64, src: &str, dst: &str, protocol: &str) -> PacketRecord {
        PacketRecord {
            no,
            time: no as f64,
            source: src.to_string(),
            destination: dst.to_string(),
            protocol: protocol.to_string(),
            length: 60,
            info: None,
        }
    }

    #[test]
    fn test_three_packet_scenario() {
        let summary = summarize(vec![
            packet(1, "10.0.0.1", "10.0.0.2", "TCP"),
            packet(2, "10.0.0.2", "10.0.0.1", "TCP"),
            packet(3, "10.0.0.3", "10.0.0.1", "UDP"),
        ]);

        assert_eq!(summary.packet_count, 3);
        assert_eq!(summary.protocols.get("TCP"), Some(&2));
        assert_eq!(summary.protocols.get("UDP"), Some(&1));
        assert_eq!(
            summary.top_talkers,
            vec![
                ("10.0.0.1".to_string(), 3),
                ("10.0.0.2".to_string(), 2),
                ("10.0.0.3".to_string(), 1),
            ]
        );
        assert_eq!(
            summary.top_connections,
            vec![
                ("10.0.0.1 -> 10.0.0.2".to_string(), 1),
                ("10.0.0.2 -> 10.0.0.1".to_string(), 1),
                ("10.0.0.3 -> 10.0.0.1".to_string(), 1),
            ]
        );
        assert_eq!(summary.preview.len(), 3);
    }

    #[test]
    fn test_unknown_addresses_are_not_talkers_but_still_connections() {
        let summary = summarize(vec![
            packet(1, UNKNOWN_ADDRESS, UNKNOWN_ADDRESS, UNKNOWN_PROTOCOL),
            packet(2, "10.0.0.9", UNKNOWN_ADDRESS, "ARP"),
        ]);
        assert_eq!(summary.top_talkers, vec![("10.0.0.9".to_string(), 1)]);
        assert_eq!(
            summary.top_connections,
            vec![
                ("Unknown -> Unknown".to_string(), 1),
                ("10.0.0.9 -> Unknown".to_string(), 1),
            ]
        );
        assert_eq!(summary.protocols.values().sum::<u64>(), summary.packet_count);
    }

    #[test]
    fn test_rankings_are_truncated_and_ties_keep_first_seen_order() {
        let mut records = Vec::new();
        let mut no = 0;
        // 15 distinct hosts; host-7 and host-12 get extra traffic.
        for i in 0..15 {
            no += 1;
            records.push(packet(no, &format!("host-{}", i), "gw", "TCP"));
        }
        for _ in 0..3 {
            no += 1;
            records.push(packet(no, "host-12", "gw", "TCP"));
        }
        no += 1;
        records.push(packet(no, "host-7", "gw", "TCP"));

        let summary = summarize(records);
        assert_eq!(summary.top_talkers.len(), TOP_N);
        assert_eq!(summary.top_connections.len(), TOP_N);

        assert_eq!(summary.top_talkers[0], ("gw".to_string(), 19));
        assert_eq!(summary.top_talkers[1], ("host-12".to_string(), 4));
        assert_eq!(summary.top_talkers[2], ("host-7".to_string(), 2));
        let rest: Vec<&str> = summary.top_talkers[3..]
            .iter()
            .map(|(host, _)| host.as_str())
            .collect();
        assert_eq!(
            rest,
            vec!["host-0", "host-1", "host-2", "host-3", "host-4", "host-5", "host-6"]
        );

        for pair in summary.top_connections.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        assert_eq!(summary.top_connections[0], ("host-12 -> gw".to_string(), 4));
    }

    #[test]
    fn test_preview_is_bounded_and_ordered() {
        let records: Vec<_> = (1..=250)
            .map(|n| packet(n, "10.1.1.1", "10.1.1.2", if n % 2 == 0 { "TCP" } else { "DNS" }))
            .collect();
        let summary = summarize(records);

        assert_eq!(summary.packet_count, 250);
        assert_eq!(summary.preview.len(), PREVIEW_LIMIT);
        assert!(summary
            .preview
            .iter()
            .enumerate()
            .all(|(i, r)| r.no == i as u64 + 1));
        assert_eq!(summary.protocols.values().sum::<u64>(), 250);
    }

    #[test]
    fn test_empty_stream() {
        let summary = summarize(Vec::new());
        assert_eq!(summary, TrafficSummary::default());
    }

    #[test]
    fn test_custom_limits() {
        let mut aggregator = Aggregator::with_limits(2, 1);
        for n in 1..=5 {
            aggregator.observe(packet(n, "a", "b", "TCP"));
        }
        let summary = aggregator.finish();
        assert_eq!(summary.preview.len(), 2);
        assert_eq!(summary.top_talkers, vec![("a".to_string(), 5)]);
    }
}
