//! # Queue Statistics
//!
//! Per-class and per-queue counters. Drops never surface as errors on the
//! data path, so these counters are the only place a full class or an
//! unclassifiable packet becomes observable.
//!
//! Snapshots serialize to JSON and render in Prometheus text exposition
//! format.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

// ─── Class Counters ─────────────────────────────────────────────────────────

/// Counters kept by each traffic class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStats {
    /// Packets accepted into the class FIFO.
    pub enqueued_packets: u64,
    pub enqueued_bytes: u64,
    /// Packets handed to the link.
    pub dequeued_packets: u64,
    pub dequeued_bytes: u64,
    /// Packets rejected because the class was at capacity.
    pub dropped_full: u64,
    pub dropped_full_bytes: u64,
}

impl ClassStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_enqueue(&mut self, size: u32) {
        self.enqueued_packets += 1;
        self.enqueued_bytes += u64::from(size);
    }

    pub(crate) fn record_dequeue(&mut self, size: u32) {
        self.dequeued_packets += 1;
        self.dequeued_bytes += u64::from(size);
    }

    pub(crate) fn record_drop(&mut self, size: u32) {
        self.dropped_full += 1;
        self.dropped_full_bytes += u64::from(size);
    }

    /// Fraction of offered packets rejected for capacity.
    pub fn drop_rate(&self) -> f64 {
        let offered = self.enqueued_packets + self.dropped_full;
        if offered == 0 {
            0.0
        } else {
            self.dropped_full as f64 / offered as f64
        }
    }
}

// ─── Snapshots ──────────────────────────────────────────────────────────────

/// One traffic class as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStatsSnapshot {
    pub name: String,
    /// Scheduling position at snapshot time.
    pub position: usize,
    pub priority: u32,
    pub weight: u32,
    pub is_default: bool,
    pub occupancy: usize,
    pub capacity: usize,
    #[serde(flatten)]
    pub counters: ClassStats,
}

/// Whole-queue snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub discipline: String,
    /// Packets dropped because no filter matched and no default class exists.
    pub dropped_unclassified: u64,
    pub dropped_unclassified_bytes: u64,
    /// Sum of class occupancies.
    pub total_buffered: usize,
    pub classes: Vec<ClassStatsSnapshot>,
}

impl StatsSnapshot {
    /// All drops: capacity plus classification failures.
    pub fn total_dropped(&self) -> u64 {
        self.dropped_unclassified
            + self
                .classes
                .iter()
                .map(|c| c.counters.dropped_full)
                .sum::<u64>()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ─── Prometheus ─────────────────────────────────────────────────────────────

/// Escape a label value: backslash, double quote and newline.
fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Render a snapshot in Prometheus text exposition format.
pub fn render_prometheus(snapshot: &StatsSnapshot) -> String {
    let mut out = String::with_capacity(2048);
    let discipline = escape_label(&snapshot.discipline);

    let class_metrics: [(&str, &str, &str, fn(&ClassStatsSnapshot) -> u64); 7] = [
        (
            "diffserv_class_occupancy_packets",
            "gauge",
            "Packets currently buffered in the class.",
            |c| c.occupancy as u64,
        ),
        (
            "diffserv_class_enqueued_packets_total",
            "counter",
            "Packets accepted into the class.",
            |c| c.counters.enqueued_packets,
        ),
        (
            "diffserv_class_enqueued_bytes_total",
            "counter",
            "Bytes accepted into the class.",
            |c| c.counters.enqueued_bytes,
        ),
        (
            "diffserv_class_dequeued_packets_total",
            "counter",
            "Packets scheduled out of the class.",
            |c| c.counters.dequeued_packets,
        ),
        (
            "diffserv_class_dequeued_bytes_total",
            "counter",
            "Bytes scheduled out of the class.",
            |c| c.counters.dequeued_bytes,
        ),
        (
            "diffserv_class_dropped_full_total",
            "counter",
            "Packets rejected because the class was full.",
            |c| c.counters.dropped_full,
        ),
        (
            "diffserv_class_capacity_packets",
            "gauge",
            "Configured class capacity.",
            |c| c.capacity as u64,
        ),
    ];

    for (name, kind, help, value) in class_metrics {
        let _ = writeln!(out, "# HELP {name} {help}");
        let _ = writeln!(out, "# TYPE {name} {kind}");
        for class in &snapshot.classes {
            let _ = writeln!(
                out,
                "{name}{{class=\"{}\",discipline=\"{discipline}\"}} {}",
                escape_label(&class.name),
                value(class)
            );
        }
    }

    let _ = writeln!(
        out,
        "# HELP diffserv_dropped_unclassified_total Packets dropped with no matching or default class."
    );
    let _ = writeln!(out, "# TYPE diffserv_dropped_unclassified_total counter");
    let _ = writeln!(
        out,
        "diffserv_dropped_unclassified_total{{discipline=\"{discipline}\"}} {}",
        snapshot.dropped_unclassified
    );

    out
}
