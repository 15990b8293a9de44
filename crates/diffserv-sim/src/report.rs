use diffserv_core::stats::StatsSnapshot;
use serde::{Deserialize, Serialize};

/// Per-flow packet accounting over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub name: String,
    pub destination_port: u16,
    pub sent_packets: u64,
    pub sent_bytes: u64,
    pub delivered_packets: u64,
    pub delivered_bytes: u64,
    pub dropped_packets: u64,
    pub dropped_bytes: u64,
    /// Mean sojourn from emission to arrival at the far end.
    pub mean_delay_ms: f64,
    pub max_delay_ms: f64,
}

impl FlowReport {
    /// Packets still buffered or on the wire when the run ended.
    pub fn in_flight_packets(&self) -> u64 {
        self.sent_packets
            .saturating_sub(self.delivered_packets)
            .saturating_sub(self.dropped_packets)
    }

    pub fn loss_ratio(&self) -> f64 {
        if self.sent_packets == 0 {
            0.0
        } else {
            self.dropped_packets as f64 / self.sent_packets as f64
        }
    }
}

/// Delivered throughput during one one-second bucket, per flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSample {
    pub second: u64,
    /// Indexed like [`SimReport::flows`].
    pub bits_per_second: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimReport {
    pub scenario: String,
    pub discipline: String,
    pub seed: u64,
    pub duration_secs: f64,
    pub link_rate_bps: u64,
    pub flows: Vec<FlowReport>,
    pub throughput: Vec<ThroughputSample>,
    pub queue: StatsSnapshot,
}

impl SimReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Mean delivered rate of `flow` over seconds `[from, to)`.
    pub fn mean_bps(&self, flow: usize, from: u64, to: u64) -> f64 {
        let samples: Vec<u64> = self
            .throughput
            .iter()
            .filter(|s| s.second >= from && s.second < to)
            .filter_map(|s| s.bits_per_second.get(flow).copied())
            .collect();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<u64>() as f64 / samples.len() as f64
    }

    /// Fraction of link capacity carried, over the whole run.
    pub fn utilization(&self) -> f64 {
        if self.link_rate_bps == 0 || self.duration_secs <= 0.0 {
            return 0.0;
        }
        let bits: u64 = self.flows.iter().map(|f| f.delivered_bytes * 8).sum();
        bits as f64 / (self.link_rate_bps as f64 * self.duration_secs)
    }
}
