use std::net::Ipv4Addr;
use std::time::Duration;

use diffserv_core::packet::{FlowHeaders, PROTO_TCP, PROTO_UDP};
use diffserv_core::PacketMeta;
use rand::rngs::StdRng;
use rand::RngExt as _;
use serde::{Deserialize, Serialize};

/// IPv4 (20) + UDP (8) header bytes.
pub const UDP_OVERHEAD: u32 = 28;
/// IPv4 (20) + TCP (20) header bytes.
pub const TCP_OVERHEAD: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    pub fn overhead(self) -> u32 {
        match self {
            Transport::Udp => UDP_OVERHEAD,
            Transport::Tcp => TCP_OVERHEAD,
        }
    }

    pub fn protocol(self) -> u8 {
        match self {
            Transport::Udp => PROTO_UDP,
            Transport::Tcp => PROTO_TCP,
        }
    }
}

/// Constant-bit-rate source: one `payload`-byte packet every `interval`
/// between `start` (inclusive) and `stop` (exclusive).
#[derive(Debug, Clone)]
pub struct CbrSource {
    pub name: String,
    pub transport: Transport,
    pub source: Ipv4Addr,
    pub source_port: u16,
    pub destination: Ipv4Addr,
    pub destination_port: u16,
    pub payload: u32,
    pub interval: Duration,
    pub start: Duration,
    pub stop: Duration,
    /// Uniform jitter applied to each gap, as a fraction of `interval`.
    pub jitter: f64,
}

impl CbrSource {
    pub fn udp(name: impl Into<String>, destination_port: u16, payload: u32) -> Self {
        CbrSource {
            name: name.into(),
            transport: Transport::Udp,
            source: Ipv4Addr::new(10, 0, 0, 1),
            source_port: 49153,
            destination: Ipv4Addr::new(10, 0, 1, 2),
            destination_port,
            payload,
            interval: Duration::from_millis(4),
            start: Duration::ZERO,
            stop: Duration::MAX,
            jitter: 0.0,
        }
    }

    pub fn tcp(name: impl Into<String>, destination_port: u16, payload: u32) -> Self {
        CbrSource {
            transport: Transport::Tcp,
            ..Self::udp(name, destination_port, payload)
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn active(mut self, start: Duration, stop: Duration) -> Self {
        self.start = start;
        self.stop = stop;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Bytes on the wire per packet.
    pub fn wire_size(&self) -> u32 {
        self.payload + self.transport.overhead()
    }

    /// Offered load in bits per second, ignoring jitter.
    pub fn offered_bps(&self) -> f64 {
        let secs = self.interval.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        f64::from(self.wire_size()) * 8.0 / secs
    }

    pub fn headers(&self) -> FlowHeaders {
        FlowHeaders {
            source: self.source,
            destination: self.destination,
            protocol: self.transport.protocol(),
            ports: Some((self.source_port, self.destination_port)),
        }
    }

    pub(crate) fn make_packet(&self, uid: u64, flow: u32) -> PacketMeta {
        PacketMeta::new(uid, self.wire_size())
            .with_flow(flow)
            .with_headers(self.headers())
    }

    /// Gap to the next emission in nanoseconds, never zero.
    pub(crate) fn next_gap(&self, rng: &mut StdRng) -> u64 {
        let base = self.interval.as_nanos() as f64;
        let gap = if self.jitter > 0.0 {
            let offset = (rng.random::<f64>() * 2.0 - 1.0) * self.jitter;
            base * (1.0 + offset)
        } else {
            base
        };
        (gap.round() as u64).max(1)
    }
}
