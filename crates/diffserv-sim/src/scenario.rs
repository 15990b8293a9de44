use std::time::Duration;

use diffserv_core::{ConfigError, DisciplineKind, QosConfig};

use crate::source::CbrSource;

const DRR_CONFIG: &str = include_str!("../configs/drr-config.json");
const SPQ_CONFIG: &str = include_str!("../configs/spq-config.json");

/// Bottleneck link draining the queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    pub rate_bps: u64,
    /// Propagation delay added after serialisation.
    pub delay: Duration,
}

impl LinkConfig {
    pub fn new(rate_bps: u64, delay: Duration) -> Self {
        LinkConfig { rate_bps, delay }
    }

    /// Serialisation time for `bytes` in nanoseconds, rounded up.
    pub fn transmit_nanos(&self, bytes: u32) -> u64 {
        let rate = u128::from(self.rate_bps.max(1));
        let bits = u128::from(bytes) * 8 * 1_000_000_000;
        bits.div_ceil(rate).min(u128::from(u64::MAX)) as u64
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig::new(1_000_000, Duration::from_millis(2))
    }
}

/// Traffic sources and link for one simulated run.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub duration: Duration,
    pub link: LinkConfig,
    pub sources: Vec<CbrSource>,
}

impl Scenario {
    /// Three UDP flows on ports 5000..=5002, each offering about 2 Mbit/s
    /// into a 1 Mbit/s link. They stop at 50 s, 15 s and 30 s.
    pub fn drr() -> Self {
        let stops = [50, 15, 30];
        let sources = stops
            .iter()
            .enumerate()
            .map(|(i, &stop)| {
                CbrSource::udp(format!("flow{i}"), 5000 + i as u16, 1000)
                    .with_interval(Duration::from_millis(4))
                    .active(Duration::ZERO, Duration::from_secs(stop))
                    .with_jitter(0.05)
            })
            .collect();

        Scenario {
            name: "drr".into(),
            seed: 1,
            duration: Duration::from_secs(50),
            link: LinkConfig::default(),
            sources,
        }
    }

    /// A bulk flow to port 7001 for the whole run and an interactive flow
    /// to port 7000 active from 15 s to 35 s.
    pub fn spq() -> Self {
        let sources = vec![
            CbrSource::tcp("bulk", 7001, 1024)
                .with_interval(Duration::from_millis(4))
                .active(Duration::ZERO, Duration::from_secs(50))
                .with_jitter(0.05),
            CbrSource::tcp("interactive", 7000, 1024)
                .with_interval(Duration::from_millis(4))
                .active(Duration::from_secs(15), Duration::from_secs(35))
                .with_jitter(0.05),
        ];

        Scenario {
            name: "spq".into(),
            seed: 1,
            duration: Duration::from_secs(50),
            link: LinkConfig::default(),
            sources,
        }
    }

    pub fn builtin(kind: DisciplineKind) -> Self {
        match kind {
            DisciplineKind::Drr => Self::drr(),
            DisciplineKind::Spq => Self::spq(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_link_rate(mut self, rate_bps: u64) -> Self {
        self.link.rate_bps = rate_bps;
        self
    }

    pub fn offered_bps(&self) -> f64 {
        self.sources.iter().map(CbrSource::offered_bps).sum()
    }
}

/// Queue configuration shipped with the built-in scenario.
pub fn builtin_config(kind: DisciplineKind) -> Result<QosConfig, ConfigError> {
    match kind {
        DisciplineKind::Drr => QosConfig::from_json_str(DRR_CONFIG),
        DisciplineKind::Spq => QosConfig::from_json_str(SPQ_CONFIG),
    }
}
