//! # Queue Configuration
//!
//! Configuration files are read into the raw [`QosConfigInput`] structs,
//! where every field is optional, then checked by
//! [`QosConfigInput::resolve`] into a [`QosConfig`] with defaults filled in.
//! [`QosConfig::from_json_str`], [`QosConfig::from_toml_str`] and
//! [`QosConfig::from_path`] do both steps; [`QosConfig::build`] turns the
//! result into a ready [`DiffServ`].

use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::diffserv::DiffServ;
use crate::filter::{Filter, FilterElement};
use crate::packet::Packet;
use crate::scheduler::Discipline;
use crate::traffic_class::{TrafficClass, DEFAULT_MAX_PACKETS, DEFAULT_WEIGHT};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no queues configured")]
    NoQueues,
    #[error("queue {queue}: maxPackets must be at least 1")]
    ZeroCapacity { queue: String },
    #[error("queue {queue}: DRR weight must be positive")]
    ZeroWeight { queue: String },
    #[error("queue {queue}: prefix length {prefix_len} is longer than 32")]
    PrefixTooLong { queue: String, prefix_len: u8 },
    #[error("more than one default queue: {first} and {second}")]
    DuplicateDefault { first: String, second: String },
    #[error("no default queue configured")]
    MissingDefault,
    #[error("unknown scheduling discipline {0:?} (expected \"drr\" or \"spq\")")]
    UnknownDiscipline(String),
    #[error("no scheduling discipline selected")]
    MissingDiscipline,
}

// ── Discipline selection ────────────────────────────────────────────

/// Which scheduler a configuration builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisciplineKind {
    Drr,
    Spq,
}

impl DisciplineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisciplineKind::Drr => "drr",
            DisciplineKind::Spq => "spq",
        }
    }

    pub fn discipline(&self) -> Discipline {
        match self {
            DisciplineKind::Drr => Discipline::drr(),
            DisciplineKind::Spq => Discipline::spq(),
        }
    }
}

impl fmt::Display for DisciplineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisciplineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drr" => Ok(DisciplineKind::Drr),
            "spq" => Ok(DisciplineKind::Spq),
            other => Err(ConfigError::UnknownDiscipline(other.to_string())),
        }
    }
}

// ── Raw input ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QosConfigInput {
    pub discipline: Option<DisciplineKind>,
    pub queues: Vec<QueueConfigInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueConfigInput {
    pub name: Option<String>,
    pub max_packets: Option<usize>,
    pub is_default: Option<bool>,
    pub priority_level: Option<u32>,
    #[serde(alias = "quantum")]
    pub weight: Option<u32>,
    /// Outer list is OR, inner list is AND.
    pub filters: Vec<Vec<FilterElementInput>>,
}

/// One filter element as written in the configuration.
///
/// For the mask types `value` is the prefix length and `addr` the network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum FilterElementInput {
    SourceIpAddress { value: Ipv4Addr },
    DestinationIpAddress { value: Ipv4Addr },
    SourceMask { value: u8, addr: Ipv4Addr },
    DestinationMask { value: u8, addr: Ipv4Addr },
    SourcePortNumber { value: u16 },
    DestinationPortNumber { value: u16 },
    ProtocolNumber { value: u8 },
}

// ── Resolved config ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: String,
    pub max_packets: usize,
    pub is_default: bool,
    pub priority: u32,
    pub weight: u32,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosConfig {
    pub discipline: Option<DisciplineKind>,
    pub queues: Vec<QueueConfig>,
}

impl FilterElementInput {
    fn resolve(&self, queue: &str) -> Result<FilterElement, ConfigError> {
        let check_prefix = |prefix_len: u8| {
            if prefix_len > 32 {
                Err(ConfigError::PrefixTooLong {
                    queue: queue.to_string(),
                    prefix_len,
                })
            } else {
                Ok(prefix_len)
            }
        };

        Ok(match *self {
            FilterElementInput::SourceIpAddress { value } => FilterElement::SourceIpAddress(value),
            FilterElementInput::DestinationIpAddress { value } => {
                FilterElement::DestinationIpAddress(value)
            }
            FilterElementInput::SourceMask { value, addr } => FilterElement::SourceMask {
                addr,
                prefix_len: check_prefix(value)?,
            },
            FilterElementInput::DestinationMask { value, addr } => FilterElement::DestinationMask {
                addr,
                prefix_len: check_prefix(value)?,
            },
            FilterElementInput::SourcePortNumber { value } => {
                FilterElement::SourcePortNumber(value)
            }
            FilterElementInput::DestinationPortNumber { value } => {
                FilterElement::DestinationPortNumber(value)
            }
            FilterElementInput::ProtocolNumber { value } => FilterElement::ProtocolNumber(value),
        })
    }
}

impl QosConfigInput {
    pub fn resolve(self) -> Result<QosConfig, ConfigError> {
        if self.queues.is_empty() {
            return Err(ConfigError::NoQueues);
        }

        let mut queues = Vec::with_capacity(self.queues.len());
        let mut default_name: Option<String> = None;

        for (idx, queue) in self.queues.into_iter().enumerate() {
            let name = queue
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("queue{idx}"));

            let max_packets = queue.max_packets.unwrap_or(DEFAULT_MAX_PACKETS);
            if max_packets == 0 {
                return Err(ConfigError::ZeroCapacity { queue: name });
            }

            let is_default = queue.is_default.unwrap_or(false);
            if is_default {
                if let Some(first) = &default_name {
                    return Err(ConfigError::DuplicateDefault {
                        first: first.clone(),
                        second: name,
                    });
                }
                default_name = Some(name.clone());
            }

            let mut filters = Vec::with_capacity(queue.filters.len());
            for elements in &queue.filters {
                let filter = elements
                    .iter()
                    .map(|e| e.resolve(&name))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Filter::new)?;
                if filter.is_empty() {
                    warn!(queue = %name, "filter with no elements never matches");
                }
                filters.push(filter);
            }

            queues.push(QueueConfig {
                name,
                max_packets,
                is_default,
                priority: queue.priority_level.unwrap_or(0),
                weight: queue.weight.unwrap_or(DEFAULT_WEIGHT),
                filters,
            });
        }

        if default_name.is_none() {
            return Err(ConfigError::MissingDefault);
        }

        Ok(QosConfig {
            discipline: self.discipline,
            queues,
        })
    }
}

impl QosConfig {
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let parsed: QosConfigInput = serde_json::from_str(input)?;
        parsed.resolve()
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let parsed: QosConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    /// Load a file; `.toml` is parsed as TOML, anything else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&input)
        } else {
            Self::from_json_str(&input)
        }
    }

    /// Build a queue for `kind`.
    pub fn build<P: Packet>(&self, kind: DisciplineKind) -> Result<DiffServ<P>, ConfigError> {
        if kind == DisciplineKind::Drr {
            if let Some(q) = self.queues.iter().find(|q| q.weight == 0) {
                return Err(ConfigError::ZeroWeight {
                    queue: q.name.clone(),
                });
            }
        }

        let mut diffserv = DiffServ::new(kind.discipline());
        for q in &self.queues {
            diffserv.add_traffic_class(
                TrafficClass::new(q.name.as_str(), q.max_packets)
                    .with_default(q.is_default)
                    .with_priority(q.priority)
                    .with_weight(q.weight)
                    .with_filters(q.filters.iter().cloned()),
            );
        }

        info!(
            discipline = %kind,
            queues = self.queues.len(),
            "queue configuration applied"
        );
        Ok(diffserv)
    }

    /// Build with the discipline named in the file.
    pub fn build_configured<P: Packet>(&self) -> Result<DiffServ<P>, ConfigError> {
        let kind = self.discipline.ok_or(ConfigError::MissingDiscipline)?;
        self.build(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{FlowHeaders, PacketMeta};

    const SPQ_JSON: &str = r#"
    {
        "queues": [
            {
                "maxPackets": 50,
                "isDefault": false,
                "priorityLevel": 1,
                "filters": [
                    [ { "type": "DestinationPortNumber", "value": 7001 } ]
                ]
            },
            {
                "name": "interactive",
                "maxPackets": 50,
                "isDefault": true,
                "priorityLevel": 10,
                "filters": [
                    [
                        { "type": "DestinationPortNumber", "value": 7000 },
                        { "type": "ProtocolNumber", "value": 6 }
                    ],
                    [ { "type": "SourceMask", "value": 24, "addr": "10.0.0.0" } ]
                ]
            }
        ]
    }"#;

    #[test]
    fn parse_json_config() {
        let cfg = QosConfig::from_json_str(SPQ_JSON).unwrap();
        assert_eq!(cfg.queues.len(), 2);
        assert_eq!(cfg.discipline, None);

        let low = &cfg.queues[0];
        assert_eq!(low.name, "queue0");
        assert_eq!(low.max_packets, 50);
        assert_eq!(low.priority, 1);
        assert_eq!(low.weight, DEFAULT_WEIGHT);
        assert_eq!(
            low.filters,
            vec![Filter::new(vec![FilterElement::DestinationPortNumber(7001)])]
        );

        let high = &cfg.queues[1];
        assert_eq!(high.name, "interactive");
        assert!(high.is_default);
        assert_eq!(high.filters.len(), 2);
        assert_eq!(
            high.filters[1].elements(),
            &[FilterElement::SourceMask {
                addr: Ipv4Addr::new(10, 0, 0, 0),
                prefix_len: 24
            }]
        );
    }

    #[test]
    fn parse_toml_config_with_quantum_alias() {
        let toml = r#"
            discipline = "drr"

            [[queues]]
            maxPackets = 200
            quantum = 3000
            filters = [[{ type = "DestinationIpAddress", value = "10.0.1.2" }]]

            [[queues]]
            isDefault = true
            weight = 1000
        "#;
        let cfg = QosConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.discipline, Some(DisciplineKind::Drr));
        assert_eq!(cfg.queues[0].weight, 3000);
        assert_eq!(cfg.queues[0].max_packets, 200);
        assert_eq!(cfg.queues[1].max_packets, DEFAULT_MAX_PACKETS);
        assert_eq!(cfg.queues[1].weight, 1000);
        assert!(cfg.queues[1].filters.is_empty());
    }

    #[test]
    fn rejects_empty_queue_list() {
        assert!(matches!(
            QosConfig::from_json_str(r#"{ "queues": [] }"#),
            Err(ConfigError::NoQueues)
        ));
        assert!(matches!(
            QosConfig::from_json_str("{}"),
            Err(ConfigError::NoQueues)
        ));
    }

    #[test]
    fn rejects_duplicate_default() {
        let json = r#"{ "queues": [
            { "name": "a", "isDefault": true },
            { "name": "b", "isDefault": true }
        ] }"#;
        match QosConfig::from_json_str(json) {
            Err(ConfigError::DuplicateDefault { first, second }) => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_default() {
        let json = r#"{ "queues": [ { "maxPackets": 10 } ] }"#;
        assert!(matches!(
            QosConfig::from_json_str(json),
            Err(ConfigError::MissingDefault)
        ));
    }

    #[test]
    fn rejects_zero_capacity() {
        let json = r#"{ "queues": [ { "maxPackets": 0, "isDefault": true } ] }"#;
        assert!(matches!(
            QosConfig::from_json_str(json),
            Err(ConfigError::ZeroCapacity { .. })
        ));
    }

    #[test]
    fn rejects_long_prefix() {
        let json = r#"{ "queues": [ { "isDefault": true, "filters": [[
            { "type": "DestinationMask", "value": 33, "addr": "10.0.0.0" }
        ]] } ] }"#;
        assert!(matches!(
            QosConfig::from_json_str(json),
            Err(ConfigError::PrefixTooLong { prefix_len: 33, .. })
        ));
    }

    #[test]
    fn rejects_unknown_element_type() {
        let json = r#"{ "queues": [ { "isDefault": true, "filters": [[
            { "type": "VlanId", "value": 5 }
        ]] } ] }"#;
        assert!(matches!(
            QosConfig::from_json_str(json),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn zero_weight_only_matters_for_drr() {
        let json = r#"{ "queues": [ { "isDefault": true, "weight": 0 } ] }"#;
        let cfg = QosConfig::from_json_str(json).unwrap();
        assert!(matches!(
            cfg.build::<PacketMeta>(DisciplineKind::Drr),
            Err(ConfigError::ZeroWeight { .. })
        ));
        assert!(cfg.build::<PacketMeta>(DisciplineKind::Spq).is_ok());
    }

    #[test]
    fn build_spq_sorts_and_classifies() {
        let cfg = QosConfig::from_json_str(SPQ_JSON).unwrap();
        let q: DiffServ<PacketMeta> = cfg.build(DisciplineKind::Spq).unwrap();
        let names: Vec<&str> = q.traffic_classes().map(|c| c.name()).collect();
        assert_eq!(names, vec!["interactive", "queue0"]);

        let low = PacketMeta::new(1, 100).with_headers(FlowHeaders::udp(
            Ipv4Addr::new(192, 168, 0, 1),
            1234,
            Ipv4Addr::new(10, 0, 1, 2),
            7001,
        ));
        assert_eq!(q.classify(&low), Some(1));
    }

    #[test]
    fn build_configured_needs_discipline() {
        let cfg = QosConfig::from_json_str(SPQ_JSON).unwrap();
        assert!(matches!(
            cfg.build_configured::<PacketMeta>(),
            Err(ConfigError::MissingDiscipline)
        ));
    }

    #[test]
    fn discipline_kind_from_str() {
        assert_eq!("DRR".parse::<DisciplineKind>().unwrap(), DisciplineKind::Drr);
        assert_eq!("spq".parse::<DisciplineKind>().unwrap(), DisciplineKind::Spq);
        for unknown in ["wfq", "strict", "priority", ""] {
            assert!(matches!(
                unknown.parse::<DisciplineKind>(),
                Err(ConfigError::UnknownDiscipline(_))
            ));
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            QosConfig::from_path("/nonexistent/diffserv.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
