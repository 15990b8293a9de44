//! # diffserv-core
//!
//! Differentiated-services egress queuing.
//!
//! Arriving packets are classified into traffic classes by rule-based
//! filters, buffered per class in bounded FIFOs, and handed to the link by a
//! pluggable scheduling discipline: Deficit Round Robin for weighted fairness
//! or Strict Priority for absolute ordering.
//!
//! ## Crate structure
//!
//! - [`packet`]: Packet accessor trait and a concrete packet type
//! - [`filter`]: Filter elements and AND-filters
//! - [`traffic_class`]: Bounded per-class FIFO with OR-filters
//! - [`scheduler`]: DRR and SPQ selection state
//! - [`diffserv`]: Coordinator: classify, enqueue, schedule, peek
//! - [`config`]: JSON/TOML queue configuration and validation
//! - [`stats`]: Per-class counters, snapshots, Prometheus rendering
//! - [`shared`]: Mutex-guarded handle for multi-threaded hosts

pub mod config;
pub mod diffserv;
pub mod filter;
pub mod packet;
pub mod scheduler;
pub mod shared;
pub mod stats;
pub mod traffic_class;

pub use config::{ConfigError, DisciplineKind, QosConfig};
pub use diffserv::{ClassId, DiffServ};
pub use filter::{Filter, FilterElement};
pub use packet::{Packet, PacketMeta};
pub use scheduler::Discipline;
pub use shared::SharedDiffServ;
pub use traffic_class::TrafficClass;
