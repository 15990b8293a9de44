//! # diffserv-sim
//!
//! Deterministic discrete-event simulation of a single bottleneck link fed
//! by constant-bit-rate sources through a [`diffserv_core::DiffServ`] queue.
//! Used to observe DRR bandwidth sharing and strict-priority preemption
//! end to end.

pub mod report;
pub mod scenario;
pub mod sim;
pub mod source;

use diffserv_core::{ConfigError, DisciplineKind, PacketMeta, QosConfig};

pub use report::{FlowReport, SimReport, ThroughputSample};
pub use scenario::{builtin_config, LinkConfig, Scenario};
pub use sim::Simulation;
pub use source::CbrSource;

/// Build the queue from `config` and run `scenario` through it.
pub fn run(
    scenario: Scenario,
    config: &QosConfig,
    kind: DisciplineKind,
) -> Result<SimReport, ConfigError> {
    let queue = config.build::<PacketMeta>(kind)?;
    Ok(Simulation::new(scenario, queue).run())
}
