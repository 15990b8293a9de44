//! Discrete-event run of one egress link.
//!
//! Sources push packets into the [`DiffServ`] queue; the link pulls one
//! packet at a time and is busy for its serialisation time. Events are
//! ordered by time, then by insertion sequence, so a given seed always
//! replays identically.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use diffserv_core::{DiffServ, Packet, PacketMeta};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::report::{FlowReport, SimReport, ThroughputSample};
use crate::scenario::Scenario;

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    /// The packet on the wire has been fully serialised.
    TxComplete,
    /// Source `usize` emits its next packet.
    Emit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Event {
    at: u64,
    seq: u64,
    kind: EventKind,
}

#[derive(Debug, Default)]
struct FlowState {
    report: FlowReport,
    delay_sum_ns: u128,
    max_delay_ns: u64,
}

pub struct Simulation {
    scenario: Scenario,
    queue: DiffServ<PacketMeta>,
    rng: StdRng,
    events: BinaryHeap<Reverse<Event>>,
    seq: u64,
    now: u64,
    /// Emission time of each packet, indexed by uid.
    emitted_at: Vec<u64>,
    on_wire: Option<PacketMeta>,
    flows: Vec<FlowState>,
    /// Delivered bits per second bucket, per flow.
    buckets: Vec<Vec<u64>>,
}

impl Simulation {
    pub fn new(scenario: Scenario, queue: DiffServ<PacketMeta>) -> Self {
        let rng = StdRng::seed_from_u64(scenario.seed);
        let seconds = scenario.duration.as_nanos().div_ceil(u128::from(NANOS_PER_SEC)) as usize;
        let flows = scenario
            .sources
            .iter()
            .map(|s| FlowState {
                report: FlowReport {
                    name: s.name.clone(),
                    destination_port: s.destination_port,
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect();
        let buckets = vec![vec![0; scenario.sources.len()]; seconds];

        Simulation {
            scenario,
            queue,
            rng,
            events: BinaryHeap::new(),
            seq: 0,
            now: 0,
            emitted_at: Vec::new(),
            on_wire: None,
            flows,
            buckets,
        }
    }

    pub fn queue(&self) -> &DiffServ<PacketMeta> {
        &self.queue
    }

    fn end(&self) -> u64 {
        u64::try_from(self.scenario.duration.as_nanos()).unwrap_or(u64::MAX)
    }

    fn push(&mut self, at: u64, kind: EventKind) {
        self.seq += 1;
        self.events.push(Reverse(Event {
            at,
            seq: self.seq,
            kind,
        }));
    }

    /// Run to the end of the scenario and summarise.
    pub fn run(mut self) -> SimReport {
        info!(
            scenario = %self.scenario.name,
            discipline = self.queue.discipline().name(),
            sources = self.scenario.sources.len(),
            link_rate_bps = self.scenario.link.rate_bps,
            duration_s = self.scenario.duration.as_secs_f64(),
            seed = self.scenario.seed,
            "simulation starting"
        );

        for idx in 0..self.scenario.sources.len() {
            let start = self.scenario.sources[idx].start.as_nanos();
            if let Ok(start) = u64::try_from(start) {
                self.push(start, EventKind::Emit(idx));
            }
        }

        let end = self.end();
        while let Some(Reverse(event)) = self.events.pop() {
            if event.at > end {
                break;
            }
            self.now = event.at;
            match event.kind {
                EventKind::Emit(idx) => self.on_emit(idx),
                EventKind::TxComplete => self.on_tx_complete(),
            }
        }

        self.finish()
    }

    fn on_emit(&mut self, idx: usize) {
        let source = &self.scenario.sources[idx];
        if u128::from(self.now) >= source.stop.as_nanos() {
            return;
        }

        let uid = self.emitted_at.len() as u64;
        let packet = source.make_packet(uid, idx as u32);
        let gap = source.next_gap(&mut self.rng);
        let size = u64::from(packet.size());
        self.emitted_at.push(self.now);

        let flow = &mut self.flows[idx].report;
        flow.sent_packets += 1;
        flow.sent_bytes += size;

        if !self.queue.enqueue(packet) {
            let flow = &mut self.flows[idx].report;
            flow.dropped_packets += 1;
            flow.dropped_bytes += size;
        }

        self.push(self.now.saturating_add(gap), EventKind::Emit(idx));
        self.start_transmission();
    }

    fn start_transmission(&mut self) {
        if self.on_wire.is_some() {
            return;
        }
        let Some(packet) = self.queue.dequeue() else {
            return;
        };
        let done = self.now + self.scenario.link.transmit_nanos(packet.size());
        self.on_wire = Some(packet);
        self.push(done, EventKind::TxComplete);
    }

    fn on_tx_complete(&mut self) {
        if let Some(packet) = self.on_wire.take() {
            self.deliver(packet);
        }
        self.start_transmission();
    }

    fn deliver(&mut self, packet: PacketMeta) {
        let propagation = u64::try_from(self.scenario.link.delay.as_nanos()).unwrap_or(u64::MAX);
        let arrival = self.now.saturating_add(propagation);
        if arrival > self.end() {
            return;
        }

        let idx = packet.flow as usize;
        let size = u64::from(packet.size());
        let emitted = self.emitted_at[packet.uid as usize];
        let delay = arrival - emitted;

        let state = &mut self.flows[idx];
        state.report.delivered_packets += 1;
        state.report.delivered_bytes += size;
        state.delay_sum_ns += u128::from(delay);
        state.max_delay_ns = state.max_delay_ns.max(delay);

        let second = (arrival / NANOS_PER_SEC) as usize;
        if let Some(bucket) = self.buckets.get_mut(second) {
            bucket[idx] += size * 8;
        }
    }

    fn finish(self) -> SimReport {
        let throughput: Vec<ThroughputSample> = self
            .buckets
            .into_iter()
            .enumerate()
            .map(|(second, bits_per_second)| ThroughputSample {
                second: second as u64,
                bits_per_second,
            })
            .collect();

        for sample in &throughput {
            debug!(second = sample.second, bps = ?sample.bits_per_second, "throughput");
        }

        let flows: Vec<FlowReport> = self
            .flows
            .into_iter()
            .map(|state| {
                let mut report = state.report;
                if report.delivered_packets > 0 {
                    let mean = state.delay_sum_ns / u128::from(report.delivered_packets);
                    report.mean_delay_ms = mean as f64 / 1e6;
                }
                report.max_delay_ms = state.max_delay_ns as f64 / 1e6;
                report
            })
            .collect();

        for flow in &flows {
            info!(
                flow = %flow.name,
                port = flow.destination_port,
                sent = flow.sent_packets,
                delivered = flow.delivered_packets,
                dropped = flow.dropped_packets,
                mean_delay_ms = flow.mean_delay_ms,
                "flow summary"
            );
        }

        SimReport {
            scenario: self.scenario.name,
            discipline: self.queue.discipline().name().to_string(),
            seed: self.scenario.seed,
            duration_secs: self.scenario.duration.as_secs_f64(),
            link_rate_bps: self.scenario.link.rate_bps,
            flows,
            throughput,
            queue: self.queue.stats_snapshot(),
        }
    }
}
