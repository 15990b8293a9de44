//! # Traffic Classes
//!
//! A traffic class is a bounded FIFO plus the filters that steer packets
//! into it and the metadata the schedulers read (priority for SPQ, weight
//! for DRR, and the default-class flag used as classification fallback).

use std::collections::VecDeque;

use compact_str::CompactString;
use tracing::trace;

use crate::filter::Filter;
use crate::packet::Packet;
use crate::stats::ClassStats;

/// Capacity used when none is configured.
pub const DEFAULT_MAX_PACKETS: usize = 100;
/// DRR quantum, in bytes, used when none is configured.
pub const DEFAULT_WEIGHT: u32 = 1000;

/// Bounded FIFO with OR-filters and scheduling metadata.
#[derive(Debug, Clone)]
pub struct TrafficClass<P> {
    name: CompactString,
    queue: VecDeque<P>,
    capacity: usize,
    filters: Vec<Filter>,
    is_default: bool,
    priority: u32,
    weight: u32,
    stats: ClassStats,
}

impl<P> TrafficClass<P> {
    pub fn new(name: impl Into<CompactString>, capacity: usize) -> Self {
        TrafficClass {
            name: name.into(),
            queue: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            filters: Vec::new(),
            is_default: false,
            priority: 0,
            weight: DEFAULT_WEIGHT,
            stats: ClassStats::new(),
        }
    }

    /// Higher value is served first under strict priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Bytes of credit granted per DRR visit.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn stats(&self) -> &ClassStats {
        &self.stats
    }

    /// Packets currently buffered.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    /// Head of the FIFO, without removing it.
    pub fn peek(&self) -> Option<&P> {
        self.queue.front()
    }
}

impl<P: Packet> TrafficClass<P> {
    /// True if any filter matches the packet.
    pub fn matches(&self, packet: &P) -> bool {
        self.filters.iter().any(|f| f.matches(packet))
    }

    /// Append a packet, handing it back if the class is full.
    pub fn try_enqueue(&mut self, packet: P) -> Result<(), P> {
        let size = packet.size();
        if self.is_full() {
            self.stats.record_drop(size);
            trace!(
                class = %self.name,
                size,
                capacity = self.capacity,
                "class full, packet rejected"
            );
            return Err(packet);
        }
        self.queue.push_back(packet);
        self.stats.record_enqueue(size);
        Ok(())
    }

    /// Append a packet; a full class drops it and returns false.
    pub fn enqueue(&mut self, packet: P) -> bool {
        self.try_enqueue(packet).is_ok()
    }

    /// Remove and return the head of the FIFO.
    pub fn dequeue(&mut self) -> Option<P> {
        let packet = self.queue.pop_front()?;
        self.stats.record_dequeue(packet.size());
        Some(packet)
    }

    /// Size of the head packet, if any.
    pub fn head_size(&self) -> Option<u32> {
        self.queue.front().map(Packet::size)
    }
}
