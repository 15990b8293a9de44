//! # DiffServ Coordinator
//!
//! Owns the traffic classes and routes packets through them:
//!
//! ```text
//! enqueue:  packet → classify → position → TrafficClass::enqueue (may drop)
//! dequeue:  Discipline::select → TrafficClass::dequeue → Discipline::commit
//! peek:     Discipline::peek_select → TrafficClass::peek   (no state change)
//! ```
//!
//! Classes live in an arena addressed by [`ClassId`]. The scheduling order
//! is a separate list of ids that strict priority re-sorts on every
//! insertion, so positions can shift while ids never do.

use tracing::{debug, trace};

use crate::packet::Packet;
use crate::scheduler::{ClassView, Discipline};
use crate::stats::{ClassStatsSnapshot, StatsSnapshot};
use crate::traffic_class::TrafficClass;

/// Stable handle to a traffic class inside one [`DiffServ`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(usize);

impl ClassId {
    pub(crate) fn from_index(index: usize) -> Self {
        ClassId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Classifying, buffering, scheduling egress queue.
#[derive(Debug, Clone)]
pub struct DiffServ<P> {
    classes: Vec<TrafficClass<P>>,
    order: Vec<ClassId>,
    discipline: Discipline,
    dropped_unclassified: u64,
    dropped_unclassified_bytes: u64,
}

impl<P: Packet> DiffServ<P> {
    pub fn new(discipline: Discipline) -> Self {
        DiffServ {
            classes: Vec::new(),
            order: Vec::new(),
            discipline,
            dropped_unclassified: 0,
            dropped_unclassified_bytes: 0,
        }
    }

    /// Empty queue scheduled by Deficit Round Robin.
    pub fn drr() -> Self {
        Self::new(Discipline::drr())
    }

    /// Empty queue scheduled by strict priority.
    pub fn spq() -> Self {
        Self::new(Discipline::spq())
    }

    pub fn discipline(&self) -> &Discipline {
        &self.discipline
    }

    fn view(&self) -> ClassView<'_, P> {
        ClassView::new(&self.classes, &self.order)
    }

    // ─── Configuration ──────────────────────────────────────────────────

    /// Add a class at the end of the order. Strict priority then re-sorts
    /// the whole order, so earlier positions may shift.
    pub fn add_traffic_class(&mut self, class: TrafficClass<P>) -> ClassId {
        let id = ClassId(self.classes.len());
        debug!(
            class = class.name(),
            id = id.0,
            priority = class.priority(),
            weight = class.weight(),
            capacity = class.capacity(),
            is_default = class.is_default(),
            discipline = self.discipline.name(),
            "traffic class added"
        );
        self.classes.push(class);
        self.order.push(id);
        self.discipline.on_class_added(id, &self.classes, &mut self.order);
        id
    }

    /// Classes in scheduling order.
    pub fn traffic_classes(&self) -> impl Iterator<Item = &TrafficClass<P>> + '_ {
        self.view().iter()
    }

    /// Mutable classes in scheduling order.
    pub fn traffic_classes_mut(&mut self) -> Vec<&mut TrafficClass<P>> {
        let mut slots: Vec<Option<&mut TrafficClass<P>>> =
            self.classes.iter_mut().map(Some).collect();
        self.order
            .iter()
            .filter_map(|id| slots[id.0].take())
            .collect()
    }

    pub fn class(&self, id: ClassId) -> Option<&TrafficClass<P>> {
        self.classes.get(id.0)
    }

    pub fn class_mut(&mut self, id: ClassId) -> Option<&mut TrafficClass<P>> {
        self.classes.get_mut(id.0)
    }

    /// Id of the class at a scheduling position.
    pub fn class_id_at(&self, position: usize) -> Option<ClassId> {
        self.order.get(position).copied()
    }

    /// Current scheduling position of a class.
    pub fn position_of(&self, id: ClassId) -> Option<usize> {
        self.order.iter().position(|&x| x == id)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Total packets buffered across all classes.
    pub fn len(&self) -> usize {
        self.classes.iter().map(TrafficClass::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.iter().all(TrafficClass::is_empty)
    }

    // ─── Data path ──────────────────────────────────────────────────────

    /// Scheduling position of the class a packet belongs to.
    ///
    /// First class (in scheduling order) with a matching filter, else the
    /// first default class, else `None`.
    pub fn classify(&self, packet: &P) -> Option<usize> {
        let view = self.view();
        view.iter()
            .position(|class| class.matches(packet))
            .or_else(|| view.iter().position(TrafficClass::is_default))
    }

    /// Classify and buffer a packet. Returns false if the packet was dropped,
    /// either because nothing claimed it or because its class is full.
    pub fn enqueue(&mut self, packet: P) -> bool {
        let Some(position) = self.classify(&packet) else {
            let size = packet.size();
            self.dropped_unclassified += 1;
            self.dropped_unclassified_bytes += u64::from(size);
            debug!(size, "no matching or default class, packet dropped");
            return false;
        };
        let id = self.order[position];
        self.classes[id.0].enqueue(packet)
    }

    /// Remove the next packet chosen by the discipline.
    pub fn dequeue(&mut self) -> Option<P> {
        self.schedule()
    }

    /// Alias of [`dequeue`](Self::dequeue).
    pub fn remove(&mut self) -> Option<P> {
        self.schedule()
    }

    /// The packet [`dequeue`](Self::dequeue) would return now. Leaves the
    /// scheduler state untouched.
    pub fn peek(&self) -> Option<&P> {
        let view = self.view();
        let position = self.discipline.peek_select(&view)?;
        view.class(position).peek()
    }

    fn schedule(&mut self) -> Option<P> {
        let view = ClassView::new(&self.classes, &self.order);
        let position = self.discipline.select(&view)?;
        let id = self.order[position];
        let packet = self.classes[id.0].dequeue()?;
        let size = packet.size();
        self.discipline.commit(id, size);
        trace!(
            class = self.classes[id.0].name(),
            position,
            size,
            "packet scheduled"
        );
        Some(packet)
    }

    // ─── Statistics ─────────────────────────────────────────────────────

    pub fn dropped_unclassified(&self) -> u64 {
        self.dropped_unclassified
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        let classes = self
            .traffic_classes()
            .enumerate()
            .map(|(position, class)| ClassStatsSnapshot {
                name: class.name().to_string(),
                position,
                priority: class.priority(),
                weight: class.weight(),
                is_default: class.is_default(),
                occupancy: class.len(),
                capacity: class.capacity(),
                counters: *class.stats(),
            })
            .collect();

        StatsSnapshot {
            discipline: self.discipline.name().to_string(),
            dropped_unclassified: self.dropped_unclassified,
            dropped_unclassified_bytes: self.dropped_unclassified_bytes,
            total_buffered: self.len(),
            classes,
        }
    }
}
