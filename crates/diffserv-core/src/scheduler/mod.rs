//! Packet scheduling disciplines.
//!
//! A discipline decides which traffic class the link is served from next.
//! The set is closed: [`Drr`] for weighted fairness and [`Spq`] for strict
//! priority, both behind the [`Discipline`] handle held by the coordinator.
//!
//! Every discipline splits its work in two:
//! - `select` finds the scheduling position of the next class to serve,
//! - `commit` books the packet that was actually removed.
//!
//! `peek_select` answers the same question as `select` without touching
//! any state, which is what a non-mutating peek needs.

pub mod drr;
pub mod spq;

pub use drr::Drr;
pub use spq::Spq;

use crate::diffserv::ClassId;
use crate::packet::Packet;
use crate::traffic_class::TrafficClass;

/// Traffic classes seen in scheduling order.
///
/// `arena` is indexed by [`ClassId`]; `order` lists ids by scheduling
/// position.
pub struct ClassView<'a, P> {
    arena: &'a [TrafficClass<P>],
    order: &'a [ClassId],
}

impl<'a, P> ClassView<'a, P> {
    pub fn new(arena: &'a [TrafficClass<P>], order: &'a [ClassId]) -> Self {
        ClassView { arena, order }
    }

    /// Number of classes in the order.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stable id of the class at `position`.
    pub fn id(&self, position: usize) -> ClassId {
        self.order[position]
    }

    /// Class at `position`.
    pub fn class(&self, position: usize) -> &'a TrafficClass<P> {
        &self.arena[self.order[position].index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a TrafficClass<P>> + 'a {
        let arena = self.arena;
        self.order.iter().map(move |id| &arena[id.index()])
    }
}

/// Scheduling strategy held by a [`DiffServ`](crate::diffserv::DiffServ).
#[derive(Debug, Clone)]
pub enum Discipline {
    Drr(Drr),
    Spq(Spq),
}

impl Discipline {
    pub fn drr() -> Self {
        Discipline::Drr(Drr::new())
    }

    pub fn spq() -> Self {
        Discipline::Spq(Spq::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Discipline::Drr(_) => "drr",
            Discipline::Spq(_) => "spq",
        }
    }

    /// Hook run after a class joins the arena and the order list.
    pub(crate) fn on_class_added<P>(
        &mut self,
        id: ClassId,
        arena: &[TrafficClass<P>],
        order: &mut [ClassId],
    ) {
        match self {
            Discipline::Drr(drr) => drr.register(id),
            Discipline::Spq(spq) => spq.arrange(arena, order),
        }
    }

    /// Position of the class to serve next. May advance DRR state.
    pub(crate) fn select<P: Packet>(&mut self, view: &ClassView<'_, P>) -> Option<usize> {
        match self {
            Discipline::Drr(drr) => drr.select(view),
            Discipline::Spq(spq) => spq.select(view),
        }
    }

    /// What [`select`](Self::select) would return, leaving state untouched.
    pub(crate) fn peek_select<P: Packet>(&self, view: &ClassView<'_, P>) -> Option<usize> {
        match self {
            Discipline::Drr(drr) => drr.peek_select(view),
            Discipline::Spq(spq) => spq.select(view),
        }
    }

    /// Book a packet of `size` bytes removed from class `id`.
    pub(crate) fn commit(&mut self, id: ClassId, size: u32) {
        match self {
            Discipline::Drr(drr) => drr.commit(id, size),
            Discipline::Spq(_) => {}
        }
    }
}
