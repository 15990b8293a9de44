use std::cmp::Reverse;

use super::ClassView;
use crate::diffserv::ClassId;
use crate::traffic_class::TrafficClass;

/// Strict priority selection.
///
/// The order list is kept sorted by descending priority, ties in insertion
/// order. The first backlogged class always wins; lower classes are served
/// only when every class above them is empty, with no starvation guard.
#[derive(Debug, Clone, Default)]
pub struct Spq;

impl Spq {
    pub fn new() -> Self {
        Spq
    }

    /// Re-sort the order list. `sort_by_key` is stable, so equal
    /// priorities keep their insertion order.
    pub(crate) fn arrange<P>(&self, arena: &[TrafficClass<P>], order: &mut [ClassId]) {
        order.sort_by_key(|id| Reverse(arena[id.index()].priority()));
    }

    pub(crate) fn select<P>(&self, view: &ClassView<'_, P>) -> Option<usize> {
        view.iter().position(|class| !class.is_empty())
    }
}
