use tracing::trace;

use super::ClassView;
use crate::diffserv::ClassId;
use crate::packet::Packet;

/// Deficit Round Robin selection state.
///
/// Each class owns a byte deficit. The cursor walks the scheduling order;
/// a visited class whose head packet does not fit its deficit is credited
/// with its weight and the cursor moves on. A class whose head fits is
/// served, and the cursor stays on it so the next search re-evaluates it
/// first. Empty classes lose their deficit.
#[derive(Debug, Clone, Default)]
pub struct Drr {
    /// Indexed by [`ClassId`].
    deficits: Vec<u64>,
    /// Scheduling position the next search starts from.
    cursor: usize,
}

impl Drr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deficit(&self, id: ClassId) -> u64 {
        self.deficits.get(id.index()).copied().unwrap_or(0)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn register(&mut self, id: ClassId) {
        if self.deficits.len() <= id.index() {
            self.deficits.resize(id.index() + 1, 0);
        }
    }

    fn advance(&mut self, count: usize) {
        self.cursor = (self.cursor + 1) % count;
    }

    pub(crate) fn select<P: Packet>(&mut self, view: &ClassView<'_, P>) -> Option<usize> {
        let count = view.len();
        if count == 0 {
            return None;
        }
        if self.cursor >= count {
            self.cursor = 0;
        }
        for pos in 0..count {
            self.register(view.id(pos));
        }

        loop {
            let mut visited_backlog = false;
            let mut credited = false;

            for _ in 0..count {
                let pos = self.cursor;
                let slot = view.id(pos).index();
                let class = view.class(pos);

                let Some(head) = class.head_size() else {
                    self.deficits[slot] = 0;
                    self.advance(count);
                    continue;
                };
                visited_backlog = true;

                if u64::from(head) <= self.deficits[slot] {
                    return Some(pos);
                }

                let weight = u64::from(class.weight());
                self.deficits[slot] += weight;
                credited |= weight > 0;
                self.advance(count);
            }

            if !visited_backlog {
                return None;
            }
            if !credited {
                // Every backlogged class has weight 0: nothing can ever fit.
                trace!("drr: backlogged classes have no quantum, nothing schedulable");
                return None;
            }
        }
    }

    /// Run the search on a throwaway copy of the state.
    pub(crate) fn peek_select<P: Packet>(&self, view: &ClassView<'_, P>) -> Option<usize> {
        self.clone().select(view)
    }

    pub(crate) fn commit(&mut self, id: ClassId, size: u32) {
        if let Some(deficit) = self.deficits.get_mut(id.index()) {
            *deficit = deficit.saturating_sub(u64::from(size));
        }
    }
}
