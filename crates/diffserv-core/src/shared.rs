//! Thread-safe handle around one [`DiffServ`].
//!
//! DRR selection and commit must observe one consistent view of cursor,
//! deficits and occupancy, so the whole queue sits behind a single mutex
//! held for the duration of every call.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::diffserv::{ClassId, DiffServ};
use crate::packet::Packet;
use crate::stats::StatsSnapshot;
use crate::traffic_class::TrafficClass;

/// Lock a mutex, recovering from poison (prior panic in another thread).
fn lock_or_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cloneable, lock-guarded [`DiffServ`].
#[derive(Debug)]
pub struct SharedDiffServ<P> {
    inner: Arc<Mutex<DiffServ<P>>>,
}

impl<P> Clone for SharedDiffServ<P> {
    fn clone(&self) -> Self {
        SharedDiffServ {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Packet> SharedDiffServ<P> {
    pub fn new(queue: DiffServ<P>) -> Self {
        SharedDiffServ {
            inner: Arc::new(Mutex::new(queue)),
        }
    }

    pub fn enqueue(&self, packet: P) -> bool {
        lock_or_recover(&self.inner).enqueue(packet)
    }

    pub fn dequeue(&self) -> Option<P> {
        lock_or_recover(&self.inner).dequeue()
    }

    pub fn remove(&self) -> Option<P> {
        lock_or_recover(&self.inner).remove()
    }

    pub fn add_traffic_class(&self, class: TrafficClass<P>) -> ClassId {
        lock_or_recover(&self.inner).add_traffic_class(class)
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_or_recover(&self.inner).is_empty()
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        lock_or_recover(&self.inner).stats_snapshot()
    }

    /// Run `f` with the queue locked, e.g. to peek or inspect classes.
    pub fn with<R>(&self, f: impl FnOnce(&mut DiffServ<P>) -> R) -> R {
        f(&mut lock_or_recover(&self.inner))
    }
}

impl<P: Packet + Clone> SharedDiffServ<P> {
    /// Copy of the packet `dequeue` would return now.
    pub fn peek(&self) -> Option<P> {
        lock_or_recover(&self.inner).peek().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketMeta;
    use std::thread;

    #[test]
    fn concurrent_producers_lose_nothing() {
        let mut q = DiffServ::drr();
        q.add_traffic_class(
            TrafficClass::new("all", 10_000)
                .with_default(true)
                .with_weight(1500),
        );
        let shared = SharedDiffServ::new(q);

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let q = shared.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        assert!(q.enqueue(PacketMeta::new(t * 1000 + i, 100)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(shared.len(), 1000);
        let peeked = shared.peek().map(|p| p.uid);
        assert_eq!(shared.dequeue().map(|p| p.uid), peeked);

        let mut drained = 1;
        while shared.remove().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 1000);
        assert!(shared.is_empty());
        assert_eq!(shared.stats_snapshot().classes[0].counters.dequeued_packets, 1000);
    }

    #[test]
    fn with_gives_locked_access() {
        let shared: SharedDiffServ<PacketMeta> = SharedDiffServ::new(DiffServ::spq());
        shared.add_traffic_class(TrafficClass::new("a", 1).with_default(true));
        let count = shared.with(|q| q.class_count());
        assert_eq!(count, 1);
    }
}
