//! Property-based tests for classification, buffering and scheduling.

use std::net::Ipv4Addr;

use diffserv_core::packet::FlowHeaders;
use diffserv_core::{DiffServ, Discipline, Filter, FilterElement, PacketMeta, TrafficClass};
use proptest::prelude::*;

const BASE_PORT: u16 = 5000;

fn packet(uid: u64, class: usize, size: u32) -> PacketMeta {
    let port = BASE_PORT + class as u16;
    PacketMeta::new(uid, size)
        .with_flow(class as u32)
        .with_headers(FlowHeaders::udp(
            Ipv4Addr::new(10, 0, 0, 1),
            40000,
            Ipv4Addr::new(10, 0, 1, 2),
            port,
        ))
}

/// One class per entry, class `i` claiming destination port `BASE_PORT + i`.
fn build(discipline: Discipline, classes: &[(usize, u32, u32)]) -> DiffServ<PacketMeta> {
    let mut q = DiffServ::new(discipline);
    for (i, &(capacity, priority, weight)) in classes.iter().enumerate() {
        q.add_traffic_class(
            TrafficClass::new(format!("c{i}"), capacity)
                .with_priority(priority)
                .with_weight(weight)
                .with_filter(Filter::new(vec![FilterElement::DestinationPortNumber(
                    BASE_PORT + i as u16,
                )])),
        );
    }
    q
}

fn class_layout() -> impl Strategy<Value = Vec<(usize, u32, u32)>> {
    prop::collection::vec((1usize..=16, 0u32..8, 1u32..=1500), 1..=5)
}

#[derive(Debug, Clone)]
enum Op {
    Enqueue { class: usize, size: u32 },
    Dequeue,
    Peek,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..5, 40u32..=1500).prop_map(|(class, size)| Op::Enqueue { class, size }),
        2 => Just(Op::Dequeue),
        1 => Just(Op::Peek),
    ]
}

fn discipline() -> impl Strategy<Value = bool> {
    any::<bool>()
}

// ─── Buffering ──────────────────────────────────────────────────────────────

proptest! {
    /// No class ever holds more than its capacity, and every accepted packet
    /// is eventually dequeued exactly once.
    #[test]
    fn occupancy_bounded_and_nothing_lost(
        classes in class_layout(),
        ops in prop::collection::vec(op(), 0..300),
        use_drr in discipline(),
    ) {
        let d = if use_drr { Discipline::drr() } else { Discipline::spq() };
        let mut q = build(d, &classes);
        let mut accepted = 0usize;
        let mut delivered = 0usize;

        for (uid, op) in ops.into_iter().enumerate() {
            match op {
                Op::Enqueue { class, size } => {
                    if q.enqueue(packet(uid as u64, class, size)) {
                        accepted += 1;
                    }
                }
                Op::Dequeue => {
                    if q.dequeue().is_some() {
                        delivered += 1;
                    }
                }
                Op::Peek => {
                    let _ = q.peek();
                }
            }
            for class in q.traffic_classes() {
                prop_assert!(class.len() <= class.capacity());
            }
        }

        while q.dequeue().is_some() {
            delivered += 1;
        }
        prop_assert_eq!(accepted, delivered);
        prop_assert!(q.is_empty());
    }

    /// Within one class, packets leave in arrival order.
    #[test]
    fn per_class_fifo(
        classes in class_layout(),
        arrivals in prop::collection::vec((0usize..5, 40u32..=1500), 1..200),
        use_drr in discipline(),
    ) {
        let d = if use_drr { Discipline::drr() } else { Discipline::spq() };
        let mut q = build(d, &classes);
        for (uid, (class, size)) in arrivals.into_iter().enumerate() {
            q.enqueue(packet(uid as u64, class, size));
        }

        let mut last_uid = vec![None::<u64>; classes.len()];
        while let Some(p) = q.dequeue() {
            let slot = &mut last_uid[p.flow as usize];
            if let Some(prev) = *slot {
                prop_assert!(p.uid > prev);
            }
            *slot = Some(p.uid);
        }
    }
}

// ─── Scheduling ─────────────────────────────────────────────────────────────

proptest! {
    /// `peek` is pure and names the packet `dequeue` returns next.
    #[test]
    fn peek_matches_dequeue(
        classes in class_layout(),
        ops in prop::collection::vec(op(), 0..300),
        use_drr in discipline(),
    ) {
        let d = if use_drr { Discipline::drr() } else { Discipline::spq() };
        let mut q = build(d, &classes);

        for (uid, op) in ops.into_iter().enumerate() {
            match op {
                Op::Enqueue { class, size } => {
                    q.enqueue(packet(uid as u64, class, size));
                }
                Op::Dequeue | Op::Peek => {
                    let first = q.peek().cloned();
                    let second = q.peek().cloned();
                    prop_assert_eq!(&first, &second);
                    if matches!(op, Op::Dequeue) {
                        prop_assert_eq!(q.dequeue(), first);
                    }
                }
            }
        }
    }

    /// Strict priority always serves the highest-priority backlogged class.
    #[test]
    fn spq_serves_highest_backlogged_priority(
        classes in class_layout(),
        arrivals in prop::collection::vec((0usize..5, 40u32..=1500), 1..200),
    ) {
        let mut q = build(Discipline::spq(), &classes);
        for (uid, (class, size)) in arrivals.into_iter().enumerate() {
            q.enqueue(packet(uid as u64, class, size));
        }

        loop {
            let best = q
                .traffic_classes()
                .filter(|c| !c.is_empty())
                .map(TrafficClass::priority)
                .max();
            let Some(p) = q.dequeue() else {
                prop_assert!(best.is_none());
                break;
            };
            prop_assert_eq!(Some(classes[p.flow as usize].1), best);
        }
    }

    /// Classification is a pure function of packet and configuration.
    #[test]
    fn classification_is_stable(
        classes in class_layout(),
        class in 0usize..8,
        size in 40u32..=1500,
        use_drr in discipline(),
    ) {
        let d = if use_drr { Discipline::drr() } else { Discipline::spq() };
        let q = build(d, &classes);
        let p = packet(0, class, size);
        let first = q.classify(&p);
        prop_assert_eq!(q.classify(&p), first);
        prop_assert_eq!(first.is_some(), class < classes.len());
        if let Some(pos) = first {
            let id = q.class_id_at(pos).unwrap();
            prop_assert_eq!(id.index(), class);
        }
    }

    /// DRR with two always-backlogged classes: bytes served plus the
    /// remaining deficit always equal whole quanta granted (no packet was
    /// sent on credit it did not have), the two classes have been granted
    /// quanta within one round of each other, and the byte shares track
    /// the weights within one quantum plus one maximum packet.
    #[test]
    fn drr_serves_within_deficit_and_tracks_weights(
        w_a in 100u32..=1500,
        w_b in 100u32..=1500,
        sizes in prop::collection::vec(40u32..=1500, 1200),
        rounds in 1usize..300,
    ) {
        let mut q = build(Discipline::drr(), &[(600, 0, w_a), (600, 0, w_b)]);
        for (uid, &size) in sizes.iter().enumerate() {
            prop_assert!(q.enqueue(packet(uid as u64, uid % 2, size)));
        }
        let max_size = f64::from(*sizes.iter().max().unwrap());
        let weights = [u64::from(w_a), u64::from(w_b)];
        let ids = [q.class_id_at(0).unwrap(), q.class_id_at(1).unwrap()];
        let mut served = [0u64; 2];

        for _ in 0..rounds {
            let p = q.dequeue().unwrap();
            served[p.flow as usize] += u64::from(p.size);

            let Discipline::Drr(drr) = q.discipline() else {
                unreachable!("built with DRR");
            };
            let mut quanta = [0u64; 2];
            for class in 0..2 {
                let granted = served[class] + drr.deficit(ids[class]);
                prop_assert_eq!(granted % weights[class], 0);
                quanta[class] = granted / weights[class];
            }
            prop_assert!(quanta[0].abs_diff(quanta[1]) <= 1);

            let share_a = served[0] as f64 / f64::from(w_a);
            let share_b = served[1] as f64 / f64::from(w_b);
            let slack = 2.0 + max_size / f64::from(w_a.min(w_b));
            prop_assert!((share_a - share_b).abs() <= slack);
        }
    }
}
