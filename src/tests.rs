use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{Error, RingConsumer, RingInfo, RingProducer, SwmrRing};

/// Counts constructions and drops of every value it hands out.
#[derive(Default, Clone)]
struct Ledger {
    built: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl Ledger {
    fn make(&self, id: u32) -> Counted {
        self.built.fetch_add(1, Ordering::SeqCst);
        Counted {
            id,
            dropped: Arc::clone(&self.dropped),
        }
    }

    fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct Counted {
    id: u32,
    dropped: Arc<AtomicUsize>,
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

struct PanicOnDrop;

impl Drop for PanicOnDrop {
    fn drop(&mut self) {
        panic!("PanicOnDrop dropped");
    }
}

fn drain_ids(ring: &SwmrRing<Counted>) -> Vec<u32> {
    core::iter::from_fn(|| ring.try_remove()).map(|c| c.id).collect()
}

// ── Construction ─────────────────────────────────────────────────────

#[test]
fn zero_capacity_is_rejected() {
    assert_eq!(SwmrRing::<u32>::new(0).unwrap_err(), Error::InvalidCapacity);
    assert_eq!(
        SwmrRing::<u32>::builder().cold().build().unwrap_err(),
        Error::InvalidCapacity
    );
}

#[test]
fn nonzero_capacity_is_accepted() {
    for capacity in [1, 2, 7, 64, 1000] {
        let ring = SwmrRing::<u32>::new(capacity).unwrap();
        assert_eq!(ring.capacity(), capacity);
        assert!(ring.is_empty());
        assert!(!ring.is_full());
    }
}

#[test]
fn oversized_capacity_fails_allocation() {
    assert_eq!(
        SwmrRing::<u64>::new(usize::MAX).unwrap_err(),
        Error::AllocationFailure {
            capacity: usize::MAX
        }
    );
    let capacity = usize::MAX / 64;
    assert_eq!(
        SwmrRing::<[u64; 8]>::new(capacity).unwrap_err(),
        Error::AllocationFailure { capacity }
    );
}

#[test]
fn error_messages() {
    assert_eq!(Error::InvalidCapacity.to_string(), "capacity must be nonzero");
    assert_eq!(
        Error::AllocationFailure { capacity: 9 }.to_string(),
        "failed to allocate arena for capacity 9"
    );
}

#[test]
fn construction_builds_and_drops_nothing() {
    // Dropping any element would panic.
    let ring = SwmrRing::<PanicOnDrop>::new(200).unwrap();
    drop(ring);
    let cold = SwmrRing::<PanicOnDrop>::builder()
        .capacity(200)
        .cold()
        .build()
        .unwrap();
    drop(cold);
}

// ── Insertion and removal ────────────────────────────────────────────

#[test]
fn fills_then_drains_in_order() {
    let mut ring = SwmrRing::new(4).unwrap();
    for i in 0..4 {
        ring.insert(i);
    }
    assert!(ring.is_full());
    assert_eq!(ring.len(), 4);
    for i in 0..4 {
        assert_eq!(ring.try_remove(), Some(i));
    }
    assert_eq!(ring.try_remove(), None);
}

#[test]
fn overflow_evicts_oldest() {
    let mut ring = SwmrRing::new(3).unwrap();
    for i in 0..5 {
        ring.insert(i);
    }
    assert_eq!(ring.evictions(), 2);
    assert_eq!(ring.try_remove(), Some(2));
    assert_eq!(ring.try_remove(), Some(3));
    assert_eq!(ring.try_remove(), Some(4));
    assert_eq!(ring.try_remove(), None);
}

#[test]
fn overflow_by_many_keeps_newest_capacity() {
    for capacity in [1, 2, 5, 16] {
        for extra in [1, 3, 40] {
            let mut ring = SwmrRing::new(capacity).unwrap();
            let total = capacity + extra;
            ring.extend(0..total);
            assert_eq!(ring.evictions(), extra);
            let drained: Vec<_> = ring.drain().collect();
            assert_eq!(drained, (extra..total).collect::<Vec<_>>());
        }
    }
}

#[test]
fn removals_interleaved_with_wraparound() {
    let mut ring = SwmrRing::new(5).unwrap();
    ring.extend(0..5);
    assert_eq!(ring.try_remove(), Some(0));
    assert_eq!(ring.try_remove(), Some(1));
    ring.insert(5);
    ring.insert(6);
    assert_eq!(ring.len(), 5);
    assert_eq!(ring.evictions(), 0);
    assert_eq!(ring.drain().collect::<Vec<_>>(), [2, 3, 4, 5, 6]);
}

#[test]
fn empty_removal_is_repeatable() {
    let mut ring = SwmrRing::<u8>::new(2).unwrap();
    for _ in 0..100 {
        assert_eq!(ring.try_remove(), None);
    }
    assert!(ring.is_empty());
    ring.insert(7);
    assert_eq!(ring.try_remove(), Some(7));
    for _ in 0..100 {
        assert_eq!(ring.try_remove(), None);
    }
}

#[test]
fn capacity_one_keeps_latest() {
    let mut ring = SwmrRing::new(1).unwrap();
    for i in 0..10 {
        ring.insert(i);
        assert_eq!(ring.len(), 1);
    }
    assert_eq!(ring.evictions(), 9);
    assert_eq!(ring.try_remove(), Some(9));
    assert_eq!(ring.try_remove(), None);
}

#[test]
fn try_remove_into_replaces_output() {
    let mut ring = SwmrRing::new(2).unwrap();
    ring.insert(String::from("a"));
    let mut out = String::from("old");
    assert!(ring.try_remove_into(&mut out));
    assert_eq!(out, "a");
    assert!(!ring.try_remove_into(&mut out));
    assert_eq!(out, "a");
}

#[test]
fn drain_reports_exact_len() {
    let mut ring = SwmrRing::new(8).unwrap();
    ring.extend(0..6);
    let drain = ring.drain();
    assert_eq!(drain.len(), 6);
    assert_eq!(drain.count(), 6);
    assert!(ring.is_empty());
}

#[test]
fn clear_drops_everything() {
    let ledger = Ledger::default();
    let mut ring = SwmrRing::new(4).unwrap();
    for i in 0..6 {
        ring.insert(ledger.make(i));
    }
    ring.clear();
    assert!(ring.is_empty());
    assert_eq!(ledger.dropped(), 6);
    ring.insert(ledger.make(6));
    assert_eq!(drain_ids(&ring), [6]);
}

#[test]
fn debug_shows_shape() {
    let mut ring = SwmrRing::new(4).unwrap();
    ring.extend(0..6u8);
    let dbg = format!("{ring:?}");
    assert!(dbg.contains("capacity: 4"), "{dbg}");
    assert!(dbg.contains("len: 4"), "{dbg}");
    assert!(dbg.contains("evictions: 2"), "{dbg}");
}

// ── Construction / destruction accounting ────────────────────────────

#[test]
fn every_insert_constructs_once() {
    let ledger = Ledger::default();
    let mut ring = SwmrRing::new(100).unwrap();
    for i in 0..10 {
        ring.insert_with(|| ledger.make(i));
    }
    assert_eq!(ledger.built(), 10);
    for i in 0..1000 {
        ring.insert_with(|| ledger.make(i));
    }
    assert_eq!(ledger.built(), 1010);
}

#[test]
fn teardown_drops_all_live_elements() {
    let ledger = Ledger::default();
    {
        let mut ring = SwmrRing::new(1000).unwrap();
        for i in 0..1000 {
            ring.insert(ledger.make(i));
        }
    }
    assert_eq!(ledger.dropped(), 1000);

    let ledger = Ledger::default();
    {
        let mut ring = SwmrRing::new(100).unwrap();
        for i in 0..10_000 {
            ring.insert(ledger.make(i));
        }
        assert_eq!(ring.evictions(), 9_900);
    }
    assert_eq!(ledger.dropped(), 10_000);
}

#[test]
fn teardown_across_wraparound_drops_exact_live_set() {
    let ledger = Ledger::default();
    let mut ring = SwmrRing::new(5).unwrap();
    for i in 0..5 {
        ring.insert(ledger.make(i));
    }
    // Move the tail forward, then wrap the head past the arena end.
    for _ in 0..3 {
        drop(ring.try_remove());
    }
    for i in 5..8 {
        ring.insert(ledger.make(i));
    }
    assert_eq!(ledger.dropped(), 3);
    assert_eq!(ring.len(), 5);
    drop(ring);
    assert_eq!(ledger.dropped(), 8);
    assert_eq!(ledger.built(), 8);
}

#[test]
fn mixed_sequences_balance_builds_and_drops() {
    for capacity in [1, 2, 3, 7] {
        let ledger = Ledger::default();
        {
            let mut ring = SwmrRing::new(capacity).unwrap();
            let mut next = 0;
            for round in 0..50 {
                for _ in 0..(round % 4) + 1 {
                    ring.insert(ledger.make(next));
                    next += 1;
                }
                for _ in 0..(round % 3) {
                    drop(ring.try_remove());
                }
            }
        }
        assert_eq!(ledger.built(), ledger.dropped(), "capacity {capacity}");
    }
}

// ── Failing element operations ───────────────────────────────────────

#[test]
fn failed_construction_leaves_ring_usable() {
    let mut ring = SwmrRing::new(3).unwrap();
    ring.extend([1, 2]);
    let err = ring.try_insert_with(|| Err::<i32, _>("no"));
    assert_eq!(err, Err("no"));
    assert_eq!(ring.len(), 2);
    ring.insert(3);
    assert_eq!(ring.drain().collect::<Vec<_>>(), [1, 2, 3]);
}

#[test]
fn failed_construction_keeps_its_eviction() {
    let ledger = Ledger::default();
    let mut ring = SwmrRing::new(2).unwrap();
    ring.insert(ledger.make(0));
    ring.insert(ledger.make(1));

    let err = ring.try_insert_with(|| Err::<Counted, _>(()));
    assert!(err.is_err());
    assert_eq!(ring.evictions(), 1);
    assert_eq!(ledger.dropped(), 1);
    assert_eq!(drain_ids(&ring), [1]);
}

#[test]
fn panicking_constructor_leaves_ring_usable() {
    let mut ring = SwmrRing::new(3).unwrap();
    ring.extend([1, 2]);
    let result = catch_unwind(AssertUnwindSafe(|| {
        ring.insert_with(|| panic!("constructor failed"));
    }));
    assert!(result.is_err());
    ring.insert(3);
    assert_eq!(ring.drain().collect::<Vec<_>>(), [1, 2, 3]);
}

#[test]
fn panicking_eviction_keeps_cursors_consistent() {
    struct Fuse(bool);
    impl Drop for Fuse {
        fn drop(&mut self) {
            if self.0 {
                panic!("fuse blew");
            }
        }
    }

    let mut ring = SwmrRing::new(2).unwrap();
    ring.insert(Fuse(true));
    ring.insert(Fuse(false));
    let result = catch_unwind(AssertUnwindSafe(|| ring.insert(Fuse(false))));
    assert!(result.is_err());
    // The blown element is gone, the new one was never inserted.
    assert_eq!(ring.evictions(), 1);
    assert_eq!(ring.len(), 1);
    ring.insert(Fuse(false));
    assert_eq!(ring.len(), 2);
}

#[test]
fn panicking_output_drop_releases_the_tail() {
    let mut ring = SwmrRing::new(2).unwrap();
    ring.insert(PanicOnDrop);
    ring.insert(PanicOnDrop);

    let mut out = PanicOnDrop;
    let result = catch_unwind(AssertUnwindSafe(|| ring.try_remove_into(&mut out)));
    assert!(result.is_err());
    // The element moved out before the old value blew up; the tail advanced.
    assert_eq!(ring.len(), 1);
    let last = ring.try_remove().unwrap();
    assert!(ring.try_remove().is_none());
    core::mem::forget(last);
    core::mem::forget(out);
}

#[test]
fn panicking_teardown_still_drops_the_rest() {
    struct Bomb {
        armed: bool,
        dropped: Arc<AtomicUsize>,
    }
    impl Drop for Bomb {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            if self.armed {
                panic!("bomb");
            }
        }
    }

    let dropped = Arc::new(AtomicUsize::new(0));
    let mut ring = SwmrRing::new(4).unwrap();
    for i in 0..6 {
        ring.insert(Bomb {
            armed: i == 3,
            dropped: Arc::clone(&dropped),
        });
    }
    // Two evicted; four live and wrapped around the arena end.
    assert_eq!(dropped.load(Ordering::SeqCst), 2);

    let result = catch_unwind(AssertUnwindSafe(move || drop(ring)));
    assert!(result.is_err());
    assert_eq!(dropped.load(Ordering::SeqCst), 6);
}

// ── Traits ───────────────────────────────────────────────────────────

fn fill<P: RingProducer<u32>>(producer: &mut P, count: u32) {
    for i in 0..count {
        producer.insert(i);
    }
}

fn collect<C: RingConsumer<u32>>(consumer: &C) -> Vec<u32> {
    core::iter::from_fn(|| consumer.try_remove()).collect()
}

#[test]
fn ring_traits() {
    let mut ring = SwmrRing::new(4).unwrap();
    fill(&mut ring, 6);
    assert!(RingInfo::is_full(&ring));
    assert_eq!(RingInfo::capacity(&ring), 4);
    assert_eq!(collect(&ring), [2, 3, 4, 5]);
    assert!(RingInfo::is_empty(&ring));
}

#[test]
fn handle_traits() {
    let (mut producer, consumer) = SwmrRing::new(4).unwrap().split();
    fill(&mut producer, 3);
    assert_eq!(RingInfo::len(&consumer), 3);
    assert_eq!(collect(&consumer), [0, 1, 2]);
}

// ── Handles ──────────────────────────────────────────────────────────

#[test]
fn split_handles_share_the_ring() {
    let (mut producer, consumer) = SwmrRing::new(3).unwrap().split();
    let second = producer.consumer();
    for i in 0..5 {
        producer.insert(i);
    }
    assert_eq!(producer.evictions(), 2);
    assert!(producer.is_full());
    assert_eq!(consumer.try_remove(), Some(2));
    assert_eq!(second.try_remove(), Some(3));
    assert_eq!(consumer.clone().try_remove(), Some(4));
    assert!(second.is_empty());
}

#[test]
fn last_handle_tears_down() {
    let ledger = Ledger::default();
    let (mut producer, consumer) = SwmrRing::new(4).unwrap().split();
    for i in 0..3 {
        producer.insert(ledger.make(i));
    }
    drop(producer);
    assert_eq!(ledger.dropped(), 0);
    drop(consumer);
    assert_eq!(ledger.dropped(), 3);
}

#[test]
fn producer_fallible_insert() {
    let (mut producer, consumer) = SwmrRing::new(2).unwrap().split();
    assert_eq!(producer.try_insert_with(|| Ok::<_, ()>(1)), Ok(()));
    assert_eq!(producer.try_insert_with(|| Err::<i32, _>(())), Err(()));
    let mut out = 0;
    assert!(consumer.try_remove_into(&mut out));
    assert_eq!(out, 1);
    assert!(!consumer.try_remove_into(&mut out));
}

#[test]
fn constructor_may_remove_through_a_consumer() {
    let (mut producer, consumer) = SwmrRing::builder()
        .capacity(3)
        .cold()
        .build()
        .unwrap()
        .split();
    for word in ["a", "b", "c"] {
        producer.insert(String::from(word));
    }

    // Full: "a" is evicted before the constructor runs.
    producer.insert_with(|| {
        assert_eq!(consumer.try_remove().as_deref(), Some("b"));
        String::from("d")
    });
    assert_eq!(producer.evictions(), 1);
    assert_eq!(consumer.len(), 2);

    let rest: Vec<String> = core::iter::from_fn(|| consumer.try_remove()).collect();
    assert_eq!(rest, ["c", "d"]);
    assert!(consumer.is_empty());
}

#[test]
fn constructor_draining_the_ring_leaves_only_its_element() {
    let (mut producer, consumer) = SwmrRing::builder()
        .capacity(3)
        .cold()
        .build()
        .unwrap()
        .split();
    producer.insert(String::from("old"));

    producer.insert_with(|| {
        assert_eq!(consumer.try_remove().as_deref(), Some("old"));
        assert!(consumer.try_remove().is_none());
        String::from("new")
    });
    assert_eq!(consumer.len(), 1);
    assert_eq!(consumer.try_remove().as_deref(), Some("new"));
    assert!(consumer.try_remove().is_none());
}
