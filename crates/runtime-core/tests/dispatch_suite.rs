//! Dispatch conformance: pool conservation, turn atomicity, fork/join
//! ordering, and overflow behaviour.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation
)]

use proptest::prelude::*;
use runtime_core::actor::{one_shot_reply_pair, TAG_LEFT, TAG_RIGHT};
use runtime_core::arena::Arena;
use runtime_core::dispatch::{TraceEvent, TraceSink, TurnOutcome};
use runtime_core::{BehaviourCode, CellRef, FaultCode, Runtime, RuntimeConfig, Word};
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default()).expect("runtime")
}

proptest! {
    /// At every quiescent point, free cells plus live cells account for
    /// the whole dynamic pool.
    #[test]
    fn pool_conservation_holds_across_reserve_release_sequences(
        ops in proptest::collection::vec(any::<bool>(), 1..200),
    ) {
        let capacity = 256;
        let mut arena = Arena::new(capacity);
        let dynamic = arena.available();
        let mut live: Vec<CellRef> = Vec::new();

        for reserve in ops {
            if reserve || live.is_empty() {
                match arena.reserve() {
                    Ok(r) => live.push(r),
                    Err(FaultCode::OutOfMemory) => prop_assert!(live.len() == dynamic),
                    Err(other) => prop_assert!(false, "unexpected fault {other:?}"),
                }
            } else {
                let r = live.swap_remove(live.len() / 2);
                arena.release(r);
            }
            prop_assert_eq!(arena.available() + live.len(), dynamic);
        }
    }
}

#[test]
fn fork_join_forwards_the_ordered_pair_in_either_arrival_order() {
    for swapped in [false, true] {
        let mut rt = runtime();
        let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");
        let join = rt
            .spawn(
                BehaviourCode::Join,
                &[Word::from_cell(cust), Word::NIL, Word::NIL, Word::from_int(0)],
            )
            .expect("spawn");
        let tag_left = rt
            .spawn(
                BehaviourCode::Tag,
                &[Word::from_cell(join), Word::from_int(TAG_LEFT)],
            )
            .expect("spawn");
        let tag_right = rt
            .spawn(
                BehaviourCode::Tag,
                &[Word::from_cell(join), Word::from_int(TAG_RIGHT)],
            )
            .expect("spawn");

        // Two concurrent reporters, enqueued in both orders.
        if swapped {
            rt.inject(tag_right, &[Word::from_int(456)]).expect("inject");
            rt.inject(tag_left, &[Word::from_int(123)]).expect("inject");
        } else {
            rt.inject(tag_left, &[Word::from_int(123)]).expect("inject");
            rt.inject(tag_right, &[Word::from_int(456)]).expect("inject");
        }

        let summary = rt.run_until_idle();
        assert_eq!(summary.aborted, 0);

        let (left, right) = one_shot_reply_pair(rt.arena(), cust).expect("joined reply");
        assert_eq!(left.as_int(), Some(123));
        assert_eq!(right.as_int(), Some(456));
    }
}

#[test]
fn failed_reserve_leaves_pool_and_queue_at_their_preturn_state() {
    let mut rt = runtime();
    let sym = rt.intern("anything").expect("intern");
    let pair = {
        let arena = rt.arena_mut();
        runtime_core::kernel::make_pair(arena, sym, runtime_core::value::UNIT).expect("pair")
    };
    let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");

    rt.inject(
        pair,
        &[
            Word::from_cell(cust),
            runtime_core::kernel::eval::Selector::Eval.word(),
            Word::from_cell(rt.ground()),
        ],
    )
    .expect("inject");

    // Exhaust the pool so the behaviour's first reserve must fail.
    while rt.arena_mut().reserve().is_ok() {}
    assert_eq!(rt.arena_mut().reserve(), Err(FaultCode::OutOfMemory));

    let high_water = rt.arena().high_water();
    let available = rt.arena().available();
    let depth = rt.queue_depth();
    let pair_image = *rt.arena().cell(pair);

    let outcome = rt.dispatch_one(None);
    assert_eq!(
        outcome,
        Some(TurnOutcome::Aborted {
            cause: FaultCode::OutOfMemory
        })
    );

    assert_eq!(rt.arena().high_water(), high_water);
    // Only the consumed event cell was returned to the pool.
    assert_eq!(rt.arena().available(), available + 1);
    assert_eq!(rt.queue_depth(), depth - 1);
    assert_eq!(*rt.arena().cell(pair), pair_image);
}

#[test]
fn queue_overflow_is_a_fault_not_a_growth() {
    let mut rt = Runtime::new(RuntimeConfig {
        queue_slots: 1024,
        ..RuntimeConfig::default()
    })
    .expect("runtime");
    let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");

    let mut enqueued = 0usize;
    let overflow = loop {
        match rt.inject(cust, &[Word::from_int(1)]) {
            Ok(()) => enqueued += 1,
            Err(fault) => break fault,
        }
    };
    assert_eq!(overflow, FaultCode::QueueOverflow);
    assert_eq!(enqueued, 1024);
    assert_eq!(rt.queue_depth(), 1024);
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<TraceEvent>,
}

impl TraceSink for RecordingSink {
    fn on_event(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[test]
fn trace_sink_sees_turn_boundaries_in_dispatch_order() {
    let mut rt = runtime();
    let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");
    let fwd = rt
        .spawn(BehaviourCode::Fwd, &[Word::from_cell(cust)])
        .expect("spawn");
    rt.inject(fwd, &[Word::from_int(5)]).expect("inject");

    let mut sink = RecordingSink::default();
    rt.run_traced(&mut sink);

    let kinds: Vec<_> = sink
        .events
        .iter()
        .map(|e| match e {
            TraceEvent::TurnStart { .. } => "start",
            TraceEvent::TurnCommitted { .. } => "commit",
            TraceEvent::TurnAborted { .. } => "abort",
        })
        .collect();
    assert_eq!(kinds, vec!["start", "commit", "start", "commit"]);
}

#[test]
fn sends_within_a_turn_preserve_enqueue_order() {
    let mut rt = runtime();
    // Two forwarders into two reply cells, fed by one fan-out turn each.
    let cust_a = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");
    let cust_b = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");
    let fwd_a = rt
        .spawn(BehaviourCode::Fwd, &[Word::from_cell(cust_a)])
        .expect("spawn");
    let fwd_b = rt
        .spawn(BehaviourCode::Fwd, &[Word::from_cell(cust_b)])
        .expect("spawn");

    rt.inject(fwd_a, &[Word::from_int(1)]).expect("inject");
    rt.inject(fwd_b, &[Word::from_int(2)]).expect("inject");

    // FIFO means fwd_a's relay lands before fwd_b's.
    assert_eq!(
        rt.dispatch_one(None),
        Some(TurnOutcome::Committed { sends: 1 })
    );
    assert_eq!(
        rt.dispatch_one(None),
        Some(TurnOutcome::Committed { sends: 1 })
    );
    assert!(one_shot_reply_pair(rt.arena(), cust_a).is_none());

    rt.run_until_idle();
    let (a, _) = one_shot_reply_pair(rt.arena(), cust_a).expect("reply");
    let (b, _) = one_shot_reply_pair(rt.arena(), cust_b).expect("reply");
    assert_eq!(a.as_int(), Some(1));
    assert_eq!(b.as_int(), Some(2));
}
