//! Single-flow event dispatcher and the per-turn actor context.
//!
//! One turn runs one behaviour to completion. All side effects of a turn
//! commit together or not at all: the dispatcher checkpoints the queue
//! tail, the pool journal, and the target's full cell image, and rewinds
//! all three when the behaviour fails.

#![allow(clippy::pedantic, clippy::nursery)]

use crate::actor::{self, BehaviourCode};
use crate::arena::{CellRef, Word};
use crate::fault::{FaultClass, FaultCode};
use crate::kernel::{env, eval};
use crate::runtime::Runtime;

/// Maximum number of message words an event cell carries.
pub const MAX_MESSAGE_WORDS: usize = 7;

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The behaviour ran to completion and its effects are visible.
    Committed {
        /// Number of events the turn enqueued.
        sends: u16,
    },
    /// The behaviour failed; all its effects were rolled back.
    Aborted {
        /// The fault that aborted the turn.
        cause: FaultCode,
    },
}

/// Saturating dispatch counters, aggregated per fault class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DispatchStats {
    /// Turns that committed.
    pub turns_committed: u64,
    /// Turns that aborted and were rolled back.
    pub turns_aborted: u64,
    /// Events enqueued by committed turns and host injection.
    pub events_enqueued: u64,
    /// Deepest queue occupancy observed.
    pub peak_queue_depth: usize,
    /// Highest pool bump frontier observed.
    pub peak_high_water: u32,
    /// Aborts in the pool class.
    pub faults_pool: u64,
    /// Aborts in the queue class.
    pub faults_queue: u64,
    /// Aborts in the actor class.
    pub faults_actor: u64,
    /// Aborts in the decode class.
    pub faults_decode: u64,
    /// Aborts in the kernel class.
    pub faults_kernel: u64,
    /// Terminal faults.
    pub faults_fatal: u64,
    /// Most recent abort cause.
    pub last_fault: Option<FaultCode>,
}

impl DispatchStats {
    /// Records one turn abort.
    pub const fn record_abort(&mut self, cause: FaultCode) {
        self.turns_aborted = self.turns_aborted.saturating_add(1);
        self.last_fault = Some(cause);
        let counter = match cause.class() {
            FaultClass::Pool => &mut self.faults_pool,
            FaultClass::Queue => &mut self.faults_queue,
            FaultClass::Actor => &mut self.faults_actor,
            FaultClass::Decode => &mut self.faults_decode,
            FaultClass::Kernel => &mut self.faults_kernel,
            FaultClass::Fatal => &mut self.faults_fatal,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Deterministic trace events emitted at turn boundaries when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// An event was popped and its target's behaviour is about to run.
    TurnStart {
        /// Actor the event names.
        target: CellRef,
        /// The event cell being consumed.
        event: CellRef,
    },
    /// The turn committed.
    TurnCommitted {
        /// Actor whose behaviour ran.
        target: CellRef,
        /// Number of events the turn enqueued.
        sends: u16,
    },
    /// The turn aborted and was rolled back.
    TurnAborted {
        /// Actor whose behaviour ran.
        target: CellRef,
        /// The fault that aborted the turn.
        cause: FaultCode,
    },
}

/// Sink trait for deterministic dispatch trace hooks.
pub trait TraceSink {
    /// Records an event in dispatch order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Aggregated outcome of draining the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Total turns dispatched.
    pub turns: u64,
    /// Turns that committed.
    pub committed: u64,
    /// Turns that aborted.
    pub aborted: u64,
    /// Most recent abort cause, if any turn aborted.
    pub last_fault: Option<FaultCode>,
}

/// Per-dispatch actor context: `self`, the consumed event, and the kernel
/// primitives a behaviour may call during its turn.
pub struct Turn<'rt> {
    rt: &'rt mut Runtime,
    self_ref: CellRef,
    event: CellRef,
    sponsor: Word,
    sends: u16,
}

impl Turn<'_> {
    /// The actor this turn is running.
    #[must_use]
    pub const fn self_ref(&self) -> CellRef {
        self.self_ref
    }

    /// The event cell that started this turn.
    #[must_use]
    pub const fn event(&self) -> CellRef {
        self.event
    }

    /// The accounting root bound for this dispatch. Opaque to actors and
    /// preserved across kernel calls.
    #[must_use]
    pub const fn sponsor(&self) -> Word {
        self.sponsor
    }

    /// Reads message word `i` (`1..=7`) of the consumed event.
    #[must_use]
    pub fn arg(&self, i: usize) -> Word {
        Word::from_raw(self.rt.arena().cell(self.event).word(i))
    }

    /// Reads state word `i` (`1..=7`) of `self`.
    #[must_use]
    pub fn state(&self, i: usize) -> Word {
        Word::from_raw(self.rt.arena().cell(self.self_ref).word(i))
    }

    /// Mutable access to the arena for value construction.
    pub fn arena(&mut self) -> &mut crate::arena::Arena {
        self.rt.arena_mut()
    }

    /// Shared access to the arena for value inspection.
    #[must_use]
    pub fn arena_ref(&self) -> &crate::arena::Arena {
        self.rt.arena()
    }

    /// Allocates a zeroed cell; failure aborts the turn.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
    pub fn reserve(&mut self) -> Result<CellRef, FaultCode> {
        let r = self.rt.arena_mut().reserve()?;
        self.rt.note_high_water();
        Ok(r)
    }

    /// Hands a cell back; the release lands when the turn commits.
    pub fn release(&mut self, r: CellRef) {
        self.rt.arena_mut().release(r);
    }

    /// Releases `self` at commit; used by one-shot continuation actors
    /// after their final send.
    pub fn release_self(&mut self) {
        let me = self.self_ref;
        self.rt.arena_mut().release(me);
    }

    /// Allocates and initialises an actor cell.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
    pub fn spawn(&mut self, code: BehaviourCode, state: &[Word]) -> Result<CellRef, FaultCode> {
        let r = self.reserve()?;
        actor::init_actor(self.rt.arena_mut().cell_mut(r), code, state);
        Ok(r)
    }

    /// Appends a caller-built event cell to the queue.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::Panic`] for an invalid event reference or
    /// [`FaultCode::QueueOverflow`] when the ring is full; either aborts
    /// the turn.
    pub fn enqueue(&mut self, event: CellRef) -> Result<(), FaultCode> {
        self.rt.arena().check(event)?;
        self.rt.enqueue_for_turn(event)?;
        self.sends += 1;
        Ok(())
    }

    /// Reserves, fills, and enqueues an event for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::Panic`] for an oversized message,
    /// [`FaultCode::OutOfMemory`] when the event cell cannot be reserved,
    /// or [`FaultCode::QueueOverflow`] when the ring is full. Any of these
    /// aborts the turn and the event is reclaimed by the rollback.
    pub fn send(&mut self, target: CellRef, msg: &[Word]) -> Result<(), FaultCode> {
        if msg.len() > MAX_MESSAGE_WORDS {
            return Err(FaultCode::Panic);
        }
        self.rt.arena().check(target)?;
        let event = self.reserve()?;
        {
            let cell = self.rt.arena_mut().cell_mut(event);
            cell.set_word(0, target.raw());
            for (i, word) in msg.iter().enumerate() {
                cell.set_word(i + 1, word.raw());
            }
        }
        self.rt.enqueue_for_turn(event)?;
        self.sends += 1;
        Ok(())
    }

    /// Replaces `self`'s behaviour and state, visible from the next turn.
    pub fn become_with(&mut self, code: BehaviourCode, state: &[Word]) {
        let me = self.self_ref;
        actor::init_actor(self.rt.arena_mut().cell_mut(me), code, state);
    }

    /// Asks the host to stop the read-eval-print loop.
    pub fn request_exit(&mut self) {
        self.rt.request_exit();
    }
}

fn invoke(code: BehaviourCode, t: &mut Turn<'_>) -> Result<(), FaultCode> {
    match code {
        BehaviourCode::Value => eval::value_beh(t),
        BehaviourCode::Symbol => eval::symbol_beh(t),
        BehaviourCode::Pair => eval::pair_beh(t),
        BehaviourCode::CombCont => eval::comb_cont_beh(t),
        BehaviourCode::Operative => eval::operative_beh(t),
        BehaviourCode::Applicative => eval::applicative_beh(t),
        BehaviourCode::Evlis => eval::evlis_beh(t),
        BehaviourCode::IfCont => eval::if_cont_beh(t),
        BehaviourCode::DefCont => eval::def_cont_beh(t),
        BehaviourCode::SeqCont => eval::seq_cont_beh(t),
        BehaviourCode::BindSeq => eval::bind_seq_beh(t),
        BehaviourCode::Binding => env::binding_beh(t),
        BehaviourCode::Scope => env::scope_beh(t),
        BehaviourCode::EmptyEnv => env::empty_env_beh(t),
        BehaviourCode::Prim => eval::prim_beh(t),
        BehaviourCode::Tag => actor::tag_beh(t),
        BehaviourCode::Join => actor::join_beh(t),
        BehaviourCode::Fwd => actor::fwd_beh(t),
        BehaviourCode::OneShot => actor::one_shot_beh(t),
    }
}

fn trace(sink: &mut Option<&mut dyn TraceSink>, event: TraceEvent) {
    if let Some(sink) = sink.as_mut() {
        sink.on_event(event);
    }
}

fn reborrow_sink<'a>(
    sink: &'a mut Option<&mut dyn TraceSink>,
) -> Option<&'a mut dyn TraceSink> {
    match sink {
        Some(sink) => Some(&mut **sink),
        None => None,
    }
}

/// Pops and dispatches one event. Returns `None` when the queue is empty
/// or a terminal fault is latched.
pub fn dispatch_one(
    rt: &mut Runtime,
    mut sink: Option<&mut dyn TraceSink>,
) -> Option<TurnOutcome> {
    if rt.latched_fault().is_some() {
        return None;
    }
    let event = rt.dequeue_event()?;

    // A corrupt event reference is unrecoverable: nothing can be released
    // or restored safely.
    if rt.arena().check(event).is_err() {
        rt.latch(FaultCode::Panic);
        return Some(TurnOutcome::Aborted {
            cause: FaultCode::Panic,
        });
    }
    let target_raw = rt.arena().cell(event).word(0);
    let target = match CellRef::from_raw(target_raw) {
        Some(r) if rt.arena().check(r).is_ok() => r,
        _ => {
            rt.latch(FaultCode::Panic);
            return Some(TurnOutcome::Aborted {
                cause: FaultCode::Panic,
            });
        }
    };

    let Some(code) = BehaviourCode::of_cell(rt.arena(), target) else {
        // Not an actor template: recoverable, the event is dropped.
        rt.arena_mut().release(event);
        rt.stats_mut().record_abort(FaultCode::WrongActorType);
        return Some(TurnOutcome::Aborted {
            cause: FaultCode::WrongActorType,
        });
    };

    trace(&mut sink, TraceEvent::TurnStart { target, event });

    let queue_mark = rt.queue_mark();
    rt.arena_mut().begin_journal();
    let self_image = *rt.arena().cell(target);

    let sponsor = rt.sponsor();
    let (result, sends) = {
        let mut turn = Turn {
            rt: &mut *rt,
            self_ref: target,
            event,
            sponsor,
            sends: 0,
        };
        let result = invoke(code, &mut turn);
        (result, turn.sends)
    };

    match result {
        Ok(()) => {
            rt.arena_mut().commit_journal();
            rt.arena_mut().release(event);
            rt.stats_mut().turns_committed += 1;
            rt.stats_mut().events_enqueued += u64::from(sends);
            trace(&mut sink, TraceEvent::TurnCommitted { target, sends });
            Some(TurnOutcome::Committed { sends })
        }
        Err(cause) => {
            rt.rewind_queue(queue_mark);
            rt.arena_mut().abort_journal();
            *rt.arena_mut().cell_mut(target) = self_image;
            rt.arena_mut().release(event);
            rt.stats_mut().record_abort(cause);
            if cause.is_terminal() {
                rt.latch(cause);
            }
            trace(&mut sink, TraceEvent::TurnAborted { target, cause });
            Some(TurnOutcome::Aborted { cause })
        }
    }
}

/// Drains the queue until it is empty or a terminal fault latches.
pub fn run_until_idle(rt: &mut Runtime, mut sink: Option<&mut dyn TraceSink>) -> DispatchSummary {
    let mut summary = DispatchSummary {
        turns: 0,
        committed: 0,
        aborted: 0,
        last_fault: None,
    };
    loop {
        let outcome = dispatch_one(rt, reborrow_sink(&mut sink));
        let Some(outcome) = outcome else { break };
        summary.turns += 1;
        match outcome {
            TurnOutcome::Committed { .. } => summary.committed += 1,
            TurnOutcome::Aborted { cause } => {
                summary.aborted += 1;
                summary.last_fault = Some(cause);
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::{dispatch_one, run_until_idle, TurnOutcome};
    use crate::actor::{one_shot_reply, BehaviourCode, TAG_LEFT, TAG_RIGHT};
    use crate::arena::Word;
    use crate::config::RuntimeConfig;
    use crate::fault::FaultCode;
    use crate::runtime::Runtime;
    use crate::value;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default()).expect("runtime")
    }

    #[test]
    fn forwarder_passes_messages_through_to_a_reply_cell() {
        let mut rt = runtime();
        let cust = rt
            .spawn(BehaviourCode::OneShot, &[])
            .expect("spawn reply cell");
        let fwd = rt
            .spawn(BehaviourCode::Fwd, &[Word::from_cell(cust)])
            .expect("spawn fwd");

        rt.inject(fwd, &[Word::from_int(17)]).expect("inject");
        let summary = run_until_idle(&mut rt, None);

        assert_eq!(summary.committed, 2);
        assert_eq!(summary.aborted, 0);
        assert_eq!(
            one_shot_reply(rt.arena(), cust).and_then(Word::as_int),
            Some(17)
        );
    }

    #[test]
    fn eval_of_a_self_evaluating_value_replies_with_itself() {
        let mut rt = runtime();
        let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");
        // EVAL of a self-evaluating value replies with the value itself.
        rt.inject(
            value::TRUE_VALUE,
            &[
                Word::from_cell(cust),
                crate::kernel::eval::Selector::Eval.word(),
                Word::from_cell(rt.ground()),
            ],
        )
        .expect("inject");
        let outcome = dispatch_one(&mut rt, None);
        assert_eq!(outcome, Some(TurnOutcome::Committed { sends: 1 }));
    }

    #[test]
    fn join_collects_both_sides_in_either_order() {
        for swap in [false, true] {
            let mut rt = runtime();
            let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");
            let join = rt
                .spawn(
                    BehaviourCode::Join,
                    &[Word::from_cell(cust), Word::NIL, Word::NIL, Word::from_int(0)],
                )
                .expect("spawn join");
            let left = rt
                .spawn(
                    BehaviourCode::Tag,
                    &[Word::from_cell(join), Word::from_int(TAG_LEFT)],
                )
                .expect("spawn tag");
            let right = rt
                .spawn(
                    BehaviourCode::Tag,
                    &[Word::from_cell(join), Word::from_int(TAG_RIGHT)],
                )
                .expect("spawn tag");

            let (first, second) = if swap { (right, left) } else { (left, right) };
            rt.inject(first, &[Word::from_int(if swap { 456 } else { 123 })])
                .expect("inject");
            rt.inject(second, &[Word::from_int(if swap { 123 } else { 456 })])
                .expect("inject");

            let summary = run_until_idle(&mut rt, None);
            assert_eq!(summary.aborted, 0);

            // The join forwards (left, right) regardless of arrival order;
            // the reply cell latches the left component.
            assert_eq!(
                one_shot_reply(rt.arena(), cust).and_then(Word::as_int),
                Some(123)
            );
        }
    }

    #[test]
    fn aborted_turn_restores_queue_pool_and_behaviour() {
        let mut rt = runtime();
        // A symbol evaluated in the terminal environment faults the lookup
        // turn with an unbound-symbol error.
        let sym = rt.intern("ghost").expect("intern");
        let empty = rt.spawn(BehaviourCode::EmptyEnv, &[]).expect("spawn");
        let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");

        rt.inject(
            sym,
            &[
                Word::from_cell(cust),
                crate::kernel::eval::Selector::Eval.word(),
                Word::from_cell(empty),
            ],
        )
        .expect("inject");

        // Turn 1: the symbol forwards a lookup to the environment.
        assert_eq!(
            dispatch_one(&mut rt, None),
            Some(TurnOutcome::Committed { sends: 1 })
        );

        let high_water = rt.arena().high_water();
        let available = rt.arena().available();
        let depth = rt.queue_depth();
        let image = *rt.arena().cell(empty);

        // Turn 2: the terminal environment aborts.
        assert_eq!(
            dispatch_one(&mut rt, None),
            Some(TurnOutcome::Aborted {
                cause: FaultCode::UnboundSymbol
            })
        );

        assert_eq!(rt.arena().high_water(), high_water);
        // The consumed event cell went back to the pool.
        assert_eq!(rt.arena().available(), available + 1);
        assert_eq!(rt.queue_depth(), depth - 1);
        assert_eq!(*rt.arena().cell(empty), image);
        assert!(one_shot_reply(rt.arena(), cust).is_none());
    }

    #[test]
    fn event_naming_a_non_actor_cell_aborts_recoverably() {
        let mut rt = runtime();
        let bogus = rt.arena_mut().reserve().expect("reserve");
        rt.arena_mut()
            .cell_mut(bogus)
            .set_word(0, Word::from_int(9999).raw());
        rt.inject(bogus, &[Word::from_int(1)]).expect("inject");

        assert_eq!(
            dispatch_one(&mut rt, None),
            Some(TurnOutcome::Aborted {
                cause: FaultCode::WrongActorType
            })
        );
        assert!(rt.latched_fault().is_none());
    }

    #[test]
    fn stats_account_commits_aborts_and_enqueues() {
        let mut rt = runtime();
        let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");
        let fwd = rt
            .spawn(BehaviourCode::Fwd, &[Word::from_cell(cust)])
            .expect("spawn");
        rt.inject(fwd, &[Word::from_int(1)]).expect("inject");
        run_until_idle(&mut rt, None);

        let stats = *rt.stats();
        assert_eq!(stats.turns_committed, 2);
        assert_eq!(stats.turns_aborted, 0);
        // Host injection plus the forwarder's relay.
        assert_eq!(stats.events_enqueued, 2);
        assert!(stats.peak_queue_depth >= 1);
    }
}
