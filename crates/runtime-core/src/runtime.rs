//! The runtime instance: pool, queue, statistics, symbol table, and the
//! ground environment.

use crate::actor::{self, BehaviourCode};
use crate::arena::{Arena, CellRef, Word};
use crate::config::RuntimeConfig;
use crate::dispatch::{self, DispatchStats, DispatchSummary, TraceSink, TurnOutcome};
use crate::fault::FaultCode;
use crate::kernel::eval;
use crate::queue::EventQueue;
use crate::value;

/// One complete actor runtime: shared state for every dispatch.
#[derive(Debug)]
pub struct Runtime {
    arena: Arena,
    queue: EventQueue,
    stats: DispatchStats,
    config: RuntimeConfig,
    symbols: Vec<(Vec<u8>, CellRef)>,
    ground: CellRef,
    sponsor: Word,
    exit_requested: bool,
    latched: Option<FaultCode>,
}

impl Runtime {
    /// Builds a runtime: arena with singletons, empty event ring, interned
    /// ground environment.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::OutOfMemory`] when the configured pool cannot
    /// hold the ground environment.
    pub fn new(config: RuntimeConfig) -> Result<Self, FaultCode> {
        let mut arena = Arena::new(config.pool_cells);
        value::init_singletons(&mut arena);
        let queue = EventQueue::new(config.effective_queue_slots());
        let mut rt = Self {
            arena,
            queue,
            stats: DispatchStats::default(),
            config,
            symbols: Vec::new(),
            ground: CellRef::NIL,
            sponsor: Word::NIL,
            exit_requested: false,
            latched: None,
        };
        rt.ground = eval::make_ground_env(&mut rt)?;
        Ok(rt)
    }

    /// Shared access to the cell arena.
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable access to the cell arena.
    pub const fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// The configuration this runtime was built with.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Dispatch counters.
    #[must_use]
    pub const fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub(crate) const fn stats_mut(&mut self) -> &mut DispatchStats {
        &mut self.stats
    }

    /// The ground environment actor.
    #[must_use]
    pub const fn ground(&self) -> CellRef {
        self.ground
    }

    /// Number of pending events.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// The accounting root bound into every dispatch. Opaque to actors.
    #[must_use]
    pub const fn sponsor(&self) -> Word {
        self.sponsor
    }

    /// Replaces the accounting root bound into subsequent dispatches.
    pub const fn set_sponsor(&mut self, sponsor: Word) {
        self.sponsor = sponsor;
    }

    /// The latched terminal fault, if the dispatch loop has stopped.
    #[must_use]
    pub const fn latched_fault(&self) -> Option<FaultCode> {
        self.latched
    }

    /// True once an evaluated form has requested termination.
    #[must_use]
    pub const fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub(crate) const fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub(crate) const fn latch(&mut self, cause: FaultCode) {
        self.latched = Some(cause);
    }

    pub(crate) fn dequeue_event(&mut self) -> Option<CellRef> {
        self.queue.dequeue()
    }

    pub(crate) const fn queue_mark(&self) -> usize {
        self.queue.mark()
    }

    pub(crate) const fn rewind_queue(&mut self, mark: usize) {
        self.queue.rewind(mark);
    }

    pub(crate) fn enqueue_for_turn(&mut self, event: CellRef) -> Result<(), FaultCode> {
        self.queue.enqueue(event)?;
        self.stats.peak_queue_depth = self.stats.peak_queue_depth.max(self.queue.depth());
        Ok(())
    }

    pub(crate) fn note_high_water(&mut self) {
        self.stats.peak_high_water = self.stats.peak_high_water.max(self.arena.high_water());
    }

    /// Allocates and initialises an actor cell outside any turn.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
    pub fn spawn(&mut self, code: BehaviourCode, state: &[Word]) -> Result<CellRef, FaultCode> {
        let r = self.arena.reserve()?;
        self.note_high_water();
        actor::init_actor(self.arena.cell_mut(r), code, state);
        Ok(r)
    }

    /// Builds and enqueues an event from the host, outside any turn.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::Panic`] for an oversized message or invalid
    /// target, [`FaultCode::OutOfMemory`] or [`FaultCode::QueueOverflow`]
    /// from the pool and ring.
    pub fn inject(&mut self, target: CellRef, msg: &[Word]) -> Result<(), FaultCode> {
        if msg.len() > dispatch::MAX_MESSAGE_WORDS {
            return Err(FaultCode::Panic);
        }
        self.arena.check(target)?;
        let event = self.arena.reserve()?;
        self.note_high_water();
        {
            let cell = self.arena.cell_mut(event);
            cell.set_word(0, target.raw());
            for (i, word) in msg.iter().enumerate() {
                cell.set_word(i + 1, word.raw());
            }
        }
        self.enqueue_for_turn(event)?;
        self.stats.events_enqueued += 1;
        Ok(())
    }

    /// Returns the interned symbol actor for `name`, creating it on first
    /// use.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
    pub fn intern(&mut self, name: &str) -> Result<CellRef, FaultCode> {
        if let Some((_, sym)) = self
            .symbols
            .iter()
            .find(|(n, _)| n.as_slice() == name.as_bytes())
        {
            return Ok(*sym);
        }
        let text = value::make_string(&mut self.arena, value::StrFamily::Utf8, name.as_bytes())?;
        let sym = self.spawn(BehaviourCode::Symbol, &[Word::from_cell(text)])?;
        self.symbols.push((name.as_bytes().to_vec(), sym));
        Ok(sym)
    }

    /// Returns the name of an interned symbol actor.
    #[must_use]
    pub fn symbol_name(&self, sym: CellRef) -> Option<String> {
        if BehaviourCode::of_cell(&self.arena, sym) != Some(BehaviourCode::Symbol) {
            return None;
        }
        let text = Word::from_raw(self.arena.cell(sym).word(1)).as_cell()?;
        let bytes = value::string_bytes(&self.arena, text)?;
        String::from_utf8(bytes).ok()
    }

    /// Pops and dispatches one event.
    pub fn dispatch_one(&mut self, sink: Option<&mut dyn TraceSink>) -> Option<TurnOutcome> {
        dispatch::dispatch_one(self, sink)
    }

    /// Drains the queue until empty or a terminal fault latches.
    pub fn run_until_idle(&mut self) -> DispatchSummary {
        dispatch::run_until_idle(self, None)
    }

    /// Drains the queue with a trace sink attached.
    pub fn run_traced(&mut self, sink: &mut dyn TraceSink) -> DispatchSummary {
        dispatch::run_until_idle(self, Some(sink))
    }
}

#[cfg(test)]
mod tests {
    use super::Runtime;
    use crate::actor::BehaviourCode;
    use crate::arena::Word;
    use crate::config::RuntimeConfig;
    use crate::fault::FaultCode;

    #[test]
    fn interning_is_idempotent_per_name() {
        let mut rt = Runtime::new(RuntimeConfig::default()).expect("runtime");
        let a = rt.intern("with-this-name").expect("intern");
        let b = rt.intern("with-this-name").expect("intern");
        let c = rt.intern("with-that-name").expect("intern");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(rt.symbol_name(a).as_deref(), Some("with-this-name"));
        assert_eq!(rt.symbol_name(c).as_deref(), Some("with-that-name"));
    }

    #[test]
    fn oversized_messages_are_rejected_at_injection() {
        let mut rt = Runtime::new(RuntimeConfig::default()).expect("runtime");
        let cust = rt.spawn(BehaviourCode::OneShot, &[]).expect("spawn");
        let msg = [Word::from_int(0); 8];
        assert_eq!(rt.inject(cust, &msg), Err(FaultCode::Panic));
    }

    #[test]
    fn ground_environment_is_an_environment_actor() {
        let rt = Runtime::new(RuntimeConfig::default()).expect("runtime");
        let code = BehaviourCode::of_cell(rt.arena(), rt.ground()).expect("behaviour");
        assert!(code.is_environment());
    }
}
