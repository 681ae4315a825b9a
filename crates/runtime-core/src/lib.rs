//! Core actor runtime and BOSE value layer for Mycelia.
//!
//! The runtime executes concurrent actors driven by a single global event
//! queue. Actors are 32-byte cells addressed by reference, communicate
//! only by asynchronous message events, and run one atomic behaviour turn
//! per event. On top of the runtime sit the binary value graph (BOSE), its
//! codec, and a Kernel-style evaluator with first-class environments.

/// Actor templates and generic service actors.
pub mod actor;
/// Cell arena: the fixed pool of 32-byte aligned cells.
pub mod arena;
/// Binary value codec and its error taxonomy.
pub mod codec;
/// Runtime configuration.
pub mod config;
/// Host console and clock traits.
pub mod console;
/// Event dispatcher and the per-turn actor context.
pub mod dispatch;
/// Fault taxonomy.
pub mod fault;
/// Compact JSON rendering of data values.
pub mod json;
/// Kernel evaluator: environments, protocol, reader, printer.
pub mod kernel;
/// Bounded FIFO event ring.
pub mod queue;
/// Read-eval-print driver.
pub mod repl;
/// The runtime instance.
pub mod runtime;
/// BOSE value graph.
pub mod value;

pub use actor::BehaviourCode;
pub use arena::{Arena, Cell, CellRef, Word};
pub use codec::{decode_bytes, encode_bytes, DecodeError};
pub use config::RuntimeConfig;
pub use console::{CaptureConsole, Clock, Console};
pub use dispatch::{DispatchStats, DispatchSummary, TraceEvent, TraceSink, TurnOutcome};
pub use fault::{FaultClass, FaultCode};
pub use runtime::Runtime;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
