use thiserror::Error;

/// Fault classes used for dispatch statistics aggregation and recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Cell pool exhaustion or misuse.
    Pool,
    /// Event ring capacity violation.
    Queue,
    /// Behaviour-template mismatch at dispatch or in a primitive.
    Actor,
    /// Malformed binary value input.
    Decode,
    /// Kernel evaluation type or binding violation.
    Kernel,
    /// Invariant violation that stops the dispatch loop.
    Fatal,
}

/// Stable fault taxonomy for turn aborts and dispatcher escalation.
///
/// Every kind except [`FaultCode::Panic`] aborts only the current turn and is
/// recovered by the dispatcher's snapshot/restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// `reserve()` found the free list and high-water region exhausted.
    #[error("cell pool exhausted")]
    OutOfMemory = 0x01,
    /// `enqueue()` found the event ring full.
    #[error("event queue overflow")]
    QueueOverflow = 0x02,
    /// Operation attempted on a cell whose behaviour word does not match the
    /// expected template.
    #[error("behaviour word does not match expected template")]
    WrongActorType = 0x03,
    /// Malformed binary value stream reached the value layer.
    #[error("malformed encoded value")]
    MalformedValue = 0x04,
    /// Environment lookup fell through to the terminal binding.
    #[error("symbol is not bound in any reachable environment")]
    UnboundSymbol = 0x05,
    /// Head of a combination evaluated to something that is not a combiner.
    #[error("object is not a combiner")]
    NotCombiner = 0x06,
    /// Operand required to be an environment is not one.
    #[error("object is not an environment")]
    NotEnvironment = 0x07,
    /// Operand required to be an applicative is not one.
    #[error("object is not an applicative")]
    NotApplicative = 0x08,
    /// Runtime invariant violated; the dispatch loop latches and stops.
    #[error("runtime invariant violated")]
    Panic = 0x09,
}

impl FaultCode {
    /// Converts a fault code to its stable low-byte wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable low-byte wire value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::OutOfMemory),
            0x02 => Some(Self::QueueOverflow),
            0x03 => Some(Self::WrongActorType),
            0x04 => Some(Self::MalformedValue),
            0x05 => Some(Self::UnboundSymbol),
            0x06 => Some(Self::NotCombiner),
            0x07 => Some(Self::NotEnvironment),
            0x08 => Some(Self::NotApplicative),
            0x09 => Some(Self::Panic),
            _ => None,
        }
    }

    /// Returns the statistics class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::OutOfMemory => FaultClass::Pool,
            Self::QueueOverflow => FaultClass::Queue,
            Self::WrongActorType => FaultClass::Actor,
            Self::MalformedValue => FaultClass::Decode,
            Self::UnboundSymbol | Self::NotCombiner | Self::NotEnvironment | Self::NotApplicative => {
                FaultClass::Kernel
            }
            Self::Panic => FaultClass::Fatal,
        }
    }

    /// Faults that latch the runtime instead of aborting a single turn.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Panic)
    }
}
