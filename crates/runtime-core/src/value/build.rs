//! Incremental string construction over chained cells.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use crate::arena::{Arena, CellRef};
use crate::fault::FaultCode;
use crate::value::prefix::{
    smol_prefix, EXT_CAPACITY, INT_MAGNITUDE_BYTES, OFF_LINK, OFF_LONG_DATA, OFF_PREFIX,
    OFF_SIZE32, OFF_SIZE_AUX, OFF_SIZE_PREFIX, PFX_P_INT_0,
};
use crate::value::StrFamily;
use crate::actor::BehaviourCode;

/// Builder cursor owning an under-construction string value.
///
/// The builder always uses the chained layout and bumps the 32-bit size
/// field on every append, so a partially built value is self-describing at
/// all times. Only the `octets` and `utf8` families can be built.
#[derive(Debug)]
pub struct StringBuilder {
    family: StrFamily,
    head: CellRef,
    tail: CellRef,
    tail_off: usize,
    tail_end: usize,
    len: u32,
}

impl StringBuilder {
    /// Starts building a string of the given family.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::WrongActorType`] for any family other than
    /// `octets`/`utf8`, or [`FaultCode::OutOfMemory`] when the pool is
    /// exhausted.
    pub fn new(arena: &mut Arena, family: StrFamily) -> Result<Self, FaultCode> {
        if family == StrFamily::Utf16 {
            return Err(FaultCode::WrongActorType);
        }
        let head = arena.reserve()?;
        let size4 = smol_prefix(INT_MAGNITUDE_BYTES as i32).ok_or(FaultCode::Panic)?;
        let cell = arena.cell_mut(head);
        cell.set_word(0, BehaviourCode::Value.word().raw());
        cell.set_byte(OFF_PREFIX, family.prefix());
        cell.set_byte(OFF_SIZE_PREFIX, PFX_P_INT_0);
        cell.set_byte(OFF_SIZE_AUX, size4);
        cell.set_u32_at(OFF_SIZE32, 0);
        Ok(Self {
            family,
            head,
            tail: head,
            tail_off: OFF_LONG_DATA,
            tail_end: OFF_LINK,
            len: 0,
        })
    }

    /// Content bytes appended so far.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// True before the first append.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends one content byte.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::OutOfMemory`] when a fresh chain cell cannot be
    /// reserved, or [`FaultCode::MalformedValue`] when the 32-bit size
    /// field would overflow.
    pub fn write_octet(&mut self, arena: &mut Arena, byte: u8) -> Result<(), FaultCode> {
        let len = self.len.checked_add(1).ok_or(FaultCode::MalformedValue)?;
        if self.tail_off == self.tail_end {
            let ext = arena.reserve()?;
            arena.cell_mut(self.tail).set_u32_at(self.tail_end, ext.raw());
            self.tail = ext;
            self.tail_off = 0;
            self.tail_end = EXT_CAPACITY;
        }
        arena.cell_mut(self.tail).set_byte(self.tail_off, byte);
        self.tail_off += 1;
        self.len = len;
        arena.cell_mut(self.head).set_u32_at(OFF_SIZE32, len);
        Ok(())
    }

    /// Appends one character in the builder's encoding.
    ///
    /// # Errors
    ///
    /// Propagates [`StringBuilder::write_octet`] faults; for an `octets`
    /// builder a scalar above `0xFF` is [`FaultCode::MalformedValue`].
    pub fn write_character(&mut self, arena: &mut Arena, c: char) -> Result<(), FaultCode> {
        match self.family {
            StrFamily::Octets => {
                let scalar = u32::from(c);
                let byte = u8::try_from(scalar).map_err(|_| FaultCode::MalformedValue)?;
                self.write_octet(arena, byte)
            }
            StrFamily::Utf8 => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).as_bytes() {
                    self.write_octet(arena, *byte)?;
                }
                Ok(())
            }
            StrFamily::Utf16 => Err(FaultCode::WrongActorType),
        }
    }

    /// Finalises the builder and returns the root of the built string.
    #[must_use]
    pub const fn finish(self) -> CellRef {
        self.head
    }
}
