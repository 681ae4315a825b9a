//! Binary value codec: decode an octet stream into the value graph and
//! encode values back out.
//!
//! The decoder is bounds-driven: composites declare their content size, so
//! a nested value is decoded through a bounded inner cursor and the outer
//! cursor skips the subtree in one step.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use thiserror::Error;

use crate::arena::{Arena, CellRef};
use crate::fault::FaultCode;
use crate::value::iter::OctetCursor;
use crate::value::prefix::{
    classify_prefix, smol_prefix, PrefixKind, PFX_ARRAY_COUNTED, PFX_ARRAY_EMPTY, PFX_FALSE,
    PFX_M_INT_0, PFX_NULL, PFX_OBJECT_COUNTED, PFX_OBJECT_EMPTY, PFX_P_INT_0, PFX_TRUE,
};
use crate::value::{
    self, array_get, array_len, classify_value, int_value, make_array, make_int, make_object,
    make_string, object_pair, strings_equal, string_bytes, StrFamily, ValueKind,
};

/// Decoder error taxonomy.
///
/// Every error propagates to the caller without mutating the target graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A memoised string reference was encountered.
    #[error("memoised references are not supported")]
    MemoNotSupported,
    /// The prefix byte has no assigned meaning.
    #[error("unsupported encoding prefix")]
    UnsupportedEncoding,
    /// An extended integer does not fit the runtime's integer range.
    #[error("integer too large")]
    IntegerTooLarge,
    /// A UTF-8 string's content is not valid UTF-8.
    #[error("malformed utf-8 content")]
    Utf8Malformed,
    /// The stream ended inside a value, or a size field overran its bound.
    #[error("value extends out of bounds")]
    OutOfBounds,
    /// Structure disagreed with its declared sizes or counts.
    #[error("bad continuation of an enclosing value")]
    BadContinuation,
    /// The pool could not hold the decoded value.
    #[error("allocation failed while decoding")]
    Pool(#[from] FaultCode),
}

/// Bounded cursor over the input octets.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> ByteCursor<'a> {
    /// Opens a cursor over a whole input slice.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            limit: bytes.len(),
        }
    }

    /// Current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Octets left before the bound.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    fn next(&mut self) -> Result<u8, DecodeError> {
        if self.pos == self.limit {
            return Err(DecodeError::OutOfBounds);
        }
        let byte = self.bytes[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::OutOfBounds);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Splits off a bounded inner cursor of `n` octets and advances this
    /// cursor past them.
    fn bounded(&mut self, n: usize) -> Result<Self, DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::OutOfBounds);
        }
        let inner = Self {
            bytes: self.bytes,
            pos: self.pos,
            limit: self.pos + n,
        };
        self.pos += n;
        Ok(inner)
    }
}

fn extended_int(cur: &mut ByteCursor<'_>, negative: bool) -> Result<i32, DecodeError> {
    let size = decode_size(cur)?;
    let bytes = cur.take(size as usize)?;
    let pad = if negative { 0xFFu8 } else { 0x00u8 };
    let mut magnitude = [pad; 8];
    for (i, b) in bytes.iter().enumerate() {
        if i >= magnitude.len() {
            // Redundant pad bytes beyond the window are fine; anything
            // else cannot fit.
            if *b != pad {
                return Err(DecodeError::IntegerTooLarge);
            }
            continue;
        }
        magnitude[i] = *b;
    }
    let wide = i64::from_le_bytes(magnitude);
    i32::try_from(wide).map_err(|_| DecodeError::IntegerTooLarge)
}

/// Reads a non-negative size field: a smol byte or an extended integer.
fn decode_size(cur: &mut ByteCursor<'_>) -> Result<u32, DecodeError> {
    let byte = cur.next()?;
    match classify_prefix(byte) {
        Some(PrefixKind::Smol(n)) if n >= 0 => Ok(n as u32),
        Some(PrefixKind::PosInt { .. }) => {
            let n = extended_int(cur, false)?;
            u32::try_from(n).map_err(|_| DecodeError::IntegerTooLarge)
        }
        _ => Err(DecodeError::UnsupportedEncoding),
    }
}

fn decode_string(
    arena: &mut Arena,
    cur: &mut ByteCursor<'_>,
    family: StrFamily,
) -> Result<CellRef, DecodeError> {
    let size = decode_size(cur)? as usize;
    let content = cur.take(size)?;
    match family {
        StrFamily::Utf8 => {
            if std::str::from_utf8(content).is_err() {
                return Err(DecodeError::Utf8Malformed);
            }
        }
        StrFamily::Utf16 => {
            if size % 2 != 0 {
                return Err(DecodeError::BadContinuation);
            }
        }
        StrFamily::Octets => {}
    }
    Ok(make_string(arena, family, content)?)
}

fn decode_array(
    arena: &mut Arena,
    cur: &mut ByteCursor<'_>,
    counted: bool,
) -> Result<CellRef, DecodeError> {
    let size = decode_size(cur)? as usize;
    let declared = if counted { Some(decode_size(cur)?) } else { None };
    let mut inner = cur.bounded(size)?;
    let mut elems = Vec::new();
    while inner.remaining() > 0 {
        elems.push(decode(arena, &mut inner)?);
    }
    if let Some(count) = declared {
        if count as usize != elems.len() {
            return Err(DecodeError::BadContinuation);
        }
    }
    Ok(make_array(arena, &elems)?)
}

fn decode_object(
    arena: &mut Arena,
    cur: &mut ByteCursor<'_>,
    counted: bool,
) -> Result<CellRef, DecodeError> {
    let size = decode_size(cur)? as usize;
    let declared = if counted { Some(decode_size(cur)?) } else { None };
    let mut inner = cur.bounded(size)?;
    let mut pairs: Vec<(CellRef, CellRef)> = Vec::new();
    let mut decoded = 0u32;
    while inner.remaining() > 0 {
        let name = decode(arena, &mut inner)?;
        if value::string_family(arena, name).is_none() {
            return Err(DecodeError::BadContinuation);
        }
        if inner.remaining() == 0 {
            return Err(DecodeError::BadContinuation);
        }
        let val = decode(arena, &mut inner)?;
        decoded += 1;
        // Duplicate keys: last value wins, original position is kept.
        if let Some(slot) = pairs.iter_mut().find(|(n, _)| strings_equal(arena, *n, name)) {
            slot.1 = val;
        } else {
            pairs.push((name, val));
        }
    }
    if let Some(count) = declared {
        if count != decoded {
            return Err(DecodeError::BadContinuation);
        }
    }
    Ok(make_object(arena, &pairs)?)
}

/// Decodes one value from the cursor.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first malformation found; the
/// arena may hold unreachable partial allocations but no reachable value
/// is mutated.
pub fn decode(arena: &mut Arena, cur: &mut ByteCursor<'_>) -> Result<CellRef, DecodeError> {
    let byte = cur.next()?;
    match classify_prefix(byte).ok_or(DecodeError::UnsupportedEncoding)? {
        PrefixKind::Null => Ok(value::NULL_VALUE),
        PrefixKind::True => Ok(value::TRUE_VALUE),
        PrefixKind::False => Ok(value::FALSE_VALUE),
        PrefixKind::Smol(n) => Ok(make_int(arena, n)?),
        PrefixKind::PosInt { .. } => {
            let n = extended_int(cur, false)?;
            if n < 0 {
                return Err(DecodeError::BadContinuation);
            }
            Ok(make_int(arena, n)?)
        }
        PrefixKind::NegInt { .. } => {
            let n = extended_int(cur, true)?;
            if n >= 0 {
                return Err(DecodeError::BadContinuation);
            }
            Ok(make_int(arena, n)?)
        }
        PrefixKind::Octets => decode_string(arena, cur, StrFamily::Octets),
        PrefixKind::Utf8 => decode_string(arena, cur, StrFamily::Utf8),
        PrefixKind::Utf16 => decode_string(arena, cur, StrFamily::Utf16),
        PrefixKind::MemoRef => Err(DecodeError::MemoNotSupported),
        PrefixKind::EmptyArray => Ok(make_array(arena, &[])?),
        PrefixKind::EmptyObject => Ok(make_object(arena, &[])?),
        PrefixKind::Array => decode_array(arena, cur, false),
        PrefixKind::ArrayCounted => decode_array(arena, cur, true),
        PrefixKind::Object => decode_object(arena, cur, false),
        PrefixKind::ObjectCounted => decode_object(arena, cur, true),
    }
}

/// Decodes one value from a byte slice, requiring full consumption.
///
/// # Errors
///
/// Propagates [`decode`] errors; trailing octets are
/// [`DecodeError::BadContinuation`].
pub fn decode_bytes(arena: &mut Arena, bytes: &[u8]) -> Result<CellRef, DecodeError> {
    let mut cur = ByteCursor::new(bytes);
    let v = decode(arena, &mut cur)?;
    if cur.remaining() == 0 {
        Ok(v)
    } else {
        Err(DecodeError::BadContinuation)
    }
}

fn encode_size(out: &mut Vec<u8>, size: u32) {
    if let Some(p) = smol_prefix(size as i32) {
        if size <= 126 {
            out.push(p);
            return;
        }
    }
    if let Ok(small) = u16::try_from(size) {
        out.push(PFX_P_INT_0);
        push_smol(out, 2);
        out.extend_from_slice(&small.to_le_bytes());
    } else {
        out.push(PFX_P_INT_0);
        push_smol(out, 4);
        out.extend_from_slice(&size.to_le_bytes());
    }
}

fn push_smol(out: &mut Vec<u8>, n: i32) {
    if let Some(p) = smol_prefix(n) {
        out.push(p);
    }
}

fn encode_int(out: &mut Vec<u8>, n: i32) {
    if let Some(p) = smol_prefix(n) {
        out.push(p);
        return;
    }
    let bytes = n.to_le_bytes();
    // Trim redundant pad bytes from the canonical little-endian form.
    let pad = if n < 0 { 0xFF } else { 0x00 };
    let mut keep = bytes.len();
    while keep > 1 && bytes[keep - 1] == pad && (bytes[keep - 2] >= 0x80) == (n < 0) {
        keep -= 1;
    }
    out.push(if n < 0 { PFX_M_INT_0 } else { PFX_P_INT_0 });
    push_smol(out, keep as i32);
    out.extend_from_slice(&bytes[..keep]);
}

/// Encodes one value onto the output stream in canonical form.
///
/// # Errors
///
/// Returns [`FaultCode::WrongActorType`] when `r` is not an encodable data
/// value (kernel-only singletons and actor cells are not).
pub fn encode(arena: &Arena, r: CellRef, out: &mut Vec<u8>) -> Result<(), FaultCode> {
    match classify_value(arena, r).ok_or(FaultCode::WrongActorType)? {
        ValueKind::Null => {
            out.push(PFX_NULL);
            Ok(())
        }
        ValueKind::Bool(true) => {
            out.push(PFX_TRUE);
            Ok(())
        }
        ValueKind::Bool(false) => {
            out.push(PFX_FALSE);
            Ok(())
        }
        ValueKind::Int(_) => {
            let n = int_value(arena, r).ok_or(FaultCode::WrongActorType)?;
            encode_int(out, n);
            Ok(())
        }
        ValueKind::Str(family) => {
            let bytes = string_bytes(arena, r).ok_or(FaultCode::MalformedValue)?;
            out.push(family.prefix());
            encode_size(out, bytes.len() as u32);
            out.extend_from_slice(&bytes);
            Ok(())
        }
        ValueKind::Array => {
            let len = array_len(arena, r).ok_or(FaultCode::MalformedValue)?;
            if len == 0 {
                out.push(PFX_ARRAY_EMPTY);
                return Ok(());
            }
            let mut content = Vec::new();
            for i in 0..len {
                let elem = array_get(arena, r, i).ok_or(FaultCode::MalformedValue)?;
                encode(arena, elem, &mut content)?;
            }
            out.push(PFX_ARRAY_COUNTED);
            encode_size(out, content.len() as u32);
            encode_size(out, len);
            out.extend_from_slice(&content);
            Ok(())
        }
        ValueKind::Object => {
            let pairs = crate::value::object_len(arena, r).ok_or(FaultCode::MalformedValue)?;
            if pairs == 0 {
                out.push(PFX_OBJECT_EMPTY);
                return Ok(());
            }
            let mut content = Vec::new();
            for i in 0..pairs {
                let (name, val) = object_pair(arena, r, i).ok_or(FaultCode::MalformedValue)?;
                encode(arena, name, &mut content)?;
                encode(arena, val, &mut content)?;
            }
            out.push(PFX_OBJECT_COUNTED);
            encode_size(out, content.len() as u32);
            encode_size(out, pairs);
            out.extend_from_slice(&content);
            Ok(())
        }
        ValueKind::Inert | ValueKind::Ignore | ValueKind::Unit => Err(FaultCode::WrongActorType),
    }
}

/// Encodes one value into a fresh byte vector.
///
/// # Errors
///
/// Propagates [`encode`] faults.
pub fn encode_bytes(arena: &Arena, r: CellRef) -> Result<Vec<u8>, FaultCode> {
    let mut out = Vec::new();
    encode(arena, r, &mut out)?;
    Ok(out)
}

/// Decodes one value from an in-arena octet string through the lazy string
/// cursor.
///
/// # Errors
///
/// Propagates [`decode`] errors; a non-string source is
/// [`DecodeError::UnsupportedEncoding`].
pub fn decode_value_stream(arena: &mut Arena, source: CellRef) -> Result<CellRef, DecodeError> {
    let mut cursor =
        OctetCursor::over_string(arena, source).ok_or(DecodeError::UnsupportedEncoding)?;
    let mut bytes = Vec::with_capacity(cursor.remaining() as usize);
    while let Some(b) = cursor.next_octet(arena) {
        bytes.push(b);
    }
    if cursor.remaining() != 0 {
        return Err(DecodeError::OutOfBounds);
    }
    decode_bytes(arena, &bytes)
}
