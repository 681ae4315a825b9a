//! BOSE value graph: self-describing tagged values over arena cells.
//!
//! A value occupies one head cell, or a head cell plus a chain of
//! extension cells when its content exceeds the inline capacity. Values are
//! immutable after construction; mutators return a new root that shares
//! element cells (and chain suffixes where slot phase is preserved) with
//! the original.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub mod build;
pub mod iter;
pub mod prefix;

use crate::actor::BehaviourCode;
use crate::arena::{Arena, Cell, CellRef};
use crate::fault::FaultCode;
use crate::value::iter::OctetCursor;
use crate::value::prefix::{
    smol_prefix, smol_value, EXT_ELEM_SLOTS, HEAD_ELEM_SLOTS, INT_MAGNITUDE_BYTES,
    LONG_HEAD_CAPACITY, OFF_ELEMS, OFF_EXT_LINK, OFF_LINK, OFF_LONG_DATA, OFF_PREFIX,
    OFF_SHORT_DATA, OFF_SIZE32, OFF_SIZE_AUX, OFF_SIZE_PREFIX, PFX_ARRAY, PFX_ARRAY_EMPTY,
    PFX_FALSE, PFX_IGNORE, PFX_INERT, PFX_M_INT_0, PFX_NULL, PFX_OBJECT, PFX_OBJECT_EMPTY,
    PFX_OCTETS, PFX_P_INT_0, PFX_TRUE, PFX_UNIT, PFX_UTF16, PFX_UTF8, SHORT_STRING_CAPACITY,
};

/// The `null` singleton cell.
pub const NULL_VALUE: CellRef = CellRef::from_index(1);
/// The `true` singleton cell.
pub const TRUE_VALUE: CellRef = CellRef::from_index(2);
/// The `false` singleton cell.
pub const FALSE_VALUE: CellRef = CellRef::from_index(3);
/// The `#inert` singleton cell.
pub const INERT: CellRef = CellRef::from_index(4);
/// The `#ignore` singleton cell.
pub const IGNORE: CellRef = CellRef::from_index(5);
/// The empty list `()` singleton cell.
pub const UNIT: CellRef = CellRef::from_index(6);

/// Initialises the reserved singleton cells of a fresh arena.
pub fn init_singletons(arena: &mut Arena) {
    let singletons = [
        (NULL_VALUE, PFX_NULL),
        (TRUE_VALUE, PFX_TRUE),
        (FALSE_VALUE, PFX_FALSE),
        (INERT, PFX_INERT),
        (IGNORE, PFX_IGNORE),
        (UNIT, PFX_UNIT),
    ];
    for (r, pfx) in singletons {
        let cell = arena.cell_mut(r);
        *cell = Cell::ZERO;
        cell.set_word(0, BehaviourCode::Value.word().raw());
        cell.set_byte(OFF_PREFIX, pfx);
    }
}

/// String type families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrFamily {
    /// Raw byte string.
    Octets,
    /// UTF-8 text.
    Utf8,
    /// UTF-16 text.
    Utf16,
}

impl StrFamily {
    /// Returns the prefix byte for this family.
    #[must_use]
    pub const fn prefix(self) -> u8 {
        match self {
            Self::Octets => PFX_OCTETS,
            Self::Utf8 => PFX_UTF8,
            Self::Utf16 => PFX_UTF16,
        }
    }

    /// Classifies a prefix byte as a string family.
    #[must_use]
    pub const fn from_prefix(byte: u8) -> Option<Self> {
        match byte {
            PFX_OCTETS => Some(Self::Octets),
            PFX_UTF8 => Some(Self::Utf8),
            PFX_UTF16 => Some(Self::Utf16),
            _ => None,
        }
    }
}

/// Classified shape of a value cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// The `null` singleton.
    Null,
    /// A boolean singleton.
    Bool(bool),
    /// A smol or extended integer.
    Int(i32),
    /// A string of the given family.
    Str(StrFamily),
    /// An array (possibly empty).
    Array,
    /// An object (possibly empty).
    Object,
    /// The `#inert` singleton.
    Inert,
    /// The `#ignore` singleton.
    Ignore,
    /// The empty list singleton.
    Unit,
}

/// Classifies the cell behind `r`, if it is a data value.
#[must_use]
pub fn classify_value(arena: &Arena, r: CellRef) -> Option<ValueKind> {
    if BehaviourCode::of_cell(arena, r) != Some(BehaviourCode::Value) {
        return None;
    }
    let cell = arena.cell(r);
    let byte = cell.byte(OFF_PREFIX);
    match byte {
        PFX_NULL => Some(ValueKind::Null),
        PFX_TRUE => Some(ValueKind::Bool(true)),
        PFX_FALSE => Some(ValueKind::Bool(false)),
        PFX_INERT => Some(ValueKind::Inert),
        PFX_IGNORE => Some(ValueKind::Ignore),
        PFX_UNIT => Some(ValueKind::Unit),
        PFX_ARRAY | PFX_ARRAY_EMPTY => Some(ValueKind::Array),
        PFX_OBJECT | PFX_OBJECT_EMPTY => Some(ValueKind::Object),
        PFX_P_INT_0 | PFX_M_INT_0 => Some(ValueKind::Int(cell.u32_at(OFF_SIZE32) as i32)),
        _ => {
            if let Some(family) = StrFamily::from_prefix(byte) {
                Some(ValueKind::Str(family))
            } else {
                smol_value(byte).map(ValueKind::Int)
            }
        }
    }
}

/// Returns the boolean singleton for `v`.
#[must_use]
pub const fn make_bool(v: bool) -> CellRef {
    if v {
        TRUE_VALUE
    } else {
        FALSE_VALUE
    }
}

/// Allocates an integer value cell (smol when in range).
///
/// # Errors
///
/// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
pub fn make_int(arena: &mut Arena, n: i32) -> Result<CellRef, FaultCode> {
    let r = arena.reserve()?;
    let size_prefix = smol_prefix(INT_MAGNITUDE_BYTES as i32).ok_or(FaultCode::Panic)?;
    let cell = arena.cell_mut(r);
    cell.set_word(0, BehaviourCode::Value.word().raw());
    if let Some(p) = smol_prefix(n) {
        cell.set_byte(OFF_PREFIX, p);
    } else {
        let family = if n < 0 { PFX_M_INT_0 } else { PFX_P_INT_0 };
        cell.set_byte(OFF_PREFIX, family);
        cell.set_byte(OFF_SIZE_PREFIX, size_prefix);
        cell.set_u32_at(OFF_SIZE32, n as u32);
    }
    Ok(r)
}

/// Reads the integer a value cell carries, if it is a number.
#[must_use]
pub fn int_value(arena: &Arena, r: CellRef) -> Option<i32> {
    match classify_value(arena, r) {
        Some(ValueKind::Int(n)) => Some(n),
        _ => None,
    }
}

/// In-cell header of a string value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StringLayout {
    pub family: StrFamily,
    pub len: u32,
    /// Byte offset of the first content byte in the head cell.
    pub data_off: usize,
    /// Byte offset where the head's content region ends (the link word for
    /// chained strings).
    pub block_end: usize,
}

/// Parses the header of a string value cell.
pub(crate) fn string_layout(arena: &Arena, r: CellRef) -> Option<StringLayout> {
    if BehaviourCode::of_cell(arena, r) != Some(BehaviourCode::Value) {
        return None;
    }
    let cell = arena.cell(r);
    let family = StrFamily::from_prefix(cell.byte(OFF_PREFIX))?;
    let size_byte = cell.byte(OFF_SIZE_PREFIX);
    if let Some(n) = smol_value(size_byte) {
        if n < 0 || n as usize > SHORT_STRING_CAPACITY {
            return None;
        }
        Some(StringLayout {
            family,
            len: n as u32,
            data_off: OFF_SHORT_DATA,
            block_end: OFF_SHORT_DATA + n as usize,
        })
    } else if size_byte == PFX_P_INT_0 {
        Some(StringLayout {
            family,
            len: cell.u32_at(OFF_SIZE32),
            data_off: OFF_LONG_DATA,
            block_end: OFF_LINK,
        })
    } else {
        None
    }
}

/// Allocates a string value from raw content bytes, chaining extension
/// cells as needed.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted, or
/// [`FaultCode::MalformedValue`] when the content size does not fit the
/// 32-bit size field.
pub fn make_string(arena: &mut Arena, family: StrFamily, bytes: &[u8]) -> Result<CellRef, FaultCode> {
    let len = u32::try_from(bytes.len()).map_err(|_| FaultCode::MalformedValue)?;
    let head = arena.reserve()?;
    let size4 = smol_prefix(INT_MAGNITUDE_BYTES as i32).ok_or(FaultCode::Panic)?;
    {
        let cell = arena.cell_mut(head);
        cell.set_word(0, BehaviourCode::Value.word().raw());
        cell.set_byte(OFF_PREFIX, family.prefix());
    }

    if bytes.len() <= SHORT_STRING_CAPACITY {
        let short = smol_prefix(len as i32).ok_or(FaultCode::Panic)?;
        let cell = arena.cell_mut(head);
        cell.set_byte(OFF_SIZE_PREFIX, short);
        for (i, b) in bytes.iter().enumerate() {
            cell.set_byte(OFF_SHORT_DATA + i, *b);
        }
        return Ok(head);
    }

    {
        let cell = arena.cell_mut(head);
        cell.set_byte(OFF_SIZE_PREFIX, PFX_P_INT_0);
        cell.set_byte(OFF_SIZE_AUX, size4);
        cell.set_u32_at(OFF_SIZE32, len);
        for (i, b) in bytes.iter().take(LONG_HEAD_CAPACITY).enumerate() {
            cell.set_byte(OFF_LONG_DATA + i, *b);
        }
    }

    let mut rest = &bytes[LONG_HEAD_CAPACITY..];
    let mut prev = head;
    let mut link_off = OFF_LINK;
    while !rest.is_empty() {
        let ext = arena.reserve()?;
        arena.cell_mut(prev).set_u32_at(link_off, ext.raw());
        let take = rest.len().min(prefix::EXT_CAPACITY);
        let cell = arena.cell_mut(ext);
        for (i, b) in rest[..take].iter().enumerate() {
            cell.set_byte(i, *b);
        }
        rest = &rest[take..];
        prev = ext;
        link_off = OFF_EXT_LINK;
    }
    Ok(head)
}

/// Returns the string family of a value cell, if it is a string.
#[must_use]
pub fn string_family(arena: &Arena, r: CellRef) -> Option<StrFamily> {
    string_layout(arena, r).map(|l| l.family)
}

/// Returns the content length in bytes of a string value.
#[must_use]
pub fn string_len(arena: &Arena, r: CellRef) -> Option<u32> {
    string_layout(arena, r).map(|l| l.len)
}

/// Collects the content bytes of a string value.
#[must_use]
pub fn string_bytes(arena: &Arena, r: CellRef) -> Option<Vec<u8>> {
    let mut cursor = OctetCursor::over_string(arena, r)?;
    let mut out = Vec::with_capacity(cursor.remaining() as usize);
    while let Some(b) = cursor.next_octet(arena) {
        out.push(b);
    }
    if cursor.remaining() == 0 {
        Some(out)
    } else {
        None
    }
}

fn init_composite(
    arena: &mut Arena,
    refs: &[CellRef],
    empty_prefix: u8,
    full_prefix: u8,
    mirror_count: u32,
) -> Result<CellRef, FaultCode> {
    let head = arena.reserve()?;
    {
        let cell = arena.cell_mut(head);
        cell.set_word(0, BehaviourCode::Value.word().raw());
        if refs.is_empty() {
            cell.set_byte(OFF_PREFIX, empty_prefix);
            return Ok(head);
        }
        cell.set_byte(OFF_PREFIX, full_prefix);
        if let Some(short) = smol_prefix(mirror_count as i32) {
            cell.set_byte(OFF_SIZE_PREFIX, short);
        } else {
            cell.set_byte(OFF_SIZE_PREFIX, PFX_P_INT_0);
            let size4 = smol_prefix(INT_MAGNITUDE_BYTES as i32).ok_or(FaultCode::Panic)?;
            cell.set_byte(OFF_SIZE_AUX, size4);
        }
        cell.set_u32_at(OFF_SIZE32, (refs.len() as u32) * 4);
        for (i, r) in refs.iter().take(HEAD_ELEM_SLOTS).enumerate() {
            cell.set_u32_at(OFF_ELEMS + i * 4, r.raw());
        }
    }

    let mut rest = &refs[refs.len().min(HEAD_ELEM_SLOTS)..];
    let mut prev = head;
    let mut link_off = OFF_LINK;
    while !rest.is_empty() {
        let ext = arena.reserve()?;
        arena.cell_mut(prev).set_u32_at(link_off, ext.raw());
        let take = rest.len().min(EXT_ELEM_SLOTS);
        let cell = arena.cell_mut(ext);
        for (i, r) in rest[..take].iter().enumerate() {
            cell.set_u32_at(i * 4, r.raw());
        }
        rest = &rest[take..];
        prev = ext;
        link_off = OFF_EXT_LINK;
    }
    Ok(head)
}

/// Allocates an array value over the given element references.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
pub fn make_array(arena: &mut Arena, elems: &[CellRef]) -> Result<CellRef, FaultCode> {
    init_composite(
        arena,
        elems,
        PFX_ARRAY_EMPTY,
        PFX_ARRAY,
        elems.len() as u32,
    )
}

/// Allocates an object value over the given `(name, value)` pairs.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
pub fn make_object(arena: &mut Arena, pairs: &[(CellRef, CellRef)]) -> Result<CellRef, FaultCode> {
    let mut refs = Vec::with_capacity(pairs.len() * 2);
    for (name, value) in pairs {
        refs.push(*name);
        refs.push(*value);
    }
    init_composite(
        arena,
        &refs,
        PFX_OBJECT_EMPTY,
        PFX_OBJECT,
        pairs.len() as u32,
    )
}

/// Returns the element count of an array value.
#[must_use]
pub fn array_len(arena: &Arena, r: CellRef) -> Option<u32> {
    if BehaviourCode::of_cell(arena, r) != Some(BehaviourCode::Value) {
        return None;
    }
    let cell = arena.cell(r);
    match cell.byte(OFF_PREFIX) {
        PFX_ARRAY_EMPTY => Some(0),
        PFX_ARRAY => Some(cell.u32_at(OFF_SIZE32) / 4),
        _ => None,
    }
}

/// Returns the pair count of an object value.
#[must_use]
pub fn object_len(arena: &Arena, r: CellRef) -> Option<u32> {
    if BehaviourCode::of_cell(arena, r) != Some(BehaviourCode::Value) {
        return None;
    }
    let cell = arena.cell(r);
    match cell.byte(OFF_PREFIX) {
        PFX_OBJECT_EMPTY => Some(0),
        PFX_OBJECT => Some(cell.u32_at(OFF_SIZE32) / 8),
        _ => None,
    }
}

/// Locates the cell and byte offset holding reference slot `slot`.
fn ref_slot(arena: &Arena, head: CellRef, slot: u32) -> Option<(CellRef, usize)> {
    if (slot as usize) < HEAD_ELEM_SLOTS {
        return Some((head, OFF_ELEMS + slot as usize * 4));
    }
    let mut remaining = slot as usize - HEAD_ELEM_SLOTS;
    let mut block = CellRef::from_raw(arena.cell(head).u32_at(OFF_LINK))?;
    if block.is_nil() {
        return None;
    }
    while remaining >= EXT_ELEM_SLOTS {
        block = CellRef::from_raw(arena.cell(block).u32_at(OFF_EXT_LINK))?;
        if block.is_nil() {
            return None;
        }
        remaining -= EXT_ELEM_SLOTS;
    }
    Some((block, remaining * 4))
}

/// Collects `count` reference slots from a composite value's chain.
fn collect_slots(arena: &Arena, head: CellRef, count: u32) -> Option<Vec<CellRef>> {
    let mut out = Vec::with_capacity(count as usize);
    let mut cell = head;
    let mut slot = 0usize;
    let mut slots_here = HEAD_ELEM_SLOTS;
    let mut base = OFF_ELEMS;
    for _ in 0..count {
        if slot == slots_here {
            let link_off = if cell == head { OFF_LINK } else { OFF_EXT_LINK };
            cell = CellRef::from_raw(arena.cell(cell).u32_at(link_off))?;
            if cell.is_nil() {
                return None;
            }
            slot = 0;
            slots_here = EXT_ELEM_SLOTS;
            base = 0;
        }
        let raw = arena.cell(cell).u32_at(base + slot * 4);
        out.push(CellRef::from_raw(raw)?);
        slot += 1;
    }
    Some(out)
}

/// Returns element `index` of an array value.
#[must_use]
pub fn array_get(arena: &Arena, a: CellRef, index: u32) -> Option<CellRef> {
    if index >= array_len(arena, a)? {
        return None;
    }
    let (cell, off) = ref_slot(arena, a, index)?;
    CellRef::from_raw(arena.cell(cell).u32_at(off))
}

/// Returns pair `index` of an object value.
#[must_use]
pub fn object_pair(arena: &Arena, o: CellRef, index: u32) -> Option<(CellRef, CellRef)> {
    if index >= object_len(arena, o)? {
        return None;
    }
    let (nc, noff) = ref_slot(arena, o, index * 2)?;
    let name = CellRef::from_raw(arena.cell(nc).u32_at(noff))?;
    let (vc, voff) = ref_slot(arena, o, index * 2 + 1)?;
    let value = CellRef::from_raw(arena.cell(vc).u32_at(voff))?;
    Some((name, value))
}

/// Produces a new array with `x` inserted at `index`; the original array is
/// unchanged and its element cells are shared.
///
/// # Errors
///
/// Returns [`FaultCode::WrongActorType`] when `a` is not an array,
/// [`FaultCode::MalformedValue`] when `index > len`, or pool faults from
/// allocation.
pub fn array_insert(
    arena: &mut Arena,
    a: CellRef,
    index: u32,
    x: CellRef,
) -> Result<CellRef, FaultCode> {
    let len = array_len(arena, a).ok_or(FaultCode::WrongActorType)?;
    if index > len {
        return Err(FaultCode::MalformedValue);
    }
    let mut refs = collect_slots(arena, a, len).ok_or(FaultCode::Panic)?;
    refs.insert(index as usize, x);
    make_array(arena, &refs)
}

/// True when two string values have the same family and content bytes.
#[must_use]
pub fn strings_equal(arena: &Arena, a: CellRef, b: CellRef) -> bool {
    if a == b {
        return true;
    }
    match (string_layout(arena, a), string_layout(arena, b)) {
        (Some(la), Some(lb)) => {
            la.family == lb.family
                && la.len == lb.len
                && string_bytes(arena, a) == string_bytes(arena, b)
        }
        _ => false,
    }
}

/// Produces a new object with `key` bound to `value`; the original object
/// is unchanged.
///
/// A present key keeps its position and gets the new value (chain cells
/// strictly after the touched block are shared); an absent key is appended.
///
/// # Errors
///
/// Returns [`FaultCode::WrongActorType`] when `o` is not an object or
/// `key` is not a string, or pool faults from allocation.
pub fn object_set(
    arena: &mut Arena,
    o: CellRef,
    key: CellRef,
    value: CellRef,
) -> Result<CellRef, FaultCode> {
    let pairs = object_len(arena, o).ok_or(FaultCode::WrongActorType)?;
    if string_layout(arena, key).is_none() {
        return Err(FaultCode::WrongActorType);
    }

    let found = (0..pairs).find(|i| {
        object_pair(arena, o, *i).is_some_and(|(name, _)| strings_equal(arena, name, key))
    });

    let Some(index) = found else {
        let mut all: Vec<(CellRef, CellRef)> = (0..pairs)
            .map(|i| object_pair(arena, o, i).ok_or(FaultCode::Panic))
            .collect::<Result<_, _>>()?;
        all.push((key, value));
        return make_object(arena, &all);
    };

    // Replace in place on a copied spine prefix; the suffix keeps its slot
    // phase, so the copied block can link straight into the original chain.
    let value_slot = index * 2 + 1;
    let new_head = arena.reserve()?;
    *arena.cell_mut(new_head) = *arena.cell(o);
    arena
        .cell_mut(new_head)
        .set_word(0, BehaviourCode::Value.word().raw());
    if (value_slot as usize) < HEAD_ELEM_SLOTS {
        arena
            .cell_mut(new_head)
            .set_u32_at(OFF_ELEMS + value_slot as usize * 4, value.raw());
        return Ok(new_head);
    }

    let mut slot = value_slot as usize - HEAD_ELEM_SLOTS;
    let mut prev_copy = new_head;
    let mut link_off = OFF_LINK;
    let mut block = CellRef::from_raw(arena.cell(o).u32_at(OFF_LINK)).ok_or(FaultCode::Panic)?;
    loop {
        if block.is_nil() {
            return Err(FaultCode::Panic);
        }
        let copy = arena.reserve()?;
        *arena.cell_mut(copy) = *arena.cell(block);
        arena.cell_mut(prev_copy).set_u32_at(link_off, copy.raw());
        if slot < EXT_ELEM_SLOTS {
            arena.cell_mut(copy).set_u32_at(slot * 4, value.raw());
            return Ok(new_head);
        }
        slot -= EXT_ELEM_SLOTS;
        prev_copy = copy;
        link_off = OFF_EXT_LINK;
        block = CellRef::from_raw(arena.cell(block).u32_at(OFF_EXT_LINK)).ok_or(FaultCode::Panic)?;
    }
}

/// Structural equality over data values.
///
/// Numbers compare by value, strings by family and content, arrays
/// element-wise, objects pair-wise in order. Non-value cells compare by
/// identity only.
#[must_use]
pub fn values_equal(arena: &Arena, a: CellRef, b: CellRef) -> bool {
    if a == b {
        return true;
    }
    match (classify_value(arena, a), classify_value(arena, b)) {
        (Some(ValueKind::Int(x)), Some(ValueKind::Int(y))) => x == y,
        (Some(ValueKind::Str(_)), Some(ValueKind::Str(_))) => strings_equal(arena, a, b),
        (Some(ValueKind::Array), Some(ValueKind::Array)) => {
            let (Some(la), Some(lb)) = (array_len(arena, a), array_len(arena, b)) else {
                return false;
            };
            la == lb
                && (0..la).all(|i| {
                    match (array_get(arena, a, i), array_get(arena, b, i)) {
                        (Some(x), Some(y)) => values_equal(arena, x, y),
                        _ => false,
                    }
                })
        }
        (Some(ValueKind::Object), Some(ValueKind::Object)) => {
            let (Some(la), Some(lb)) = (object_len(arena, a), object_len(arena, b)) else {
                return false;
            };
            la == lb
                && (0..la).all(|i| {
                    match (object_pair(arena, a, i), object_pair(arena, b, i)) {
                        (Some((ka, va)), Some((kb, vb))) => {
                            strings_equal(arena, ka, kb) && values_equal(arena, va, vb)
                        }
                        _ => false,
                    }
                })
        }
        _ => false,
    }
}
