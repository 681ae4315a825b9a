//! Binary value prefix assignments and cell layout constants.
//!
//! One byte of prefix identifies every value's type family, both on the
//! wire and at offset 0x05 of a value's head cell.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

/// Wire prefix: the `false` singleton.
pub const PFX_FALSE: u8 = 0x00;
/// Wire prefix: the `true` singleton.
pub const PFX_TRUE: u8 = 0x01;
/// Wire prefix: empty array, no size field.
pub const PFX_ARRAY_EMPTY: u8 = 0x02;
/// Wire prefix: empty object, no size field.
pub const PFX_OBJECT_EMPTY: u8 = 0x03;
/// Wire prefix: raw byte string, size follows.
pub const PFX_OCTETS: u8 = 0x04;
/// Wire prefix: UTF-8 string, size follows.
pub const PFX_UTF8: u8 = 0x05;
/// Wire prefix: UTF-16 string (optional BOM, default big-endian).
pub const PFX_UTF16: u8 = 0x06;
/// Wire prefix: memoised string reference. Recognised, never supported.
pub const PFX_MEMO_REF: u8 = 0x07;
/// Wire prefix: array with byte-size field.
pub const PFX_ARRAY: u8 = 0x08;
/// Wire prefix: array with byte-size and element-count fields.
pub const PFX_ARRAY_COUNTED: u8 = 0x09;
/// Wire prefix: object with byte-size field.
pub const PFX_OBJECT: u8 = 0x0A;
/// Wire prefix: object with byte-size and pair-count fields.
pub const PFX_OBJECT_COUNTED: u8 = 0x0B;
/// Wire prefix: first non-negative extended integer form (`p_int_0`).
pub const PFX_P_INT_0: u8 = 0x10;
/// Wire prefix: first negative extended integer form (`m_int_0`).
pub const PFX_M_INT_0: u8 = 0x18;
/// Wire prefix: the `null` singleton.
pub const PFX_NULL: u8 = 0xFF;

/// Internal prefix for `#inert`. Never legal on the wire.
pub const PFX_INERT: u8 = 0x20;
/// Internal prefix for `#ignore`. Never legal on the wire.
pub const PFX_IGNORE: u8 = 0x21;
/// Internal prefix for the empty list `()`. Never legal on the wire.
pub const PFX_UNIT: u8 = 0x22;

/// Smallest integer representable directly in a prefix byte.
pub const SMOL_MIN: i32 = -64;
/// Largest integer representable directly in a prefix byte.
pub const SMOL_MAX: i32 = 126;

/// Number of pad-size variants in each extended integer family.
pub const INT_PAD_FORMS: u8 = 8;

/// Classified prefix families.
///
/// Any byte that classifies to `None` is illegal on the wire by definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixKind {
    /// `false` singleton.
    False,
    /// `true` singleton.
    True,
    /// `null` singleton.
    Null,
    /// Integer carried in the prefix byte itself.
    Smol(i32),
    /// Non-negative extended integer; the pad count is an encoder hint.
    PosInt {
        /// Declared pad-byte count (`0..8`), ignored on decode.
        pad: u8,
    },
    /// Negative extended integer; the pad count is an encoder hint.
    NegInt {
        /// Declared pad-byte count (`0..8`), ignored on decode.
        pad: u8,
    },
    /// Raw byte string.
    Octets,
    /// UTF-8 string.
    Utf8,
    /// UTF-16 string.
    Utf16,
    /// Memoised string reference (recognised, unsupported).
    MemoRef,
    /// Empty array.
    EmptyArray,
    /// Array with a byte-size field.
    Array,
    /// Array with byte-size and element-count fields.
    ArrayCounted,
    /// Empty object.
    EmptyObject,
    /// Object with a byte-size field.
    Object,
    /// Object with byte-size and pair-count fields.
    ObjectCounted,
}

/// Classifies one wire prefix byte.
#[must_use]
pub const fn classify_prefix(byte: u8) -> Option<PrefixKind> {
    match byte {
        PFX_FALSE => Some(PrefixKind::False),
        PFX_TRUE => Some(PrefixKind::True),
        PFX_ARRAY_EMPTY => Some(PrefixKind::EmptyArray),
        PFX_OBJECT_EMPTY => Some(PrefixKind::EmptyObject),
        PFX_OCTETS => Some(PrefixKind::Octets),
        PFX_UTF8 => Some(PrefixKind::Utf8),
        PFX_UTF16 => Some(PrefixKind::Utf16),
        PFX_MEMO_REF => Some(PrefixKind::MemoRef),
        PFX_ARRAY => Some(PrefixKind::Array),
        PFX_ARRAY_COUNTED => Some(PrefixKind::ArrayCounted),
        PFX_OBJECT => Some(PrefixKind::Object),
        PFX_OBJECT_COUNTED => Some(PrefixKind::ObjectCounted),
        PFX_NULL => Some(PrefixKind::Null),
        _ => {
            if byte >= PFX_P_INT_0 && byte < PFX_P_INT_0 + INT_PAD_FORMS {
                Some(PrefixKind::PosInt {
                    pad: byte - PFX_P_INT_0,
                })
            } else if byte >= PFX_M_INT_0 && byte < PFX_M_INT_0 + INT_PAD_FORMS {
                Some(PrefixKind::NegInt {
                    pad: byte - PFX_M_INT_0,
                })
            } else if let Some(n) = smol_value(byte) {
                Some(PrefixKind::Smol(n))
            } else {
                None
            }
        }
    }
}

/// Returns the prefix byte for an in-range smol integer.
#[must_use]
pub const fn smol_prefix(n: i32) -> Option<u8> {
    if n >= SMOL_MIN && n <= SMOL_MAX {
        Some((n + 128) as u8)
    } else {
        None
    }
}

/// Returns the integer a smol prefix byte carries, if it is one.
#[must_use]
pub const fn smol_value(byte: u8) -> Option<i32> {
    // 0xFF is the null singleton, not smol(127).
    if byte >= 0x40 && byte <= 0xFE {
        Some(byte as i32 - 128)
    } else {
        None
    }
}

/// Byte offset of the prefix in a value head cell.
pub const OFF_PREFIX: usize = 0x05;
/// Byte offset of the inline size prefix (smol length or extended marker).
pub const OFF_SIZE_PREFIX: usize = 0x06;
/// Byte offset of the auxiliary size byte (size-of-size for extended forms).
pub const OFF_SIZE_AUX: usize = 0x07;
/// Byte offset of the 32-bit content size in extended-form head cells.
pub const OFF_SIZE32: usize = 0x08;
/// Byte offset of inline content in short-form strings and numbers.
pub const OFF_SHORT_DATA: usize = 0x08;
/// Inline content capacity of a short-form string head.
pub const SHORT_STRING_CAPACITY: usize = 20;
/// Byte offset of inline content in long-form (chained) heads.
pub const OFF_LONG_DATA: usize = 0x0C;
/// Inline content capacity of a long-form head before the chain.
pub const LONG_HEAD_CAPACITY: usize = 12;
/// Byte offset of the head's link word to the first extension cell.
pub const OFF_LINK: usize = 0x18;
/// Content capacity of one extension cell.
pub const EXT_CAPACITY: usize = 28;
/// Byte offset of an extension cell's link word.
pub const OFF_EXT_LINK: usize = 0x1C;
/// Byte offset of the first inline element reference in arrays/objects.
pub const OFF_ELEMS: usize = 0x0C;
/// Inline element-reference slots in an array/object head.
pub const HEAD_ELEM_SLOTS: usize = 3;
/// Element-reference slots in an array/object extension cell.
pub const EXT_ELEM_SLOTS: usize = 7;
/// Largest extended-integer magnitude stored in a head cell, in bytes.
pub const INT_MAGNITUDE_BYTES: usize = 4;

#[cfg(test)]
mod tests {
    use super::{
        classify_prefix, smol_prefix, smol_value, PrefixKind, PFX_IGNORE, PFX_INERT, PFX_NULL,
        PFX_UNIT, SMOL_MAX, SMOL_MIN,
    };

    #[test]
    fn every_smol_integer_has_a_distinct_prefix() {
        for n in SMOL_MIN..=SMOL_MAX {
            let byte = smol_prefix(n).expect("in-range smol");
            assert_eq!(smol_value(byte), Some(n));
            assert_eq!(classify_prefix(byte), Some(PrefixKind::Smol(n)));
        }
        assert_eq!(smol_prefix(SMOL_MIN - 1), None);
        assert_eq!(smol_prefix(SMOL_MAX + 1), None);
    }

    #[test]
    fn null_prefix_is_not_a_smol_value() {
        assert_eq!(smol_value(PFX_NULL), None);
        assert_eq!(classify_prefix(PFX_NULL), Some(PrefixKind::Null));
    }

    #[test]
    fn extended_integer_pad_families_classify_with_pad_counts() {
        assert_eq!(classify_prefix(0x10), Some(PrefixKind::PosInt { pad: 0 }));
        assert_eq!(classify_prefix(0x14), Some(PrefixKind::PosInt { pad: 4 }));
        assert_eq!(classify_prefix(0x17), Some(PrefixKind::PosInt { pad: 7 }));
        assert_eq!(classify_prefix(0x18), Some(PrefixKind::NegInt { pad: 0 }));
        assert_eq!(classify_prefix(0x1F), Some(PrefixKind::NegInt { pad: 7 }));
    }

    #[test]
    fn internal_prefixes_are_illegal_on_the_wire() {
        assert_eq!(classify_prefix(PFX_INERT), None);
        assert_eq!(classify_prefix(PFX_IGNORE), None);
        assert_eq!(classify_prefix(PFX_UNIT), None);
    }

    #[test]
    fn classification_covers_the_full_byte_range_without_overlap() {
        let mut assigned = 0u32;
        for byte in 0u8..=0xFF {
            if classify_prefix(byte).is_some() {
                assigned += 1;
            }
        }
        // 13 fixed forms, 16 extended-integer forms, 191 smol values.
        assert_eq!(assigned, 13 + 16 + 191);
    }
}
