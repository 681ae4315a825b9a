//! Compact JSON rendering of data values.

use std::fmt::Write as _;

use crate::arena::{Arena, CellRef};
use crate::fault::FaultCode;
use crate::value::iter::StringIterator;
use crate::value::{array_get, array_len, classify_value, object_len, object_pair, ValueKind};

fn push_json_string(arena: &Arena, s: CellRef, out: &mut String) -> Result<(), FaultCode> {
    let mut it = StringIterator::new(arena, s)?;
    out.push('"');
    while let Some(c) = it.read_character(arena) {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(())
}

fn render(arena: &Arena, r: CellRef, out: &mut String) -> Result<(), FaultCode> {
    match classify_value(arena, r).ok_or(FaultCode::WrongActorType)? {
        ValueKind::Null => {
            out.push_str("null");
            Ok(())
        }
        ValueKind::Bool(true) => {
            out.push_str("true");
            Ok(())
        }
        ValueKind::Bool(false) => {
            out.push_str("false");
            Ok(())
        }
        ValueKind::Int(n) => {
            let _ = write!(out, "{n}");
            Ok(())
        }
        ValueKind::Str(_) => push_json_string(arena, r, out),
        ValueKind::Array => {
            let len = array_len(arena, r).ok_or(FaultCode::MalformedValue)?;
            out.push('[');
            for i in 0..len {
                if i > 0 {
                    out.push(',');
                }
                let elem = array_get(arena, r, i).ok_or(FaultCode::MalformedValue)?;
                render(arena, elem, out)?;
            }
            out.push(']');
            Ok(())
        }
        ValueKind::Object => {
            let pairs = object_len(arena, r).ok_or(FaultCode::MalformedValue)?;
            out.push('{');
            for i in 0..pairs {
                if i > 0 {
                    out.push(',');
                }
                let (name, value) = object_pair(arena, r, i).ok_or(FaultCode::MalformedValue)?;
                push_json_string(arena, name, out)?;
                out.push(':');
                render(arena, value, out)?;
            }
            out.push('}');
            Ok(())
        }
        ValueKind::Inert | ValueKind::Ignore | ValueKind::Unit => Err(FaultCode::WrongActorType),
    }
}

/// Renders a data value as compact JSON.
///
/// # Errors
///
/// Returns [`FaultCode::WrongActorType`] when `r` is not a data value (or
/// contains one of the kernel-only singletons).
pub fn to_json(arena: &Arena, r: CellRef) -> Result<String, FaultCode> {
    let mut out = String::new();
    render(arena, r, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::to_json;
    use crate::arena::Arena;
    use crate::fault::FaultCode;
    use crate::value::{
        init_singletons, make_array, make_int, make_object, make_string, StrFamily, FALSE_VALUE,
        INERT, NULL_VALUE, TRUE_VALUE,
    };

    fn arena() -> Arena {
        let mut arena = Arena::new(4096);
        init_singletons(&mut arena);
        arena
    }

    #[test]
    fn scalars_render_to_their_json_forms() {
        let mut arena = arena();
        assert_eq!(to_json(&arena, NULL_VALUE), Ok("null".to_string()));
        assert_eq!(to_json(&arena, TRUE_VALUE), Ok("true".to_string()));
        assert_eq!(to_json(&arena, FALSE_VALUE), Ok("false".to_string()));
        let n = make_int(&mut arena, -40).expect("int");
        assert_eq!(to_json(&arena, n), Ok("-40".to_string()));
    }

    #[test]
    fn strings_escape_controls_and_quotes() {
        let mut arena = arena();
        let s = make_string(&mut arena, StrFamily::Utf8, b"say \"hi\"\n\x01").expect("string");
        assert_eq!(
            to_json(&arena, s),
            Ok("\"say \\\"hi\\\"\\n\\u0001\"".to_string())
        );
    }

    #[test]
    fn nested_object_prints_compactly() {
        let mut arena = arena();
        let k_origin = make_string(&mut arena, StrFamily::Octets, b"origin").expect("str");
        let k_extent = make_string(&mut arena, StrFamily::Octets, b"extent").expect("str");
        let n40 = make_int(&mut arena, -40).expect("int");
        let n20 = make_int(&mut arena, -20).expect("int");
        let n600 = make_int(&mut arena, 600).expect("int");
        let n460 = make_int(&mut arena, 460).expect("int");
        let origin = make_array(&mut arena, &[n40, n20]).expect("array");
        let extent = make_array(&mut arena, &[n600, n460]).expect("array");
        let space =
            make_object(&mut arena, &[(k_origin, origin), (k_extent, extent)]).expect("object");
        let k_space = make_string(&mut arena, StrFamily::Octets, b"space").expect("str");
        let root = make_object(&mut arena, &[(k_space, space)]).expect("object");

        assert_eq!(
            to_json(&arena, root),
            Ok("{\"space\":{\"origin\":[-40,-20],\"extent\":[600,460]}}".to_string())
        );
    }

    #[test]
    fn kernel_singletons_are_not_json() {
        let arena = arena();
        assert_eq!(to_json(&arena, INERT), Err(FaultCode::WrongActorType));
    }
}
