//! Plain printer for evaluation results.

use crate::actor::BehaviourCode;
use crate::arena::{CellRef, Word};
use crate::json;
use crate::runtime::Runtime;
use crate::value::{FALSE_VALUE, IGNORE, INERT, TRUE_VALUE, UNIT};

/// Renders an evaluation result the way the prompt prints it.
///
/// Data values print as their JSON rendering, kernel constants and
/// combiners by their conventional hash forms, pairs as (possibly dotted)
/// lists.
#[must_use]
pub fn print_value(rt: &Runtime, r: CellRef) -> String {
    match r {
        INERT => return "#inert".to_string(),
        IGNORE => return "#ignore".to_string(),
        UNIT => return "()".to_string(),
        TRUE_VALUE => return "#t".to_string(),
        FALSE_VALUE => return "#f".to_string(),
        _ => {}
    }
    match BehaviourCode::of_cell(rt.arena(), r) {
        Some(BehaviourCode::Value) => {
            json::to_json(rt.arena(), r).unwrap_or_else(|_| "#<value>".to_string())
        }
        Some(BehaviourCode::Symbol) => rt
            .symbol_name(r)
            .unwrap_or_else(|| "#<symbol>".to_string()),
        Some(BehaviourCode::Pair) => print_list(rt, r),
        Some(BehaviourCode::Operative | BehaviourCode::Prim) => "#<operative>".to_string(),
        Some(BehaviourCode::Applicative) => "#<applicative>".to_string(),
        Some(code) if code.is_environment() => "#<environment>".to_string(),
        _ => "#<actor>".to_string(),
    }
}

fn print_list(rt: &Runtime, head: CellRef) -> String {
    let mut out = String::from("(");
    let mut current = head;
    let mut first = true;
    loop {
        if BehaviourCode::of_cell(rt.arena(), current) != Some(BehaviourCode::Pair) {
            break;
        }
        let cell = rt.arena().cell(current);
        let Some(car) = Word::from_raw(cell.word(1)).as_cell() else {
            break;
        };
        let Some(cdr) = Word::from_raw(cell.word(2)).as_cell() else {
            break;
        };
        if !first {
            out.push(' ');
        }
        first = false;
        out.push_str(&print_value(rt, car));
        if cdr == UNIT {
            out.push(')');
            return out;
        }
        if BehaviourCode::of_cell(rt.arena(), cdr) == Some(BehaviourCode::Pair) {
            current = cdr;
        } else {
            out.push_str(" . ");
            out.push_str(&print_value(rt, cdr));
            out.push(')');
            return out;
        }
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::print_value;
    use crate::config::RuntimeConfig;
    use crate::kernel::{make_list, make_pair};
    use crate::runtime::Runtime;
    use crate::value::{make_int, make_string, StrFamily, INERT, TRUE_VALUE, UNIT};

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default()).expect("runtime")
    }

    #[test]
    fn constants_print_their_hash_forms() {
        let rt = runtime();
        assert_eq!(print_value(&rt, INERT), "#inert");
        assert_eq!(print_value(&rt, UNIT), "()");
        assert_eq!(print_value(&rt, TRUE_VALUE), "#t");
    }

    #[test]
    fn lists_print_with_dotted_tails() {
        let mut rt = runtime();
        let one = make_int(rt.arena_mut(), 1).expect("int");
        let two = make_int(rt.arena_mut(), 2).expect("int");
        let sym = rt.intern("x").expect("intern");

        let proper = make_list(rt.arena_mut(), &[one, two, sym]).expect("list");
        assert_eq!(print_value(&rt, proper), "(1 2 x)");

        let dotted = make_pair(rt.arena_mut(), one, two).expect("pair");
        assert_eq!(print_value(&rt, dotted), "(1 . 2)");
    }

    #[test]
    fn values_print_as_json_and_strings_quote() {
        let mut rt = runtime();
        let s = make_string(rt.arena_mut(), StrFamily::Utf8, b"hi").expect("string");
        assert_eq!(print_value(&rt, s), "\"hi\"");
    }

    #[test]
    fn interned_symbols_print_their_names() {
        let mut rt = runtime();
        let plus = rt.intern("+").expect("intern");
        assert_eq!(print_value(&rt, plus), "+");
    }
}
