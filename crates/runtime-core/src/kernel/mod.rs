//! Kernel evaluator layered on the actor runtime: environments, the
//! evaluation protocol, the s-expression reader, and the plain printer.

pub mod env;
pub mod eval;
pub mod print;
pub mod reader;

use crate::actor::{self, BehaviourCode};
use crate::arena::{Arena, CellRef, Word};
use crate::fault::FaultCode;
use crate::value::UNIT;

/// Allocates a kernel pair cell.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
pub fn make_pair(arena: &mut Arena, car: CellRef, cdr: CellRef) -> Result<CellRef, FaultCode> {
    let r = arena.reserve()?;
    actor::init_actor(
        arena.cell_mut(r),
        BehaviourCode::Pair,
        &[Word::from_cell(car), Word::from_cell(cdr)],
    );
    Ok(r)
}

/// Splits a pair cell into `(car, cdr)`.
#[must_use]
pub fn pair_parts(arena: &Arena, r: CellRef) -> Option<(CellRef, CellRef)> {
    if BehaviourCode::of_cell(arena, r) != Some(BehaviourCode::Pair) {
        return None;
    }
    let cell = arena.cell(r);
    let car = Word::from_raw(cell.word(1)).as_cell()?;
    let cdr = Word::from_raw(cell.word(2)).as_cell()?;
    Some((car, cdr))
}

/// Builds a proper list from `items`, ending in `()`.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfMemory`] when the pool is exhausted.
pub fn make_list(arena: &mut Arena, items: &[CellRef]) -> Result<CellRef, FaultCode> {
    let mut list = UNIT;
    for item in items.iter().rev() {
        list = make_pair(arena, *item, list)?;
    }
    Ok(list)
}

/// Collects a proper list into a vector; `None` for improper lists.
#[must_use]
pub fn list_items(arena: &Arena, mut list: CellRef) -> Option<Vec<CellRef>> {
    let mut out = Vec::new();
    while list != UNIT {
        let (car, cdr) = pair_parts(arena, list)?;
        out.push(car);
        list = cdr;
    }
    Some(out)
}
