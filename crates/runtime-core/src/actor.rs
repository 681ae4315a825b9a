//! Actor templates: the closed set of behaviour codes and the generic
//! service actors (forwarders, tags, joins, reply cells).
//!
//! Word 0 of an actor cell holds a tagged [`BehaviourCode`]; the dispatcher
//! does one match on it. Any other word 0 shape is not dispatchable.

use crate::arena::{Arena, Cell, CellRef, Word};
use crate::dispatch::Turn;
use crate::fault::FaultCode;

/// Closed set of behaviour templates recognised by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BehaviourCode {
    /// Self-evaluating data value.
    Value = 1,
    /// Interned symbol; state: name string.
    Symbol = 2,
    /// Kernel pair; state: car, cdr.
    Pair = 3,
    /// Combination continuation; state: customer, operand list, environment.
    CombCont = 4,
    /// Compound operative; state: parameter tree, environment formal, body,
    /// static environment.
    Operative = 5,
    /// Applicative wrapper; state: inner combiner.
    Applicative = 6,
    /// Operand-list evaluation walker.
    Evlis = 7,
    /// Branch continuation; state: customer, consequent, alternative,
    /// environment.
    IfCont = 8,
    /// Definition continuation; state: customer, definiend, environment.
    DefCont = 9,
    /// Body sequence continuation; state: customer, remaining body,
    /// environment.
    SeqCont = 10,
    /// Sequential binder for destructured definitions.
    BindSeq = 11,
    /// Environment binding; state: symbol, value, next.
    Binding = 12,
    /// Child scope over a parent environment.
    Scope = 13,
    /// Terminal environment; lookups fail here.
    EmptyEnv = 14,
    /// Built-in combiner; state: primitive code.
    Prim = 15,
    /// Reply labeller feeding a join; state: join, side.
    Tag = 16,
    /// Two-way join; state: customer, left, right, seen mask.
    Join = 17,
    /// Static forwarder; state: target.
    Fwd = 18,
    /// One-shot reply store read by the host; state: value, answered flag.
    OneShot = 19,
}

impl BehaviourCode {
    /// Converts a raw discriminant back into a behaviour code.
    #[must_use]
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Value),
            2 => Some(Self::Symbol),
            3 => Some(Self::Pair),
            4 => Some(Self::CombCont),
            5 => Some(Self::Operative),
            6 => Some(Self::Applicative),
            7 => Some(Self::Evlis),
            8 => Some(Self::IfCont),
            9 => Some(Self::DefCont),
            10 => Some(Self::SeqCont),
            11 => Some(Self::BindSeq),
            12 => Some(Self::Binding),
            13 => Some(Self::Scope),
            14 => Some(Self::EmptyEnv),
            15 => Some(Self::Prim),
            16 => Some(Self::Tag),
            17 => Some(Self::Join),
            18 => Some(Self::Fwd),
            19 => Some(Self::OneShot),
            _ => None,
        }
    }

    /// Returns the tagged word stored in an actor cell's entry slot.
    #[must_use]
    pub const fn word(self) -> Word {
        Word::from_int(self as i32)
    }

    /// Reads the behaviour code of the cell behind `r`, if it has one.
    #[must_use]
    pub fn of_cell(arena: &Arena, r: CellRef) -> Option<Self> {
        let entry = Word::from_raw(arena.cell(r).word(0));
        entry.as_int().and_then(Self::from_i32)
    }

    /// Behaviours that may stand at the head of a combination.
    #[must_use]
    pub const fn is_combiner(self) -> bool {
        matches!(self, Self::Operative | Self::Applicative | Self::Prim)
    }

    /// Behaviours that form the environment chain.
    #[must_use]
    pub const fn is_environment(self) -> bool {
        matches!(self, Self::Binding | Self::Scope | Self::EmptyEnv)
    }
}

/// Writes an actor image (entry word plus up to seven state words) into a
/// cell.
pub fn init_actor(cell: &mut Cell, code: BehaviourCode, state: &[Word]) {
    debug_assert!(state.len() < 8);
    *cell = Cell::ZERO;
    cell.set_word(0, code.word().raw());
    for (i, word) in state.iter().enumerate() {
        cell.set_word(i + 1, word.raw());
    }
}

/// Tag side marker for the left input of a join.
pub const TAG_LEFT: i32 = 0;
/// Tag side marker for the right input of a join.
pub const TAG_RIGHT: i32 = 1;

/// Tag behaviour: label the incoming reply with this tag's side and pass it
/// to the join, then retire.
pub fn tag_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let join = t
        .state(1)
        .as_cell()
        .ok_or(FaultCode::WrongActorType)?;
    let side = t.state(2);
    let value = t.arg(1);
    t.send(join, &[side, value])?;
    t.release_self();
    Ok(())
}

/// Join behaviour: collect both labelled replies in either arrival order,
/// then forward `(left, right)` to the customer and retire.
pub fn join_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t
        .state(1)
        .as_cell()
        .ok_or(FaultCode::WrongActorType)?;
    let mut left = t.state(2);
    let mut right = t.state(3);
    let mut seen = t.state(4).as_int().unwrap_or(0);

    let side = t.arg(1).as_int().ok_or(FaultCode::WrongActorType)?;
    let value = t.arg(2);
    match side {
        TAG_LEFT => {
            left = value;
            seen |= 1;
        }
        TAG_RIGHT => {
            right = value;
            seen |= 2;
        }
        _ => return Err(FaultCode::WrongActorType),
    }

    if seen == 3 {
        t.send(cust, &[left, right])?;
        t.release_self();
    } else {
        t.become_with(
            BehaviourCode::Join,
            &[Word::from_cell(cust), left, right, Word::from_int(seen)],
        );
    }
    Ok(())
}

/// Forwarder behaviour: pass the whole message unchanged to the stored
/// target.
pub fn fwd_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let target = t
        .state(1)
        .as_cell()
        .ok_or(FaultCode::WrongActorType)?;
    let msg = [
        t.arg(1),
        t.arg(2),
        t.arg(3),
        t.arg(4),
        t.arg(5),
        t.arg(6),
        t.arg(7),
    ];
    t.send(target, &msg)
}

/// One-shot reply store: latch the first two words of the first message
/// for the host and ignore everything after it.
pub fn one_shot_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    if t.state(2).as_int() == Some(1) {
        return Ok(());
    }
    let first = t.arg(1);
    let second = t.arg(2);
    t.become_with(
        BehaviourCode::OneShot,
        &[first, Word::from_int(1), second],
    );
    Ok(())
}

/// Reads a latched one-shot reply, if one arrived.
#[must_use]
pub fn one_shot_reply(arena: &Arena, cell: CellRef) -> Option<Word> {
    one_shot_reply_pair(arena, cell).map(|(first, _)| first)
}

/// Reads both latched words of a one-shot reply, if one arrived.
#[must_use]
pub fn one_shot_reply_pair(arena: &Arena, cell: CellRef) -> Option<(Word, Word)> {
    let image = arena.cell(cell);
    if Word::from_raw(image.word(2)).as_int() == Some(1) {
        Some((Word::from_raw(image.word(1)), Word::from_raw(image.word(3))))
    } else {
        None
    }
}
