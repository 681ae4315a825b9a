//! Environment chain actors: bindings, scopes, and the terminal
//! environment.
//!
//! An environment is a chain of binding actors. `LOOKUP` walks the chain by
//! forwarding; `BIND` clones the receiving binding into a fresh cell and
//! becomes the new head, so the environment's identity stays stable while
//! its contents grow.

use crate::actor::BehaviourCode;
use crate::arena::Word;
use crate::dispatch::Turn;
use crate::fault::FaultCode;
use crate::kernel::eval::Selector;
use crate::value::INERT;

/// Binding actor: state `(symbol, value, next)`.
pub fn binding_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1).as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Lookup) => {
            let sym = t.arg(3).as_cell().ok_or(FaultCode::WrongActorType)?;
            let my_sym = t.state(1).as_cell().ok_or(FaultCode::Panic)?;
            if sym == my_sym {
                let value = t.state(2);
                t.send(cust, &[value])
            } else {
                let next = t.state(3).as_cell().ok_or(FaultCode::Panic)?;
                let msg = [t.arg(1), t.arg(2), t.arg(3)];
                t.send(next, &msg)
            }
        }
        Some(Selector::Bind) => {
            let sym = t.arg(3).as_cell().ok_or(FaultCode::WrongActorType)?;
            let value = t.arg(4);
            let clone = t.spawn(
                BehaviourCode::Binding,
                &[t.state(1), t.state(2), t.state(3)],
            )?;
            t.become_with(
                BehaviourCode::Binding,
                &[Word::from_cell(sym), value, Word::from_cell(clone)],
            );
            t.send(cust, &[Word::from_cell(INERT)])
        }
        Some(Selector::Eval) => {
            let me = t.self_ref();
            t.send(cust, &[Word::from_cell(me)])
        }
        Some(Selector::Apply) => Err(FaultCode::NotCombiner),
        Some(Selector::Unwrap) => Err(FaultCode::NotApplicative),
        None => Err(FaultCode::WrongActorType),
    }
}

/// Scope actor: a mutable child frame over a parent environment.
pub fn scope_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1).as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Lookup) => {
            let parent = t.state(1).as_cell().ok_or(FaultCode::Panic)?;
            let msg = [t.arg(1), t.arg(2), t.arg(3)];
            t.send(parent, &msg)
        }
        Some(Selector::Bind) => {
            let sym = t.arg(3).as_cell().ok_or(FaultCode::WrongActorType)?;
            let value = t.arg(4);
            let child = t.spawn(BehaviourCode::Scope, &[t.state(1)])?;
            t.become_with(
                BehaviourCode::Binding,
                &[Word::from_cell(sym), value, Word::from_cell(child)],
            );
            t.send(cust, &[Word::from_cell(INERT)])
        }
        Some(Selector::Eval) => {
            let me = t.self_ref();
            t.send(cust, &[Word::from_cell(me)])
        }
        Some(Selector::Apply) => Err(FaultCode::NotCombiner),
        Some(Selector::Unwrap) => Err(FaultCode::NotApplicative),
        None => Err(FaultCode::WrongActorType),
    }
}

/// Terminal environment: every lookup that reaches it fails the turn.
pub fn empty_env_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1).as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Lookup) => Err(FaultCode::UnboundSymbol),
        Some(Selector::Bind) => {
            let sym = t.arg(3).as_cell().ok_or(FaultCode::WrongActorType)?;
            let value = t.arg(4);
            let rest = t.spawn(BehaviourCode::EmptyEnv, &[])?;
            t.become_with(
                BehaviourCode::Binding,
                &[Word::from_cell(sym), value, Word::from_cell(rest)],
            );
            t.send(cust, &[Word::from_cell(INERT)])
        }
        Some(Selector::Eval) => {
            let me = t.self_ref();
            t.send(cust, &[Word::from_cell(me)])
        }
        Some(Selector::Apply) => Err(FaultCode::NotCombiner),
        Some(Selector::Unwrap) => Err(FaultCode::NotApplicative),
        None => Err(FaultCode::WrongActorType),
    }
}
