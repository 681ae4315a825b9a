//! The evaluation protocol: selectors, evaluator behaviours, built-in
//! combiners, and the ground environment.
//!
//! Values evaluate by receiving `(cust, EVAL, env)`. A deep evaluation
//! never grows a call stack; every step is one message send, so tail
//! recursion is bounded only by the event ring.

#![allow(clippy::pedantic, clippy::nursery, clippy::similar_names)]

use crate::actor::BehaviourCode;
use crate::arena::{Arena, CellRef, Word};
use crate::dispatch::Turn;
use crate::fault::FaultCode;
use crate::kernel::{list_items, pair_parts};
use crate::runtime::Runtime;
use crate::value::{self, IGNORE, INERT, UNIT};

/// Message selector tags carried in the second message word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Selector {
    /// `(cust, EVAL, env)` — evaluate the receiver.
    Eval = 1,
    /// `(cust, APPLY, operands, env)` — apply the receiving combiner.
    Apply = 2,
    /// `(cust, LOOKUP, sym)` — look a symbol up in the receiving
    /// environment.
    Lookup = 3,
    /// `(cust, BIND, sym, value)` — bind into the receiving environment.
    Bind = 4,
    /// `(cust, UNWRAP)` — unwrap the receiving applicative.
    Unwrap = 5,
}

impl Selector {
    /// Returns the tagged message word for this selector.
    #[must_use]
    pub const fn word(self) -> Word {
        Word::from_int(self as i32)
    }

    /// Classifies a message word as a selector.
    #[must_use]
    pub const fn from_word(w: Word) -> Option<Self> {
        match w.as_int() {
            Some(1) => Some(Self::Eval),
            Some(2) => Some(Self::Apply),
            Some(3) => Some(Self::Lookup),
            Some(4) => Some(Self::Bind),
            Some(5) => Some(Self::Unwrap),
            _ => None,
        }
    }
}

/// Built-in combiner codes carried in a primitive actor's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PrimCode {
    /// `$define!` — bind in the caller's environment.
    Define = 1,
    /// `$vau` — construct a compound operative.
    Vau = 2,
    /// `$lambda` — construct an applicative over a fresh operative.
    Lambda = 3,
    /// `$if` — two-armed conditional.
    If = 4,
    /// `$sequence` — evaluate body forms left to right.
    Sequence = 5,
    /// `wrap` — wrap a combiner as an applicative.
    Wrap = 6,
    /// `unwrap` — expose an applicative's inner combiner.
    Unwrap = 7,
    /// `eval` — first-class evaluation.
    Evaluate = 8,
    /// `make-environment` — fresh scope, optionally over a parent.
    MakeEnv = 9,
    /// `cons` — allocate a pair.
    Cons = 10,
    /// `car` — head of a pair.
    Car = 11,
    /// `cdr` — tail of a pair.
    Cdr = 12,
    /// `list` — collect evaluated arguments.
    List = 13,
    /// `eq?` — identity (and numeric) equality.
    IsEq = 14,
    /// `=?` — numeric equality.
    NumEq = 15,
    /// `+` — integer sum.
    Add = 16,
    /// `-` — integer difference or negation.
    Sub = 17,
    /// `*` — integer product.
    Mul = 18,
    /// `<?` — strict ascending order.
    Lt = 19,
    /// `exit` — ask the host to stop the REPL.
    Exit = 20,
}

impl PrimCode {
    /// Returns the tagged state word for this primitive.
    #[must_use]
    pub const fn word(self) -> Word {
        Word::from_int(self as i32)
    }

    /// Classifies a state word as a primitive code.
    #[must_use]
    pub const fn from_word(w: Word) -> Option<Self> {
        match w.as_int() {
            Some(1) => Some(Self::Define),
            Some(2) => Some(Self::Vau),
            Some(3) => Some(Self::Lambda),
            Some(4) => Some(Self::If),
            Some(5) => Some(Self::Sequence),
            Some(6) => Some(Self::Wrap),
            Some(7) => Some(Self::Unwrap),
            Some(8) => Some(Self::Evaluate),
            Some(9) => Some(Self::MakeEnv),
            Some(10) => Some(Self::Cons),
            Some(11) => Some(Self::Car),
            Some(12) => Some(Self::Cdr),
            Some(13) => Some(Self::List),
            Some(14) => Some(Self::IsEq),
            Some(15) => Some(Self::NumEq),
            Some(16) => Some(Self::Add),
            Some(17) => Some(Self::Sub),
            Some(18) => Some(Self::Mul),
            Some(19) => Some(Self::Lt),
            Some(20) => Some(Self::Exit),
            _ => None,
        }
    }
}

fn environment_cell(t: &Turn<'_>, w: Word) -> Result<CellRef, FaultCode> {
    let env = w.as_cell().ok_or(FaultCode::NotEnvironment)?;
    match BehaviourCode::of_cell(t.arena_ref(), env) {
        Some(code) if code.is_environment() => Ok(env),
        _ => Err(FaultCode::NotEnvironment),
    }
}

/// Self-evaluating data value.
pub fn value_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1).as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Eval) => {
            let me = t.self_ref();
            t.send(cust, &[Word::from_cell(me)])
        }
        Some(Selector::Apply) => Err(FaultCode::NotCombiner),
        Some(Selector::Unwrap) => Err(FaultCode::NotApplicative),
        Some(Selector::Lookup | Selector::Bind) => Err(FaultCode::NotEnvironment),
        None => Err(FaultCode::WrongActorType),
    }
}

/// Symbol: evaluation is a lookup in the evaluation environment.
pub fn symbol_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1);
    cust.as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Eval) => {
            let env = environment_cell(t, t.arg(3))?;
            let me = t.self_ref();
            t.send(env, &[cust, Selector::Lookup.word(), Word::from_cell(me)])
        }
        Some(Selector::Apply) => Err(FaultCode::NotCombiner),
        Some(Selector::Unwrap) => Err(FaultCode::NotApplicative),
        Some(Selector::Lookup | Selector::Bind) => Err(FaultCode::NotEnvironment),
        None => Err(FaultCode::WrongActorType),
    }
}

/// Pair: evaluate the head, then apply the resulting combiner.
pub fn pair_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1);
    cust.as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Eval) => {
            let env = environment_cell(t, t.arg(3))?;
            let car = t.state(1).as_cell().ok_or(FaultCode::Panic)?;
            let cdr = t.state(2);
            let k_comb = t.spawn(
                BehaviourCode::CombCont,
                &[cust, cdr, Word::from_cell(env)],
            )?;
            t.send(
                car,
                &[
                    Word::from_cell(k_comb),
                    Selector::Eval.word(),
                    Word::from_cell(env),
                ],
            )
        }
        Some(Selector::Apply) => Err(FaultCode::NotCombiner),
        Some(Selector::Unwrap) => Err(FaultCode::NotApplicative),
        Some(Selector::Lookup | Selector::Bind) => Err(FaultCode::NotEnvironment),
        None => Err(FaultCode::WrongActorType),
    }
}

/// Combination continuation: got the combiner, forward the application.
pub fn comb_cont_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let combiner = t.arg(1).as_cell().ok_or(FaultCode::NotCombiner)?;
    let cust = t.state(1);
    let operands = t.state(2);
    let env = t.state(3);
    t.send(combiner, &[cust, Selector::Apply.word(), operands, env])?;
    t.release_self();
    Ok(())
}

fn match_ptree(
    arena: &Arena,
    ptree: CellRef,
    operands: CellRef,
    out: &mut Vec<(CellRef, CellRef)>,
) -> Result<(), FaultCode> {
    if ptree == IGNORE {
        return Ok(());
    }
    if ptree == UNIT {
        return if operands == UNIT {
            Ok(())
        } else {
            Err(FaultCode::WrongActorType)
        };
    }
    match BehaviourCode::of_cell(arena, ptree) {
        Some(BehaviourCode::Symbol) => {
            out.push((ptree, operands));
            Ok(())
        }
        Some(BehaviourCode::Pair) => {
            let (p_car, p_cdr) = pair_parts(arena, ptree).ok_or(FaultCode::Panic)?;
            let (o_car, o_cdr) =
                pair_parts(arena, operands).ok_or(FaultCode::WrongActorType)?;
            match_ptree(arena, p_car, o_car, out)?;
            match_ptree(arena, p_cdr, o_cdr, out)
        }
        _ => Err(FaultCode::WrongActorType),
    }
}

/// Evaluates a body list in `env`, replying the last result to `cust`.
fn eval_body(t: &mut Turn<'_>, cust: Word, body: Word, env: CellRef) -> Result<(), FaultCode> {
    let body = body.as_cell().ok_or(FaultCode::WrongActorType)?;
    if body == UNIT {
        let target = cust.as_cell().ok_or(FaultCode::WrongActorType)?;
        return t.send(target, &[Word::from_cell(INERT)]);
    }
    let (first, rest) = pair_parts(t.arena_ref(), body).ok_or(FaultCode::WrongActorType)?;
    if rest == UNIT {
        return t.send(first, &[cust, Selector::Eval.word(), Word::from_cell(env)]);
    }
    let k = t.spawn(
        BehaviourCode::SeqCont,
        &[cust, Word::from_cell(rest), Word::from_cell(env)],
    )?;
    t.send(
        first,
        &[
            Word::from_cell(k),
            Selector::Eval.word(),
            Word::from_cell(env),
        ],
    )
}

/// Compound operative: bind the parameter tree over the static environment
/// and evaluate the body.
pub fn operative_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1);
    cust.as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Eval) => {
            let me = t.self_ref();
            t.send(cust.as_cell().ok_or(FaultCode::WrongActorType)?, &[Word::from_cell(me)])
        }
        Some(Selector::Apply) => {
            let operands = t.arg(3).as_cell().ok_or(FaultCode::WrongActorType)?;
            let dyn_env = environment_cell(t, t.arg(4))?;
            let ptree = t.state(1).as_cell().ok_or(FaultCode::Panic)?;
            let eformal = t.state(2).as_cell().ok_or(FaultCode::Panic)?;
            let body = t.state(3);
            let senv = t.state(4);

            let mut bindings = Vec::new();
            match_ptree(t.arena_ref(), ptree, operands, &mut bindings)?;

            let mut env = t.spawn(BehaviourCode::Scope, &[senv])?;
            if eformal != IGNORE {
                env = t.spawn(
                    BehaviourCode::Binding,
                    &[
                        Word::from_cell(eformal),
                        Word::from_cell(dyn_env),
                        Word::from_cell(env),
                    ],
                )?;
            }
            for (sym, val) in bindings {
                env = t.spawn(
                    BehaviourCode::Binding,
                    &[
                        Word::from_cell(sym),
                        Word::from_cell(val),
                        Word::from_cell(env),
                    ],
                )?;
            }
            eval_body(t, cust, body, env)
        }
        Some(Selector::Unwrap) => Err(FaultCode::NotApplicative),
        Some(Selector::Lookup | Selector::Bind) => Err(FaultCode::NotEnvironment),
        None => Err(FaultCode::WrongActorType),
    }
}

/// Applicative: evaluate the operand list, then apply the inner combiner.
pub fn applicative_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1);
    let cust_cell = cust.as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Eval) => {
            let me = t.self_ref();
            t.send(cust_cell, &[Word::from_cell(me)])
        }
        Some(Selector::Unwrap) => {
            let inner = t.state(1);
            t.send(cust_cell, &[inner])
        }
        Some(Selector::Apply) => {
            let operands = t.arg(3).as_cell().ok_or(FaultCode::WrongActorType)?;
            let env = environment_cell(t, t.arg(4))?;
            let inner = t.state(1).as_cell().ok_or(FaultCode::Panic)?;
            if operands == UNIT {
                return t.send(
                    inner,
                    &[
                        cust,
                        Selector::Apply.word(),
                        Word::from_cell(UNIT),
                        Word::from_cell(env),
                    ],
                );
            }
            let (first, rest) =
                pair_parts(t.arena_ref(), operands).ok_or(FaultCode::WrongActorType)?;
            let walker = t.spawn(
                BehaviourCode::Evlis,
                &[
                    cust,
                    Word::from_cell(inner),
                    Word::from_cell(env),
                    Word::from_cell(rest),
                    Word::from_cell(UNIT),
                ],
            )?;
            t.send(
                first,
                &[
                    Word::from_cell(walker),
                    Selector::Eval.word(),
                    Word::from_cell(env),
                ],
            )
        }
        Some(Selector::Lookup | Selector::Bind) => Err(FaultCode::NotEnvironment),
        None => Err(FaultCode::WrongActorType),
    }
}

/// Operand walker: collect one evaluated element, then continue or apply.
///
/// Elements accumulate in reverse through fresh pairs owned by this
/// walker; no cell written before the current turn is ever touched, so an
/// abort anywhere in the walk rolls back cleanly. The final turn re-packs
/// the list in evaluation order and retires the reversed spine.
pub fn evlis_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let element = t.arg(1).as_cell().ok_or(FaultCode::WrongActorType)?;
    let cust = t.state(1);
    let inner = t.state(2).as_cell().ok_or(FaultCode::Panic)?;
    let env = t.state(3);
    let remaining = t.state(4).as_cell().ok_or(FaultCode::Panic)?;
    let acc = t.state(5).as_cell().ok_or(FaultCode::Panic)?;

    let reversed = t.spawn(
        BehaviourCode::Pair,
        &[Word::from_cell(element), Word::from_cell(acc)],
    )?;

    if remaining == UNIT {
        let mut list = UNIT;
        let mut rev = reversed;
        while rev != UNIT {
            let (car, cdr) = pair_parts(t.arena_ref(), rev).ok_or(FaultCode::Panic)?;
            list = t.spawn(
                BehaviourCode::Pair,
                &[Word::from_cell(car), Word::from_cell(list)],
            )?;
            t.release(rev);
            rev = cdr;
        }
        t.send(
            inner,
            &[cust, Selector::Apply.word(), Word::from_cell(list), env],
        )?;
        t.release_self();
        return Ok(());
    }

    let (next, rest) = pair_parts(t.arena_ref(), remaining).ok_or(FaultCode::WrongActorType)?;
    let me = t.self_ref();
    t.become_with(
        BehaviourCode::Evlis,
        &[
            cust,
            Word::from_cell(inner),
            env,
            Word::from_cell(rest),
            Word::from_cell(reversed),
        ],
    );
    t.send(next, &[Word::from_cell(me), Selector::Eval.word(), env])
}

/// Branch continuation: pick the consequent or alternative by the test
/// result.
pub fn if_cont_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let test = t.arg(1).as_cell().ok_or(FaultCode::WrongActorType)?;
    let cust = t.state(1);
    let consequent = t.state(2).as_cell().ok_or(FaultCode::Panic)?;
    let alternative = t.state(3).as_cell().ok_or(FaultCode::Panic)?;
    let env = t.state(4);

    let chosen = if test == value::TRUE_VALUE {
        consequent
    } else if test == value::FALSE_VALUE {
        alternative
    } else {
        return Err(FaultCode::WrongActorType);
    };
    t.send(chosen, &[cust, Selector::Eval.word(), env])?;
    t.release_self();
    Ok(())
}

/// Definition continuation: got the value, destructure and bind it.
pub fn def_cont_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let val = t.arg(1).as_cell().ok_or(FaultCode::WrongActorType)?;
    let cust = t.state(1);
    let definiend = t.state(2).as_cell().ok_or(FaultCode::Panic)?;
    let env = t.state(3);

    let mut bindings = Vec::new();
    match_ptree(t.arena_ref(), definiend, val, &mut bindings)?;

    if bindings.is_empty() {
        let target = cust.as_cell().ok_or(FaultCode::WrongActorType)?;
        t.send(target, &[Word::from_cell(INERT)])?;
        t.release_self();
        return Ok(());
    }

    // Thread the binds one at a time through this cell, reusing it as the
    // sequential binder.
    let mut pending = UNIT;
    for (sym, val) in bindings.iter().rev() {
        let item = t.spawn(
            BehaviourCode::Pair,
            &[Word::from_cell(*sym), Word::from_cell(*val)],
        )?;
        pending = t.spawn(
            BehaviourCode::Pair,
            &[Word::from_cell(item), Word::from_cell(pending)],
        )?;
    }
    let me = t.self_ref();
    t.become_with(
        BehaviourCode::BindSeq,
        &[cust, Word::from_cell(pending), env],
    );
    t.send(me, &[Word::from_cell(INERT)])
}

/// Sequential binder: issue one `BIND` per pending pair, then reply inert.
pub fn bind_seq_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.state(1);
    let pending = t.state(2).as_cell().ok_or(FaultCode::Panic)?;
    let env = t.state(3).as_cell().ok_or(FaultCode::Panic)?;

    if pending == UNIT {
        let target = cust.as_cell().ok_or(FaultCode::WrongActorType)?;
        t.send(target, &[Word::from_cell(INERT)])?;
        t.release_self();
        return Ok(());
    }

    let (item, rest) = pair_parts(t.arena_ref(), pending).ok_or(FaultCode::Panic)?;
    let (sym, val) = pair_parts(t.arena_ref(), item).ok_or(FaultCode::Panic)?;
    let me = t.self_ref();
    let env_word = t.state(3);
    t.become_with(
        BehaviourCode::BindSeq,
        &[cust, Word::from_cell(rest), env_word],
    );
    t.release(item);
    t.release(pending);
    t.send(
        env,
        &[
            Word::from_cell(me),
            Selector::Bind.word(),
            Word::from_cell(sym),
            Word::from_cell(val),
        ],
    )
}

/// Body sequence continuation: discard the previous result, evaluate the
/// next form.
pub fn seq_cont_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.state(1);
    let remaining = t.state(2).as_cell().ok_or(FaultCode::Panic)?;
    let env = t.state(3);

    let (first, rest) = pair_parts(t.arena_ref(), remaining).ok_or(FaultCode::Panic)?;
    if rest == UNIT {
        t.send(first, &[cust, Selector::Eval.word(), env])?;
        t.release_self();
        return Ok(());
    }
    let me = t.self_ref();
    t.become_with(BehaviourCode::SeqCont, &[cust, Word::from_cell(rest), env]);
    t.send(first, &[Word::from_cell(me), Selector::Eval.word(), env])
}

fn int_args(arena: &Arena, operands: CellRef) -> Result<Vec<i32>, FaultCode> {
    let items = list_items(arena, operands).ok_or(FaultCode::WrongActorType)?;
    items
        .into_iter()
        .map(|r| value::int_value(arena, r).ok_or(FaultCode::WrongActorType))
        .collect()
}

fn expect_args<const N: usize>(
    arena: &Arena,
    operands: CellRef,
) -> Result<[CellRef; N], FaultCode> {
    let items = list_items(arena, operands).ok_or(FaultCode::WrongActorType)?;
    items
        .try_into()
        .map_err(|_| FaultCode::WrongActorType)
}

fn reply(t: &mut Turn<'_>, cust: Word, value: CellRef) -> Result<(), FaultCode> {
    let target = cust.as_cell().ok_or(FaultCode::WrongActorType)?;
    t.send(target, &[Word::from_cell(value)])
}

#[allow(clippy::too_many_lines)]
fn apply_prim(
    t: &mut Turn<'_>,
    code: PrimCode,
    cust: Word,
    operands: CellRef,
    env: CellRef,
) -> Result<(), FaultCode> {
    match code {
        PrimCode::Define => {
            let [definiend, expr] = expect_args(t.arena_ref(), operands)?;
            let k = t.spawn(
                BehaviourCode::DefCont,
                &[cust, Word::from_cell(definiend), Word::from_cell(env)],
            )?;
            t.send(
                expr,
                &[
                    Word::from_cell(k),
                    Selector::Eval.word(),
                    Word::from_cell(env),
                ],
            )
        }
        PrimCode::Vau => {
            let (ptree, tail) =
                pair_parts(t.arena_ref(), operands).ok_or(FaultCode::WrongActorType)?;
            let (eformal, body) =
                pair_parts(t.arena_ref(), tail).ok_or(FaultCode::WrongActorType)?;
            let is_formal = eformal == IGNORE
                || BehaviourCode::of_cell(t.arena_ref(), eformal)
                    == Some(BehaviourCode::Symbol);
            if !is_formal {
                return Err(FaultCode::WrongActorType);
            }
            let op = t.spawn(
                BehaviourCode::Operative,
                &[
                    Word::from_cell(ptree),
                    Word::from_cell(eformal),
                    Word::from_cell(body),
                    Word::from_cell(env),
                ],
            )?;
            reply(t, cust, op)
        }
        PrimCode::Lambda => {
            let (formals, body) =
                pair_parts(t.arena_ref(), operands).ok_or(FaultCode::WrongActorType)?;
            let op = t.spawn(
                BehaviourCode::Operative,
                &[
                    Word::from_cell(formals),
                    Word::from_cell(IGNORE),
                    Word::from_cell(body),
                    Word::from_cell(env),
                ],
            )?;
            let app = t.spawn(BehaviourCode::Applicative, &[Word::from_cell(op)])?;
            reply(t, cust, app)
        }
        PrimCode::If => {
            let [test, consequent, alternative] = expect_args(t.arena_ref(), operands)?;
            let k = t.spawn(
                BehaviourCode::IfCont,
                &[
                    cust,
                    Word::from_cell(consequent),
                    Word::from_cell(alternative),
                    Word::from_cell(env),
                ],
            )?;
            t.send(
                test,
                &[
                    Word::from_cell(k),
                    Selector::Eval.word(),
                    Word::from_cell(env),
                ],
            )
        }
        PrimCode::Sequence => eval_body(t, cust, Word::from_cell(operands), env),
        PrimCode::Wrap => {
            let [combiner] = expect_args(t.arena_ref(), operands)?;
            match BehaviourCode::of_cell(t.arena_ref(), combiner) {
                Some(code) if code.is_combiner() => {
                    let app =
                        t.spawn(BehaviourCode::Applicative, &[Word::from_cell(combiner)])?;
                    reply(t, cust, app)
                }
                _ => Err(FaultCode::NotCombiner),
            }
        }
        PrimCode::Unwrap => {
            let [applicative] = expect_args(t.arena_ref(), operands)?;
            if BehaviourCode::of_cell(t.arena_ref(), applicative)
                != Some(BehaviourCode::Applicative)
            {
                return Err(FaultCode::NotApplicative);
            }
            t.send(applicative, &[cust, Selector::Unwrap.word()])
        }
        PrimCode::Evaluate => {
            let [expr, env_arg] = expect_args(t.arena_ref(), operands)?;
            let target_env = environment_cell(t, Word::from_cell(env_arg))?;
            t.send(
                expr,
                &[cust, Selector::Eval.word(), Word::from_cell(target_env)],
            )
        }
        PrimCode::MakeEnv => {
            let items = list_items(t.arena_ref(), operands).ok_or(FaultCode::WrongActorType)?;
            let parent = match items.as_slice() {
                [] => t.spawn(BehaviourCode::EmptyEnv, &[])?,
                [parent] => environment_cell(t, Word::from_cell(*parent))?,
                _ => return Err(FaultCode::WrongActorType),
            };
            let scope = t.spawn(BehaviourCode::Scope, &[Word::from_cell(parent)])?;
            reply(t, cust, scope)
        }
        PrimCode::Cons => {
            let [car, cdr] = expect_args(t.arena_ref(), operands)?;
            let pair = t.spawn(
                BehaviourCode::Pair,
                &[Word::from_cell(car), Word::from_cell(cdr)],
            )?;
            reply(t, cust, pair)
        }
        PrimCode::Car => {
            let [pair] = expect_args(t.arena_ref(), operands)?;
            let (car, _) = pair_parts(t.arena_ref(), pair).ok_or(FaultCode::WrongActorType)?;
            reply(t, cust, car)
        }
        PrimCode::Cdr => {
            let [pair] = expect_args(t.arena_ref(), operands)?;
            let (_, cdr) = pair_parts(t.arena_ref(), pair).ok_or(FaultCode::WrongActorType)?;
            reply(t, cust, cdr)
        }
        PrimCode::List => reply(t, cust, operands),
        PrimCode::IsEq => {
            let [a, b] = expect_args(t.arena_ref(), operands)?;
            let eq = a == b
                || matches!(
                    (
                        value::int_value(t.arena_ref(), a),
                        value::int_value(t.arena_ref(), b),
                    ),
                    (Some(x), Some(y)) if x == y
                );
            reply(t, cust, value::make_bool(eq))
        }
        PrimCode::NumEq => {
            let args = int_args(t.arena_ref(), operands)?;
            if args.is_empty() {
                return Err(FaultCode::WrongActorType);
            }
            let eq = args.windows(2).all(|w| w[0] == w[1]);
            reply(t, cust, value::make_bool(eq))
        }
        PrimCode::Add | PrimCode::Mul => {
            let args = int_args(t.arena_ref(), operands)?;
            let unit = if code == PrimCode::Add { 0i32 } else { 1i32 };
            let mut acc = unit;
            for n in args {
                acc = if code == PrimCode::Add {
                    acc.checked_add(n)
                } else {
                    acc.checked_mul(n)
                }
                .ok_or(FaultCode::MalformedValue)?;
            }
            let out = value::make_int(t.arena(), acc)?;
            reply(t, cust, out)
        }
        PrimCode::Sub => {
            let args = int_args(t.arena_ref(), operands)?;
            let acc = match args.as_slice() {
                [] => return Err(FaultCode::WrongActorType),
                [only] => only.checked_neg().ok_or(FaultCode::MalformedValue)?,
                [first, rest @ ..] => {
                    let mut acc = *first;
                    for n in rest {
                        acc = acc.checked_sub(*n).ok_or(FaultCode::MalformedValue)?;
                    }
                    acc
                }
            };
            let out = value::make_int(t.arena(), acc)?;
            reply(t, cust, out)
        }
        PrimCode::Lt => {
            let args = int_args(t.arena_ref(), operands)?;
            if args.is_empty() {
                return Err(FaultCode::WrongActorType);
            }
            let ascending = args.windows(2).all(|w| w[0] < w[1]);
            reply(t, cust, value::make_bool(ascending))
        }
        PrimCode::Exit => {
            t.request_exit();
            reply(t, cust, INERT)
        }
    }
}

/// Built-in combiner behaviour.
pub fn prim_beh(t: &mut Turn<'_>) -> Result<(), FaultCode> {
    let cust = t.arg(1);
    let cust_cell = cust.as_cell().ok_or(FaultCode::WrongActorType)?;
    match Selector::from_word(t.arg(2)) {
        Some(Selector::Eval) => {
            let me = t.self_ref();
            t.send(cust_cell, &[Word::from_cell(me)])
        }
        Some(Selector::Apply) => {
            let operands = t.arg(3).as_cell().ok_or(FaultCode::WrongActorType)?;
            let env = environment_cell(t, t.arg(4))?;
            let code = PrimCode::from_word(t.state(1)).ok_or(FaultCode::Panic)?;
            apply_prim(t, code, cust, operands, env)
        }
        Some(Selector::Unwrap) => Err(FaultCode::NotApplicative),
        Some(Selector::Lookup | Selector::Bind) => Err(FaultCode::NotEnvironment),
        None => Err(FaultCode::WrongActorType),
    }
}

/// Ground bindings: name, primitive code, and whether the binding is the
/// applicative wrapping of the primitive.
pub const GROUND_BINDINGS: &[(&str, PrimCode, bool)] = &[
    ("$define!", PrimCode::Define, false),
    ("$vau", PrimCode::Vau, false),
    ("$lambda", PrimCode::Lambda, false),
    ("$if", PrimCode::If, false),
    ("$sequence", PrimCode::Sequence, false),
    ("wrap", PrimCode::Wrap, true),
    ("unwrap", PrimCode::Unwrap, true),
    ("eval", PrimCode::Evaluate, true),
    ("make-environment", PrimCode::MakeEnv, true),
    ("cons", PrimCode::Cons, true),
    ("car", PrimCode::Car, true),
    ("cdr", PrimCode::Cdr, true),
    ("list", PrimCode::List, true),
    ("eq?", PrimCode::IsEq, true),
    ("=?", PrimCode::NumEq, true),
    ("+", PrimCode::Add, true),
    ("-", PrimCode::Sub, true),
    ("*", PrimCode::Mul, true),
    ("<?", PrimCode::Lt, true),
    ("exit", PrimCode::Exit, true),
];

/// Builds the ground environment: a scope over the chain of built-in
/// bindings.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfMemory`] when the pool cannot hold the ground
/// chain.
pub fn make_ground_env(rt: &mut Runtime) -> Result<CellRef, FaultCode> {
    let mut env = rt.spawn(BehaviourCode::EmptyEnv, &[])?;
    for (name, code, wrapped) in GROUND_BINDINGS {
        let sym = rt.intern(name)?;
        let prim = rt.spawn(BehaviourCode::Prim, &[code.word()])?;
        let value = if *wrapped {
            rt.spawn(BehaviourCode::Applicative, &[Word::from_cell(prim)])?
        } else {
            prim
        };
        env = rt.spawn(
            BehaviourCode::Binding,
            &[
                Word::from_cell(sym),
                Word::from_cell(value),
                Word::from_cell(env),
            ],
        )?;
    }
    rt.spawn(BehaviourCode::Scope, &[Word::from_cell(env)])
}
