//! Read-eval-print driver over the console surface.
//!
//! Each form is read, sent `(cust, EVAL, ground)` with a one-shot reply
//! cell as the customer, and the queue is drained. A recoverable fault (or
//! a drained queue with no reply) prints `#<ERROR>` and returns to the
//! prompt; output already emitted is not rewound.

use crate::actor::{one_shot_reply, BehaviourCode};
use crate::arena::Word;
use crate::console::{Clock, Console};
use crate::fault::FaultCode;
use crate::kernel::eval::Selector;
use crate::kernel::print::print_value;
use crate::kernel::reader::{ReadErrorKind, Reader};
use crate::runtime::Runtime;

/// Text printed for any recoverable evaluation or read error.
pub const ERROR_TEXT: &str = "#<ERROR>";

/// Prompt printed before each form.
pub const PROMPT: &str = "> ";

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Input ended cleanly.
    EndOfInput,
    /// An evaluated form requested termination.
    ExitRequested,
    /// A terminal fault latched the runtime.
    Fatal(FaultCode),
}

/// Aggregate outcome of one driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplOutcome {
    /// Forms read and evaluated.
    pub forms: u64,
    /// Forms that ended in `#<ERROR>`.
    pub errors: u64,
    /// Wall time consumed, by the host clock.
    pub elapsed_us: u64,
    /// Why the loop ended.
    pub exit: ExitReason,
}

impl ReplOutcome {
    /// Process exit status for the host binary.
    #[must_use]
    pub const fn status(&self) -> i32 {
        match self.exit {
            ExitReason::EndOfInput | ExitReason::ExitRequested => 0,
            ExitReason::Fatal(_) => 1,
        }
    }
}

fn put_text(console: &mut dyn Console, text: &str) {
    for byte in text.bytes() {
        console.putc(byte);
    }
}

fn read_line(console: &mut dyn Console) -> Option<String> {
    let mut line = Vec::new();
    loop {
        match console.getc() {
            None => {
                if line.is_empty() {
                    return None;
                }
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            Some(b'\n') => {
                line.push(b'\n');
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            Some(b) => line.push(b),
        }
    }
}

enum ReadOutcome {
    Form(crate::arena::CellRef),
    EndOfInput,
    ReadError,
}

/// Accumulates lines until the buffer holds one complete form.
fn read_one_form(rt: &mut Runtime, console: &mut dyn Console, buffer: &mut String) -> ReadOutcome {
    loop {
        let (parsed, consumed) = {
            let mut reader = Reader::new(buffer);
            let parsed = reader.read_form(rt);
            (parsed, reader.position())
        };
        match parsed {
            Ok(Some(form)) => {
                buffer.drain(..consumed);
                return ReadOutcome::Form(form);
            }
            Ok(None) => match read_line(console) {
                Some(line) => buffer.push_str(&line),
                None => return ReadOutcome::EndOfInput,
            },
            Err(e)
                if matches!(
                    e.kind,
                    ReadErrorKind::UnexpectedEnd | ReadErrorKind::UnterminatedString
                ) =>
            {
                match read_line(console) {
                    Some(line) => buffer.push_str(&line),
                    None => {
                        buffer.clear();
                        return ReadOutcome::ReadError;
                    }
                }
            }
            Err(_) => {
                buffer.clear();
                return ReadOutcome::ReadError;
            }
        }
    }
}

/// Runs the read-eval-print loop until end of input, `(exit)`, or a
/// terminal fault.
pub fn run(rt: &mut Runtime, console: &mut dyn Console, clock: &dyn Clock) -> ReplOutcome {
    drive(rt, console, clock, true)
}

/// Runs the loop without prompts, for scripted input.
pub fn run_script(rt: &mut Runtime, console: &mut dyn Console, clock: &dyn Clock) -> ReplOutcome {
    drive(rt, console, clock, false)
}

fn drive(
    rt: &mut Runtime,
    console: &mut dyn Console,
    clock: &dyn Clock,
    prompt: bool,
) -> ReplOutcome {
    let started = clock.now_us();
    let mut outcome = ReplOutcome {
        forms: 0,
        errors: 0,
        elapsed_us: 0,
        exit: ExitReason::EndOfInput,
    };
    let mut buffer = String::new();

    loop {
        if prompt {
            put_text(console, PROMPT);
            console.flush();
        }

        let form = match read_one_form(rt, console, &mut buffer) {
            ReadOutcome::Form(form) => form,
            ReadOutcome::EndOfInput => break,
            ReadOutcome::ReadError => {
                outcome.errors += 1;
                put_text(console, ERROR_TEXT);
                put_text(console, "\n");
                continue;
            }
        };
        outcome.forms += 1;

        let evaluated = evaluate_form(rt, form);
        match evaluated {
            Ok(Some(reply)) => {
                if rt.exit_requested() {
                    outcome.exit = ExitReason::ExitRequested;
                    break;
                }
                put_text(console, &print_value(rt, reply));
                put_text(console, "\n");
            }
            Ok(None) => {
                outcome.errors += 1;
                put_text(console, ERROR_TEXT);
                put_text(console, "\n");
            }
            Err(fatal) => {
                outcome.exit = ExitReason::Fatal(fatal);
                break;
            }
        }
        console.flush();
    }

    console.flush();
    outcome.elapsed_us = clock.now_us().saturating_sub(started);
    outcome
}

/// Evaluates one form in the ground environment.
///
/// `Ok(Some(value))` is a reply, `Ok(None)` a recoverable error, `Err` a
/// terminal fault.
fn evaluate_form(
    rt: &mut Runtime,
    form: crate::arena::CellRef,
) -> Result<Option<crate::arena::CellRef>, FaultCode> {
    let cust = match rt.spawn(BehaviourCode::OneShot, &[]) {
        Ok(cust) => cust,
        Err(FaultCode::OutOfMemory) => return Ok(None),
        Err(fatal) => return Err(fatal),
    };
    let ground = rt.ground();
    let sent = rt.inject(
        form,
        &[
            Word::from_cell(cust),
            Selector::Eval.word(),
            Word::from_cell(ground),
        ],
    );
    if sent.is_err() {
        rt.arena_mut().release(cust);
        return Ok(None);
    }

    rt.run_until_idle();
    if let Some(fatal) = rt.latched_fault() {
        return Err(fatal);
    }

    let reply = one_shot_reply(rt.arena(), cust).and_then(Word::as_cell);
    rt.arena_mut().release(cust);
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::{run, ExitReason};
    use crate::config::RuntimeConfig;
    use crate::console::{CaptureConsole, StepClock};
    use crate::runtime::Runtime;

    fn run_script(script: &str) -> (super::ReplOutcome, String) {
        let mut rt = Runtime::new(RuntimeConfig::default()).expect("runtime");
        let mut console = CaptureConsole::with_input(script);
        let clock = StepClock::default();
        let outcome = run(&mut rt, &mut console, &clock);
        (outcome, console.output_text())
    }

    #[test]
    fn arithmetic_prints_its_result() {
        let (outcome, output) = run_script("(+ 1 2 3)\n");
        assert_eq!(outcome.forms, 1);
        assert_eq!(outcome.errors, 0);
        assert_eq!(outcome.exit, ExitReason::EndOfInput);
        assert!(output.contains("6\n"), "output was {output:?}");
    }

    #[test]
    fn errors_print_and_the_prompt_returns() {
        let (outcome, output) = run_script("unbound-name\n(+ 1 1)\n");
        assert_eq!(outcome.forms, 2);
        assert_eq!(outcome.errors, 1);
        assert!(output.contains("#<ERROR>\n"), "output was {output:?}");
        assert!(output.contains("2\n"), "output was {output:?}");
    }

    #[test]
    fn exit_ends_the_loop_with_clean_status() {
        let (outcome, output) = run_script("(exit)\n(+ 1 1)\n");
        assert_eq!(outcome.exit, ExitReason::ExitRequested);
        assert_eq!(outcome.status(), 0);
        // Nothing after (exit) is evaluated.
        assert!(!output.contains('2'), "output was {output:?}");
    }

    #[test]
    fn forms_may_span_lines() {
        let (outcome, output) = run_script("(+ 1\n   2)\n");
        assert_eq!(outcome.forms, 1);
        assert!(output.contains("3\n"), "output was {output:?}");
    }

    #[test]
    fn several_forms_on_one_line_all_evaluate() {
        let (outcome, output) = run_script("(+ 1 1) (+ 2 2)\n");
        assert_eq!(outcome.forms, 2);
        assert!(output.contains("2\n"), "output was {output:?}");
        assert!(output.contains("4\n"), "output was {output:?}");
    }

    #[test]
    fn read_errors_recover_at_the_prompt() {
        let (outcome, output) = run_script(")\n(+ 2 2)\n");
        assert_eq!(outcome.errors, 1);
        assert!(output.contains("#<ERROR>\n"), "output was {output:?}");
        assert!(output.contains("4\n"), "output was {output:?}");
    }
}
