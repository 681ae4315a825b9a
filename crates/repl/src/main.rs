//! CLI entry point for the Mycelia Kernel prompt.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use runtime_core::console::{CaptureConsole, Clock, Console};
use runtime_core::repl::{self, ExitReason};
use runtime_core::{Runtime, RuntimeConfig};

const USAGE_TEXT: &str = "\
Usage: mycelia-repl [options] [script]

Options:
  -e, --eval <expr>   Evaluate one expression and print the result
  --pool-cells <n>    Cell pool capacity (default 65536)
  --queue-slots <n>   Event ring capacity (default 1024)
  -h, --help          Show this help message

With no script and no -e, reads forms interactively from stdin.
";

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Interactive,
    Eval(String),
    Script(PathBuf),
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    mode: Mode,
    config: RuntimeConfig,
}

#[derive(Debug)]
enum ParseResult {
    Run(Args),
    Help,
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut mode: Option<Mode> = None;
    let mut config = RuntimeConfig::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Ok(ParseResult::Help);
        }

        if arg == "-e" || arg == "--eval" {
            let value = args
                .next()
                .ok_or_else(|| "missing expression for -e".to_string())?;
            if mode.is_some() {
                return Err("multiple inputs provided".to_string());
            }
            mode = Some(Mode::Eval(value.to_string_lossy().into_owned()));
            continue;
        }

        if arg == "--pool-cells" {
            config.pool_cells = parse_count(args.next(), "--pool-cells")?;
            continue;
        }

        if arg == "--queue-slots" {
            config.queue_slots = parse_count(args.next(), "--queue-slots")?;
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if mode.is_some() {
            return Err("multiple inputs provided".to_string());
        }
        mode = Some(Mode::Script(PathBuf::from(arg)));
    }

    Ok(ParseResult::Run(Args {
        mode: mode.unwrap_or(Mode::Interactive),
        config,
    }))
}

fn parse_count(value: Option<OsString>, flag: &str) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("missing value for {flag}"))?;
    value
        .to_string_lossy()
        .parse()
        .map_err(|_| format!("bad value for {flag}: {}", value.to_string_lossy()))
}

/// Console over process stdin/stdout.
struct StdConsole {
    out: Vec<u8>,
}

impl StdConsole {
    const fn new() -> Self {
        Self { out: Vec::new() }
    }
}

impl Console for StdConsole {
    fn putc(&mut self, byte: u8) {
        self.out.push(byte);
    }

    fn getc(&mut self) -> Option<u8> {
        // Output must be visible before the read blocks on the user.
        self.flush();
        let mut byte = [0u8; 1];
        match std::io::stdin().lock().read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn flush(&mut self) {
        if self.out.is_empty() {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(&self.out);
        let _ = stdout.flush();
        self.out.clear();
    }
}

/// Monotonic clock over [`Instant`].
struct SystemClock {
    origin: Instant,
}

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

fn run(args: Args) -> i32 {
    let mut rt = match Runtime::new(args.config) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: cannot start runtime: {e}");
            return 1;
        }
    };
    let clock = SystemClock {
        origin: Instant::now(),
    };

    match args.mode {
        Mode::Interactive => {
            let mut console = StdConsole::new();
            let outcome = repl::run(&mut rt, &mut console, &clock);
            console.flush();
            outcome.status()
        }
        Mode::Eval(expr) => run_text(&mut rt, &clock, &expr),
        Mode::Script(path) => match fs::read_to_string(&path) {
            Ok(text) => run_text(&mut rt, &clock, &text),
            Err(e) => {
                eprintln!("error: cannot read {}: {e}", path.display());
                1
            }
        },
    }
}

fn run_text(rt: &mut Runtime, clock: &dyn Clock, text: &str) -> i32 {
    let mut console = CaptureConsole::with_input(text);
    let outcome = repl::run_script(rt, &mut console, clock);
    print!("{}", console.output_text());
    let _ = std::io::stdout().flush();
    if let ExitReason::Fatal(fault) = outcome.exit {
        eprintln!("error: runtime fault: {fault}");
    }
    if outcome.errors > 0 && outcome.status() == 0 {
        // Scripted input with any errored form exits nonzero.
        return 1;
    }
    outcome.status()
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => run(args),
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::{parse_args, Args, Mode, ParseResult};
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Result<ParseResult, String> {
        parse_args(args.iter().map(OsString::from))
    }

    #[test]
    fn no_arguments_means_interactive() {
        let Ok(ParseResult::Run(Args { mode, .. })) = parse(&[]) else {
            panic!("expected run mode");
        };
        assert_eq!(mode, Mode::Interactive);
    }

    #[test]
    fn eval_flag_takes_one_expression() {
        let Ok(ParseResult::Run(Args { mode, .. })) = parse(&["-e", "(+ 1 2)"]) else {
            panic!("expected run mode");
        };
        assert_eq!(mode, Mode::Eval("(+ 1 2)".to_string()));

        let error = parse(&["-e"]).expect_err("missing expression must fail");
        assert!(error.contains("missing expression"));
    }

    #[test]
    fn script_path_is_positional() {
        let Ok(ParseResult::Run(Args { mode, .. })) = parse(&["boot.knl"]) else {
            panic!("expected run mode");
        };
        assert_eq!(mode, Mode::Script(PathBuf::from("boot.knl")));
    }

    #[test]
    fn capacity_flags_override_defaults() {
        let Ok(ParseResult::Run(Args { config, .. })) =
            parse(&["--pool-cells", "1024", "--queue-slots", "2048"])
        else {
            panic!("expected run mode");
        };
        assert_eq!(config.pool_cells, 1024);
        assert_eq!(config.queue_slots, 2048);

        let error = parse(&["--pool-cells", "lots"]).expect_err("bad count must fail");
        assert!(error.contains("bad value"));
    }

    #[test]
    fn conflicting_inputs_are_rejected() {
        let error = parse(&["a.knl", "b.knl"]).expect_err("two scripts must fail");
        assert!(error.contains("multiple inputs"));

        let error = parse(&["-e", "1", "a.knl"]).expect_err("eval plus script must fail");
        assert!(error.contains("multiple inputs"));
    }

    #[test]
    fn help_flag_wins() {
        assert!(matches!(parse(&["--help"]), Ok(ParseResult::Help)));
        assert!(matches!(parse(&["-h"]), Ok(ParseResult::Help)));
    }

    #[test]
    fn unknown_options_are_rejected() {
        let error = parse(&["--frobnicate"]).expect_err("unknown option must fail");
        assert!(error.contains("unknown option"));
    }
}
