//! Deterministic dispatch fingerprint generator used for cross-host
//! comparison of runtime behaviour.

use proptest as _;
use rstest as _;
use runtime_core::console::{CaptureConsole, Clock};
use runtime_core::repl;
use runtime_core::{Runtime, RuntimeConfig};
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

struct ZeroClock;

impl Clock for ZeroClock {
    fn now_us(&self) -> u64 {
        0
    }
}

const SCRIPT: &str = "\
($define! f ($lambda (x) ($if (=? x 0) 0 (f (- x 1)))))\n\
(f 100)\n\
($define! (a b) (list 40 2))\n\
(+ a b)\n\
(cons 1 (list 2 3))\n\
unbound-name\n\
";

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> String {
    let mut rt = Runtime::new(RuntimeConfig::default()).expect("runtime must start");
    let mut console = CaptureConsole::with_input(SCRIPT);
    let outcome = repl::run_script(&mut rt, &mut console, &ZeroClock);

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, console.output_text().as_bytes());
    hash_bytes(&mut hash, &outcome.forms.to_le_bytes());
    hash_bytes(&mut hash, &outcome.errors.to_le_bytes());

    let stats = rt.stats();
    hash_bytes(&mut hash, &stats.turns_committed.to_le_bytes());
    hash_bytes(&mut hash, &stats.turns_aborted.to_le_bytes());
    hash_bytes(&mut hash, &stats.events_enqueued.to_le_bytes());
    hash_bytes(&mut hash, &stats.peak_high_water.to_le_bytes());

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
