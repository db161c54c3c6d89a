/*
 * fuzz_targets/parse_signal.rs
 *
 * fuzz target for signal parsing. validates that parse_signal never panics
 * and that whatever it accepts survives a trip through signal_name.
 *
 * edge cases: "SIGFOO", "999", "-1", "sig", "Sig", "  USR2  ", ""
 */

#![no_main]

use libfuzzer_sys::fuzz_target;
use rainbow_saddle::signal::{parse_signal, signal_name};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = core::str::from_utf8(data) {
        if let Ok(sig) = parse_signal(s) {
            assert_eq!(parse_signal(signal_name(sig)).ok(), Some(sig));
        }
    }
});
