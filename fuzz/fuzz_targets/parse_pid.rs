/*
 * fuzz_targets/parse_pid.rs
 *
 * fuzz target for pidfile contents. Whatever a torn or hostile write leaves
 * in the pidfile, parse_pid must not panic, and a pid it returns is positive.
 */

#![no_main]

use libfuzzer_sys::fuzz_target;
use rainbow_saddle::pidfile::{PidRead, parse_pid};

fuzz_target!(|data: &[u8]| {
    let contents = String::from_utf8_lossy(data);
    match parse_pid(&contents) {
        PidRead::Pid(pid) => assert!(pid > 0),
        PidRead::Malformed(_) | PidRead::Missing => {}
    }
});
