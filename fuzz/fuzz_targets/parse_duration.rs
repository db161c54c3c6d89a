/*
 * fuzz_targets/parse_duration.rs
 *
 * fuzz target for poll interval parsing. parse_duration must never panic and
 * never hand back a zero interval.
 *
 * edge cases: "", "0", "1e400", "-1", "1.2.3s", "NaNms", unicode
 */

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = core::str::from_utf8(data) {
        if let Ok(d) = rainbow_saddle::duration::parse_duration(s) {
            assert!(!d.is_zero(), "zero interval accepted: {s:?}");
        }
    }
});
