/*
 * duration.rs
 *
 * Parse poll intervals: "300ms", "0.1s", "1", "2m". No suffix means seconds.
 * Case insensitive. Zero is rejected - a zero poll interval is a busy loop.
 */

use std::time::Duration;

use crate::error::{Result, SupervisorError};

/* cap at u64::MAX nanoseconds (~584 years) */
#[allow(clippy::cast_precision_loss)]
const MAX_NANOS: f64 = u64::MAX as f64;

/// Parse "300ms", "0.3", "0.3s", "1m". No suffix = seconds.
///
/// # Examples
///
/// ```
/// use rainbow_saddle::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
/// assert_eq!(parse_duration("0.1s").unwrap(), Duration::from_millis(100));
/// assert_eq!(parse_duration("1").unwrap(), Duration::from_secs(1));
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();

    if input.is_empty() {
        return Err(SupervisorError::InvalidDuration("empty duration".to_string()));
    }

    let (num_str, suffix) = split_number_and_suffix(input);

    if num_str.is_empty() {
        return Err(SupervisorError::InvalidDuration(format!(
            "no numeric value in '{input}'"
        )));
    }

    let value: f64 = num_str
        .parse()
        .map_err(|_| SupervisorError::InvalidDuration(format!("invalid number '{num_str}'")))?;

    if value < 0.0 {
        return Err(SupervisorError::NegativeDuration);
    }
    if value.is_nan() {
        return Err(SupervisorError::InvalidDuration(
            "NaN is not allowed".to_string(),
        ));
    }
    if value.is_infinite() {
        return Err(SupervisorError::DurationOverflow);
    }

    /* scale straight to nanoseconds and round, so "0.3s" is 300ms and not 299.999999ms */
    let nanos_per_unit = match suffix.to_ascii_lowercase().as_str() {
        "ms" => 1e6,
        "" | "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        "d" => 86400e9,
        _ => {
            return Err(SupervisorError::InvalidDuration(format!(
                "invalid suffix '{suffix}'"
            )));
        }
    };

    let total_nanos = (value * nanos_per_unit).round();

    if total_nanos >= MAX_NANOS {
        return Err(SupervisorError::DurationOverflow);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let duration = Duration::from_nanos(total_nanos as u64);
    if duration.is_zero() {
        return Err(SupervisorError::InvalidDuration(format!(
            "'{input}' is zero; poll intervals must be positive"
        )));
    }
    Ok(duration)
}

/* find where the number ends and suffix begins */
fn split_number_and_suffix(input: &str) -> (&str, &str) {
    let suffix_start = input
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_ascii_digit() || *c == '.')
        .map_or(0, |(i, c)| i + c.len_utf8());

    (&input[..suffix_start], &input[suffix_start..])
}
