//! Human-readable duration parsing for command-line options.

use std::time::Duration;

/// Parse a duration from a human-readable string.
///
/// Supports the following suffixes:
/// - `s` or no suffix: seconds
/// - `m`: minutes
/// - `h`: hours
/// - `ms`: milliseconds
///
/// # Examples
/// ```
/// use atc_listener::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
/// assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();

    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num, unit_millis, unit_name) = if let Some(num) = src.strip_suffix("ms") {
        (num, 1, "milliseconds")
    } else if let Some(num) = src.strip_suffix('h') {
        (num, 3_600_000, "hours")
    } else if let Some(num) = src.strip_suffix('m') {
        (num, 60_000, "minutes")
    } else if let Some(num) = src.strip_suffix('s') {
        (num, 1_000, "seconds")
    } else {
        (src, 1_000, "duration")
    };

    let value: u64 = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid {}: {}", unit_name, num))?;
    value
        .checked_mul(unit_millis)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration too large: {}", src))
}
