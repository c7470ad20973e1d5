//! Duration parser for CLI arguments.
//!
//! Supports:
//! - Plain seconds: `90`
//! - Suffixed: `500ms`, `4s`, `1m`, `2h`, `1d`

use std::time::Duration;

/// Error type for duration parsing failures.
#[derive(Debug, Clone)]
pub struct DurationParseError {
    pub input: String,
    pub message: String,
}

impl std::fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse duration '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for DurationParseError {}

/// Parse a duration string.
///
/// | Format | Example | Meaning |
/// |--------|---------|---------|
/// | Plain integer | `90` | Seconds |
/// | Milliseconds | `500ms` | |
/// | Seconds | `4s` | |
/// | Minutes | `1m` | |
/// | Hours | `2h` | |
/// | Days | `1d` | |
///
/// # Examples
///
/// ```
/// use bwtally::util::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("4s").unwrap(), Duration::from_secs(4));
/// assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let input = input.trim();
    let err = |message: &str| DurationParseError {
        input: input.to_string(),
        message: message.to_string(),
    };

    if input.is_empty() {
        return Err(err("empty duration"));
    }

    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number_str, unit) = input.split_at(split);
    if number_str.is_empty() {
        return Err(err("expected a number, e.g. 4s or 1m"));
    }
    let number: u64 = number_str
        .parse()
        .map_err(|_| err("number out of range"))?;

    let (multiplier, millis) = match unit.trim() {
        "" | "s" => (1, false),
        "ms" => (1, true),
        "m" => (60, false),
        "h" => (3600, false),
        "d" => (86400, false),
        _ => return Err(err("unknown unit, use ms, s, m, h or d")),
    };

    let value = number
        .checked_mul(multiplier)
        .ok_or_else(|| err("duration overflow"))?;
    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
