use chrono::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,

    #[error("unknown time unit {0:?}")]
    UnknownUnit(String),

    #[error("expected a number at {0:?}")]
    ExpectedNumber(String),

    #[error("malformed clock value {0:?}")]
    BadClock(String),

    #[error("duration out of range")]
    OutOfRange,
}

/// Parses a human-readable interval such as `"60d"`, `"2 weeks"`, `"1h30m"`,
/// `"3 days, 4 hours"`, `"90"` (seconds) or `"1:30:00"` (clock form).
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let text = input.trim().to_lowercase();
    if text.is_empty() {
        return Err(DurationParseError::Empty);
    }

    if let Ok(seconds) = text.parse::<f64>() {
        return seconds_to_duration(seconds);
    }

    if text.contains(':') {
        return parse_clock(&text);
    }

    let mut total = 0.0_f64;
    let mut rest = text.as_str();
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        if let Some(after) = rest.strip_prefix("and") {
            if after.starts_with(|c: char| c.is_whitespace() || c.is_ascii_digit()) {
                rest = after;
                continue;
            }
        }

        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(DurationParseError::ExpectedNumber(rest.to_string()));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| DurationParseError::ExpectedNumber(rest.to_string()))?;
        rest = rest[number_len..].trim_start();

        let unit_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        total += value * unit_seconds(unit)?;
    }

    seconds_to_duration(total)
}

fn unit_seconds(unit: &str) -> Result<f64, DurationParseError> {
    let seconds = match unit {
        "w" | "wk" | "wks" | "week" | "weeks" => 7.0 * 86_400.0,
        "d" | "dy" | "dys" | "day" | "days" => 86_400.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        // A bare trailing number counts as seconds, matching the plain-number form
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        other => return Err(DurationParseError::UnknownUnit(other.to_string())),
    };
    Ok(seconds)
}

/// `[[d:]h:]m:s`, the last field may carry a fraction
fn parse_clock(text: &str) -> Result<Duration, DurationParseError> {
    let fields: Vec<&str> = text.split(':').map(str::trim).collect();
    if fields.len() > 4 || fields.iter().any(|f| f.is_empty()) {
        return Err(DurationParseError::BadClock(text.to_string()));
    }

    const WEIGHTS: [f64; 4] = [1.0, 60.0, 3_600.0, 86_400.0];
    let mut total = 0.0;
    for (idx, field) in fields.iter().rev().enumerate() {
        let is_seconds = idx == 0;
        let valid = field
            .chars()
            .all(|c| c.is_ascii_digit() || (is_seconds && c == '.'));
        if !valid {
            return Err(DurationParseError::BadClock(text.to_string()));
        }
        let value: f64 = field
            .parse()
            .map_err(|_| DurationParseError::BadClock(text.to_string()))?;
        total += value * WEIGHTS[idx];
    }
    seconds_to_duration(total)
}

fn seconds_to_duration(seconds: f64) -> Result<Duration, DurationParseError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(DurationParseError::OutOfRange);
    }
    let millis = (seconds * 1000.0).round();
    if millis > i64::MAX as f64 {
        return Err(DurationParseError::OutOfRange);
    }
    Duration::try_milliseconds(millis as i64).ok_or(DurationParseError::OutOfRange)
}
