//! Kubernetes durations, written in Go's `time.Duration` string format
//! (e.g. `1h30m`, `250ms`).
//!
//! Resource fields keep durations as strings so that a malformed value only
//! invalidates the feature that uses it, not the whole object.

use std::time::Duration;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("empty duration")]
    Empty,

    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("negative durations are not supported")]
    Negative,

    #[error("invalid floating-point number: {}", .0)]
    NotANumber(#[from] std::num::ParseFloatError),
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

/// Parses a non-negative Go duration.
pub fn parse(s: &str) -> Result<Duration, ParseError> {
    fn unit(val: f64, unit: &str) -> Result<Duration, ParseError> {
        const MINUTE: Duration = Duration::from_secs(60);
        let base = match unit {
            "ns" => Duration::from_nanos(1),
            // U+00B5 is the "micro sign" while U+03BC is "Greek letter mu"
            "us" | "\u{00b5}s" | "\u{03bc}s" => Duration::from_micros(1),
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => MINUTE,
            "h" => MINUTE * 60,
            _ => return Err(ParseError::InvalidUnit),
        };
        Ok(base.mul_f64(val))
    }

    if s.is_empty() {
        return Err(ParseError::Empty);
    }
    if let Some(rest) = s.strip_prefix('-') {
        // Go accepts "-0"; anything else negative is rejected.
        if rest == "0" {
            return Ok(Duration::ZERO);
        }
        return Err(ParseError::Negative);
    }
    let mut s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    while !s.is_empty() {
        let unit_start = s
            .find(|c: char| c.is_alphabetic())
            .ok_or(ParseError::NoUnit)?;
        let (val, rest) = s.split_at(unit_start);
        let val = val.parse::<f64>()?;
        let (u, rest) = match rest.find(|c: char| !c.is_alphabetic()) {
            Some(next) => rest.split_at(next),
            None => (rest, ""),
        };
        total += unit(val, u)?;
        s = rest;
    }
    Ok(total)
}
