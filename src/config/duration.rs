//! Duration strings (`"250ms"`, `"1m30s"`, `"-1"`).
//!
//! Accepts a sequence of decimal numbers, each with a unit suffix
//! (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare `0` is allowed without
//! unit, and so is a bare negative number, which only carries the sign.

use std::time::Duration;

/// A parsed duration that remembers whether it was negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedDuration {
    pub negative: bool,
    pub magnitude: Duration,
}

impl SignedDuration {
    pub const ZERO: SignedDuration = SignedDuration {
        negative: false,
        magnitude: Duration::ZERO,
    };

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }
}

/// Parse a duration string. Returns `None` on malformed input.
pub fn parse_duration(input: &str) -> Option<SignedDuration> {
    let s = input.trim();
    if s.is_empty() {
        return Some(SignedDuration::ZERO);
    }

    let (negative, mut rest) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if rest.is_empty() {
        return None;
    }

    // "0" and "-1" style values carry no unit.
    if rest.bytes().all(|b| b.is_ascii_digit()) {
        let value: u64 = rest.parse().ok()?;
        if value == 0 || negative {
            return Some(SignedDuration {
                negative: negative && value != 0,
                magnitude: if value == 0 { Duration::ZERO } else { Duration::from_nanos(1) },
            });
        }
        return None;
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return None;
    }

    Some(SignedDuration {
        negative: negative && total_nanos > 0.0,
        magnitude: Duration::from_nanos(total_nanos.round() as u64),
    })
}
