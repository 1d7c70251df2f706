use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};

/// Text shown in place of an unknown time
pub const NULL_TIME_TEXT: &str = "-----";

// ============================================================================
// TIME VALUE
// ============================================================================

/// An elapsed or clock time, held in hundredths of a second.
///
/// Unknown times are represented by `Option<Time>::None`, so arithmetic on an
/// unknown value propagates through `Option` combinators rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(i64);

impl Time {
    pub const ZERO: Time = Time(0);

    pub const fn from_secs(secs: i64) -> Time {
        Time(secs * 100)
    }

    pub const fn from_mins(mins: i64) -> Time {
        Time(mins * 6000)
    }

    pub const fn from_hundredths(hundredths: i64) -> Time {
        Time(hundredths)
    }

    /// Rounds to the nearest hundredth; `None` for NaN or infinite input
    pub fn from_secs_f64(secs: f64) -> Option<Time> {
        if secs.is_finite() {
            Some(Time((secs * 100.0).round() as i64))
        } else {
            None
        }
    }

    pub fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn as_mins_f64(self) -> f64 {
        self.as_secs_f64() / 60.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Multiplies by a factor, rounding to the nearest hundredth
    pub fn scale(self, factor: f64) -> Time {
        Time((self.0 as f64 * factor).round() as i64)
    }

    /// Parses `[h:]mm:ss[.ff]` (comma also accepted as the decimal
    /// separator). Returns `None` for anything else, including blank text and
    /// placeholders such as `-----`.
    pub fn parse(text: &str) -> Option<Time> {
        let text = text.trim();
        let (negative, text) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let (whole, fraction) = match text.find(|c| c == '.' || c == ',') {
            Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
            None => (text, None),
        };

        let parts: Vec<&str> = whole.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return None;
        }
        if !parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
            return None;
        }
        if parts[parts.len() - 1].len() != 2 {
            return None;
        }

        let mut secs: i64 = 0;
        for part in &parts {
            secs = secs * 60 + part.parse::<i64>().ok()?;
        }

        let mut hundredths = secs * 100;
        if let Some(fraction) = fraction {
            if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let value: f64 = format!("0.{}", fraction).parse().ok()?;
            hundredths += (value * 100.0).round() as i64;
        }

        Some(Time(if negative { -hundredths } else { hundredths }))
    }
}

impl fmt::Display for Time {
    /// Formats as `[-][h:]mm:ss[.ff]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let total = self.0.abs();
        let fraction = total % 100;
        let secs = total / 100;
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            write!(f, "{}{}:{:02}:{:02}", sign, hours, mins, secs)?;
        } else {
            write!(f, "{}{:02}:{:02}", sign, mins, secs)?;
        }
        if fraction != 0 {
            write!(f, ".{:02}", fraction)?;
        }
        Ok(())
    }
}

impl Serialize for Time {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl Add for Time {
    type Output = Time;
    fn add(self, other: Time) -> Time {
        Time(self.0 + other.0)
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, other: Time) {
        self.0 += other.0;
    }
}

impl Sub for Time {
    type Output = Time;
    fn sub(self, other: Time) -> Time {
        Time(self.0 - other.0)
    }
}

impl Neg for Time {
    type Output = Time;
    fn neg(self) -> Time {
        Time(-self.0)
    }
}

// ============================================================================
// OPTIONAL TIME HELPERS
// ============================================================================

/// Formats a possibly-unknown time, using `-----` for unknown
pub fn format_time(time: Option<Time>) -> String {
    match time {
        Some(time) => time.to_string(),
        None => NULL_TIME_TEXT.to_string(),
    }
}

/// `a - b`, unknown if either side is unknown
pub fn subtract(a: Option<Time>, b: Option<Time>) -> Option<Time> {
    a.zip(b).map(|(a, b)| a - b)
}

/// `a + b`, unknown if either side is unknown
pub fn add(a: Option<Time>, b: Option<Time>) -> Option<Time> {
    a.zip(b).map(|(a, b)| a + b)
}

/// Seconds as minutes for plotting; unknown stays unknown
pub fn to_minutes(time: Option<Time>) -> Option<f64> {
    time.map(Time::as_mins_f64)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minutes_and_seconds() {
        assert_eq!(Time::parse("01:48"), Some(Time::from_secs(108)));
        assert_eq!(Time::parse("12:14"), Some(Time::from_secs(734)));
        assert_eq!(Time::parse("75:30"), Some(Time::from_secs(75 * 60 + 30)));
    }

    #[test]
    fn test_parse_hours() {
        assert_eq!(Time::parse("10:00:00"), Some(Time::from_secs(36000)));
        assert_eq!(Time::parse("1:02:03"), Some(Time::from_secs(3723)));
    }

    #[test]
    fn test_parse_fractions() {
        assert_eq!(Time::parse("00:05.5"), Some(Time::from_hundredths(550)));
        assert_eq!(Time::parse("00:05,25"), Some(Time::from_hundredths(525)));
        assert_eq!(Time::parse("00:05.254"), Some(Time::from_hundredths(525)));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(Time::parse(""), None);
        assert_eq!(Time::parse("-----"), None);
        assert_eq!(Time::parse("mp"), None);
        assert_eq!(Time::parse("12"), None);
        assert_eq!(Time::parse("12:3"), None);
        assert_eq!(Time::parse("1:2:3:45"), None);
        assert_eq!(Time::parse("12:34."), None);
        assert_eq!(Time::parse("a1:23"), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(Time::from_secs(108).to_string(), "01:48");
        assert_eq!(Time::from_secs(3723).to_string(), "1:02:03");
        assert_eq!(Time::from_hundredths(550).to_string(), "00:05.50");
        assert_eq!(Time::from_secs(-65).to_string(), "-01:05");
        assert_eq!(format_time(None), "-----");
    }

    #[test]
    fn test_format_parse_round_trip() {
        for hundredths in [0, 1, 99, 100, 5999, 6000, 359_999, 360_000, 1_234_567, -4_321] {
            let time = Time::from_hundredths(hundredths);
            assert_eq!(Time::parse(&time.to_string()), Some(time), "{}", time);
        }
    }

    #[test]
    fn test_optional_arithmetic() {
        let a = Some(Time::from_secs(100));
        let b = Some(Time::from_secs(40));
        assert_eq!(subtract(a, b), Some(Time::from_secs(60)));
        assert_eq!(add(a, b), Some(Time::from_secs(140)));
        assert_eq!(subtract(a, None), None);
        assert_eq!(add(None, b), None);
        assert_eq!(to_minutes(Some(Time::from_secs(90))), Some(1.5));
    }

    #[test]
    fn test_scale_rounds() {
        assert_eq!(Time::from_secs(80).scale(1.25), Time::from_secs(100));
        assert_eq!(Time::from_hundredths(3).scale(0.5), Time::from_hundredths(2));
    }
}
