// Relative time offsets in InfluxQL duration notation ("-200d", "0d", "-12h")
use super::error::CleanerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const UNITS: [&str; 9] = ["ns", "u", "µ", "ms", "s", "m", "h", "d", "w"];

/// An offset from `now()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeTime {
    negative: bool,
    amount: u64,
    unit: String,
}

impl RelativeTime {
    pub fn now() -> Self {
        Self {
            negative: false,
            amount: 0,
            unit: "d".to_string(),
        }
    }

    /// Renders the offset as an InfluxQL time expression.
    pub fn to_influxql(&self) -> String {
        match (self.amount, self.negative) {
            (0, _) => "now()".to_string(),
            (n, true) => format!("now() - {}{}", n, self.unit),
            (n, false) => format!("now() + {}{}", n, self.unit),
        }
    }
}

impl FromStr for RelativeTime {
    type Err = CleanerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CleanerError::InvalidTimeRange(s.to_string());
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits_end == 0 {
            return Err(invalid());
        }
        let (digits, unit) = rest.split_at(digits_end);
        if !UNITS.contains(&unit) {
            return Err(invalid());
        }
        let amount = digits.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self {
            negative,
            amount,
            unit: unit.to_string(),
        })
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative && self.amount > 0 { "-" } else { "" };
        write!(f, "{}{}{}", sign, self.amount, self.unit)
    }
}

impl Serialize for RelativeTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RelativeTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `start` and `end` are both offsets from now; points strictly between them are returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: RelativeTime,
    pub end: RelativeTime,
}

impl TimeRange {
    pub fn new(start: RelativeTime, end: RelativeTime) -> Self {
        Self { start, end }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: RelativeTime {
                negative: true,
                amount: 200,
                unit: "d".to_string(),
            },
            end: RelativeTime::now(),
        }
    }
}
