use std::fmt;
use std::time::Duration;

use serde::{de::Error, Deserialize, Deserializer};

use crate::error::SettingsError;

/// A configured duration, written as `<number><unit>` with unit `s`, `m` or `h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpInterval {
    Seconds(u32),
    Minutes(u32),
    Hours(u32),
}

impl DumpInterval {
    pub fn parse(s: &str) -> Result<Self, SettingsError> {
        let invalid = |reason: &str| SettingsError::Interval {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let Some(unit) = s.chars().last() else {
            return Err(invalid("empty value"));
        };
        let num: u32 = s[..s.len() - unit.len_utf8()]
            .parse()
            .map_err(|e: std::num::ParseIntError| invalid(&e.to_string()))?;

        match unit {
            's' => Ok(DumpInterval::Seconds(num)),
            'm' => Ok(DumpInterval::Minutes(num)),
            'h' => Ok(DumpInterval::Hours(num)),
            _ => Err(invalid("invalid time unit")),
        }
    }

    pub fn as_duration(&self) -> Duration {
        (*self).into()
    }

    pub fn is_zero(&self) -> bool {
        self.as_duration().is_zero()
    }
}

impl fmt::Display for DumpInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpInterval::Seconds(s) => write!(f, "{s}s"),
            DumpInterval::Minutes(m) => write!(f, "{m}m"),
            DumpInterval::Hours(h) => write!(f, "{h}h"),
        }
    }
}

impl<'de> Deserialize<'de> for DumpInterval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        DumpInterval::parse(&s).map_err(D::Error::custom)
    }
}

impl From<DumpInterval> for Duration {
    fn from(val: DumpInterval) -> Self {
        match val {
            DumpInterval::Seconds(s) => Duration::from_secs(u64::from(s)),
            DumpInterval::Minutes(m) => Duration::from_secs(u64::from(m) * 60),
            DumpInterval::Hours(h) => Duration::from_secs(u64::from(h) * 3600),
        }
    }
}

impl From<DumpInterval> for chrono::Duration {
    fn from(val: DumpInterval) -> Self {
        match val {
            DumpInterval::Seconds(s) => chrono::Duration::seconds(s as i64),
            DumpInterval::Minutes(m) => chrono::Duration::minutes(m as i64),
            DumpInterval::Hours(h) => chrono::Duration::hours(h as i64),
        }
    }
}
