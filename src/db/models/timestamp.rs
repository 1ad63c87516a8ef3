use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};

use crate::error::Error;

/// Fixed persisted timestamp layout, second precision
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time truncated to whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    pub fn from_naive(value: NaiveDateTime) -> Self {
        // with_nanosecond(0) is always in range
        Self(value.with_nanosecond(0).unwrap_or(value))
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .map(Self)
            .map_err(|e| {
                Error::invalid(format!(
                    "'{}' is not a timestamp in the form YYYY-MM-DD HH:MM:SS ({})",
                    value, e
                ))
            })
    }

    /// Parse the persisted optional form, where an empty string means "no deadline"
    pub fn parse_optional(value: &str) -> Result<Option<Self>, Error> {
        if value.is_empty() {
            Ok(None)
        } else {
            Self::parse(value).map(Some)
        }
    }

    pub fn format_optional(value: Option<Timestamp>) -> String {
        value.map(|t| t.to_string()).unwrap_or_default()
    }

    pub fn after(&self, duration: Duration) -> Result<Self, Error> {
        let delta = chrono::Duration::from_std(duration)
            .map_err(|_| Error::invalid(format!("duration {:?} is too large", duration)))?;
        self.0
            .checked_add_signed(delta)
            .map(Self::from_naive)
            .ok_or_else(|| Error::invalid(format!("duration {:?} is too large", duration)))
    }

    pub fn before(&self, duration: Duration) -> Result<Self, Error> {
        let delta = chrono::Duration::from_std(duration)
            .map_err(|_| Error::invalid(format!("duration {:?} is too large", duration)))?;
        self.0
            .checked_sub_signed(delta)
            .map(Self::from_naive)
            .ok_or_else(|| Error::invalid(format!("duration {:?} is too large", duration)))
    }

    /// Fractional seconds from `now` until this timestamp; negative when already past
    pub fn seconds_from(&self, now: NaiveDateTime) -> f64 {
        let delta = self.0 - now;
        delta.num_milliseconds() as f64 / 1000.0
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
