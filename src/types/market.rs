//! Market data types shared by the broker gateway and the predicate engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single OHLC bar as returned by the broker history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, epoch seconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Open interest (futures/options; zero for equities).
    #[serde(rename = "oi", default)]
    pub open_interest: i64,
}

/// Live quote snapshot. Lifetime is one request; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Last traded price.
    pub ltp: f64,
    /// Absolute change from previous close.
    #[serde(rename = "chng")]
    pub change: f64,
    /// Percent change from previous close.
    #[serde(rename = "chng_perc")]
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    #[serde(rename = "prev_close")]
    pub previous_close: f64,
}

/// Candle interval accepted for monitors and one-shot signal checks.
///
/// The wire value is passed to the broker verbatim; anything outside this
/// set is rejected at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "5m")]
    FiveMinute,
    #[serde(rename = "15m")]
    FifteenMinute,
    #[serde(rename = "1h")]
    OneHour,
}

impl Interval {
    /// Parse a user-supplied interval token.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "5m" => Some(Interval::FiveMinute),
            "15m" => Some(Interval::FifteenMinute),
            "1h" => Some(Interval::OneHour),
            _ => None,
        }
    }

    /// Broker wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::FiveMinute => "5m",
            Interval::FifteenMinute => "15m",
            Interval::OneHour => "1h",
        }
    }

    /// Tick period for a monitor on this interval.
    pub fn duration(&self) -> Duration {
        match self {
            Interval::FiveMinute => Duration::from_secs(300),
            Interval::FifteenMinute => Duration::from_secs(900),
            Interval::OneHour => Duration::from_secs(3600),
        }
    }

    /// Calendar days of history to request so a period-200 indicator
    /// always has enough bars.
    pub fn lookback_days(&self) -> i64 {
        match self {
            Interval::FiveMinute => 5,
            Interval::FifteenMinute => 10,
            Interval::OneHour => 30,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
