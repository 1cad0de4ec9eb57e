//! Candle timeframes produced by the aggregator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipscopeError;

/// A target cadence for aggregated candles.
///
/// Keys follow the file naming convention used on disk (`1w`, `1d`, `4h`,
/// `1h`, `15m`, `5m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// Trading week, Monday through Friday.
    #[serde(rename = "1w")]
    Week1,
    /// Trading day.
    #[serde(rename = "1d")]
    Day1,
    /// Four hours, epoch aligned.
    #[serde(rename = "4h")]
    Hour4,
    /// One hour.
    #[serde(rename = "1h")]
    Hour1,
    /// Fifteen minutes.
    #[serde(rename = "15m")]
    Minute15,
    /// Five minutes, the base resolution of the input bars.
    #[serde(rename = "5m")]
    Minute5,
}

impl Timeframe {
    /// Every supported timeframe, coarsest first.
    pub const ALL: [Self; 6] = [
        Self::Week1,
        Self::Day1,
        Self::Hour4,
        Self::Hour1,
        Self::Minute15,
        Self::Minute5,
    ];

    /// File key for this timeframe.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Week1 => "1w",
            Self::Day1 => "1d",
            Self::Hour4 => "4h",
            Self::Hour1 => "1h",
            Self::Minute15 => "15m",
            Self::Minute5 => "5m",
        }
    }

    /// Bucket width in minutes for fixed-interval timeframes; `None` for the
    /// calendar-aware daily and weekly frames.
    #[must_use]
    pub const fn intraday_minutes(self) -> Option<i64> {
        match self {
            Self::Week1 | Self::Day1 => None,
            Self::Hour4 => Some(240),
            Self::Hour1 => Some(60),
            Self::Minute15 => Some(15),
            Self::Minute5 => Some(5),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Timeframe {
    type Err = PipscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tf| tf.key() == key)
            .ok_or_else(|| PipscopeError::unsupported_timeframe(s))
    }
}
