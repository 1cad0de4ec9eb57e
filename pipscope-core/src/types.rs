//! Price bar and candle types shared by aggregation, I/O, and metrics.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pipscope_types::PipscopeError;

/// Read access to open/high/low/close prices plus derived measures.
pub trait Ohlc {
    /// First traded price of the period.
    fn open(&self) -> Decimal;
    /// Highest price of the period.
    fn high(&self) -> Decimal;
    /// Lowest price of the period.
    fn low(&self) -> Decimal;
    /// Last traded price of the period.
    fn close(&self) -> Decimal;

    /// High minus low.
    fn range(&self) -> Decimal {
        self.high() - self.low()
    }

    /// Absolute distance between open and close.
    fn body(&self) -> Decimal {
        (self.close() - self.open()).abs()
    }

    /// Close strictly above open.
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    /// Close strictly below open.
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }
}

/// A timestamped OHLC candle. Input bars use the same shape.
///
/// Timestamps carry no zone on disk and are interpreted as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start (or bar time for input bars).
    pub ts: DateTime<Utc>,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
}

/// Raw input bar. Volume is discarded at parse time.
pub type Bar = Candle;

/// Aggregated candle for one trading date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCandle {
    /// Trading date (never Saturday or Sunday).
    pub date: NaiveDate,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
}

/// Aggregated candle for one Monday-to-Friday trading week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyCandle {
    /// The labelled span of the week.
    pub span: WeekSpan,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
}

macro_rules! impl_ohlc {
    ($($t:ty),*) => {
        $(impl Ohlc for $t {
            fn open(&self) -> Decimal { self.open }
            fn high(&self) -> Decimal { self.high }
            fn low(&self) -> Decimal { self.low }
            fn close(&self) -> Decimal { self.close }
        })*
    };
}

impl_ohlc!(Candle, DailyCandle, WeeklyCandle);

/// Output of aggregating bars to one timeframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandleSeries {
    /// Fixed-width buckets (`4h`, `1h`, `15m`, `5m`).
    Intraday(Vec<Candle>),
    /// One candle per trading date.
    Daily(Vec<DailyCandle>),
    /// One candle per complete trading week.
    Weekly(Vec<WeeklyCandle>),
}

impl CandleSeries {
    /// Number of candles.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Intraday(v) => v.len(),
            Self::Daily(v) => v.len(),
            Self::Weekly(v) => v.len(),
        }
    }

    /// True when the series holds no candles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intraday candles, or `None` for other shapes.
    #[must_use]
    pub fn into_intraday(self) -> Option<Vec<Candle>> {
        match self {
            Self::Intraday(v) => Some(v),
            _ => None,
        }
    }

    /// Daily candles, or `None` for other shapes.
    #[must_use]
    pub fn into_daily(self) -> Option<Vec<DailyCandle>> {
        match self {
            Self::Daily(v) => Some(v),
            _ => None,
        }
    }

    /// Weekly candles, or `None` for other shapes.
    #[must_use]
    pub fn into_weekly(self) -> Option<Vec<WeeklyCandle>> {
        match self {
            Self::Weekly(v) => Some(v),
            _ => None,
        }
    }
}

/// A trading week identified by its Monday.
///
/// Rendered as `"YYYY-MM-DD to YYYY-MM-DD"`, Monday through Friday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekSpan {
    start: NaiveDate,
}

impl WeekSpan {
    /// Span starting on `monday`.
    #[must_use]
    pub const fn new(monday: NaiveDate) -> Self {
        Self { start: monday }
    }

    /// First day (Monday).
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day (Friday).
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(4))
            .unwrap_or(self.start)
    }

    /// Whether `date` lies within the span, inclusive on both ends.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end()
    }
}

impl fmt::Display for WeekSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end().format("%Y-%m-%d")
        )
    }
}

impl FromStr for WeekSpan {
    type Err = PipscopeError;

    /// Parses a `"start to end"` label.
    ///
    /// The start must be a Monday and the end the Friday of that week, so the
    /// parsed span is exactly the one [`WeekSpan::end`] reports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(" to ")
            .ok_or_else(|| PipscopeError::Data(format!("malformed week label '{s}'")))?;
        let parse = |v: &str| {
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                .map_err(|e| PipscopeError::Data(format!("malformed week label '{s}': {e}")))
        };
        let start = parse(a)?;
        let end = parse(b)?;
        if start.weekday() != Weekday::Mon {
            return Err(PipscopeError::Data(format!(
                "week label '{s}' does not start on a Monday"
            )));
        }
        let span = Self { start };
        if end != span.end() {
            return Err(PipscopeError::Data(format!(
                "week label '{s}' does not end on Friday {}",
                span.end().format("%Y-%m-%d")
            )));
        }
        Ok(span)
    }
}
