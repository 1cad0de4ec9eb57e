use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use pipscope_types::{
    InstrumentTable, MetricMap, PipscopeError, SessionTable, SessionWindow, Timeframe, category,
};

use crate::io::store::CandleStore;
use crate::metrics::{MetricCalculator, TRADING_WEEKDAYS, scaled_mean, weekday_name};
use crate::types::{Candle, DailyCandle, Ohlc, WeeklyCandle};

/// Average daily range name.
pub const AVG_DAILY_RANGE: &str = "Average Daily Range (pips)";
/// Average daily body name.
pub const AVG_DAILY_BODY: &str = "Average Daily Body Size (pips)";
/// Average weekly range name.
pub const AVG_WEEKLY_RANGE: &str = "Average Weekly Range (pips)";
/// Average weekly body name.
pub const AVG_WEEKLY_BODY: &str = "Average Weekly Body Size (pips)";

fn session_range_name(session: &str) -> String {
    format!("Average {session} Range")
}

fn weekday_range_name(day: chrono::Weekday) -> String {
    format!("Average {} Range", weekday_name(day))
}

/// Every metric name this module emits, paired with its category.
#[must_use]
pub fn catalog_entries(table: &SessionTable) -> Vec<(String, &'static str)> {
    [AVG_DAILY_RANGE, AVG_DAILY_BODY, AVG_WEEKLY_RANGE, AVG_WEEKLY_BODY]
        .into_iter()
        .map(String::from)
        .chain(table.windows().iter().map(|w| session_range_name(&w.name)))
        .chain(TRADING_WEEKDAYS.into_iter().map(weekday_range_name))
        .map(|n| (n, category::VOLATILITY))
        .collect()
}

/// Daily range and body averages in pips, plus per-weekday ranges.
#[must_use]
pub fn daily_metrics(days: &[DailyCandle], pip_factor: u32) -> MetricMap {
    let mut out = MetricMap::new();
    out.insert(
        AVG_DAILY_RANGE.into(),
        scaled_mean(days.iter().map(Ohlc::range), pip_factor).into(),
    );
    out.insert(
        AVG_DAILY_BODY.into(),
        scaled_mean(days.iter().map(Ohlc::body), pip_factor).into(),
    );
    for wd in TRADING_WEEKDAYS {
        let ranges = days
            .iter()
            .filter(|d| d.date.weekday() == wd)
            .map(Ohlc::range);
        out.insert(weekday_range_name(wd), scaled_mean(ranges, pip_factor).into());
    }
    out
}

/// Weekly range and body averages in pips.
#[must_use]
pub fn weekly_metrics(weeks: &[WeeklyCandle], pip_factor: u32) -> MetricMap {
    let mut out = MetricMap::new();
    out.insert(
        AVG_WEEKLY_RANGE.into(),
        scaled_mean(weeks.iter().map(Ohlc::range), pip_factor).into(),
    );
    out.insert(
        AVG_WEEKLY_BODY.into(),
        scaled_mean(weeks.iter().map(Ohlc::body), pip_factor).into(),
    );
    out
}

/// Mean per-day range inside one session window, in pips.
///
/// Candles are matched on their UTC clock time and grouped by calendar date,
/// so a window that crosses midnight contributes one range per side.
#[must_use]
pub fn session_range(candles: &[Candle], window: &SessionWindow, pip_factor: u32) -> f64 {
    let mut per_day: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
    for c in candles.iter().filter(|c| window.contains(c.ts.time())) {
        per_day
            .entry(c.ts.date_naive())
            .and_modify(|(h, l)| {
                *h = (*h).max(c.high);
                *l = (*l).min(c.low);
            })
            .or_insert((c.high, c.low));
    }
    scaled_mean(per_day.into_values().map(|(h, l)| h - l), pip_factor)
}

/// Per-session average ranges for every configured window.
#[must_use]
pub fn session_metrics(candles: &[Candle], table: &SessionTable, pip_factor: u32) -> MetricMap {
    table
        .windows()
        .iter()
        .map(|w| {
            (
                session_range_name(&w.name),
                session_range(candles, w, pip_factor).into(),
            )
        })
        .collect()
}

/// Range and body averages from daily, weekly and 5-minute candles.
pub struct VolatilityCalculator {
    sessions: SessionTable,
    instruments: InstrumentTable,
    candles: Arc<dyn CandleStore>,
}

impl VolatilityCalculator {
    /// Calculator over `candles` using the pip factors in `instruments`.
    pub fn new(
        sessions: SessionTable,
        instruments: InstrumentTable,
        candles: Arc<dyn CandleStore>,
    ) -> Self {
        Self {
            sessions,
            instruments,
            candles,
        }
    }
}

fn or_empty<T>(res: Result<Vec<T>, PipscopeError>, _what: &str) -> Vec<T> {
    res.unwrap_or_else(|_e| {
        #[cfg(feature = "tracing")]
        tracing::warn!(input = _what, error = %_e, "input unavailable; reporting zeros");
        Vec::new()
    })
}

impl MetricCalculator for VolatilityCalculator {
    fn name(&self) -> &'static str {
        "volatility"
    }

    fn calculate(&self, symbol: &str, year: i32) -> MetricMap {
        let pip = self.instruments.pip_factor(symbol);
        #[cfg(feature = "tracing")]
        if self.instruments.get(symbol).is_none() {
            tracing::warn!(symbol, pip_factor = pip, "unknown instrument; using fallback pip factor");
        }
        let days = or_empty(self.candles.load_daily(symbol, year), "1d");
        let weeks = or_empty(self.candles.load_weekly(symbol, year), "1w");
        let bars = or_empty(
            self.candles.load_intraday(symbol, year, Timeframe::Minute5),
            "5m",
        );
        let mut out = daily_metrics(&days, pip);
        out.extend(weekly_metrics(&weeks, pip));
        out.extend(session_metrics(&bars, &self.sessions, pip));
        out
    }

    fn metric_names(&self) -> Vec<String> {
        catalog_entries(&self.sessions)
            .into_iter()
            .map(|(n, _)| n)
            .collect()
    }
}
