use std::sync::Arc;

use chrono::{Datelike, Weekday};

use pipscope_types::{MetricMap, category};

use crate::calendar::is_weekend;
use crate::io::store::CandleStore;
use crate::metrics::levels::{self, key_levels};
use crate::metrics::{MetricCalculator, TRADING_WEEKDAYS, percentage, weekday_name, zeroed};
use crate::types::{DailyCandle, Ohlc, WeeklyCandle};

fn names_for(day: Weekday) -> [String; 4] {
    let d = weekday_name(day);
    [
        format!("High in {d}"),
        format!("Low in {d}"),
        format!("Bullish High in {d}"),
        format!("Bearish High in {d}"),
    ]
}

/// Every metric name this module emits, paired with its category.
///
/// Includes the previous-day level metrics it delegates for.
#[must_use]
pub fn catalog_entries() -> Vec<(String, &'static str)> {
    TRADING_WEEKDAYS
        .into_iter()
        .flat_map(names_for)
        .map(|n| (n, category::OCCURRENCE))
        .chain(levels::catalog_entries())
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    high: [usize; 5],
    low: [usize; 5],
    bull_high: [usize; 5],
    bear_high: [usize; 5],
    weeks: usize,
    bull_weeks: usize,
    bear_weeks: usize,
}

fn slot(day: &DailyCandle) -> Option<usize> {
    TRADING_WEEKDAYS.iter().position(|w| *w == day.date.weekday())
}

/// Weekday occurrence of each week's high and low.
///
/// For every week the first weekday whose daily high equals the weekly high
/// is credited, likewise for the low. Weekend daily candles never take part,
/// and weeks with no weekday candles in their span are skipped. Bullish and bearish variants are normalised by their own
/// week counts.
#[must_use]
pub fn weekday_occurrence(weeks: &[WeeklyCandle], days: &[DailyCandle]) -> MetricMap {
    let mut t = Tally::default();
    for w in weeks {
        let mut members: Vec<&DailyCandle> = days
            .iter()
            .filter(|d| w.span.contains(d.date) && !is_weekend(d.date))
            .collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by_key(|d| d.date);
        t.weeks += 1;
        let bullish = w.is_bullish();
        let bearish = w.is_bearish();
        t.bull_weeks += usize::from(bullish);
        t.bear_weeks += usize::from(bearish);
        if let Some(i) = members.iter().find(|d| d.high == w.high).and_then(|d| slot(d)) {
            t.high[i] += 1;
            t.bull_high[i] += usize::from(bullish);
            t.bear_high[i] += usize::from(bearish);
        }
        if let Some(i) = members.iter().find(|d| d.low == w.low).and_then(|d| slot(d)) {
            t.low[i] += 1;
        }
    }

    let mut out = MetricMap::new();
    for (i, day) in TRADING_WEEKDAYS.into_iter().enumerate() {
        let [high, low, bull, bear] = names_for(day);
        out.insert(high, percentage(t.high[i], t.weeks).into());
        out.insert(low, percentage(t.low[i], t.weeks).into());
        out.insert(bull, percentage(t.bull_high[i], t.bull_weeks).into());
        out.insert(bear, percentage(t.bear_high[i], t.bear_weeks).into());
    }
    out
}

/// Weekday occurrence plus previous-day level probabilities.
pub struct OccurrenceCalculator {
    candles: Arc<dyn CandleStore>,
}

impl OccurrenceCalculator {
    /// Calculator over daily and weekly candles in `candles`.
    pub fn new(candles: Arc<dyn CandleStore>) -> Self {
        Self { candles }
    }
}

impl MetricCalculator for OccurrenceCalculator {
    fn name(&self) -> &'static str {
        "occurrence"
    }

    fn calculate(&self, symbol: &str, year: i32) -> MetricMap {
        let days = match self.candles.load_daily(symbol, year) {
            Ok(days) => days,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(symbol, year, error = %_e, "no daily candles; reporting zeros");
                return zeroed(self.metric_names());
            }
        };
        let weeks = self.candles.load_weekly(symbol, year).unwrap_or_else(|_e| {
            #[cfg(feature = "tracing")]
            tracing::warn!(symbol, year, error = %_e, "no weekly candles; weekday occurrence is zero");
            Vec::new()
        });
        let mut out = weekday_occurrence(&weeks, &days);
        out.extend(key_levels(&days));
        out
    }

    fn metric_names(&self) -> Vec<String> {
        catalog_entries().into_iter().map(|(n, _)| n).collect()
    }
}
