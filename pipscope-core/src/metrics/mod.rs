//! Metric calculators.
//!
//! Every calculator implements [`MetricCalculator`]: given a symbol and a
//! year it returns a flat name to value map. Input problems never surface as
//! errors; a calculator logs them and reports its all-zero defaults instead.
/// Metric name to category lookup and profile filtering.
pub mod catalog;
/// Previous-day high/low break probabilities.
pub mod levels;
/// Weekday occurrence of weekly extremes.
pub mod occurrence;
/// Session distribution and cross-session breaks.
pub mod session_metrics;
/// Range and body averages.
pub mod volatility;

use chrono::Weekday;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use pipscope_types::MetricMap;

/// Name of the descriptive date-range metric.
pub const DATE_RANGE: &str = "Date Range";

/// Trading weekdays in calendar order.
pub const TRADING_WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

/// A source of metrics for one (symbol, year).
pub trait MetricCalculator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Compute every metric this calculator owns.
    ///
    /// Missing or malformed inputs yield the calculator's defaults.
    fn calculate(&self, symbol: &str, year: i32) -> MetricMap;

    /// Names of every metric [`calculate`](Self::calculate) emits.
    fn metric_names(&self) -> Vec<String>;
}

/// Round to two decimals, halves away from zero.
#[must_use]
pub fn round2(v: Decimal) -> f64 {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// `count / total * 100`, rounded to two decimals; 0.0 when `total` is 0.
#[must_use]
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(Decimal::from(count) * Decimal::ONE_HUNDRED / Decimal::from(total))
}

/// Arithmetic mean of `values` scaled by `factor`, rounded to two decimals;
/// 0.0 for an empty input.
#[must_use]
pub fn scaled_mean(values: impl IntoIterator<Item = Decimal>, factor: u32) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((Decimal::ZERO, 0u64), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return 0.0;
    }
    round2(sum * Decimal::from(factor) / Decimal::from(n))
}

/// English weekday name used in metric labels.
#[must_use]
pub const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub(crate) fn zeroed(names: Vec<String>) -> MetricMap {
    names.into_iter().map(|n| (n, 0.0.into())).collect()
}
