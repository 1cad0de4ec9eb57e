use std::cmp::Ordering;
use std::sync::Arc;

use rust_decimal::Decimal;

use pipscope_types::{MetricMap, SessionTable, Timeframe, category};

use crate::io::store::CandleStore;
use crate::metrics::{MetricCalculator, percentage, zeroed};
use crate::sessions::{DailySessionRecord, SessionAttributor, SessionRecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    const fn label(self) -> &'static str {
        match self {
            Self::Bullish => "Bullish",
            Self::Bearish => "Bearish",
        }
    }
}

/// Bullish/bearish classification of a day.
///
/// Uses close against open when the record carries both. Otherwise a day is
/// bullish when its high session comes after its low session in precedence
/// order and bearish in the reverse case.
fn direction(r: &DailySessionRecord, table: &SessionTable) -> Option<Direction> {
    let ord = match r.price_direction() {
        Some(ord) => ord,
        None => table
            .position(&r.daily_high_session)?
            .cmp(&table.position(&r.daily_low_session)?),
    };
    match ord {
        Ordering::Greater => Some(Direction::Bullish),
        Ordering::Less => Some(Direction::Bearish),
        Ordering::Equal => None,
    }
}

fn high_in(label: &str) -> String {
    format!("Daily High in {label} %")
}

fn low_in(label: &str) -> String {
    format!("Daily Low in {label} %")
}

/// Every metric name this module emits, paired with its category.
#[must_use]
pub fn catalog_entries(table: &SessionTable) -> Vec<(String, &'static str)> {
    let mut out = Vec::new();
    for label in table.labels() {
        out.push((high_in(label), category::TIMING));
        out.push((low_in(label), category::TIMING));
        for d in [Direction::Bullish, Direction::Bearish] {
            out.push((format!("{} {}", d.label(), high_in(label)), category::TIMING));
            out.push((format!("{} {}", d.label(), low_in(label)), category::TIMING));
        }
    }
    let names: Vec<&str> = table.windows().iter().map(|w| w.name.as_str()).collect();
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            out.push((format!("{b}-{a} High %"), category::INTERVALS));
            out.push((format!("{b}-{a} Low %"), category::INTERVALS));
            out.push((format!("Bullish {b}-{a} Low %"), category::DIRECTIONAL));
            out.push((format!("Bearish {b}-{a} High %"), category::DIRECTIONAL));
        }
    }
    out
}

/// Share of days whose high (low) fell in each session, over all labels.
#[must_use]
pub fn distribution(records: &[DailySessionRecord], table: &SessionTable) -> MetricMap {
    distribution_over(records.iter(), table, "")
}

fn distribution_over<'a>(
    records: impl Iterator<Item = &'a DailySessionRecord> + Clone,
    table: &SessionTable,
    prefix: &str,
) -> MetricMap {
    let total = records.clone().count();
    let mut out = MetricMap::new();
    for label in table.labels() {
        let highs = records.clone().filter(|r| r.daily_high_session == label).count();
        let lows = records.clone().filter(|r| r.daily_low_session == label).count();
        out.insert(format!("{prefix}{}", high_in(label)), percentage(highs, total).into());
        out.insert(format!("{prefix}{}", low_in(label)), percentage(lows, total).into());
    }
    out
}

/// [`distribution`] recomputed over bullish and bearish days separately.
///
/// Each subset is normalised by its own day count. Days that are neither
/// (close equal to open) fall in no subset.
#[must_use]
pub fn directional_distribution(
    records: &[DailySessionRecord],
    table: &SessionTable,
) -> MetricMap {
    let mut out = MetricMap::new();
    for d in [Direction::Bullish, Direction::Bearish] {
        let subset = records.iter().filter(move |r| direction(r, table) == Some(d));
        out.extend(distribution_over(subset, table, &format!("{} ", d.label())));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    High,
    Low,
}

/// How often `later` broke `earlier`'s extreme before anything in between did.
///
/// Returns `(breaks, days)` where `days` counts days on which both sessions
/// traded. Indices are positions in the session table with `earlier < later`.
fn break_count(
    records: &[DailySessionRecord],
    earlier: usize,
    later: usize,
    side: Side,
) -> (usize, usize) {
    let level = |r: &DailySessionRecord, i: usize| {
        let s = r.extremes(i);
        match side {
            Side::High => s.high,
            Side::Low => s.low,
        }
    };
    let beats = |candidate: Decimal, reference: Decimal| match side {
        Side::High => candidate > reference,
        Side::Low => candidate < reference,
    };
    let mut days = 0;
    let mut breaks = 0;
    for r in records {
        let (Some(a), Some(b)) = (level(r, earlier), level(r, later)) else {
            continue;
        };
        days += 1;
        let taken_earlier = (earlier + 1..later)
            .filter_map(|k| level(r, k))
            .any(|mid| beats(mid, a));
        if !taken_earlier && beats(b, a) {
            breaks += 1;
        }
    }
    (breaks, days)
}

/// Cross-session break percentages for every ordered pair of named sessions.
///
/// Only pairs where the second session follows the first are emitted. The
/// directional labels carry the same values as their plain counterparts.
#[must_use]
pub fn breaks(records: &[DailySessionRecord], table: &SessionTable) -> MetricMap {
    let names: Vec<&str> = table.windows().iter().map(|w| w.name.as_str()).collect();
    let mut out = MetricMap::new();
    for (i, a) in names.iter().enumerate() {
        for (j, b) in names.iter().enumerate().skip(i + 1) {
            let (hb, hd) = break_count(records, i, j, Side::High);
            let (lb, ld) = break_count(records, i, j, Side::Low);
            let high = percentage(hb, hd);
            let low = percentage(lb, ld);
            out.insert(format!("{b}-{a} High %"), high.into());
            out.insert(format!("{b}-{a} Low %"), low.into());
            out.insert(format!("Bullish {b}-{a} Low %"), low.into());
            out.insert(format!("Bearish {b}-{a} High %"), high.into());
        }
    }
    out
}

/// Every session metric for a record table.
#[must_use]
pub fn session_metrics(records: &[DailySessionRecord], table: &SessionTable) -> MetricMap {
    let mut out = distribution(records, table);
    out.extend(directional_distribution(records, table));
    out.extend(breaks(records, table));
    out
}

/// Session distribution and break metrics backed by the daily session cache.
pub struct SessionMetricsCalculator {
    attributor: SessionAttributor,
    candles: Arc<dyn CandleStore>,
    records: Arc<dyn SessionRecordStore>,
}

impl SessionMetricsCalculator {
    /// Calculator reading 5-minute candles from `candles` on a cache miss.
    pub fn new(
        sessions: SessionTable,
        candles: Arc<dyn CandleStore>,
        records: Arc<dyn SessionRecordStore>,
    ) -> Self {
        Self {
            attributor: SessionAttributor::new(sessions),
            candles,
            records,
        }
    }
}

impl MetricCalculator for SessionMetricsCalculator {
    fn name(&self) -> &'static str {
        "session_distribution"
    }

    fn calculate(&self, symbol: &str, year: i32) -> MetricMap {
        let table = self.attributor.sessions();
        match self
            .attributor
            .load_or_compute(self.records.as_ref(), symbol, year, || {
                self.candles.load_intraday(symbol, year, Timeframe::Minute5)
            }) {
            Ok(records) => session_metrics(&records, table),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(symbol, year, error = %_e, "no session data; reporting zeros");
                zeroed(self.metric_names())
            }
        }
    }

    fn metric_names(&self) -> Vec<String> {
        catalog_entries(self.attributor.sessions())
            .into_iter()
            .map(|(n, _)| n)
            .collect()
    }
}
