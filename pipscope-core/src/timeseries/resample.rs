use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use pipscope_types::Timeframe;

use crate::calendar::{is_weekend, monday_of, trading_date};
use crate::types::{Candle, CandleSeries, DailyCandle, Ohlc, WeekSpan, WeeklyCandle};

/// Minimum number of distinct trading dates for a week to be emitted.
pub const MIN_DAYS_PER_WEEK: usize = 5;

/// Running OHLC aggregate for one bucket.
#[derive(Debug, Clone, Copy)]
struct BucketAgg<K> {
    key: K,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    members: usize,
}

impl<K> BucketAgg<K> {
    fn start<T: Ohlc>(key: K, item: &T) -> Self {
        Self {
            key,
            open: item.open(),
            high: item.high(),
            low: item.low(),
            close: item.close(),
            members: 1,
        }
    }

    fn absorb<T: Ohlc>(&mut self, item: &T) {
        if item.high() > self.high {
            self.high = item.high();
        }
        if item.low() < self.low {
            self.low = item.low();
        }
        self.close = item.close();
        self.members += 1;
    }
}

/// Generic folder that groups ordered items by a bucket function and
/// aggregates OHLC within each bucket.
///
/// Items for which `bucket_of` returns `None` are skipped. A bucket closes
/// when the key changes, so keys must be non-decreasing over the input.
fn resample_by<T, K, F>(items: impl IntoIterator<Item = T>, bucket_of: F) -> Vec<BucketAgg<K>>
where
    T: Ohlc,
    K: PartialEq + Copy,
    F: Fn(&T) -> Option<K>,
{
    let mut out: Vec<BucketAgg<K>> = Vec::new();
    let mut cur: Option<BucketAgg<K>> = None;

    for item in items {
        let Some(key) = bucket_of(&item) else {
            continue;
        };
        match cur.as_mut() {
            Some(agg) if agg.key == key => agg.absorb(&item),
            _ => {
                if let Some(done) = cur.take() {
                    out.push(done);
                }
                cur = Some(BucketAgg::start(key, &item));
            }
        }
    }
    if let Some(done) = cur {
        out.push(done);
    }
    out
}

fn sorted(mut bars: Vec<Candle>) -> Vec<Candle> {
    bars.sort_by_key(|c| c.ts);
    bars
}

fn weekday_trading_date(ts: DateTime<Utc>) -> Option<NaiveDate> {
    let d = trading_date(ts);
    (!is_weekend(d)).then_some(d)
}

/// Aggregate bars into one candle per trading date.
///
/// - Groups by [`trading_date`].
/// - Open = first open, High = max high, Low = min low, Close = last close.
/// - Trading dates falling on Saturday or Sunday are dropped.
#[must_use]
pub fn resample_to_trading_days(bars: Vec<Candle>) -> Vec<DailyCandle> {
    resample_by(sorted(bars), |c| weekday_trading_date(c.ts))
        .into_iter()
        .map(|b| DailyCandle {
            date: b.key,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
        })
        .collect()
}

/// Aggregate bars into one candle per complete trading week.
///
/// Weeks are keyed by the Monday of each bar's trading date. A week is
/// emitted only if at least [`MIN_DAYS_PER_WEEK`] distinct weekday trading
/// dates contributed to it, so the partial weeks at either end of a dataset
/// (or a week with a holiday) are dropped. Weekend trading dates never
/// contribute, which keeps every weekly high equal to the max of its daily highs.
#[must_use]
pub fn resample_to_trading_weeks(bars: Vec<Candle>) -> Vec<WeeklyCandle> {
    let days = resample_to_trading_days(bars);
    resample_by(days, |d| Some(monday_of(d.date)))
        .into_iter()
        .filter(|b| b.members >= MIN_DAYS_PER_WEEK)
        .map(|b| WeeklyCandle {
            span: WeekSpan::new(b.key),
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
        })
        .collect()
}

/// Aggregate bars into fixed `minutes`-wide buckets.
///
/// Buckets are aligned to the Unix epoch and half-open, `[start, start + step)`,
/// which makes hourly buckets hour-aligned and 15-minute buckets
/// quarter-hour-aligned. Bars whose trading date falls on a weekend are
/// excluded first. Empty buckets produce no candle.
#[must_use]
pub fn resample_to_minutes(bars: Vec<Candle>, minutes: i64) -> Vec<Candle> {
    if minutes <= 0 {
        return Vec::new();
    }
    let step = minutes * 60;
    resample_by(sorted(bars), |c| {
        weekday_trading_date(c.ts)?;
        let secs = c.ts.timestamp();
        Some(secs - secs.rem_euclid(step))
    })
    .into_iter()
    .filter_map(|b| {
        Some(Candle {
            ts: DateTime::from_timestamp(b.key, 0)?,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
        })
    })
    .collect()
}

/// Aggregate bars to the requested timeframe.
#[must_use]
pub fn resample(bars: Vec<Candle>, timeframe: Timeframe) -> CandleSeries {
    match timeframe.intraday_minutes() {
        Some(minutes) => CandleSeries::Intraday(resample_to_minutes(bars, minutes)),
        None if timeframe == Timeframe::Week1 => {
            CandleSeries::Weekly(resample_to_trading_weeks(bars))
        }
        None => CandleSeries::Daily(resample_to_trading_days(bars)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Weekday};
    use rust_decimal_macros::dec;

    fn bar(y: i32, m: u32, d: u32, hh: u32, mm: u32, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle {
            ts: Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap(),
            open: o,
            high: h,
            low: l,
            close: c,
        }
    }

    fn flat(y: i32, m: u32, d: u32, hh: u32, mm: u32, p: Decimal) -> Candle {
        bar(y, m, d, hh, mm, p, p, p, p)
    }

    #[test]
    fn daily_candle_spans_rollover() {
        // Summer: Monday's trading day runs Sun 21:00 .. Mon 20:55.
        let bars = vec![
            bar(2024, 7, 7, 21, 0, dec!(1.10), dec!(1.11), dec!(1.09), dec!(1.105)),
            bar(2024, 7, 8, 12, 0, dec!(1.105), dec!(1.12), dec!(1.10), dec!(1.115)),
            bar(2024, 7, 8, 20, 55, dec!(1.115), dec!(1.116), dec!(1.08), dec!(1.09)),
            bar(2024, 7, 8, 21, 0, dec!(1.09), dec!(1.095), dec!(1.085), dec!(1.092)),
        ];
        let days = resample_to_trading_days(bars);
        assert_eq!(days.len(), 2);
        let mon = days[0];
        assert_eq!(mon.date.weekday(), Weekday::Mon);
        assert_eq!(mon.open, dec!(1.10));
        assert_eq!(mon.high, dec!(1.12));
        assert_eq!(mon.low, dec!(1.08));
        assert_eq!(mon.close, dec!(1.09));
        assert_eq!(days[1].date.weekday(), Weekday::Tue);
    }

    #[test]
    fn friday_evening_bars_are_dropped_from_daily() {
        let bars = vec![
            flat(2024, 7, 12, 20, 55, dec!(1.1)),
            flat(2024, 7, 12, 21, 0, dec!(1.2)),
            flat(2024, 7, 13, 3, 0, dec!(1.3)),
        ];
        let days = resample_to_trading_days(bars);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].high, dec!(1.1));
    }

    #[test]
    fn four_day_week_is_excluded() {
        // Mon..Thu of 2024-07-08, then a full Mon..Fri week.
        let mut bars = Vec::new();
        for d in 8..=11 {
            bars.push(flat(2024, 7, d, 10, 0, dec!(1.1)));
        }
        for d in 15..=19 {
            bars.push(flat(2024, 7, d, 10, 0, dec!(1.2)));
        }
        let weeks = resample_to_trading_weeks(bars);
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].span.to_string(), "2024-07-15 to 2024-07-19");
    }

    #[test]
    fn weekly_ohlc_matches_daily_extremes() {
        let mut bars = Vec::new();
        let highs = [dec!(1.11), dec!(1.15), dec!(1.12), dec!(1.13), dec!(1.14)];
        for (i, h) in highs.iter().enumerate() {
            let d = 15 + u32::try_from(i).unwrap();
            bars.push(bar(2024, 7, d, 8, 0, dec!(1.10), *h, dec!(1.05), dec!(1.10)));
        }
        bars.push(bar(2024, 7, 19, 20, 55, dec!(1.10), dec!(1.10), dec!(1.04), dec!(1.07)));
        let weeks = resample_to_trading_weeks(bars);
        assert_eq!(weeks.len(), 1);
        let w = weeks[0];
        assert_eq!(w.open, dec!(1.10));
        assert_eq!(w.high, dec!(1.15));
        assert_eq!(w.low, dec!(1.04));
        assert_eq!(w.close, dec!(1.07));
    }

    #[test]
    fn intraday_buckets_are_half_open_and_sparse() {
        let bars = vec![
            flat(2024, 7, 9, 10, 0, dec!(1.0)),
            flat(2024, 7, 9, 10, 55, dec!(2.0)),
            flat(2024, 7, 9, 11, 0, dec!(3.0)),
            flat(2024, 7, 9, 14, 5, dec!(4.0)),
        ];
        let hours = resample_to_minutes(bars, 60);
        assert_eq!(hours.len(), 3);
        assert_eq!(hours[0].ts, Utc.with_ymd_and_hms(2024, 7, 9, 10, 0, 0).unwrap());
        assert_eq!(hours[0].open, dec!(1.0));
        assert_eq!(hours[0].close, dec!(2.0));
        assert_eq!(hours[1].ts, Utc.with_ymd_and_hms(2024, 7, 9, 11, 0, 0).unwrap());
        assert_eq!(hours[2].ts, Utc.with_ymd_and_hms(2024, 7, 9, 14, 0, 0).unwrap());
    }

    #[test]
    fn intraday_excludes_weekend_trading_dates() {
        let bars = vec![
            flat(2024, 7, 12, 20, 55, dec!(1.0)),
            flat(2024, 7, 12, 21, 5, dec!(2.0)),
            flat(2024, 7, 14, 21, 5, dec!(3.0)),
        ];
        let out = resample_to_minutes(bars, 5);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].open, dec!(1.0));
        assert_eq!(out[1].open, dec!(3.0));
    }

    #[test]
    fn unsorted_input_is_handled() {
        let bars = vec![
            flat(2024, 7, 9, 10, 5, dec!(2.0)),
            flat(2024, 7, 9, 10, 0, dec!(1.0)),
        ];
        let out = resample_to_minutes(bars, 15);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].open, dec!(1.0));
        assert_eq!(out[0].close, dec!(2.0));
    }

    #[test]
    fn empty_input_yields_empty_series() {
        for tf in Timeframe::ALL {
            assert!(resample(Vec::new(), tf).is_empty());
        }
    }
}
