use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use pipscope_core::Candle;

/// Starting price of every walk, in 1e-5 units (1.10000).
const BASE_POINTS: i64 = 110_000;

/// Contiguous 5-minute bars following a seeded random walk.
///
/// The same `(start, count, seed)` always yields the same bars. Prices stay
/// within roughly 300 pips of 1.10000.
#[must_use]
pub fn five_minute_walk(start: DateTime<Utc>, count: usize, seed: u64) -> Vec<Candle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut px = BASE_POINTS;
    let mut ts = start;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let open = px;
        px = (px + rng.random_range(-12..=12)).clamp(BASE_POINTS - 3_000, BASE_POINTS + 3_000);
        let up: i64 = rng.random_range(0..=6);
        let down: i64 = rng.random_range(0..=6);
        out.push(Candle {
            ts,
            open: Decimal::new(open, 5),
            high: Decimal::new(open.max(px) + up, 5),
            low: Decimal::new(open.min(px) - down, 5),
            close: Decimal::new(px, 5),
        });
        ts += Duration::minutes(5);
    }
    out
}

/// Bars covering `weeks` full trading weeks starting the week of `monday`.
///
/// Each week runs from the preceding Sunday 00:00 UTC through Friday 23:55
/// UTC, so every weekday trading date is complete and the weekend tails are
/// left for the aggregator to drop.
#[must_use]
pub fn trading_weeks(monday: NaiveDate, weeks: u32, seed: u64) -> Vec<Candle> {
    let mut out = Vec::new();
    for w in 0..weeks {
        let Some(sunday) = monday
            .checked_add_days(Days::new(u64::from(w) * 7))
            .and_then(|m| m.pred_opt())
        else {
            break;
        };
        let Some(start) = sunday.and_hms_opt(0, 0, 0) else {
            break;
        };
        // Sunday 00:00 .. Friday 23:55 is six days of 288 bars.
        out.extend(five_minute_walk(
            start.and_utc(),
            6 * 288,
            seed.wrapping_add(u64::from(w)),
        ));
    }
    out
}

/// A single flat bar.
#[must_use]
pub fn flat_bar(ts: DateTime<Utc>, price: Decimal) -> Candle {
    Candle {
        ts,
        open: price,
        high: price,
        low: price,
        close: price,
    }
}
