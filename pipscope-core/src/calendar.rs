//! Forex trading calendar.
//!
//! A trading day starts at a rollover hour in UTC: 21:00 while US Eastern
//! observes daylight saving time, 22:00 otherwise. Sunday has no trading day
//! of its own; anything on a Sunday belongs to Monday.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::OffsetComponents;

/// Rollover hour while the reference market observes daylight saving time.
pub const SUMMER_ROLLOVER_HOUR: u32 = 21;
/// Rollover hour outside daylight saving time.
pub const WINTER_ROLLOVER_HOUR: u32 = 22;

/// Rollover hour (UTC) of the trading day containing `ts`.
///
/// This is the only place the rollover hour is decided.
#[must_use]
pub fn day_start_hour(ts: DateTime<Utc>) -> u32 {
    let local = New_York.from_utc_datetime(&ts.naive_utc());
    if local.offset().dst_offset().is_zero() {
        WINTER_ROLLOVER_HOUR
    } else {
        SUMMER_ROLLOVER_HOUR
    }
}

/// Trading date that `ts` belongs to.
///
/// - Sunday instants always map to the following Monday.
/// - At or after the rollover hour an instant belongs to the next calendar date.
/// - Otherwise it belongs to its own calendar date.
///
/// Rollover is hour-granular; minutes and seconds are ignored.
#[must_use]
pub fn trading_date(ts: DateTime<Utc>) -> NaiveDate {
    let date = ts.date_naive();
    if date.weekday() == Weekday::Sun || ts.hour() >= day_start_hour(ts) {
        next_day(date)
    } else {
        date
    }
}

/// Monday of the trading week containing `ts`.
#[must_use]
pub fn week_start(ts: DateTime<Utc>) -> NaiveDate {
    monday_of(trading_date(ts))
}

/// Monday on or before `date`.
#[must_use]
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// Saturday or Sunday.
#[must_use]
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}
