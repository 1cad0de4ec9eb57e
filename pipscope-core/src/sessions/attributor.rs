use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pipscope_types::{PipscopeError, SessionTable};

use crate::calendar::{is_weekend, trading_date};
use crate::sessions::store::SessionRecordStore;
use crate::types::Candle;

/// High and low reached inside one session on one trading day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExtremes {
    /// Highest high, `None` when the session had no candles.
    pub high: Option<Decimal>,
    /// Lowest low, `None` when the session had no candles.
    pub low: Option<Decimal>,
}

impl SessionExtremes {
    fn absorb(&mut self, c: &Candle) {
        self.high = Some(self.high.map_or(c.high, |h| h.max(c.high)));
        self.low = Some(self.low.map_or(c.low, |l| l.min(c.low)));
    }

    /// True when both extremes are known.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.high.is_some() && self.low.is_some()
    }
}

/// Session attribution of one trading day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySessionRecord {
    /// Trading date.
    pub trading_date: NaiveDate,
    /// Label of the session holding the day's high.
    pub daily_high_session: String,
    /// Label of the session holding the day's low.
    pub daily_low_session: String,
    /// The day's high.
    pub daily_high_value: Decimal,
    /// The day's low.
    pub daily_low_value: Decimal,
    /// Open of the first candle of the day.
    pub day_open: Option<Decimal>,
    /// Close of the last candle of the day.
    pub day_close: Option<Decimal>,
    /// Per-label extremes, aligned with [`SessionTable::labels`].
    pub sessions: Vec<SessionExtremes>,
}

impl DailySessionRecord {
    /// Extremes for the label at `index`, or an empty entry.
    #[must_use]
    pub fn extremes(&self, index: usize) -> SessionExtremes {
        self.sessions.get(index).copied().unwrap_or_default()
    }

    /// Close compared with open, when both are known.
    #[must_use]
    pub fn price_direction(&self) -> Option<std::cmp::Ordering> {
        Some(self.day_close?.cmp(&self.day_open?))
    }
}

/// Attributes each trading day's extremes to the configured sessions.
#[derive(Debug, Clone)]
pub struct SessionAttributor {
    sessions: SessionTable,
}

impl SessionAttributor {
    /// Attributor over `sessions`.
    #[must_use]
    pub const fn new(sessions: SessionTable) -> Self {
        Self { sessions }
    }

    /// The session table in precedence order.
    #[must_use]
    pub const fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// One record per trading day, in date order.
    ///
    /// A candle is assigned to the first window containing its UTC clock time;
    /// candles matching no window go to the out-of-session bucket. Ties on the
    /// daily extreme go to the earliest label in precedence order. Candles
    /// whose trading date falls on a weekend are ignored.
    #[must_use]
    pub fn attribute(&self, candles: &[Candle]) -> Vec<DailySessionRecord> {
        let mut sorted: Vec<&Candle> = candles.iter().collect();
        sorted.sort_by_key(|c| c.ts);

        let mut out = Vec::new();
        let mut day: Option<DayAccumulator> = None;
        for c in sorted {
            let date = trading_date(c.ts);
            if is_weekend(date) {
                continue;
            }
            if day.as_ref().is_some_and(|d| d.date != date)
                && let Some(done) = day.take()
            {
                out.extend(done.finish(&self.sessions));
            }
            let acc = day.get_or_insert_with(|| DayAccumulator::new(date, self.sessions.len() + 1));
            let slot = self
                .sessions
                .locate(c.ts.time())
                .unwrap_or(self.sessions.len());
            acc.absorb(slot, c);
        }
        if let Some(done) = day {
            out.extend(done.finish(&self.sessions));
        }
        out
    }

    /// Cached records for (symbol, year), computing and saving them on a miss.
    ///
    /// `candles` is only invoked on a cache miss. A failed save is logged and
    /// the fresh records are still returned.
    ///
    /// # Errors
    /// Returns the error from `candles` or from reading the cache.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "pipscope::session_records", skip(self, store, candles))
    )]
    pub fn load_or_compute<F>(
        &self,
        store: &dyn SessionRecordStore,
        symbol: &str,
        year: i32,
        candles: F,
    ) -> Result<Vec<DailySessionRecord>, PipscopeError>
    where
        F: FnOnce() -> Result<Vec<Candle>, PipscopeError>,
    {
        if let Some(records) = store.load(symbol, year)? {
            #[cfg(feature = "tracing")]
            tracing::info!(days = records.len(), "daily session records cached; reusing");
            return Ok(records);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("daily session records not cached; computing");
        let records = self.attribute(&candles()?);
        if let Err(_e) = store.save(symbol, year, &records) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "failed to cache daily session records");
        }
        Ok(records)
    }
}

struct DayAccumulator {
    date: NaiveDate,
    open: Decimal,
    close: Decimal,
    slots: Vec<SessionExtremes>,
}

impl DayAccumulator {
    fn new(date: NaiveDate, slots: usize) -> Self {
        Self {
            date,
            open: Decimal::ZERO,
            close: Decimal::ZERO,
            slots: vec![SessionExtremes::default(); slots],
        }
    }

    fn absorb(&mut self, slot: usize, c: &Candle) {
        if self.slots.iter().all(|s| s.high.is_none()) {
            self.open = c.open;
        }
        self.close = c.close;
        if let Some(s) = self.slots.get_mut(slot) {
            s.absorb(c);
        }
    }

    fn finish(self, sessions: &SessionTable) -> Option<DailySessionRecord> {
        let labels = sessions.labels();
        let mut high: Option<(usize, Decimal)> = None;
        let mut low: Option<(usize, Decimal)> = None;
        for (i, s) in self.slots.iter().enumerate() {
            if let Some(h) = s.high
                && high.is_none_or(|(_, best)| h > best)
            {
                high = Some((i, h));
            }
            if let Some(l) = s.low
                && low.is_none_or(|(_, best)| l < best)
            {
                low = Some((i, l));
            }
        }
        let (hi_idx, hi) = high?;
        let (lo_idx, lo) = low?;
        Some(DailySessionRecord {
            trading_date: self.date,
            daily_high_session: labels.get(hi_idx)?.to_string(),
            daily_low_session: labels.get(lo_idx)?.to_string(),
            daily_high_value: hi,
            daily_low_value: lo,
            day_open: Some(self.open),
            day_close: Some(self.close),
            sessions: self.slots,
        })
    }
}
