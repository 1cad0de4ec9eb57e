//! pipscope-core
//!
//! Calendar, aggregation, and metric logic for the pipscope pipeline.
//!
//! - `calendar`: trading date and trading week of an instant.
//! - `timeseries`: resampling bars into daily, weekly, and intraday candles.
//! - `io`: raw input parsing, candle files, and the candle store.
//! - `sessions`: per-day session attribution and its cache.
//! - `metrics`: the calculators and the metric catalog.
//! - `publisher`: the `Publisher` trait metric destinations implement.
//!
//! Everything except `publisher` is synchronous. Callers that run symbols concurrently
//! share the read-only configuration and rely on stores being keyed by
//! (symbol, year), so no two workers touch the same entry.
#![warn(missing_docs)]

/// Forex trading calendar.
pub mod calendar;
/// File formats and candle persistence.
pub mod io;
/// Metric calculators and the metric catalog.
pub mod metrics;
/// The publication seam implemented by metric destinations.
pub mod publisher;
/// Session attribution and its record store.
pub mod sessions;
/// Candle aggregation and per-timeframe builds.
pub mod timeseries;
pub mod types;

pub use calendar::{day_start_hour, trading_date, week_start};
pub use io::store::{CandleStore, FsCandleStore, MemoryCandleStore};
pub use metrics::MetricCalculator;
pub use metrics::catalog::MetricCatalog;
pub use pipscope_types::PipscopeError;
pub use publisher::Publisher;
pub use sessions::{
    DailySessionRecord, FileRecordStore, MemoryRecordStore, SessionAttributor, SessionRecordStore,
};
pub use timeseries::build::{BuildOutcome, build_timeframes, missing_timeframes};
pub use timeseries::resample::{
    resample, resample_to_minutes, resample_to_trading_days, resample_to_trading_weeks,
};
pub use types::*;
