//! Candle aggregation.
//!
//! - `resample`: calendar-aware daily/weekly and fixed-width intraday bucketing
//! - `build`: produce and persist every configured timeframe for a dataset
/// Idempotent per-timeframe aggregation into a candle store.
pub mod build;
/// Resampling utilities for aggregating bars to trading days, weeks, and minute buckets.
pub mod resample;
