//! pipscope turns raw 5-minute forex bars into per-symbol session and
//! volatility statistics and publishes them to profile-specific tables.
//!
//! Overview
//! - [`Pipeline`] runs one symbol end to end: raw files, reformatted history,
//!   per-timeframe candle files, then the [`MetricsOrchestrator`].
//! - [`batch`] fans symbols out over a bounded worker pool and collects a
//!   per-symbol success/failure tally instead of aborting on the first error.
//! - [`publish`] filters each symbol's metrics per profile and uploads them
//!   through a [`Publisher`], retrying transient failures with jittered
//!   exponential backoff under a shared request limit.
//!
//! Key behaviors
//! - Symbols are independent. Candle files and session caches are keyed by
//!   (symbol, year), so concurrent workers never write the same file.
//! - Missing inputs degrade a symbol's metrics to zeros; they never fail the
//!   batch. Only raw-input problems (no files, no parsable year) fail a symbol.
//! - Publication failures are isolated per (profile, symbol).
//!
//! Example
//! ```rust,ignore
//! use pipscope::{Pipeline, PipelineConfig};
//!
//! let cfg = PipelineConfig::from_toml_file("pipscope.toml")?;
//! let pipeline = Pipeline::builder().config(cfg).build()?;
//! let symbols = pipeline.discover_symbols()?;
//! let report = pipeline.run_all(&symbols).await;
//! for (symbol, err) in &report.failures {
//!     eprintln!("{symbol}: {err}");
//! }
//! ```

pub mod batch;
pub mod orchestrator;
pub mod pipeline;
pub mod publish;

pub use orchestrator::MetricsOrchestrator;
pub use pipeline::{Pipeline, PipelineBuilder, PreparedSymbol};
pub use publish::{NotionPublisher, Publisher, RetryingPublisher, publish_profiles};

pub use pipscope_core::{MetricCalculator, MetricCatalog};
pub use pipscope_types::{
    BatchReport, CategorizedMetrics, MetricMap, MetricValue, PipelineConfig, PipscopeError,
    PublishReport, SymbolMetrics, Timeframe,
};
