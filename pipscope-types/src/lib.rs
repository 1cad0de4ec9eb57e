//! Pipscope data transfer objects, error type, and configuration primitives.
#![warn(missing_docs)]

mod config;
pub mod error;
pub mod metric;
mod reports;
mod timeframe;

pub use config::{
    BackoffConfig, Instrument, InstrumentTable, OUT_OF_SESSION, PipelineConfig, ProfileSpec,
    PublishConfig, SessionTable, SessionWindow, default_profiles,
};
pub use error::PipscopeError;
pub use metric::{CategorizedMetrics, MetricMap, MetricValue, SymbolMetrics, category};
pub use reports::{BatchReport, ProfileTally, PublishReport};
pub use timeframe::Timeframe;
