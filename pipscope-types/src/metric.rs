//! Metric values and the shapes metric maps take on their way out.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Category labels used to group metrics for display and publication.
pub mod category {
    /// Range, body and per-session/per-weekday averages.
    pub const VOLATILITY: &str = "Volatility & Range Metrics";
    /// Which session produced the daily high/low.
    pub const TIMING: &str = "High/Low Timing Distribution (per Session)";
    /// Cross-session break percentages.
    pub const INTERVALS: &str = "Intraday Interval High/Low Percentages";
    /// Directional cross-session break percentages.
    pub const DIRECTIONAL: &str = "Bullish / Bearish Specific Metrics";
    /// Weekday occurrence and previous-day level statistics.
    pub const OCCURRENCE: &str = "Daily/Weekly Occurrence Statistics";
    /// Descriptive metadata such as the covered date range.
    pub const THEMATIC: &str = "Aggregated / Thematic Metrics";
    /// Fallback for names the catalog does not know.
    pub const OTHER: &str = "Other";
}

/// A single metric value.
///
/// Every metric is numeric except the descriptive "Date Range".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Numeric value, already rounded to two decimals.
    Number(f64),
    /// Free-form text value.
    Text(String),
}

impl MetricValue {
    /// Numeric payload, if any.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// True for numeric values.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Number(_))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v:.2}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Flat metric name to value map produced by a calculator.
pub type MetricMap = BTreeMap<String, MetricValue>;

/// Metrics for one symbol grouped by category.
pub type CategorizedMetrics = BTreeMap<String, MetricMap>;

/// Orchestrator output: `{symbol: {category: {metric: value}}}`.
pub type SymbolMetrics = BTreeMap<String, CategorizedMetrics>;
