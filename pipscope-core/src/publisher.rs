use async_trait::async_trait;

use pipscope_types::{CategorizedMetrics, MetricMap, PipscopeError};

/// Destination for per-symbol metrics, one table per profile.
///
/// Implementations classify failures through [`PipscopeError::is_transient`]
/// so callers can decide what to retry.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Make sure the profile's table has a column for every metric in `sample`.
    ///
    /// Numeric metrics become number columns; text metrics become text columns.
    async fn ensure_properties(
        &self,
        profile: &str,
        sample: &MetricMap,
    ) -> Result<(), PipscopeError>;

    /// Write one symbol's metrics into the profile's table.
    async fn publish(
        &self,
        profile: &str,
        symbol: &str,
        metrics: &CategorizedMetrics,
    ) -> Result<(), PipscopeError>;
}
