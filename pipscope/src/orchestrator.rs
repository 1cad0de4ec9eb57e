//! Runs every registered calculator for a (symbol, year) and merges the maps.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pipscope_core::metrics::DATE_RANGE;
use pipscope_core::metrics::levels::KeyLevelsCalculator;
use pipscope_core::metrics::occurrence::OccurrenceCalculator;
use pipscope_core::metrics::session_metrics::SessionMetricsCalculator;
use pipscope_core::metrics::volatility::VolatilityCalculator;
use pipscope_core::{CandleStore, MetricCalculator, MetricCatalog, SessionRecordStore};
use pipscope_types::{CategorizedMetrics, MetricMap, MetricValue, PipelineConfig, Timeframe};

/// Holds the calculators and the catalog used to group their output.
///
/// Calculators run in registration order. On a name collision the later
/// calculator's value wins; [`MetricsOrchestrator::overlapping_names`] lists
/// such collisions so tests can assert there are none.
pub struct MetricsOrchestrator {
    calculators: Vec<Arc<dyn MetricCalculator>>,
    catalog: MetricCatalog,
}

impl MetricsOrchestrator {
    /// Empty orchestrator grouping by `catalog`.
    #[must_use]
    pub const fn new(catalog: MetricCatalog) -> Self {
        Self {
            calculators: Vec::new(),
            catalog,
        }
    }

    /// The default calculator set for a configuration.
    ///
    /// Registers session distribution, volatility, and occurrence (which
    /// also reports the previous-day levels). Without a weekly timeframe the
    /// occurrence calculator has nothing to read, so the standalone key-levels
    /// calculator takes its place.
    #[must_use]
    pub fn standard(
        cfg: &PipelineConfig,
        candles: Arc<dyn CandleStore>,
        records: Arc<dyn SessionRecordStore>,
    ) -> Self {
        let catalog = MetricCatalog::new(&cfg.sessions, cfg.profiles.clone());
        let this = Self::new(catalog)
            .with_calculator(Arc::new(SessionMetricsCalculator::new(
                cfg.sessions.clone(),
                Arc::clone(&candles),
                records,
            )))
            .with_calculator(Arc::new(VolatilityCalculator::new(
                cfg.sessions.clone(),
                cfg.instruments.clone(),
                Arc::clone(&candles),
            )));
        if cfg.timeframes.contains(&Timeframe::Week1) {
            this.with_calculator(Arc::new(OccurrenceCalculator::new(candles)))
        } else {
            this.with_calculator(Arc::new(KeyLevelsCalculator::new(candles)))
        }
    }

    /// Register a calculator.
    #[must_use]
    pub fn with_calculator(mut self, calculator: Arc<dyn MetricCalculator>) -> Self {
        self.calculators.push(calculator);
        #[cfg(feature = "tracing")]
        {
            let overlap = self.overlapping_names();
            if !overlap.is_empty() {
                tracing::warn!(
                    calculator = self.calculators.last().map_or("", |c| c.name()),
                    names = ?overlap,
                    "metric names emitted by more than one calculator"
                );
            }
        }
        self
    }

    /// Registered calculators in run order.
    #[must_use]
    pub fn calculators(&self) -> &[Arc<dyn MetricCalculator>] {
        &self.calculators
    }

    /// Catalog used for grouping and profile filtering.
    #[must_use]
    pub const fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Names emitted by more than one registered calculator.
    #[must_use]
    pub fn overlapping_names(&self) -> BTreeSet<String> {
        let mut owners: BTreeMap<String, usize> = BTreeMap::new();
        for c in &self.calculators {
            for name in c.metric_names() {
                *owners.entry(name).or_insert(0) += 1;
            }
        }
        owners
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| name)
            .collect()
    }

    /// Every metric name the registered calculators emit plus "Date Range".
    #[must_use]
    pub fn metric_names(&self) -> BTreeSet<String> {
        self.calculators
            .iter()
            .flat_map(|c| c.metric_names())
            .chain(std::iter::once(DATE_RANGE.to_string()))
            .collect()
    }

    /// Flat merged metrics for one (symbol, year).
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "pipscope::orchestrator::compute",
            skip(self),
            fields(calculators = self.calculators.len()),
        )
    )]
    pub fn compute(&self, symbol: &str, year: i32) -> MetricMap {
        let mut merged = MetricMap::new();
        for c in &self.calculators {
            let out = c.calculate(symbol, year);
            #[cfg(feature = "tracing")]
            tracing::debug!(calculator = c.name(), metrics = out.len(), "calculator finished");
            merged.extend(out);
        }
        merged.insert(DATE_RANGE.to_string(), MetricValue::Text(date_range(year)));
        merged
    }

    /// Merged metrics for one (symbol, year), grouped by category.
    pub fn run(&self, symbol: &str, year: i32) -> CategorizedMetrics {
        self.catalog.group_by_category(&self.compute(symbol, year))
    }
}

/// The descriptive span reported for a dataset year.
#[must_use]
pub fn date_range(year: i32) -> String {
    format!("{year}-01-01 to {year}-12-31")
}
