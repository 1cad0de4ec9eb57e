//! Per-symbol pipeline: raw bars to candle files to metrics.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use pipscope_core::io::candles::write_formatted_history;
use pipscope_core::io::raw::{locate_raw_dataset, merge_raw_files};
use pipscope_core::{
    BuildOutcome, CandleStore, FileRecordStore, FsCandleStore, MetricCalculator, MetricCatalog,
    SessionRecordStore, build_timeframes, missing_timeframes,
};
use pipscope_types::{
    BatchReport, CategorizedMetrics, PipelineConfig, PipscopeError, SessionTable, Timeframe,
};

use crate::batch;
use crate::orchestrator::MetricsOrchestrator;

/// Result of preparing one symbol's candle files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSymbol {
    /// Upper-cased symbol.
    pub symbol: String,
    /// Dataset year taken from the raw file names.
    pub year: i32,
    /// Number of valid raw bars merged, or `None` when every artifact
    /// already existed and the raw files were not read.
    pub bars: Option<usize>,
    /// Whether the reformatted history was written (false when it existed).
    pub formatted_written: bool,
    /// Outcome per configured timeframe.
    pub timeframes: BTreeMap<Timeframe, Result<BuildOutcome, PipscopeError>>,
}

impl PreparedSymbol {
    /// Timeframes whose build failed.
    #[must_use]
    pub fn failed_timeframes(&self) -> Vec<Timeframe> {
        self.timeframes
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(tf, _)| *tf)
            .collect()
    }
}

/// A configured pipeline. Cheap to clone; clones share stores and calculators.
#[derive(Clone)]
pub struct Pipeline {
    cfg: Arc<PipelineConfig>,
    candles: Arc<dyn CandleStore>,
    records: Arc<dyn SessionRecordStore>,
    orchestrator: Arc<MetricsOrchestrator>,
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    cfg: PipelineConfig,
    candles: Option<Arc<dyn CandleStore>>,
    records: Option<Arc<dyn SessionRecordStore>>,
    extra: Vec<Arc<dyn MetricCalculator>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Builder starting from [`PipelineConfig::default`].
    ///
    /// Unless overridden, candle files live under `data_dir/timeframes` and
    /// session records under `data_dir/metrics/session_distribution`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: PipelineConfig::default(),
            candles: None,
            records: None,
            extra: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: PipelineConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Set the root data directory.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cfg.data_dir = dir.into();
        self
    }

    /// Upper bound on symbols processed concurrently.
    #[must_use]
    pub const fn max_workers(mut self, n: usize) -> Self {
        self.cfg.max_workers = n;
        self
    }

    /// Timeframes to aggregate.
    #[must_use]
    pub fn timeframes(mut self, timeframes: Vec<Timeframe>) -> Self {
        self.cfg.timeframes = timeframes;
        self
    }

    /// Session windows in precedence order.
    #[must_use]
    pub fn sessions(mut self, sessions: SessionTable) -> Self {
        self.cfg.sessions = sessions;
        self
    }

    /// Use a custom candle store instead of the filesystem layout.
    #[must_use]
    pub fn candle_store(mut self, store: Arc<dyn CandleStore>) -> Self {
        self.candles = Some(store);
        self
    }

    /// Use a custom session record store instead of the filesystem cache.
    #[must_use]
    pub fn record_store(mut self, store: Arc<dyn SessionRecordStore>) -> Self {
        self.records = Some(store);
        self
    }

    /// Run an additional calculator after the standard set.
    #[must_use]
    pub fn with_calculator(mut self, calculator: Arc<dyn MetricCalculator>) -> Self {
        self.extra.push(calculator);
        self
    }

    /// Validate the configuration and assemble the pipeline.
    ///
    /// # Errors
    /// Returns `Config` when [`PipelineConfig::validate`] rejects the settings.
    pub fn build(self) -> Result<Pipeline, PipscopeError> {
        self.cfg.validate()?;
        let candles = self
            .candles
            .unwrap_or_else(|| Arc::new(FsCandleStore::new(self.cfg.timeframes_dir())));
        let records = self.records.unwrap_or_else(|| {
            Arc::new(FileRecordStore::new(
                self.cfg.session_cache_dir(),
                self.cfg.sessions.clone(),
            ))
        });
        let orchestrator = self.extra.into_iter().fold(
            MetricsOrchestrator::standard(&self.cfg, Arc::clone(&candles), Arc::clone(&records)),
            MetricsOrchestrator::with_calculator,
        );
        Ok(Pipeline {
            cfg: Arc::new(self.cfg),
            candles,
            records,
            orchestrator: Arc::new(orchestrator),
        })
    }
}

impl Pipeline {
    /// Start building a pipeline.
    ///
    /// ```rust,ignore
    /// let pipeline = pipscope::Pipeline::builder()
    ///     .data_dir("data")
    ///     .max_workers(4)
    ///     .build()?;
    /// ```
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// The orchestrator running the calculators.
    #[must_use]
    pub fn orchestrator(&self) -> &MetricsOrchestrator {
        &self.orchestrator
    }

    /// Catalog used for grouping and profile filtering.
    #[must_use]
    pub fn catalog(&self) -> &MetricCatalog {
        self.orchestrator.catalog()
    }

    /// Backing candle store.
    #[must_use]
    pub fn candle_store(&self) -> &Arc<dyn CandleStore> {
        &self.candles
    }

    /// Backing session record store.
    #[must_use]
    pub fn record_store(&self) -> &Arc<dyn SessionRecordStore> {
        &self.records
    }

    /// Symbols with a raw data directory under `data_dir/raw`, upper-cased and sorted.
    ///
    /// # Errors
    /// Returns `NotFound` when `data_dir/raw` does not exist.
    pub fn discover_symbols(&self) -> Result<Vec<String>, PipscopeError> {
        let root = self.cfg.data_dir.join("raw");
        let entries = std::fs::read_dir(&root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipscopeError::not_found(format!("raw data directory {}", root.display()))
            } else {
                PipscopeError::from(e)
            }
        })?;
        let mut symbols: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_ascii_uppercase))
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    /// Load raw bars, write the reformatted history, and build candle files.
    ///
    /// The dataset year comes from the raw file names alone. When the
    /// reformatted history and every configured timeframe already exist the
    /// raw rows are not read. A failed timeframe is recorded in the result
    /// and does not fail the symbol.
    ///
    /// # Errors
    /// Returns `NotFound` when the symbol has no raw files, `InvalidArg` when
    /// no file name carries a year, `Data` when no row parses, and `Io`/`Csv`
    /// when the reformatted history cannot be written.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "pipscope::pipeline::prepare", skip(self))
    )]
    pub fn prepare(&self, symbol: &str) -> Result<PreparedSymbol, PipscopeError> {
        let symbol = symbol.to_ascii_uppercase();
        let (files, year) = locate_raw_dataset(&self.cfg.raw_dir(&symbol))?;
        let formatted = self
            .cfg
            .formatted_dir()
            .join(format!("{symbol}_{year}.csv"));
        let missing = missing_timeframes(self.candles.as_ref(), &symbol, year, &self.cfg.timeframes);

        if missing.is_empty() && formatted.is_file() {
            #[cfg(feature = "tracing")]
            tracing::debug!(year, "all artifacts present; raw files not read");
            return Ok(PreparedSymbol {
                symbol,
                year,
                bars: None,
                formatted_written: false,
                timeframes: self
                    .cfg
                    .timeframes
                    .iter()
                    .map(|tf| (*tf, Ok(BuildOutcome::Reused)))
                    .collect(),
            });
        }

        let bars = merge_raw_files(&files)?;
        if bars.is_empty() {
            return Err(PipscopeError::Data(format!(
                "no valid raw bars for {symbol}"
            )));
        }
        let formatted_written = write_formatted_history(&formatted, &bars)?;
        let timeframes =
            build_timeframes(self.candles.as_ref(), &symbol, year, &bars, &self.cfg.timeframes);
        Ok(PreparedSymbol {
            symbol,
            year,
            bars: Some(bars.len()),
            formatted_written,
            timeframes,
        })
    }

    /// Prepare a symbol and compute its grouped metrics.
    ///
    /// # Errors
    /// See [`Pipeline::prepare`]. Metric inputs that are still missing after
    /// preparation degrade to zeros rather than failing.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "pipscope::pipeline::run_symbol", skip(self))
    )]
    pub fn run_symbol(&self, symbol: &str) -> Result<CategorizedMetrics, PipscopeError> {
        let prepared = self.prepare(symbol)?;
        #[cfg(feature = "tracing")]
        for tf in prepared.failed_timeframes() {
            tracing::warn!(timeframe = %tf, "timeframe unavailable; dependent metrics will be zero");
        }
        Ok(self.orchestrator.run(&prepared.symbol, prepared.year))
    }

    /// Compute metrics for every symbol on the worker pool.
    pub async fn run_all(&self, symbols: &[String]) -> BatchReport<CategorizedMetrics> {
        let this = self.clone();
        batch::run_blocking(symbols, self.cfg.max_workers, move |s| this.run_symbol(s)).await
    }

    /// Build candle files for every symbol on the worker pool.
    pub async fn prepare_all(&self, symbols: &[String]) -> BatchReport<PreparedSymbol> {
        let this = self.clone();
        batch::run_blocking(symbols, self.cfg.max_workers, move |s| this.prepare(s)).await
    }

    /// Drop cached session records, for one (symbol, year) or all of them.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn clear_session_cache(&self, target: Option<(&str, i32)>) -> Result<usize, PipscopeError> {
        let removed = match target {
            Some((symbol, year)) => {
                usize::from(self.records.clear(&symbol.to_ascii_uppercase(), year)?)
            }
            None => self.records.clear_all()?,
        };
        #[cfg(feature = "tracing")]
        tracing::info!(removed, "cleared session record cache");
        Ok(removed)
    }
}
