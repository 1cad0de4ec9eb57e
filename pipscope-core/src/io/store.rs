use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use pipscope_types::{PipscopeError, Timeframe};

use crate::io::candles::{read_series, write_series};
use crate::types::{Candle, CandleSeries, DailyCandle, WeeklyCandle};

/// Persistence for aggregated candles keyed by (symbol, year, timeframe).
///
/// Keys are disjoint across symbols, so concurrent workers never touch the
/// same entry.
pub trait CandleStore: Send + Sync {
    /// Whether an artifact exists for the key.
    fn contains(&self, symbol: &str, year: i32, timeframe: Timeframe) -> bool;

    /// Load an artifact.
    ///
    /// # Errors
    /// Returns `NotFound` when no artifact exists for the key.
    fn load(&self, symbol: &str, year: i32, timeframe: Timeframe)
    -> Result<CandleSeries, PipscopeError>;

    /// Persist an artifact, replacing any previous one.
    ///
    /// # Errors
    /// Returns a backing-specific error on write failure.
    fn save(
        &self,
        symbol: &str,
        year: i32,
        timeframe: Timeframe,
        series: &CandleSeries,
    ) -> Result<(), PipscopeError>;

    /// Load intraday candles.
    ///
    /// # Errors
    /// Returns `NotFound` when missing and `Data` when the stored shape is not intraday.
    fn load_intraday(
        &self,
        symbol: &str,
        year: i32,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, PipscopeError> {
        self.load(symbol, year, timeframe)?
            .into_intraday()
            .ok_or_else(|| shape_error(symbol, year, timeframe))
    }

    /// Load daily candles.
    ///
    /// # Errors
    /// Returns `NotFound` when missing and `Data` when the stored shape is not daily.
    fn load_daily(&self, symbol: &str, year: i32) -> Result<Vec<DailyCandle>, PipscopeError> {
        self.load(symbol, year, Timeframe::Day1)?
            .into_daily()
            .ok_or_else(|| shape_error(symbol, year, Timeframe::Day1))
    }

    /// Load weekly candles.
    ///
    /// # Errors
    /// Returns `NotFound` when missing and `Data` when the stored shape is not weekly.
    fn load_weekly(&self, symbol: &str, year: i32) -> Result<Vec<WeeklyCandle>, PipscopeError> {
        self.load(symbol, year, Timeframe::Week1)?
            .into_weekly()
            .ok_or_else(|| shape_error(symbol, year, Timeframe::Week1))
    }
}

fn shape_error(symbol: &str, year: i32, timeframe: Timeframe) -> PipscopeError {
    PipscopeError::Data(format!(
        "stored {timeframe} candles for {symbol} {year} have the wrong shape"
    ))
}

/// Candle files under `{root}/{symbol_lower}/{SYMBOL}_{tf}_{year}.csv`.
#[derive(Debug, Clone)]
pub struct FsCandleStore {
    root: PathBuf,
}

impl FsCandleStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a key.
    #[must_use]
    pub fn path_for(&self, symbol: &str, year: i32, timeframe: Timeframe) -> PathBuf {
        self.root.join(symbol.to_ascii_lowercase()).join(format!(
            "{}_{}_{year}.csv",
            symbol.to_ascii_uppercase(),
            timeframe.key()
        ))
    }
}

impl CandleStore for FsCandleStore {
    fn contains(&self, symbol: &str, year: i32, timeframe: Timeframe) -> bool {
        self.path_for(symbol, year, timeframe).is_file()
    }

    fn load(
        &self,
        symbol: &str,
        year: i32,
        timeframe: Timeframe,
    ) -> Result<CandleSeries, PipscopeError> {
        read_series(&self.path_for(symbol, year, timeframe), timeframe)
    }

    fn save(
        &self,
        symbol: &str,
        year: i32,
        timeframe: Timeframe,
        series: &CandleSeries,
    ) -> Result<(), PipscopeError> {
        write_series(&self.path_for(symbol, year, timeframe), series)
    }
}

type Key = (String, i32, Timeframe);

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCandleStore {
    entries: RwLock<HashMap<Key, CandleSeries>>,
}

impl MemoryCandleStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(symbol: &str, year: i32, timeframe: Timeframe) -> Key {
        (symbol.to_ascii_uppercase(), year, timeframe)
    }
}

fn poisoned() -> PipscopeError {
    PipscopeError::Other("candle store lock poisoned".into())
}

impl CandleStore for MemoryCandleStore {
    fn contains(&self, symbol: &str, year: i32, timeframe: Timeframe) -> bool {
        self.entries
            .read()
            .is_ok_and(|m| m.contains_key(&Self::key(symbol, year, timeframe)))
    }

    fn load(
        &self,
        symbol: &str,
        year: i32,
        timeframe: Timeframe,
    ) -> Result<CandleSeries, PipscopeError> {
        self.entries
            .read()
            .map_err(|_| poisoned())?
            .get(&Self::key(symbol, year, timeframe))
            .cloned()
            .ok_or_else(|| {
                PipscopeError::not_found(format!("{timeframe} candles for {symbol} {year}"))
            })
    }

    fn save(
        &self,
        symbol: &str,
        year: i32,
        timeframe: Timeframe,
        series: &CandleSeries,
    ) -> Result<(), PipscopeError> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(Self::key(symbol, year, timeframe), series.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_paths_follow_layout() {
        let store = FsCandleStore::new("/data/timeframes");
        assert_eq!(
            store.path_for("eurusd", 2024, Timeframe::Minute15),
            PathBuf::from("/data/timeframes/eurusd/EURUSD_15m_2024.csv")
        );
    }

    #[test]
    fn memory_store_round_trip_and_not_found() {
        let store = MemoryCandleStore::new();
        assert!(!store.contains("EURUSD", 2024, Timeframe::Day1));
        assert!(store.load_daily("EURUSD", 2024).unwrap_err().is_missing_input());
        store
            .save("eurusd", 2024, Timeframe::Day1, &CandleSeries::Daily(vec![]))
            .unwrap();
        assert!(store.contains("EURUSD", 2024, Timeframe::Day1));
        assert!(store.load_daily("EURUSD", 2024).unwrap().is_empty());
        assert!(matches!(
            store.load_weekly("EURUSD", 2024),
            Err(PipscopeError::NotFound { .. })
        ));
    }

    #[test]
    fn wrong_shape_is_a_data_error() {
        let store = MemoryCandleStore::new();
        store
            .save("EURUSD", 2024, Timeframe::Day1, &CandleSeries::Intraday(vec![]))
            .unwrap();
        assert!(matches!(
            store.load_daily("EURUSD", 2024),
            Err(PipscopeError::Data(_))
        ));
    }

    #[test]
    fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCandleStore::new(dir.path());
        assert!(!store.contains("GBPUSD", 2023, Timeframe::Week1));
        store
            .save("GBPUSD", 2023, Timeframe::Week1, &CandleSeries::Weekly(vec![]))
            .unwrap();
        assert!(store.contains("GBPUSD", 2023, Timeframe::Week1));
        assert!(dir.path().join("gbpusd").join("GBPUSD_1w_2023.csv").is_file());
        assert!(store.load_weekly("GBPUSD", 2023).unwrap().is_empty());
    }

    #[test]
    fn leftover_staging_file_is_not_an_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCandleStore::new(dir.path());
        let path = store.path_for("EURUSD", 2024, Timeframe::Day1);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let staging = path.with_extension("csv.tmp");
        std::fs::write(&staging, "Date Time,Open,High,Low,Close\n").unwrap();

        assert!(!store.contains("EURUSD", 2024, Timeframe::Day1));
        assert!(store.load_daily("EURUSD", 2024).unwrap_err().is_missing_input());

        store
            .save("EURUSD", 2024, Timeframe::Day1, &CandleSeries::Daily(vec![]))
            .unwrap();
        assert!(store.contains("EURUSD", 2024, Timeframe::Day1));
        assert!(!staging.exists());
    }
}
