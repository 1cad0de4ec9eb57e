//! Configuration types shared by the compute pipeline and publication.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::PipscopeError;
use crate::metric::category;
use crate::timeframe::Timeframe;

/// Label of the synthetic bucket for candles that match no configured window.
pub const OUT_OF_SESSION: &str = "Out of Session";

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// A named wall-clock trading window.
///
/// Matching is half-open, `[start, end)`. A window whose `start` is later
/// than its `end` crosses midnight and matches either side of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    /// Display name used in metric labels (e.g. "London").
    pub name: String,
    /// Inclusive start time of day.
    pub start: NaiveTime,
    /// Exclusive end time of day.
    pub end: NaiveTime,
}

impl SessionWindow {
    /// Build a window from a name and hour/minute pairs.
    pub fn new(name: impl Into<String>, start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            start: hm(start.0, start.1),
            end: hm(end.0, end.1),
        }
    }

    /// True when the window wraps past midnight.
    #[must_use]
    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Whether a time of day falls inside the window.
    #[must_use]
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.crosses_midnight() {
            t >= self.start || t < self.end
        } else {
            t >= self.start && t < self.end
        }
    }
}

/// Ordered list of session windows.
///
/// Declaration order is chronological precedence: it decides which window
/// wins when a time matches more than one, which session wins a tie on the
/// daily extreme, and which pairs count as "earlier/later" for breaks.
/// [`OUT_OF_SESSION`] is always implicitly last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionTable {
    windows: Vec<SessionWindow>,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self {
            windows: vec![
                SessionWindow::new("Asia", (21, 0), (3, 0)),
                SessionWindow::new("Frankfurt", (6, 0), (7, 0)),
                SessionWindow::new("London", (7, 0), (10, 0)),
                SessionWindow::new("Lunch", (10, 0), (12, 0)),
                SessionWindow::new("NY", (12, 0), (16, 0)),
            ],
        }
    }
}

impl SessionTable {
    /// Build a table from windows in precedence order.
    ///
    /// # Errors
    /// Returns `Config` if the table is empty, a name repeats, a name collides
    /// with [`OUT_OF_SESSION`], or a window has zero length.
    pub fn new(windows: Vec<SessionWindow>) -> Result<Self, PipscopeError> {
        let table = Self { windows };
        table.validate()?;
        Ok(table)
    }

    /// Check the invariants listed on [`SessionTable::new`].
    ///
    /// # Errors
    /// See [`SessionTable::new`].
    pub fn validate(&self) -> Result<(), PipscopeError> {
        if self.windows.is_empty() {
            return Err(PipscopeError::Config("session table is empty".into()));
        }
        let mut seen = HashSet::new();
        for w in &self.windows {
            if w.name == OUT_OF_SESSION {
                return Err(PipscopeError::Config(format!(
                    "'{OUT_OF_SESSION}' is reserved and cannot be configured"
                )));
            }
            if !seen.insert(w.name.as_str()) {
                return Err(PipscopeError::Config(format!(
                    "duplicate session '{}'",
                    w.name
                )));
            }
            if w.start == w.end {
                return Err(PipscopeError::Config(format!(
                    "session '{}' has zero length",
                    w.name
                )));
            }
        }
        Ok(())
    }

    /// Configured windows in precedence order.
    #[must_use]
    pub fn windows(&self) -> &[SessionWindow] {
        &self.windows
    }

    /// Number of named windows (excluding the out-of-session bucket).
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// True when no windows are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Named window names followed by [`OUT_OF_SESSION`].
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.windows
            .iter()
            .map(|w| w.name.as_str())
            .chain(std::iter::once(OUT_OF_SESSION))
            .collect()
    }

    /// Index of the first window containing `t`, or `None` when out of session.
    #[must_use]
    pub fn locate(&self, t: NaiveTime) -> Option<usize> {
        self.windows.iter().position(|w| w.contains(t))
    }

    /// Precedence position of a label; [`OUT_OF_SESSION`] sorts last.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        if label == OUT_OF_SESSION {
            return Some(self.windows.len());
        }
        self.windows.iter().position(|w| w.name == label)
    }
}

/// Static description of a tradable currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Human-readable name, e.g. "EUR/USD".
    pub name: String,
    /// Multiplier converting a raw price delta into pips.
    pub pip_factor: u32,
}

/// Symbol to [`Instrument`] lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentTable {
    pairs: BTreeMap<String, Instrument>,
}

impl Default for InstrumentTable {
    fn default() -> Self {
        let mut pairs = BTreeMap::new();
        for (sym, name, pip_factor) in [
            ("EURUSD", "EUR/USD", 10_000),
            ("GBPUSD", "GBP/USD", 10_000),
            ("USDJPY", "USD/JPY", 100),
            ("USDCHF", "USD/CHF", 10_000),
        ] {
            pairs.insert(
                sym.to_string(),
                Instrument {
                    name: name.to_string(),
                    pip_factor,
                },
            );
        }
        Self { pairs }
    }
}

impl InstrumentTable {
    /// Empty table; every lookup falls back to the quote-currency heuristic.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            pairs: BTreeMap::new(),
        }
    }

    /// Register or replace an instrument.
    pub fn insert(&mut self, symbol: &str, instrument: Instrument) {
        self.pairs.insert(symbol.to_ascii_uppercase(), instrument);
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.pairs.get(&symbol.to_ascii_uppercase())
    }

    /// Pip factor for a symbol.
    ///
    /// Unknown symbols use 100 for JPY-quoted pairs and 10 000 otherwise.
    #[must_use]
    pub fn pip_factor(&self, symbol: &str) -> u32 {
        self.get(symbol).map_or_else(
            || {
                if symbol.to_ascii_uppercase().ends_with("JPY") {
                    100
                } else {
                    10_000
                }
            },
            |i| i.pip_factor,
        )
    }
}

/// Exponential backoff configuration for retried publication requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 500,
            max_backoff_ms: 30_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Settings for uploading metrics to the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Upper bound on in-flight requests across all profiles.
    pub max_concurrent_requests: usize,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Base URL of the store's REST API.
    pub endpoint: String,
    /// API version header value sent with every request.
    pub api_version: String,
    /// Destination database per profile name.
    pub databases: BTreeMap<String, String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_concurrent_requests: 3,
            request_timeout_ms: 30_000,
            endpoint: "https://api.notion.com/v1".into(),
            api_version: "2022-06-28".into(),
            databases: BTreeMap::new(),
        }
    }
}

/// A destination-facing subset of metrics.
///
/// A metric belongs to the profile when its category is listed in
/// `categories` (an empty list means every category) or when its name is
/// listed in `metrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSpec {
    /// Profile name used on the command line and in publish reports.
    pub name: String,
    /// Categories included wholesale.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Individual metric names included regardless of category.
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl ProfileSpec {
    /// Whether a metric with the given name and category belongs here.
    #[must_use]
    pub fn admits(&self, metric: &str, category: &str) -> bool {
        if self.metrics.iter().any(|m| m == metric) {
            return true;
        }
        if self.metrics.is_empty() && self.categories.is_empty() {
            return true;
        }
        self.categories.iter().any(|c| c == category)
    }
}

/// The built-in profiles: `research` (everything), `desk` and `digest`.
#[must_use]
pub fn default_profiles() -> Vec<ProfileSpec> {
    vec![
        ProfileSpec {
            name: "research".into(),
            categories: Vec::new(),
            metrics: Vec::new(),
        },
        ProfileSpec {
            name: "desk".into(),
            categories: vec![
                category::VOLATILITY.into(),
                category::TIMING.into(),
                category::OCCURRENCE.into(),
                category::THEMATIC.into(),
            ],
            metrics: Vec::new(),
        },
        ProfileSpec {
            name: "digest".into(),
            categories: vec![category::THEMATIC.into()],
            metrics: [
                "Average Daily Range (pips)",
                "Average Daily Body Size (pips)",
                "PDH Probability",
                "PDL Probability",
                "PD Levels Probability",
                "Daily High in Asia %",
                "Daily Low in Asia %",
                "Daily High in London %",
                "Daily Low in London %",
                "Daily High in NY %",
                "Daily Low in NY %",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        },
    ]
}

/// Top-level configuration for a pipeline run.
///
/// Every field has a default so partial TOML files are valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the on-disk layout (`raw/`, `formatted/`, `timeframes/`, `metrics/`).
    pub data_dir: PathBuf,
    /// Upper bound on symbols processed concurrently.
    pub max_workers: usize,
    /// Timeframes produced by the aggregator.
    pub timeframes: Vec<Timeframe>,
    /// Session windows in precedence order.
    pub sessions: SessionTable,
    /// Pip factors per symbol.
    pub instruments: InstrumentTable,
    /// Destination profiles.
    pub profiles: Vec<ProfileSpec>,
    /// Retry delays for publication.
    pub backoff: BackoffConfig,
    /// Publication settings.
    pub publish: PublishConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_workers: 5,
            timeframes: Timeframe::ALL.to_vec(),
            sessions: SessionTable::default(),
            instruments: InstrumentTable::default(),
            profiles: default_profiles(),
            backoff: BackoffConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document, filling unspecified fields with defaults.
    ///
    /// # Errors
    /// Returns `Config` on malformed TOML or when validation fails.
    pub fn from_toml_str(s: &str) -> Result<Self, PipscopeError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    /// Returns `NotFound`/`Io` when the file cannot be read, otherwise as
    /// [`PipelineConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, PipscopeError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    /// Returns `Config` when `max_workers` is zero, no timeframes are
    /// configured, profile names repeat, or the session table is invalid.
    pub fn validate(&self) -> Result<(), PipscopeError> {
        if self.max_workers == 0 {
            return Err(PipscopeError::Config("max_workers must be >= 1".into()));
        }
        if self.timeframes.is_empty() {
            return Err(PipscopeError::Config("no timeframes configured".into()));
        }
        if self.publish.max_concurrent_requests == 0 {
            return Err(PipscopeError::Config(
                "publish.max_concurrent_requests must be >= 1".into(),
            ));
        }
        let mut seen = HashSet::new();
        for p in &self.profiles {
            if !seen.insert(p.name.as_str()) {
                return Err(PipscopeError::Config(format!(
                    "duplicate profile '{}'",
                    p.name
                )));
            }
        }
        self.sessions.validate()
    }

    /// Directory holding raw semicolon-delimited bar files for a symbol.
    #[must_use]
    pub fn raw_dir(&self, symbol: &str) -> PathBuf {
        self.data_dir.join("raw").join(symbol.to_ascii_lowercase())
    }

    /// Directory for reformatted price histories.
    #[must_use]
    pub fn formatted_dir(&self) -> PathBuf {
        self.data_dir.join("formatted")
    }

    /// Root directory for per-timeframe candle files.
    #[must_use]
    pub fn timeframes_dir(&self) -> PathBuf {
        self.data_dir.join("timeframes")
    }

    /// Directory for cached daily session records.
    #[must_use]
    pub fn session_cache_dir(&self) -> PathBuf {
        self.data_dir.join("metrics").join("session_distribution")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midnight_crossing_window_matches_both_sides() {
        let asia = SessionWindow::new("Asia", (21, 0), (3, 0));
        assert!(asia.crosses_midnight());
        assert!(asia.contains(hm(21, 0)));
        assert!(asia.contains(hm(23, 55)));
        assert!(asia.contains(hm(0, 0)));
        assert!(asia.contains(hm(2, 55)));
        assert!(!asia.contains(hm(3, 0)));
        assert!(!asia.contains(hm(20, 55)));
    }

    #[test]
    fn plain_window_is_half_open() {
        let london = SessionWindow::new("London", (7, 0), (10, 0));
        assert!(london.contains(hm(7, 0)));
        assert!(london.contains(hm(9, 55)));
        assert!(!london.contains(hm(10, 0)));
    }

    #[test]
    fn default_table_locates_and_orders() {
        let t = SessionTable::default();
        assert_eq!(
            t.labels(),
            vec!["Asia", "Frankfurt", "London", "Lunch", "NY", OUT_OF_SESSION]
        );
        assert_eq!(t.locate(hm(6, 30)), Some(1));
        assert_eq!(t.locate(hm(17, 0)), None);
        assert_eq!(t.position(OUT_OF_SESSION), Some(5));
        assert_eq!(t.position("Tokyo"), None);
    }

    #[test]
    fn table_validation_rejects_bad_tables() {
        assert!(SessionTable::new(vec![]).is_err());
        assert!(
            SessionTable::new(vec![
                SessionWindow::new("A", (1, 0), (2, 0)),
                SessionWindow::new("A", (3, 0), (4, 0)),
            ])
            .is_err()
        );
        assert!(SessionTable::new(vec![SessionWindow::new(OUT_OF_SESSION, (1, 0), (2, 0))]).is_err());
        assert!(SessionTable::new(vec![SessionWindow::new("Z", (1, 0), (1, 0))]).is_err());
    }

    #[test]
    fn pip_factor_falls_back_on_quote_currency() {
        let t = InstrumentTable::default();
        assert_eq!(t.pip_factor("eurusd"), 10_000);
        assert_eq!(t.pip_factor("USDJPY"), 100);
        assert_eq!(t.pip_factor("GBPJPY"), 100);
        assert_eq!(t.pip_factor("AUDUSD"), 10_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            data_dir = "/tmp/fx"
            max_workers = 2
            timeframes = ["1d", "5m"]

            [backoff]
            min_backoff_ms = 10

            [instruments.AUDJPY]
            name = "AUD/JPY"
            pip_factor = 100
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/fx"));
        assert_eq!(cfg.max_workers, 2);
        assert_eq!(cfg.timeframes, vec![Timeframe::Day1, Timeframe::Minute5]);
        assert_eq!(cfg.backoff.min_backoff_ms, 10);
        assert_eq!(cfg.backoff.max_backoff_ms, 30_000);
        assert_eq!(cfg.sessions, SessionTable::default());
        assert_eq!(cfg.instruments.pip_factor("AUDJPY"), 100);
        assert_eq!(cfg.profiles.len(), 3);
    }

    #[test]
    fn sessions_can_be_overridden_from_toml() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [[sessions]]
            name = "Tokyo"
            start = "00:00:00"
            end = "09:00:00"

            [[sessions]]
            name = "London"
            start = "08:00:00"
            end = "16:30:00"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sessions.labels(), vec!["Tokyo", "London", OUT_OF_SESSION]);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = PipelineConfig::from_toml_str("max_workers = 0").unwrap_err();
        assert!(matches!(err, PipscopeError::Config(_)));
    }

    #[test]
    fn profile_admission() {
        let profiles = default_profiles();
        let research = &profiles[0];
        let desk = &profiles[1];
        let digest = &profiles[2];
        assert!(research.admits("anything", "Other"));
        assert!(desk.admits("Average Monday Range", category::VOLATILITY));
        assert!(!desk.admits("London-Asia High %", category::INTERVALS));
        assert!(digest.admits("PDH Probability", category::OCCURRENCE));
        assert!(!digest.admits("High in Monday", category::OCCURRENCE));
        assert!(digest.admits("Date Range", category::THEMATIC));
    }
}
