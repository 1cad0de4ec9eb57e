use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use pipscope_types::{PipscopeError, SessionTable};

use crate::io::{open_error, write_csv_atomically};
use crate::sessions::attributor::{DailySessionRecord, SessionExtremes};

/// Cache of daily session records keyed by (symbol, year).
///
/// Entries are written whole and never partially updated.
pub trait SessionRecordStore: Send + Sync {
    /// Cached records, or `None` on a miss.
    ///
    /// # Errors
    /// Returns an error when an entry exists but cannot be read.
    fn load(&self, symbol: &str, year: i32)
    -> Result<Option<Vec<DailySessionRecord>>, PipscopeError>;

    /// Store records, replacing any previous entry.
    ///
    /// # Errors
    /// Returns a backing-specific error on write failure.
    fn save(
        &self,
        symbol: &str,
        year: i32,
        records: &[DailySessionRecord],
    ) -> Result<(), PipscopeError>;

    /// Drop one entry. Returns whether it existed.
    ///
    /// # Errors
    /// Returns a backing-specific error when removal fails.
    fn clear(&self, symbol: &str, year: i32) -> Result<bool, PipscopeError>;

    /// Drop every entry. Returns how many were removed.
    ///
    /// # Errors
    /// Returns a backing-specific error when removal fails.
    fn clear_all(&self) -> Result<usize, PipscopeError>;
}

const FILE_SUFFIX: &str = "_daily_session_data.csv";
const FIXED_COLUMNS: [&str; 7] = [
    "trading_date",
    "daily_high_session",
    "daily_low_session",
    "daily_high_value",
    "daily_low_value",
    "day_open",
    "day_close",
];

fn column_stem(label: &str) -> String {
    label.replace(' ', "_")
}

/// CSV files named `{SYMBOL}_{year}_daily_session_data.csv` in one directory.
///
/// Per-session columns follow the fixed ones as `{label}_high`, `{label}_low`
/// for every label of the session table, spaces replaced by underscores.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
    sessions: SessionTable,
}

impl FileRecordStore {
    /// Store in `dir` laid out for `sessions`.
    pub fn new(dir: impl Into<PathBuf>, sessions: SessionTable) -> Self {
        Self {
            dir: dir.into(),
            sessions,
        }
    }

    /// Cache file for a key.
    #[must_use]
    pub fn path_for(&self, symbol: &str, year: i32) -> PathBuf {
        self.dir
            .join(format!("{}_{year}{FILE_SUFFIX}", symbol.to_ascii_uppercase()))
    }

    fn header(&self) -> Vec<String> {
        let mut cols: Vec<String> = FIXED_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        for label in self.sessions.labels() {
            let stem = column_stem(label);
            cols.push(format!("{stem}_high"));
            cols.push(format!("{stem}_low"));
        }
        cols
    }

    fn read(&self, path: &Path) -> Result<Vec<DailySessionRecord>, PipscopeError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| open_error(path, e))?;
        let headers = rdr.headers()?.clone();
        let index = |name: &str| headers.iter().position(|h| h == name);

        let mut fixed = [0usize; 7];
        for (slot, name) in fixed.iter_mut().zip(FIXED_COLUMNS) {
            *slot = match (name, index(name)) {
                (_, Some(i)) => i,
                ("day_open" | "day_close", None) => usize::MAX,
                (_, None) => {
                    return Err(PipscopeError::Data(format!(
                        "{} lacks column '{name}'",
                        path.display()
                    )));
                }
            };
        }
        let session_cols: Vec<(Option<usize>, Option<usize>)> = self
            .sessions
            .labels()
            .into_iter()
            .map(|l| {
                let stem = column_stem(l);
                (index(&format!("{stem}_high")), index(&format!("{stem}_low")))
            })
            .collect();

        let mut out = Vec::new();
        for (_row, rec) in rdr.records().enumerate() {
            let parsed = rec
                .map_err(PipscopeError::from)
                .and_then(|r| parse_record(&r, &fixed, &session_cols));
            match parsed {
                Ok(r) => out.push(r),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(file = %path.display(), row = _row + 2, error = %_e, "skipping malformed session record");
                }
            }
        }
        Ok(out)
    }
}

fn opt_decimal(r: &csv::StringRecord, idx: Option<usize>) -> Result<Option<Decimal>, PipscopeError> {
    match idx.and_then(|i| r.get(i)).map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| PipscopeError::Data(format!("bad value '{v}': {e}"))),
    }
}

fn required<'r>(r: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, PipscopeError> {
    r.get(idx)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipscopeError::Data(format!("missing {name}")))
}

fn parse_record(
    r: &csv::StringRecord,
    fixed: &[usize; 7],
    session_cols: &[(Option<usize>, Option<usize>)],
) -> Result<DailySessionRecord, PipscopeError> {
    let date = required(r, fixed[0], FIXED_COLUMNS[0])?;
    let trading_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| PipscopeError::Data(format!("bad trading date '{date}': {e}")))?;
    let decimal = |i: usize| -> Result<Decimal, PipscopeError> {
        let v = required(r, fixed[i], FIXED_COLUMNS[i])?;
        v.parse()
            .map_err(|e| PipscopeError::Data(format!("bad {} '{v}': {e}", FIXED_COLUMNS[i])))
    };
    let sessions = session_cols
        .iter()
        .map(|(h, l)| {
            Ok(SessionExtremes {
                high: opt_decimal(r, *h)?,
                low: opt_decimal(r, *l)?,
            })
        })
        .collect::<Result<Vec<_>, PipscopeError>>()?;
    Ok(DailySessionRecord {
        trading_date,
        daily_high_session: required(r, fixed[1], FIXED_COLUMNS[1])?.to_string(),
        daily_low_session: required(r, fixed[2], FIXED_COLUMNS[2])?.to_string(),
        daily_high_value: decimal(3)?,
        daily_low_value: decimal(4)?,
        day_open: opt_decimal(r, Some(fixed[5]))?,
        day_close: opt_decimal(r, Some(fixed[6]))?,
        sessions,
    })
}

fn cell(v: Option<Decimal>) -> String {
    v.map(|d| d.to_string()).unwrap_or_default()
}

impl SessionRecordStore for FileRecordStore {
    fn load(
        &self,
        symbol: &str,
        year: i32,
    ) -> Result<Option<Vec<DailySessionRecord>>, PipscopeError> {
        let path = self.path_for(symbol, year);
        if !path.is_file() {
            return Ok(None);
        }
        self.read(&path).map(Some)
    }

    fn save(
        &self,
        symbol: &str,
        year: i32,
        records: &[DailySessionRecord],
    ) -> Result<(), PipscopeError> {
        let path = self.path_for(symbol, year);
        let width = self.sessions.len() + 1;
        write_csv_atomically(&path, |w| {
            w.write_record(self.header())?;
            for r in records {
                let mut row = vec![
                    r.trading_date.format("%Y-%m-%d").to_string(),
                    r.daily_high_session.clone(),
                    r.daily_low_session.clone(),
                    r.daily_high_value.to_string(),
                    r.daily_low_value.to_string(),
                    cell(r.day_open),
                    cell(r.day_close),
                ];
                for i in 0..width {
                    let s = r.extremes(i);
                    row.push(cell(s.high));
                    row.push(cell(s.low));
                }
                w.write_record(&row)?;
            }
            Ok(())
        })?;
        #[cfg(feature = "tracing")]
        tracing::debug!(file = %path.display(), days = records.len(), "saved daily session records");
        Ok(())
    }

    fn clear(&self, symbol: &str, year: i32) -> Result<bool, PipscopeError> {
        match std::fs::remove_file(self.path_for(symbol, year)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_all(&self) -> Result<usize, PipscopeError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_cache = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(FILE_SUFFIX));
            if is_cache && path.is_file() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        #[cfg(feature = "tracing")]
        tracing::info!(dir = %self.dir.display(), removed, "cleared session record cache");
        Ok(removed)
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    entries: RwLock<HashMap<(String, i32), Vec<DailySessionRecord>>>,
}

impl MemoryRecordStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> PipscopeError {
    PipscopeError::Other("session record store lock poisoned".into())
}

impl SessionRecordStore for MemoryRecordStore {
    fn load(
        &self,
        symbol: &str,
        year: i32,
    ) -> Result<Option<Vec<DailySessionRecord>>, PipscopeError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| poisoned())?
            .get(&(symbol.to_ascii_uppercase(), year))
            .cloned())
    }

    fn save(
        &self,
        symbol: &str,
        year: i32,
        records: &[DailySessionRecord],
    ) -> Result<(), PipscopeError> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert((symbol.to_ascii_uppercase(), year), records.to_vec());
        Ok(())
    }

    fn clear(&self, symbol: &str, year: i32) -> Result<bool, PipscopeError> {
        Ok(self
            .entries
            .write()
            .map_err(|_| poisoned())?
            .remove(&(symbol.to_ascii_uppercase(), year))
            .is_some())
    }

    fn clear_all(&self) -> Result<usize, PipscopeError> {
        let mut map = self.entries.write().map_err(|_| poisoned())?;
        let n = map.len();
        map.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipscope_types::OUT_OF_SESSION;
    use rust_decimal_macros::dec;

    fn record() -> DailySessionRecord {
        let mut sessions = vec![SessionExtremes::default(); 6];
        sessions[0] = SessionExtremes {
            high: Some(dec!(1.1050)),
            low: Some(dec!(1.1000)),
        };
        sessions[2] = SessionExtremes {
            high: Some(dec!(1.1075)),
            low: Some(dec!(1.1020)),
        };
        sessions[5] = SessionExtremes {
            high: Some(dec!(1.1060)),
            low: Some(dec!(1.0990)),
        };
        DailySessionRecord {
            trading_date: NaiveDate::from_ymd_opt(2024, 7, 9).unwrap(),
            daily_high_session: "London".into(),
            daily_low_session: OUT_OF_SESSION.into(),
            daily_high_value: dec!(1.1075),
            daily_low_value: dec!(1.0990),
            day_open: Some(dec!(1.1000)),
            day_close: Some(dec!(1.1060)),
            sessions,
        }
    }

    #[test]
    fn file_store_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), SessionTable::default());
        assert_eq!(store.load("EURUSD", 2024).unwrap(), None);
        store.save("eurusd", 2024, &[record()]).unwrap();
        assert!(dir.path().join("EURUSD_2024_daily_session_data.csv").is_file());
        assert_eq!(store.load("EURUSD", 2024).unwrap(), Some(vec![record()]));
    }

    #[test]
    fn file_header_names_every_label() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), SessionTable::default());
        store.save("EURUSD", 2024, &[]).unwrap();
        let text = std::fs::read_to_string(store.path_for("EURUSD", 2024)).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "trading_date,daily_high_session,daily_low_session,daily_high_value,daily_low_value,\
             day_open,day_close,Asia_high,Asia_low,Frankfurt_high,Frankfurt_low,London_high,\
             London_low,Lunch_high,Lunch_low,NY_high,NY_low,Out_of_Session_high,Out_of_Session_low"
        );
    }

    #[test]
    fn legacy_files_without_open_close_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), SessionTable::default());
        std::fs::write(
            store.path_for("EURUSD", 2024),
            "trading_date,daily_high_session,daily_low_session,daily_high_value,daily_low_value,Asia_high,Asia_low\n\
             2024-07-09,Asia,Asia,1.2,1.1,1.2,1.1\n\
             bad-date,Asia,Asia,1.2,1.1,1.2,1.1\n",
        )
        .unwrap();
        let recs = store.load("EURUSD", 2024).unwrap().unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].day_open, None);
        assert_eq!(recs[0].extremes(0).high, Some(dec!(1.2)));
        assert_eq!(recs[0].extremes(2), SessionExtremes::default());
    }

    #[test]
    fn clear_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), SessionTable::default());
        store.save("EURUSD", 2024, &[record()]).unwrap();
        store.save("GBPUSD", 2024, &[record()]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();
        assert!(store.clear("EURUSD", 2024).unwrap());
        assert!(!store.clear("EURUSD", 2024).unwrap());
        assert_eq!(store.clear_all().unwrap(), 1);
        assert!(dir.path().join("notes.txt").exists());

        let mem = MemoryRecordStore::new();
        mem.save("EURUSD", 2024, &[record()]).unwrap();
        assert_eq!(mem.load("eurusd", 2024).unwrap().map(|v| v.len()), Some(1));
        assert!(mem.clear("EURUSD", 2024).unwrap());
        assert_eq!(mem.clear_all().unwrap(), 0);
    }

    #[test]
    fn leftover_staging_file_is_not_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), SessionTable::default());
        let staging = dir.path().join("EURUSD_2024_daily_session_data.csv.tmp");
        std::fs::write(&staging, "trading_date,daily_high_session\n").unwrap();

        assert_eq!(store.load("EURUSD", 2024).unwrap(), None);
        assert_eq!(store.clear_all().unwrap(), 0);

        store.save("EURUSD", 2024, &[record()]).unwrap();
        assert!(!staging.exists());
        assert_eq!(store.load("EURUSD", 2024).unwrap(), Some(vec![record()]));
    }
}
