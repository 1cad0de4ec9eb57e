//! Raw semicolon-delimited bar files.
//!
//! Each row is `datetime;open;high;low;close[;volume]` with `datetime` in
//! `YYYYMMDD HHMMSS` form. Volume is discarded.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use pipscope_types::PipscopeError;

use crate::io::open_error;
use crate::types::Bar;

const RAW_TS_FORMAT: &str = "%Y%m%d %H%M%S";

pub(crate) fn parse_price(field: &str) -> Result<Decimal, PipscopeError> {
    let v: Decimal = field
        .trim()
        .parse()
        .map_err(|e| PipscopeError::Data(format!("bad price '{field}': {e}")))?;
    if v <= Decimal::ZERO {
        return Err(PipscopeError::Data(format!("non-positive price '{field}'")));
    }
    Ok(v)
}

fn parse_fields(fields: &[&str]) -> Result<Bar, PipscopeError> {
    if fields.len() < 5 {
        return Err(PipscopeError::Data(format!(
            "expected at least 5 fields, got {}",
            fields.len()
        )));
    }
    let ts = NaiveDateTime::parse_from_str(fields[0].trim(), RAW_TS_FORMAT)
        .map_err(|e| PipscopeError::Data(format!("bad timestamp '{}': {e}", fields[0])))?
        .and_utc();
    Ok(Bar {
        ts,
        open: parse_price(fields[1])?,
        high: parse_price(fields[2])?,
        low: parse_price(fields[3])?,
        close: parse_price(fields[4])?,
    })
}

/// Parse one raw row.
///
/// # Errors
/// Returns `Data` when the row has fewer than five fields, an unparseable
/// timestamp, or a non-positive price.
pub fn parse_raw_line(line: &str) -> Result<Bar, PipscopeError> {
    let fields: Vec<&str> = line.trim().split(';').collect();
    parse_fields(&fields)
}

/// Read every valid bar from one raw file.
///
/// Malformed rows are skipped with a warning.
///
/// # Errors
/// Returns `NotFound`/`Io` if the file cannot be opened.
pub fn read_raw_file(path: &Path) -> Result<Vec<Bar>, PipscopeError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| open_error(path, e))?;

    let mut bars = Vec::new();
    for (_row, rec) in rdr.records().enumerate() {
        let parsed = rec
            .map_err(PipscopeError::from)
            .and_then(|r| parse_fields(&r.iter().collect::<Vec<_>>()));
        match parsed {
            Ok(bar) => bars.push(bar),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(file = %path.display(), row = _row + 1, error = %_e, "skipping malformed raw row");
            }
        }
    }
    Ok(bars)
}

/// List `*.csv` files in `dir`, sorted by name.
///
/// # Errors
/// Returns `NotFound` if `dir` does not exist.
pub fn discover_raw_files(dir: &Path) -> Result<Vec<PathBuf>, PipscopeError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipscopeError::not_found(format!("raw directory {}", dir.display()))
            } else {
                PipscopeError::from(e)
            }
        })?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Year encoded as the trailing `_YYYY` segment of a file stem.
///
/// `DAT_ASCII_EURUSD_M1_2024.csv` yields 2024. Longer digit runs such as
/// `_202403` use their first four digits.
///
/// # Errors
/// Returns `InvalidArg` if the stem has no such suffix.
pub fn year_from_stem(path: &Path) -> Result<i32, PipscopeError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PipscopeError::InvalidArg(format!("no file stem in {}", path.display())))?;
    let tail = stem.rsplit('_').next().unwrap_or_default();
    if tail.len() >= 4 && tail.bytes().all(|b| b.is_ascii_digit()) {
        tail[..4]
            .parse()
            .map_err(|_| PipscopeError::InvalidArg(format!("bad year in {stem}")))
    } else {
        Err(PipscopeError::InvalidArg(format!(
            "cannot extract year from file name '{stem}'"
        )))
    }
}

/// Latest year across a set of raw file names.
///
/// # Errors
/// Returns `InvalidArg` if no file name carries a year.
pub fn dataset_year(files: &[PathBuf]) -> Result<i32, PipscopeError> {
    let mut year = None;
    for f in files {
        match year_from_stem(f) {
            Ok(y) => year = Some(year.map_or(y, |cur: i32| cur.max(y))),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(file = %f.display(), error = %_e, "raw file name carries no year");
            }
        }
    }
    year.ok_or_else(|| PipscopeError::InvalidArg("no raw file name carries a year".into()))
}

/// Read, concatenate, and sort the bars of `files`.
///
/// # Errors
/// Returns `Io`/`Csv` when a file cannot be read.
pub fn merge_raw_files(files: &[PathBuf]) -> Result<Vec<Bar>, PipscopeError> {
    let mut bars = Vec::new();
    for f in files {
        bars.extend(read_raw_file(f)?);
    }
    bars.sort_by_key(|b| b.ts);
    #[cfg(feature = "tracing")]
    tracing::info!(files = files.len(), bars = bars.len(), "merged raw bars");
    Ok(bars)
}

/// Raw CSV files in `dir` and the dataset year their names carry.
///
/// # Errors
/// Returns `NotFound` when the directory is missing or holds no CSV files,
/// and `InvalidArg` when the dataset year cannot be determined.
pub fn locate_raw_dataset(dir: &Path) -> Result<(Vec<PathBuf>, i32), PipscopeError> {
    let files = discover_raw_files(dir)?;
    if files.is_empty() {
        return Err(PipscopeError::not_found(format!(
            "raw csv files in {}",
            dir.display()
        )));
    }
    let year = dataset_year(&files)?;
    Ok((files, year))
}
