//! File formats and the candle store.
//!
//! - `raw`: discovery and parsing of semicolon-delimited input bars
//! - `candles`: reformatted history and per-timeframe candle files
//! - `store`: the [`CandleStore`](store::CandleStore) seam with file and memory backings
/// Candle file encoding.
pub mod candles;
/// Raw bar discovery and parsing.
pub mod raw;
/// Candle persistence keyed by (symbol, year, timeframe).
pub mod store;

use std::path::Path;

use pipscope_types::PipscopeError;

pub(crate) fn open_error(path: &Path, e: csv::Error) -> PipscopeError {
    let missing = matches!(
        e.kind(),
        csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound
    );
    if missing {
        PipscopeError::not_found(path.display().to_string())
    } else {
        PipscopeError::from(e)
    }
}

/// Sibling path a file is staged under before it replaces `path`.
pub(crate) fn staging_path(path: &Path) -> std::path::PathBuf {
    path.with_extension("csv.tmp")
}

/// Write a CSV file whole or not at all.
///
/// Rows go to a sibling `.csv.tmp` file which is synced and then renamed over
/// `path`, so a reader never observes a truncated artifact. On failure the
/// staging file is removed and `path` is left as it was.
pub(crate) fn write_csv_atomically<F>(path: &Path, fill: F) -> Result<(), PipscopeError>
where
    F: FnOnce(&mut csv::Writer<std::fs::File>) -> Result<(), PipscopeError>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let staging = staging_path(path);
    let staged: Result<(), PipscopeError> = (|| {
        let mut w = csv::Writer::from_path(&staging)?;
        fill(&mut w)?;
        let file = w
            .into_inner()
            .map_err(|e| PipscopeError::from(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(e) = staged {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }
    std::fs::rename(&staging, path).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        PipscopeError::from(e)
    })
}
