use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use pipscope_core::Candle;

/// Render a bar the way raw vendor files store it, volume zero.
#[must_use]
pub fn raw_line(bar: &Candle) -> String {
    format!(
        "{};{};{};{};{};0",
        bar.ts.format("%Y%m%d %H%M%S"),
        bar.open,
        bar.high,
        bar.low,
        bar.close
    )
}

/// Write `bars` as a raw semicolon-delimited file named `name` inside `dir`.
///
/// # Errors
/// Returns the underlying I/O error.
pub fn write_raw_file(dir: &Path, name: &str, bars: &[Candle]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let mut text = String::new();
    for b in bars {
        let _ = writeln!(text, "{}", raw_line(b));
    }
    let path = dir.join(name);
    std::fs::write(&path, text)?;
    Ok(path)
}

/// Write a symbol's raw bars under `{data_dir}/raw/{symbol_lower}/` using the
/// vendor naming scheme `DAT_ASCII_{SYMBOL}_M5_{year}.csv`.
///
/// # Errors
/// Returns the underlying I/O error.
pub fn write_raw_dataset(
    data_dir: &Path,
    symbol: &str,
    year: i32,
    bars: &[Candle],
) -> std::io::Result<PathBuf> {
    let dir = data_dir.join("raw").join(symbol.to_ascii_lowercase());
    write_raw_file(
        &dir,
        &format!("DAT_ASCII_{}_M5_{year}.csv", symbol.to_ascii_uppercase()),
        bars,
    )
}
