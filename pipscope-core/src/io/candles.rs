//! Comma-delimited candle files.
//!
//! Both the reformatted price history and the per-timeframe candle files use
//! the header `Date Time,Open,High,Low,Close`. The index column holds a
//! `YYYY-MM-DD HH:MM:SS` timestamp for intraday data, a `YYYY-MM-DD` date for
//! daily data, and a `YYYY-MM-DD to YYYY-MM-DD` label for weekly data. Prices
//! are written with five decimals.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};

use pipscope_types::{PipscopeError, Timeframe};

use crate::io::{open_error, write_csv_atomically};
use crate::io::raw::parse_price;
use crate::types::{Bar, Candle, CandleSeries, DailyCandle, Ohlc, WeekSpan, WeeklyCandle};

/// Header row shared by every candle file.
pub const HEADER: [&str; 5] = ["Date Time", "Open", "High", "Low", "Close"];

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn price(v: Decimal) -> String {
    format!(
        "{:.5}",
        v.round_dp_with_strategy(5, RoundingStrategy::MidpointAwayFromZero)
    )
}

fn write_row<T: Ohlc>(
    w: &mut csv::Writer<std::fs::File>,
    index: &str,
    c: &T,
) -> Result<(), PipscopeError> {
    let prices = [c.open(), c.high(), c.low(), c.close()].map(price);
    w.write_record(std::iter::once(index).chain(prices.iter().map(String::as_str)))?;
    Ok(())
}

/// Write a candle series to `path`, creating parent directories.
///
/// The file appears complete or not at all.
///
/// # Errors
/// Returns `Io`/`Csv` on write failure.
pub fn write_series(path: &Path, series: &CandleSeries) -> Result<(), PipscopeError> {
    write_csv_atomically(path, |w| {
        w.write_record(HEADER)?;
        match series {
            CandleSeries::Intraday(v) => {
                for c in v {
                    write_row(w, &c.ts.format(TS_FORMAT).to_string(), c)?;
                }
            }
            CandleSeries::Daily(v) => {
                for c in v {
                    write_row(w, &c.date.format(DATE_FORMAT).to_string(), c)?;
                }
            }
            CandleSeries::Weekly(v) => {
                for c in v {
                    write_row(w, &c.span.to_string(), c)?;
                }
            }
        }
        Ok(())
    })
}

/// Write the reformatted price history unless the file already exists.
///
/// Returns `true` when the file was written.
///
/// # Errors
/// Returns `Io`/`Csv` on write failure.
pub fn write_formatted_history(path: &Path, bars: &[Bar]) -> Result<bool, PipscopeError> {
    if path.exists() {
        #[cfg(feature = "tracing")]
        tracing::debug!(file = %path.display(), "formatted history exists; skipping");
        return Ok(false);
    }
    write_series(path, &CandleSeries::Intraday(bars.to_vec()))?;
    Ok(true)
}

/// Read a reformatted price history.
///
/// # Errors
/// Returns `NotFound` when the file is missing.
pub fn read_formatted_history(path: &Path) -> Result<Vec<Bar>, PipscopeError> {
    read_rows(path, |idx| {
        NaiveDateTime::parse_from_str(idx, TS_FORMAT)
            .map(|t| t.and_utc())
            .map_err(|e| PipscopeError::Data(format!("bad timestamp '{idx}': {e}")))
    })
    .map(|rows| {
        rows.into_iter()
            .map(|(ts, [open, high, low, close])| Candle {
                ts,
                open,
                high,
                low,
                close,
            })
            .collect()
    })
}

/// Read a candle file written by [`write_series`] for `timeframe`.
///
/// Malformed rows are skipped with a warning.
///
/// # Errors
/// Returns `NotFound` when the file is missing.
pub fn read_series(path: &Path, timeframe: Timeframe) -> Result<CandleSeries, PipscopeError> {
    if timeframe.intraday_minutes().is_some() {
        return read_formatted_history(path).map(CandleSeries::Intraday);
    }
    if timeframe == Timeframe::Week1 {
        let rows = read_rows(path, str::parse::<WeekSpan>)?;
        return Ok(CandleSeries::Weekly(
            rows.into_iter()
                .map(|(span, [open, high, low, close])| WeeklyCandle {
                    span,
                    open,
                    high,
                    low,
                    close,
                })
                .collect(),
        ));
    }
    let rows = read_rows(path, |idx| {
        NaiveDate::parse_from_str(idx, DATE_FORMAT)
            .map_err(|e| PipscopeError::Data(format!("bad date '{idx}': {e}")))
    })?;
    Ok(CandleSeries::Daily(
        rows.into_iter()
            .map(|(date, [open, high, low, close])| DailyCandle {
                date,
                open,
                high,
                low,
                close,
            })
            .collect(),
    ))
}

fn read_rows<K, F>(path: &Path, parse_index: F) -> Result<Vec<(K, [Decimal; 4])>, PipscopeError>
where
    F: Fn(&str) -> Result<K, PipscopeError>,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| open_error(path, e))?;

    let mut out = Vec::new();
    for (_row, rec) in rdr.records().enumerate() {
        let parsed = rec.map_err(PipscopeError::from).and_then(|r| {
            if r.len() < 5 {
                return Err(PipscopeError::Data(format!("expected 5 fields, got {}", r.len())));
            }
            let key = parse_index(r[0].trim())?;
            Ok((
                key,
                [
                    parse_price(&r[1])?,
                    parse_price(&r[2])?,
                    parse_price(&r[3])?,
                    parse_price(&r[4])?,
                ],
            ))
        });
        match parsed {
            Ok(row) => out.push(row),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(file = %path.display(), row = _row + 2, error = %_e, "skipping malformed candle row");
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn weekly_file_uses_range_labels_and_five_decimals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.csv");
        let span = WeekSpan::new(NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
        let series = CandleSeries::Weekly(vec![WeeklyCandle {
            span,
            open: dec!(1.1),
            high: dec!(1.123456),
            low: dec!(1.05),
            close: dec!(1.08),
        }]);
        write_series(&path, &series).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Date Time,Open,High,Low,Close\n2024-07-15 to 2024-07-19,1.10000,1.12346,1.05000,1.08000\n"
        );
        let back = read_series(&path, Timeframe::Week1).unwrap().into_weekly().unwrap();
        assert_eq!(back[0].span, span);
        assert_eq!(back[0].high, dec!(1.12346));
    }

    #[test]
    fn daily_and_intraday_index_formats() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path().join("d.csv");
        write_series(
            &d,
            &CandleSeries::Daily(vec![DailyCandle {
                date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
                open: dec!(1),
                high: dec!(2),
                low: dec!(0.5),
                close: dec!(1.5),
            }]),
        )
        .unwrap();
        assert!(std::fs::read_to_string(&d).unwrap().contains("\n2024-07-15,1.00000,"));

        let h = dir.path().join("nested").join("h.csv");
        let ts = Utc.with_ymd_and_hms(2024, 7, 15, 13, 0, 0).unwrap();
        write_series(
            &h,
            &CandleSeries::Intraday(vec![Candle {
                ts,
                open: dec!(1),
                high: dec!(1),
                low: dec!(1),
                close: dec!(1),
            }]),
        )
        .unwrap();
        assert!(std::fs::read_to_string(&h).unwrap().contains("\n2024-07-15 13:00:00,"));
        let back = read_series(&h, Timeframe::Hour1).unwrap().into_intraday().unwrap();
        assert_eq!(back[0].ts, ts);
    }

    #[test]
    fn formatted_history_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EURUSD_2024.csv");
        let bar = Candle {
            ts: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: dec!(1.1),
            high: dec!(1.2),
            low: dec!(1.0),
            close: dec!(1.1),
        };
        assert!(write_formatted_history(&path, &[bar]).unwrap());
        assert!(!write_formatted_history(&path, &[]).unwrap());
        assert_eq!(read_formatted_history(&path).unwrap(), vec![bar]);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.csv");
        std::fs::write(
            &path,
            "Date Time,Open,High,Low,Close\n2024-07-15,1,2,0.5,1.5\nnot-a-date,1,2,0.5,1.5\n2024-07-16,1,x,0.5,1.5\n",
        )
        .unwrap();
        let days = read_series(&path, Timeframe::Day1).unwrap();
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = read_series(Path::new("/nope/x.csv"), Timeframe::Day1).unwrap_err();
        assert!(err.is_missing_input());
    }
}
