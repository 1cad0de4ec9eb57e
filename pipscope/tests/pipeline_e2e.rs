use chrono::NaiveDate;
use pipscope::{MetricValue, Pipeline, PipscopeError, Timeframe};
use pipscope_core::BuildOutcome;
use pipscope_core::metrics::levels::{PD_LEVELS_PROBABILITY, PDH_PROBABILITY, PDL_PROBABILITY};
use pipscope_core::metrics::volatility::AVG_DAILY_RANGE;
use pipscope_mock::fixtures::{trading_weeks, write_raw_dataset};
use pipscope_types::{CategorizedMetrics, SessionTable, category};

const WEEKDAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

fn seeded_data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let monday = NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
    write_raw_dataset(dir.path(), "EURUSD", 2024, &trading_weeks(monday, 3, 11)).unwrap();
    dir
}

fn num(m: &CategorizedMetrics, cat: &str, name: &str) -> f64 {
    m.get(cat)
        .and_then(|c| c.get(name))
        .and_then(MetricValue::as_f64)
        .unwrap_or_else(|| panic!("missing {cat} / {name}"))
}

#[tokio::test]
async fn run_all_computes_metrics_and_isolates_missing_symbols() {
    let dir = seeded_data_dir();
    let pipeline = Pipeline::builder()
        .data_dir(dir.path())
        .max_workers(2)
        .build()
        .unwrap();

    let symbols = vec!["eurusd".to_string(), "gbpusd".to_string()];
    let report = pipeline.run_all(&symbols).await;
    assert_eq!(report.succeeded(), 1);
    assert!(matches!(
        report.failures.get("GBPUSD"),
        Some(PipscopeError::NotFound { .. })
    ));

    let m = &report.results["EURUSD"];
    assert_eq!(
        m[category::THEMATIC]["Date Range"],
        MetricValue::Text("2024-01-01 to 2024-12-31".into())
    );
    assert!(num(m, category::VOLATILITY, AVG_DAILY_RANGE) > 0.0);

    let table = SessionTable::default();
    let highs: f64 = table
        .labels()
        .iter()
        .map(|s| num(m, category::TIMING, &format!("Daily High in {s} %")))
        .sum();
    assert!((highs - 100.0).abs() < 0.1, "{highs}");

    let weekly_highs: f64 = WEEKDAYS
        .iter()
        .map(|d| num(m, category::OCCURRENCE, &format!("High in {d}")))
        .sum();
    assert!((weekly_highs - 100.0).abs() < 0.1, "{weekly_highs}");

    let pdh = num(m, category::OCCURRENCE, PDH_PROBABILITY);
    let pdl = num(m, category::OCCURRENCE, PDL_PROBABILITY);
    assert!(num(m, category::OCCURRENCE, PD_LEVELS_PROBABILITY) <= pdh.min(pdl));
}

#[tokio::test]
async fn artifacts_follow_the_data_layout() {
    let dir = seeded_data_dir();
    let pipeline = Pipeline::builder().data_dir(dir.path()).build().unwrap();
    let report = pipeline.run_all(&["EURUSD".to_string()]).await;
    assert!(report.is_complete());

    let root = dir.path();
    assert!(root.join("formatted").join("EURUSD_2024.csv").is_file());
    for tf in Timeframe::ALL {
        let f = root
            .join("timeframes")
            .join("eurusd")
            .join(format!("EURUSD_{tf}_2024.csv"));
        assert!(f.is_file(), "{}", f.display());
    }
    assert!(
        root.join("metrics")
            .join("session_distribution")
            .join("EURUSD_2024_daily_session_data.csv")
            .is_file()
    );
}

#[tokio::test]
async fn second_run_reuses_artifacts_and_matches() {
    let dir = seeded_data_dir();
    let pipeline = Pipeline::builder().data_dir(dir.path()).build().unwrap();
    let symbols = vec!["EURUSD".to_string()];
    let first = pipeline.run_all(&symbols).await;

    let prepared = pipeline.prepare("EURUSD").unwrap();
    assert_eq!(prepared.year, 2024);
    assert_eq!(prepared.bars, None);
    assert!(!prepared.formatted_written);
    assert!(
        prepared
            .timeframes
            .values()
            .all(|r| matches!(r, Ok(BuildOutcome::Reused)))
    );

    let second = pipeline.run_all(&symbols).await;
    assert_eq!(first.results, second.results);

    assert_eq!(pipeline.clear_session_cache(Some(("eurusd", 2024))).unwrap(), 1);
    assert_eq!(pipeline.clear_session_cache(Some(("EURUSD", 2024))).unwrap(), 0);

    let recomputed = pipeline.run_all(&symbols).await;
    assert_eq!(first.results, recomputed.results);
}

#[tokio::test]
async fn without_weekly_candles_key_levels_stand_in() {
    let dir = seeded_data_dir();
    let pipeline = Pipeline::builder()
        .data_dir(dir.path())
        .timeframes(vec![Timeframe::Day1, Timeframe::Minute5])
        .build()
        .unwrap();
    let report = pipeline.run_all(&["EURUSD".to_string()]).await;
    let m = &report.results["EURUSD"];
    let occurrence = &m[category::OCCURRENCE];
    assert!(occurrence.contains_key(PDH_PROBABILITY));
    assert!(!occurrence.contains_key("High in Monday"));
    assert!(
        !dir.path()
            .join("timeframes")
            .join("eurusd")
            .join("EURUSD_1w_2024.csv")
            .exists()
    );
}

#[tokio::test]
async fn discovered_symbols_feed_the_batch() {
    let dir = seeded_data_dir();
    let monday = NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
    write_raw_dataset(dir.path(), "USDJPY", 2024, &trading_weeks(monday, 1, 5)).unwrap();
    let pipeline = Pipeline::builder().data_dir(dir.path()).build().unwrap();

    let symbols = pipeline.discover_symbols().unwrap();
    assert_eq!(symbols, vec!["EURUSD", "USDJPY"]);
    let report = pipeline.prepare_all(&symbols).await;
    assert!(report.is_complete());
    assert_eq!(report.results["USDJPY"].bars, Some(6 * 288));
}

#[tokio::test]
async fn complete_artifacts_skip_reading_raw_rows() {
    let dir = seeded_data_dir();
    let pipeline = Pipeline::builder().data_dir(dir.path()).build().unwrap();
    let first = pipeline.prepare("EURUSD").unwrap();
    assert!(first.bars.is_some_and(|n| n > 0));

    // Raw rows that no longer parse would fail a reload.
    let raw = dir.path().join("raw").join("eurusd").join("DAT_ASCII_EURUSD_M5_2024.csv");
    std::fs::write(&raw, "garbage\n").unwrap();
    let again = pipeline.prepare("EURUSD").unwrap();
    assert_eq!(again.bars, None);
    assert!(again.failed_timeframes().is_empty());

    std::fs::remove_file(
        dir.path()
            .join("timeframes")
            .join("eurusd")
            .join("EURUSD_1d_2024.csv"),
    )
    .unwrap();
    assert!(matches!(
        pipeline.prepare("EURUSD"),
        Err(PipscopeError::Data(_))
    ));
}
