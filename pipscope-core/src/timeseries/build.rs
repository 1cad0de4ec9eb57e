use std::collections::BTreeMap;

use pipscope_types::{PipscopeError, Timeframe};

use crate::io::store::CandleStore;
use crate::timeseries::resample::resample;
use crate::types::Bar;

/// What happened to one timeframe during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Candles were aggregated and saved; carries the candle count.
    Created(usize),
    /// An artifact already existed and was left untouched.
    Reused,
}

/// Timeframes in `wanted` that the store does not hold yet.
#[must_use]
pub fn missing_timeframes(
    store: &dyn CandleStore,
    symbol: &str,
    year: i32,
    wanted: &[Timeframe],
) -> Vec<Timeframe> {
    wanted
        .iter()
        .copied()
        .filter(|tf| !store.contains(symbol, year, *tf))
        .collect()
}

/// Aggregate `bars` into every timeframe in `timeframes` and persist them.
///
/// Existing artifacts are reused verbatim. Each timeframe is isolated: a
/// failed save is recorded for that timeframe and the rest still run. An
/// empty input produces empty (not absent) artifacts.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        name = "pipscope::build_timeframes",
        skip(store, bars, timeframes),
        fields(bars = bars.len()),
    )
)]
pub fn build_timeframes(
    store: &dyn CandleStore,
    symbol: &str,
    year: i32,
    bars: &[Bar],
    timeframes: &[Timeframe],
) -> BTreeMap<Timeframe, Result<BuildOutcome, PipscopeError>> {
    let mut out = BTreeMap::new();
    for &tf in timeframes {
        if store.contains(symbol, year, tf) {
            #[cfg(feature = "tracing")]
            tracing::debug!(timeframe = %tf, "candle file cached; reusing");
            out.insert(tf, Ok(BuildOutcome::Reused));
            continue;
        }
        let series = resample(bars.to_vec(), tf);
        let n = series.len();
        let res = store
            .save(symbol, year, tf, &series)
            .map(|()| BuildOutcome::Created(n));
        #[cfg(feature = "tracing")]
        match &res {
            Ok(_) => tracing::info!(timeframe = %tf, candles = n, "built candle file"),
            Err(e) => tracing::warn!(timeframe = %tf, error = %e, "skipping timeframe"),
        }
        out.insert(tf, res);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryCandleStore;
    use crate::types::{Candle, CandleSeries};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bars() -> Vec<Bar> {
        (0..12)
            .map(|i| Candle {
                ts: Utc.with_ymd_and_hms(2024, 7, 9, 10, i * 5, 0).unwrap(),
                open: dec!(1.1),
                high: dec!(1.2),
                low: dec!(1.0),
                close: dec!(1.1),
            })
            .collect()
    }

    #[test]
    fn builds_then_reuses() {
        let store = MemoryCandleStore::new();
        let tfs = [Timeframe::Hour1, Timeframe::Minute15, Timeframe::Day1];
        let first = build_timeframes(&store, "EURUSD", 2024, &bars(), &tfs);
        assert_eq!(first[&Timeframe::Hour1], Ok(BuildOutcome::Created(1)));
        assert_eq!(first[&Timeframe::Minute15], Ok(BuildOutcome::Created(4)));
        assert_eq!(first[&Timeframe::Day1], Ok(BuildOutcome::Created(1)));

        let second = build_timeframes(&store, "EURUSD", 2024, &[], &tfs);
        assert!(second.values().all(|r| *r == Ok(BuildOutcome::Reused)));
        assert_eq!(store.load_intraday("EURUSD", 2024, Timeframe::Minute15).unwrap().len(), 4);
    }

    #[test]
    fn existing_artifact_is_not_overwritten() {
        let store = MemoryCandleStore::new();
        store
            .save("EURUSD", 2024, Timeframe::Day1, &CandleSeries::Daily(vec![]))
            .unwrap();
        assert_eq!(
            missing_timeframes(&store, "EURUSD", 2024, &[Timeframe::Day1, Timeframe::Week1]),
            vec![Timeframe::Week1]
        );
        build_timeframes(&store, "EURUSD", 2024, &bars(), &[Timeframe::Day1]);
        assert!(store.load_daily("EURUSD", 2024).unwrap().is_empty());
    }

    #[test]
    fn empty_input_yields_empty_artifacts() {
        let store = MemoryCandleStore::new();
        let res = build_timeframes(&store, "GBPUSD", 2024, &[], &[Timeframe::Week1]);
        assert_eq!(res[&Timeframe::Week1], Ok(BuildOutcome::Created(0)));
        assert!(store.contains("GBPUSD", 2024, Timeframe::Week1));
    }
}
