//! Bounded fan-out of per-symbol work.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use pipscope_types::{BatchReport, PipscopeError};

/// Normalise, de-duplicate and drop blank symbols, keeping first-seen order.
#[must_use]
pub fn normalize_symbols(symbols: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// Run blocking `work` once per symbol with at most `max_workers` in flight.
///
/// Behavior:
/// - Symbols are upper-cased and de-duplicated first.
/// - Each unit runs on the blocking pool; a unit that errors or panics is
///   recorded in `failures` and its siblings keep going.
/// - The effective pool size is `min(max_workers, symbol count)`, at least one.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        name = "pipscope::batch::run_blocking",
        skip(symbols, work),
        fields(count = symbols.len()),
    )
)]
pub async fn run_blocking<T, F>(
    symbols: &[String],
    max_workers: usize,
    work: F,
) -> BatchReport<T>
where
    T: Send + 'static,
    F: Fn(&str) -> Result<T, PipscopeError> + Send + Sync + 'static,
{
    let symbols = normalize_symbols(symbols);
    let workers = max_workers.clamp(1, symbols.len().max(1));
    let work = Arc::new(work);

    let outcomes: Vec<(String, Result<T, PipscopeError>)> =
        futures::stream::iter(symbols.into_iter().map(|symbol| {
            let work = Arc::clone(&work);
            async move {
                let unit = symbol.clone();
                let res = tokio::task::spawn_blocking(move || work(&unit))
                    .await
                    .unwrap_or_else(|e| {
                        Err(PipscopeError::Other(format!("worker for {symbol} died: {e}")))
                    });
                (symbol, res)
            }
        }))
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut report = BatchReport::default();
    for (symbol, res) in outcomes {
        match res {
            Ok(v) => {
                report.results.insert(symbol, v);
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(symbol = %symbol, error = %e, "symbol failed");
                report.failures.insert(symbol, e);
            }
        }
    }
    #[cfg(feature = "tracing")]
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "batch finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn symbols_are_normalised_once() {
        let input: Vec<String> = ["eurusd", " EURUSD ", "", "gbpusd", "EurUsd"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(normalize_symbols(&input), vec!["EURUSD", "GBPUSD"]);
    }

    #[tokio::test]
    async fn failures_do_not_abort_siblings() {
        let symbols: Vec<String> = ["A", "B", "C", "D"].into_iter().map(String::from).collect();
        let report = run_blocking(&symbols, 2, |s| {
            if s == "C" {
                Err(PipscopeError::Data("bad input".into()))
            } else {
                Ok(s.len())
            }
        })
        .await;
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.failures["C"], PipscopeError::Data(_)));
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn panicking_unit_is_reported() {
        let symbols: Vec<String> = vec!["OK".into(), "BOOM".into()];
        let report = run_blocking(&symbols, 4, |s| {
            assert_ne!(s, "BOOM", "unit exploded");
            Ok(())
        })
        .await;
        assert!(report.results.contains_key("OK"));
        assert!(matches!(report.failures["BOOM"], PipscopeError::Other(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrency_never_exceeds_pool_size() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let symbols: Vec<String> = (0..8).map(|i| format!("S{i}")).collect();
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let report = run_blocking(&symbols, 3, move |_| {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            a.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert_eq!(report.succeeded(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn every_unit_failing_aggregates_the_errors() {
        let symbols: Vec<String> = vec!["A".into(), "B".into()];
        let report: BatchReport<()> =
            run_blocking(&symbols, 2, |s| Err(PipscopeError::not_found(s.to_string()))).await;
        let err = report.all_failed().unwrap();
        assert!(!err.is_transient());
        assert_eq!(
            err.flatten(),
            vec![PipscopeError::not_found("A"), PipscopeError::not_found("B")]
        );
    }

    #[tokio::test]
    async fn empty_input_is_an_empty_report() {
        let report = run_blocking(&[], 5, |_| Ok(())).await;
        assert!(report.results.is_empty());
        assert!(report.is_complete());
    }
}
