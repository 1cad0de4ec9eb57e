use std::sync::Arc;

use pipscope_types::{MetricMap, category};

use crate::io::store::CandleStore;
use crate::metrics::{MetricCalculator, percentage, zeroed};
use crate::types::DailyCandle;

/// Share of days whose high exceeded the previous day's high.
pub const PDH_PROBABILITY: &str = "PDH Probability";
/// Share of days whose low undercut the previous day's low.
pub const PDL_PROBABILITY: &str = "PDL Probability";
/// Share of days that did both.
pub const PD_LEVELS_PROBABILITY: &str = "PD Levels Probability";

const NAMES: [&str; 3] = [PDH_PROBABILITY, PDL_PROBABILITY, PD_LEVELS_PROBABILITY];

/// Every metric name this module emits, paired with its category.
#[must_use]
pub fn catalog_entries() -> Vec<(String, &'static str)> {
    NAMES
        .into_iter()
        .map(|n| (n.to_string(), category::OCCURRENCE))
        .collect()
}

/// Previous-day high/low break probabilities over consecutive daily candles.
///
/// Breaks are strict. Fewer than two days yields zeros.
#[must_use]
pub fn key_levels(days: &[DailyCandle]) -> MetricMap {
    let pairs = days.windows(2).count();
    let (mut pdh, mut pdl, mut both) = (0, 0, 0);
    for w in days.windows(2) {
        let (prev, cur) = (&w[0], &w[1]);
        let hi = cur.high > prev.high;
        let lo = cur.low < prev.low;
        pdh += usize::from(hi);
        pdl += usize::from(lo);
        both += usize::from(hi && lo);
    }
    let mut out = MetricMap::new();
    out.insert(PDH_PROBABILITY.into(), percentage(pdh, pairs).into());
    out.insert(PDL_PROBABILITY.into(), percentage(pdl, pairs).into());
    out.insert(PD_LEVELS_PROBABILITY.into(), percentage(both, pairs).into());
    out
}

/// Standalone previous-day level calculator reading daily candles only.
pub struct KeyLevelsCalculator {
    candles: Arc<dyn CandleStore>,
}

impl KeyLevelsCalculator {
    /// Calculator over `candles`.
    pub fn new(candles: Arc<dyn CandleStore>) -> Self {
        Self { candles }
    }
}

impl MetricCalculator for KeyLevelsCalculator {
    fn name(&self) -> &'static str {
        "key_levels"
    }

    fn calculate(&self, symbol: &str, year: i32) -> MetricMap {
        match self.candles.load_daily(symbol, year) {
            Ok(days) => key_levels(&days),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(symbol, year, error = %_e, "no daily candles; reporting zeros");
                zeroed(self.metric_names())
            }
        }
    }

    fn metric_names(&self) -> Vec<String> {
        NAMES.iter().map(|n| (*n).to_string()).collect()
    }
}
