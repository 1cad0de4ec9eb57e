use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use pipscope_core::Publisher;
use pipscope_types::{CategorizedMetrics, MetricMap, PipscopeError};

/// Symbol that always fails permanently (HTTP 401).
pub const FAIL_SYMBOL: &str = "FAIL";
/// Symbol that fails with HTTP 503 a configurable number of times, then succeeds.
pub const TRANSIENT_SYMBOL: &str = "TRANSIENT";
/// Symbol that always fails with HTTP 503.
pub const DOWN_SYMBOL: &str = "DOWN";

#[derive(Default)]
struct State {
    published: Vec<(String, String, CategorizedMetrics)>,
    ensured: Vec<String>,
    attempts: HashMap<String, u32>,
    failing_profiles: HashSet<String>,
}

/// In-memory [`Publisher`] that records what it receives.
///
/// Behaviour is keyed on the symbol: [`FAIL_SYMBOL`], [`TRANSIENT_SYMBOL`]
/// and [`DOWN_SYMBOL`] fail as documented; everything else succeeds.
pub struct MockPublisher {
    transient_failures: u32,
    state: Mutex<State>,
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPublisher {
    /// Publisher whose transient symbol fails twice before succeeding.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transient_failures(2)
    }

    /// Publisher whose transient symbol fails `n` times before succeeding.
    #[must_use]
    pub fn with_transient_failures(n: u32) -> Self {
        Self {
            transient_failures: n,
            state: Mutex::new(State::default()),
        }
    }

    /// Make `ensure_properties` fail permanently for `profile`.
    pub async fn fail_profile(&self, profile: &str) {
        self.state
            .lock()
            .await
            .failing_profiles
            .insert(profile.to_string());
    }

    /// `(profile, symbol)` pairs successfully published, in call order.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .map(|(p, s, _)| (p.clone(), s.clone()))
            .collect()
    }

    /// Metrics last published for `(profile, symbol)`.
    pub async fn metrics_for(&self, profile: &str, symbol: &str) -> Option<CategorizedMetrics> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .rev()
            .find(|(p, s, _)| p == profile && s == symbol)
            .map(|(_, _, m)| m.clone())
    }

    /// Profiles whose properties were ensured, in call order.
    pub async fn ensured(&self) -> Vec<String> {
        self.state.lock().await.ensured.clone()
    }

    /// Number of `publish` calls seen for `symbol` across profiles.
    pub async fn attempts(&self, symbol: &str) -> u32 {
        self.state
            .lock()
            .await
            .attempts
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &'static str {
        "pipscope-mock"
    }

    async fn ensure_properties(
        &self,
        profile: &str,
        _sample: &MetricMap,
    ) -> Result<(), PipscopeError> {
        let mut st = self.state.lock().await;
        if st.failing_profiles.contains(profile) {
            return Err(PipscopeError::http(400, format!("forced failure: {profile}")));
        }
        st.ensured.push(profile.to_string());
        Ok(())
    }

    async fn publish(
        &self,
        profile: &str,
        symbol: &str,
        metrics: &CategorizedMetrics,
    ) -> Result<(), PipscopeError> {
        let mut st = self.state.lock().await;
        let n = {
            let n = st.attempts.entry(symbol.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        match symbol {
            FAIL_SYMBOL => Err(PipscopeError::http(401, "forced permanent failure")),
            DOWN_SYMBOL => Err(PipscopeError::http(503, "forced outage")),
            TRANSIENT_SYMBOL if n <= self.transient_failures => {
                Err(PipscopeError::http(503, format!("forced transient failure {n}")))
            }
            _ => {
                st.published
                    .push((profile.to_string(), symbol.to_string(), metrics.clone()));
                Ok(())
            }
        }
    }
}
