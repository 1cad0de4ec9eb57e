use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use pipscope_core::Publisher;
use pipscope_types::{BackoffConfig, CategorizedMetrics, MetricMap, PipscopeError, PublishConfig};

use super::backoff::retry_delay;

/// Wraps a [`Publisher`] with bounded concurrency and retries.
///
/// Behavior:
/// - At most `max_concurrent_requests` calls are in flight across every
///   profile and symbol sharing this wrapper. A permit is held only while a
///   call runs, never while waiting to retry.
/// - Transient failures ([`PipscopeError::is_transient`]) are retried up to
///   `max_retries` times with jittered exponential backoff. Anything else is
///   returned immediately.
pub struct RetryingPublisher<P> {
    inner: P,
    backoff: BackoffConfig,
    max_retries: u32,
    permits: Arc<Semaphore>,
}

impl<P: Publisher> RetryingPublisher<P> {
    /// Wrap `inner` using the retry and concurrency limits from `publish`.
    pub fn new(inner: P, publish: &PublishConfig, backoff: BackoffConfig) -> Self {
        Self::with_limits(
            inner,
            publish.max_retries,
            publish.max_concurrent_requests,
            backoff,
        )
    }

    /// Wrap `inner` with explicit limits. A zero concurrency limit is raised to one.
    pub fn with_limits(
        inner: P,
        max_retries: u32,
        max_concurrent_requests: usize,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            inner,
            backoff,
            max_retries,
            permits: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        }
    }

    /// The wrapped publisher.
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, PipscopeError>
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, PipscopeError>> + Send,
    {
        let mut attempt = 0;
        loop {
            let res = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| PipscopeError::Other("request limiter closed".into()))?;
                f().await
            };
            match res {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = retry_delay(&self.backoff, attempt);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        publisher = self.inner.name(),
                        op,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "transient failure; retrying"
                    );
                    #[cfg(not(feature = "tracing"))]
                    let _ = op;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<P: Publisher> Publisher for RetryingPublisher<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn ensure_properties(
        &self,
        profile: &str,
        sample: &MetricMap,
    ) -> Result<(), PipscopeError> {
        self.call("ensure_properties", || {
            self.inner.ensure_properties(profile, sample)
        })
        .await
    }

    async fn publish(
        &self,
        profile: &str,
        symbol: &str,
        metrics: &CategorizedMetrics,
    ) -> Result<(), PipscopeError> {
        self.call("publish", || self.inner.publish(profile, symbol, metrics))
            .await
    }
}
