use std::time::Duration;

use pipscope_types::BackoffConfig;
use rand::Rng;

/// `base_ms` plus a random extra of up to `jitter_percent` percent of it.
#[must_use]
pub fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms.saturating_add(rng.random_range(0..jitter_range))
}

/// Delay before retry `attempt` (0-based) without jitter:
/// `min_backoff_ms * factor^attempt`, capped at `max_backoff_ms`.
#[must_use]
pub fn base_delay_ms(cfg: &BackoffConfig, attempt: u32) -> u64 {
    let cap = cfg.max_backoff_ms.max(cfg.min_backoff_ms);
    let factor = u64::from(cfg.factor.max(1));
    let mut delay = cfg.min_backoff_ms;
    for _ in 0..attempt {
        delay = delay.saturating_mul(factor);
        if delay >= cap {
            break;
        }
    }
    delay.min(cap)
}

/// Jittered delay before retry `attempt`.
#[must_use]
pub fn retry_delay(cfg: &BackoffConfig, attempt: u32) -> Duration {
    let jitter = u32::from(cfg.jitter_percent.min(100));
    Duration::from_millis(jitter_wait(base_delay_ms(cfg, attempt), jitter))
}
