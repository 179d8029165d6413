//! Exponential-backoff reconnection to the message broker.
//!
//! A watcher that cannot reach the broker keeps retrying with
//! increasing delays until either a channel is established or its
//! [`CancellationToken`] fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sentra_broker::{Broker, Exchange};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry after a failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Keep trying to establish the broker channel with exponential backoff.
///
/// Returns `Some(channel)` once an attempt succeeds, or `None` if the
/// `cancel` token fires first.
pub async fn reconnect_loop(
    broker: &Broker,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<Arc<Exchange>> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("broker reconnect cancelled");
                return None;
            }
            result = broker.channel() => {
                match result {
                    Ok(channel) => {
                        tracing::info!(attempt, "broker channel established");
                        return Some(channel.clone());
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "broker connect failed, backing off",
                        );
                    }
                }
            }
        }

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}
