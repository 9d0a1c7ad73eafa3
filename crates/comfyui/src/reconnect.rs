//! Fixed-delay reconnection for the push channel.
//!
//! The booth runs unattended for days; when the ComfyUI connection drops,
//! [`reconnect_loop`] retries forever at a fixed cadence until either the
//! connection is restored or the [`CancellationToken`] is triggered.
//! Polling keeps progress available while the channel is down, so there
//! is no escalating backoff — a short constant delay reattaches fastest.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{ComfyClient, ComfyConnection};

/// Tunable parameters for the reconnect loop.
pub struct ReconnectConfig {
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
        }
    }
}

/// Reconnect to the push channel, retrying indefinitely.
///
/// Returns `Some(connection)` once a connection succeeds, or `None` if
/// the `cancel` token is triggered first. There is no attempt limit.
pub async fn reconnect_loop(
    client: &ComfyClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<ComfyConnection> {
    let mut attempt = 0u64;

    loop {
        attempt += 1;
        tracing::info!(
            attempt,
            delay_ms = config.delay.as_millis() as u64,
            "Reconnecting to ComfyUI push channel",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            result = client.connect() => {
                match result {
                    Ok(conn) => {
                        tracing::info!(attempt, "Reconnected to ComfyUI push channel");
                        return Some(conn);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
                    }
                }
            }
        }

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(config.delay) => {}
        }
    }
}
