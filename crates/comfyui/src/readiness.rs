//! Fixed-interval readiness polling for a freshly started ComfyUI server.
//!
//! The server process may still be loading models when the first job
//! arrives. [`wait_until_ready`] polls `GET /` until it answers with a
//! success status or the overall budget runs out.

use std::time::Duration;

use tokio::time::Instant;

use crate::api::ComfyUIApi;

/// Stand-in deadline for waits too long to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + wait`, clamped to roughly thirty years out.
fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Poll the ComfyUI root endpoint until it answers with 2xx.
///
/// Connection failures and error statuses count as "not ready yet".
/// Returns `false` once `max_wait` has elapsed without a 2xx answer.
pub async fn wait_until_ready(api: &ComfyUIApi, interval: Duration, max_wait: Duration) -> bool {
    let started = Instant::now();
    let deadline = deadline_after(started, max_wait);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());

        match tokio::time::timeout(remaining, api.ping()).await {
            Ok(Ok(status)) if status.is_success() => {
                tracing::info!(
                    api_url = api.api_url(),
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "ComfyUI server is ready",
                );
                return true;
            }
            Ok(Ok(status)) => {
                tracing::debug!(attempt, status = status.as_u16(), "ComfyUI not ready yet");
            }
            Ok(Err(e)) => {
                tracing::debug!(attempt, error = %e, "ComfyUI not reachable yet");
            }
            Err(_) => {
                tracing::debug!(attempt, "ComfyUI ping exceeded remaining wait");
            }
        }

        if deadline.saturating_duration_since(Instant::now()) <= interval {
            tracing::warn!(
                api_url = api.api_url(),
                attempts = attempt,
                max_wait_ms = max_wait.as_millis() as u64,
                "ComfyUI server did not become ready",
            );
            return false;
        }

        tokio::time::sleep(interval).await;
    }
}
