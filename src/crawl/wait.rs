//! Polling helpers shared by discovery, workers and login.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::driver::PageDriver;
use crate::site::CompiledSite;

/// Sleep unless the duration is zero.
pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Current markup, retried up to `attempts` times; empty when every read fails.
pub async fn read_html<D: PageDriver + ?Sized>(
    driver: &mut D,
    attempts: u32,
    delay: Duration,
) -> String {
    for attempt in 1..=attempts.max(1) {
        match driver.current_html().await {
            Ok(html) => return html,
            Err(e) => {
                debug!(attempt, "page source unavailable: {}", e);
                pause(delay).await;
            }
        }
    }
    String::new()
}

/// Poll the markup until `ready` holds or `timeout` elapses; always checks once.
pub async fn wait_for_html<D, F>(
    driver: &mut D,
    timeout: Duration,
    poll: Duration,
    mut ready: F,
) -> bool
where
    D: PageDriver + ?Sized,
    F: FnMut(&str) -> bool + Send,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(html) = driver.current_html().await {
            if ready(&html) {
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        pause(poll.max(Duration::from_millis(1))).await;
    }
}

/// Poll the grid signature until it differs from `before`.
pub async fn wait_for_signature_change<D: PageDriver + ?Sized>(
    driver: &mut D,
    site: &CompiledSite,
    before: &str,
    timeout: Duration,
    poll: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(signature) = driver.signature(site).await {
            if signature != before {
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        pause(poll.max(Duration::from_millis(1))).await;
    }
}
