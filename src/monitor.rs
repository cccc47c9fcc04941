/// Background market sweep
///
/// Periodically refreshes the tracked token set through the same tracker
/// policy as request-driven reads: the sweep respects the governor and the
/// per-identifier flight registry, so it can never stack upstream calls on
/// top of a request-triggered refresh.
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::logger::{self, LogTag};
use crate::tokens::TokenTracker;

/// Waits for a delay or shutdown signal; true means shutdown was requested
pub async fn check_shutdown_or_delay(shutdown: &Notify, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.notified() => true,
    }
}

/// Monitor background task loop
///
/// Runs an immediate sweep on startup so a cold cache fills as soon as the
/// governor allows, then keeps sweeping at the configured cadence until
/// shutdown is signalled.
pub async fn monitor(tracker: Arc<TokenTracker>, interval: Duration, shutdown: Arc<Notify>) {
    logger::info(
        LogTag::Monitor,
        &format!("Market sweep task started ({}s cadence)", interval.as_secs()),
    );

    loop {
        match tracker.refresh_if_stale().await {
            Ok(Some(written)) => {
                logger::info(LogTag::Monitor, &format!("Sweep refreshed {} tokens", written));
            }
            Ok(None) => {
                logger::debug(LogTag::Monitor, "Sweep skipped (fresh, throttled or in flight)");
            }
            Err(e) => {
                logger::warning(LogTag::Monitor, &format!("Sweep failed: {}", e));
            }
        }

        if check_shutdown_or_delay(&shutdown, interval).await {
            logger::info(LogTag::Monitor, "Market sweep task shutting down");
            break;
        }
    }
}
