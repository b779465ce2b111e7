use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::TokenRegistry;

/// Periodically purge expired tokens from `registry`.
///
/// The first pass runs one full `interval` after spawning.
pub fn spawn_sweeper(registry: Arc<TokenRegistry>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval() fires immediately; skip that tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = registry.sweep();
            if report.removed > 0 {
                info!(
                    removed = report.removed,
                    remaining = report.remaining,
                    "background sweep removed expired tokens"
                );
            } else {
                debug!(remaining = report.remaining, "background sweep found nothing");
            }
        }
    })
}
