//! Cache sweep
//!
//! Reads already drop the expired pages they touch. This task drops the ones
//! nobody asks for again, such as prefetched pages the user never paged to.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ExpiringCache;

/// Spawns a task that sweeps `cache` every `interval` until the returned
/// handle is aborted.
pub fn spawn_cleanup_task(cache: ExpiringCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Cache sweep started");

        loop {
            tokio::time::sleep(interval).await;

            match cache.cleanup_expired().await {
                0 => debug!("Cache sweep found nothing to drop"),
                dropped => {
                    let remaining = cache.len().await;
                    info!(dropped, remaining, "Cache sweep dropped expired pages");
                }
            }
        }
    })
}
