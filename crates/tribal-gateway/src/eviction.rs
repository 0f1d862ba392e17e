use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use tribal_cache::QueryCacheStore;
use tribal_context::ThreadContextStore;
use tribal_core::config::DEFAULT_CONTEXT_TTL_SECONDS;

const EVICTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Hourly sweep over stale thread contexts, mirroring
/// `skynet-scheduler::engine::SchedulerEngine::run`'s
/// `interval.tick() / shutdown.changed()` loop.
pub async fn run_context_eviction(contexts: std::sync::Arc<ThreadContextStore>, mut shutdown: watch::Receiver<bool>) {
    info!("context eviction task started");
    let mut interval = tokio::time::interval(EVICTION_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match contexts.cleanup_old_contexts(DEFAULT_CONTEXT_TTL_SECONDS as i64) {
                    Ok(n) if n > 0 => info!(evicted = n, "evicted expired thread contexts"),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "thread context eviction failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("context eviction task shutting down");
                    break;
                }
            }
        }
    }
}

/// Hourly sweep over expired cache entries.
pub async fn run_cache_eviction(cache: std::sync::Arc<QueryCacheStore>, mut shutdown: watch::Receiver<bool>) {
    info!("cache eviction task started");
    let mut interval = tokio::time::interval(EVICTION_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match cache.cleanup_expired() {
                    Ok(n) if n > 0 => info!(evicted = n, "evicted expired cache entries"),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "cache eviction failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("cache eviction task shutting down");
                    break;
                }
            }
        }
    }
}
