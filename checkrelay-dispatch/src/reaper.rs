//! Idle Tenant Reaper
//!
//! Background task that periodically evicts tenant dispatchers that have
//! not been used within the configured idle timeout. Runs until the
//! shutdown flag flips to `true`.

use crate::registry::DispatcherRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// METRICS
// ============================================================================

/// Counters for reaper activity.
#[derive(Debug, Default)]
pub struct ReaperMetrics {
    /// Sweeps completed
    pub sweeps: AtomicU64,

    /// Dispatchers evicted since startup
    pub evicted: AtomicU64,

    /// Sweeps that failed
    pub errors: AtomicU64,
}

impl ReaperMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ReaperSnapshot {
        ReaperSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Reaper counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperSnapshot {
    pub sweeps: u64,
    pub evicted: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Sweep the registry on every reaper interval tick until shutdown.
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(reaper_task(Arc::clone(&registry), shutdown_rx));
/// // ...
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn reaper_task(
    registry: Arc<DispatcherRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ReaperMetrics> {
    let metrics = Arc::new(ReaperMetrics::new());
    let period = registry.config().reaper_interval;

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        idle_timeout_ms =
            u64::try_from(registry.config().tenant_idle_timeout.as_millis()).unwrap_or(u64::MAX),
        "Tenant reaper started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also ends the task.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Tenant reaper shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                sweep(&registry, &metrics);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweeps = snapshot.sweeps,
        evicted = snapshot.evicted,
        errors = snapshot.errors,
        "Tenant reaper completed"
    );

    metrics
}

fn sweep(registry: &DispatcherRegistry, metrics: &ReaperMetrics) {
    metrics.sweeps.fetch_add(1, Ordering::Relaxed);
    match registry.evict_idle(registry.now()) {
        Ok(0) => tracing::trace!("Reaper sweep found no idle tenants"),
        Ok(count) => {
            metrics.evicted.fetch_add(count as u64, Ordering::Relaxed);
            tracing::info!(evicted = count, remaining = registry.len(), "Evicted idle tenants");
        }
        Err(e) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Reaper sweep failed");
        }
    }
}
