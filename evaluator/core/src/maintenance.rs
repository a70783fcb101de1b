//! Background Maintenance
//!
//! Periodic housekeeping on the shared services: purge expired cache entries
//! and log a registry report. The task only runs once explicitly started and
//! stops cleanly through [`MaintenanceHandle::stop`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::EvaluationCache;
use crate::registry::PerformanceRegistry;

/// What one maintenance sweep did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Expired cache entries removed
    pub purged: usize,
    /// Cache entries left afterwards
    pub cache_size: usize,
    /// Profiles in the registry
    pub profiles: usize,
}

/// Periodic cache and registry housekeeping
#[derive(Debug)]
pub struct MaintenanceTask {
    cache: Arc<EvaluationCache>,
    registry: Arc<PerformanceRegistry>,
    interval: Duration,
}

impl MaintenanceTask {
    #[must_use]
    pub fn new(
        cache: Arc<EvaluationCache>,
        registry: Arc<PerformanceRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            cache,
            registry,
            interval,
        }
    }

    /// Run one sweep
    pub fn run_once(&self) -> MaintenanceReport {
        let purged = self.cache.purge_expired();

        for profile in self.registry.profiles() {
            debug!(
                backend = %profile.backend_id,
                avg_cost = profile.avg_cost_per_call,
                avg_latency_ms = profile.avg_latency_ms,
                accuracy = profile.accuracy_score,
                reliability = profile.reliability_score,
                observations = profile.observations,
                "Backend profile"
            );
        }

        let report = MaintenanceReport {
            purged,
            cache_size: self.cache.len(),
            profiles: self.registry.len(),
        };
        debug!(
            purged = report.purged,
            cache_size = report.cache_size,
            hit_rate_pct = self.cache.hit_rate_pct(),
            "Maintenance sweep complete"
        );
        report
    }

    /// Spawn the task on the current tokio runtime
    #[must_use]
    pub fn spawn(self) -> MaintenanceHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Maintenance task started");
            let mut ticker = tokio::time::interval(self.interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Maintenance task stopped");
        });

        MaintenanceHandle { shutdown_tx, task }
    }
}

/// Handle to a running maintenance task
#[derive(Debug)]
pub struct MaintenanceHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Whether the task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the task to exit
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Maintenance task ended abnormally");
        }
    }
}
