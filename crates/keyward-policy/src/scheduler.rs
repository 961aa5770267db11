// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic and on-demand rotation scans with at most one scan in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use keyward_config::model::RotationConfig;
use keyward_core::KeywardError;

use crate::engine::{PolicyEngine, ScanReport};

/// Drives a [`PolicyEngine`] on a fixed period.
///
/// Scheduled ticks and manual [`trigger`](Self::trigger) calls share one
/// run lock; a request that finds a scan already running is skipped.
pub struct RotationScheduler {
    engine: Arc<PolicyEngine>,
    period: Duration,
    run_on_startup: bool,
    running: Mutex<()>,
}

impl RotationScheduler {
    /// A zero `period` is raised to one second.
    pub fn new(engine: Arc<PolicyEngine>, period: Duration, run_on_startup: bool) -> Self {
        Self {
            engine,
            period: period.max(Duration::from_secs(1)),
            run_on_startup,
            running: Mutex::new(()),
        }
    }

    pub fn from_config(engine: Arc<PolicyEngine>, config: &RotationConfig) -> Self {
        Self::new(
            engine,
            Duration::from_secs(config.scan_interval_secs),
            config.run_on_startup,
        )
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one scan now, unless one is already in flight.
    ///
    /// Returns `Ok(None)` when skipped.
    pub async fn trigger(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<ScanReport>, KeywardError> {
        let Ok(_guard) = self.running.try_lock() else {
            info!("rotation scan already in progress; skipping");
            return Ok(None);
        };
        self.engine.scan(Utc::now(), cancel).await.map(Some)
    }

    /// Tick until `cancel` fires, then wait for any scan still running.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !self.run_on_startup {
            // Skip the first immediate tick.
            interval.tick().await;
        }
        info!(period_secs = self.period.as_secs(), "rotation scheduler started");

        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let scheduler = Arc::clone(&self);
                    let scan_cancel = cancel.clone();
                    in_flight.spawn(async move { scheduler.scheduled_scan(&scan_cancel).await });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "rotation scan task failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("rotation scheduler shutting down");
                    break;
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "rotation scan task failed");
            }
        }
        debug!("rotation scheduler stopped");
    }

    async fn scheduled_scan(&self, cancel: &CancellationToken) {
        match self.trigger(cancel).await {
            Ok(Some(report)) if report.expired > 0 || report.failed > 0 => {
                info!(
                    expired = report.expired,
                    failed = report.failed,
                    "scheduled rotation scan changed credentials"
                );
            }
            Ok(Some(_)) => debug!("scheduled rotation scan found nothing to expire"),
            Ok(None) => debug!("scheduled rotation scan skipped"),
            Err(e) => warn!(error = %e, "scheduled rotation scan failed (non-fatal)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RotationPolicy;
    use keyward_test_utils::{MemoryStore, RecordingNotifier};

    fn scheduler(
        store: &Arc<MemoryStore>,
        period: Duration,
        startup: bool,
    ) -> Arc<RotationScheduler> {
        let engine = PolicyEngine::new(
            store.clone(),
            Arc::new(RecordingNotifier::new()),
            RotationPolicy::new(7),
        );
        Arc::new(RotationScheduler::new(Arc::new(engine), period, startup))
    }

    #[tokio::test(start_paused = true)]
    async fn startup_scan_then_every_period() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let scheduler = scheduler(&store, Duration::from_secs(3600), true);
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.list_calls(), 1);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(store.list_calls(), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn without_startup_scan_waits_one_period() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let scheduler = scheduler(&store, Duration::from_secs(600), false);
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(599)).await;
        assert_eq!(store.list_calls(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.list_calls(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_in_flight_scan() {
        let store = Arc::new(MemoryStore::new());
        store.set_list_delay(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let scheduler = scheduler(&store, Duration::from_secs(3600), true);
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let started = tokio::time::Instant::now();
        handle.await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(29));
    }
}
