// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One pass of the rotation policy over every active credential.
//!
//! Enumeration failure aborts the pass. Failures on individual records are
//! logged and counted, and the remaining records are still evaluated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{StreamExt, future, stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use keyward_core::{
    CredentialStatus, CredentialStore, KeywardError, RotationCandidate, RotationNotifier,
};

use crate::policy::{RotationPolicy, Verdict};

/// Default number of records evaluated concurrently.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Counters for one completed (or interrupted) scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Records evaluated.
    pub scanned: usize,
    /// Records this scan moved to `Expired`.
    pub expired: usize,
    /// Records inside the warning window.
    pub due_soon: usize,
    /// Records whose store update or notification failed.
    pub failed: usize,
    /// Records left alone because another writer changed them first.
    pub skipped: usize,
    /// Set when cancellation stopped the scan before every record was seen.
    pub interrupted: bool,
}

enum Outcome {
    Current,
    Skipped,
    Expired { notified: bool },
    DueSoon { notified: bool },
    Failed,
}

/// Applies a [`RotationPolicy`] to the store and reports transitions to a
/// [`RotationNotifier`].
pub struct PolicyEngine {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn RotationNotifier>,
    policy: RotationPolicy,
    concurrency: usize,
}

impl PolicyEngine {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn RotationNotifier>,
        policy: RotationPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Bound the number of records in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Evaluate every active credential against the policy as of `now`.
    ///
    /// Expiry goes through the store's conditional `expire`, guarded on the
    /// rotation time that was evaluated, so a record rotated mid-scan is left
    /// alone and a record is announced as expired at most once.
    /// Records not yet started when `cancel` fires are left for the next scan.
    pub async fn scan(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, KeywardError> {
        let candidates = self.store.list_by_status(CredentialStatus::Active).await?;
        let total = candidates.len();
        debug!(candidates = total, "rotation scan started");

        let outcomes: Vec<Outcome> = stream::iter(candidates)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|candidate| self.process(candidate, now))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = ScanReport {
            scanned: outcomes.len(),
            interrupted: outcomes.len() < total,
            ..ScanReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Current => {}
                Outcome::Skipped => report.skipped += 1,
                Outcome::Expired { notified } => {
                    report.expired += 1;
                    if !notified {
                        report.failed += 1;
                    }
                }
                Outcome::DueSoon { notified } => {
                    report.due_soon += 1;
                    if !notified {
                        report.failed += 1;
                    }
                }
                Outcome::Failed => report.failed += 1,
            }
        }

        info!(
            scanned = report.scanned,
            expired = report.expired,
            due_soon = report.due_soon,
            failed = report.failed,
            skipped = report.skipped,
            interrupted = report.interrupted,
            "rotation scan complete"
        );
        Ok(report)
    }

    async fn process(&self, candidate: RotationCandidate, now: DateTime<Utc>) -> Outcome {
        match self.policy.evaluate(&candidate, now) {
            Verdict::Skip => Outcome::Skipped,
            Verdict::Current => Outcome::Current,
            Verdict::DueSoon { days_left } => {
                let notified = match self.notifier.rotation_due(&candidate, days_left).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(id = %candidate.id, error = %e, "rotation-due notice failed");
                        false
                    }
                };
                Outcome::DueSoon { notified }
            }
            Verdict::Expire => match self
                .store
                .expire(&candidate.id, candidate.last_rotated_at)
                .await
            {
                Ok(true) => {
                    info!(
                        id = %candidate.id,
                        owner_id = %candidate.owner_id,
                        interval_days = candidate.rotation_interval.days(),
                        "credential expired"
                    );
                    let notified = match self.notifier.credential_expired(&candidate).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(id = %candidate.id, error = %e, "expiry notice failed");
                            false
                        }
                    };
                    Outcome::Expired { notified }
                }
                Ok(false) => {
                    debug!(id = %candidate.id, "credential changed during scan; skipped");
                    Outcome::Skipped
                }
                Err(e) => {
                    warn!(id = %candidate.id, error = %e, "failed to expire credential");
                    Outcome::Failed
                }
            },
        }
    }
}
