// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure rotation policy: what should happen to one credential at one instant.

use chrono::{DateTime, Utc};
use keyward_config::model::RotationConfig;
use keyward_core::{CredentialStatus, RotationCandidate};

/// Outcome of evaluating one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not active; the policy never touches it.
    Skip,
    /// Active and outside the warning window.
    Current,
    /// Active, inside the warning window.
    DueSoon { days_left: i64 },
    /// Rotation interval has elapsed.
    Expire,
}

/// Decides expiry from whole days elapsed since the last rotation.
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    warn_before_days: i64,
}

impl RotationPolicy {
    pub fn new(warn_before_days: u16) -> Self {
        Self {
            warn_before_days: i64::from(warn_before_days),
        }
    }

    pub fn from_config(config: &RotationConfig) -> Self {
        Self::new(config.warn_before_days)
    }

    /// Elapsed days are truncated toward zero, so a credential rotated
    /// 89 days and 23 hours ago is 89 days old. A rotation time in the
    /// future yields a negative age and never expires.
    pub fn evaluate(&self, candidate: &RotationCandidate, now: DateTime<Utc>) -> Verdict {
        if candidate.status != CredentialStatus::Active {
            return Verdict::Skip;
        }

        let elapsed = (now - candidate.last_rotated_at).num_days();
        let interval = i64::from(candidate.rotation_interval.days());
        if elapsed >= interval {
            return Verdict::Expire;
        }

        let days_left = interval - elapsed;
        if days_left <= self.warn_before_days {
            Verdict::DueSoon { days_left }
        } else {
            Verdict::Current
        }
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}
