// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier that captures rotation notices for assertion in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use keyward_core::{CredentialId, KeywardError, RotationCandidate, RotationNotifier};

/// Captures every `credential_expired` and `rotation_due` call.
#[derive(Default)]
pub struct RecordingNotifier {
    expired: Mutex<Vec<CredentialId>>,
    due: Mutex<Vec<(CredentialId, i64)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every notification fail after it has been recorded.
    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Ids passed to `credential_expired`, in call order.
    pub async fn expired(&self) -> Vec<CredentialId> {
        self.expired.lock().await.clone()
    }

    /// `(id, days_left)` pairs passed to `rotation_due`, in call order.
    pub async fn due(&self) -> Vec<(CredentialId, i64)> {
        self.due.lock().await.clone()
    }

    fn outcome(&self) -> Result<(), KeywardError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KeywardError::Internal("injected notifier failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RotationNotifier for RecordingNotifier {
    async fn credential_expired(&self, credential: &RotationCandidate) -> Result<(), KeywardError> {
        self.expired.lock().await.push(credential.id.clone());
        self.outcome()
    }

    async fn rotation_due(
        &self,
        credential: &RotationCandidate,
        days_left: i64,
    ) -> Result<(), KeywardError> {
        self.due.lock().await.push((credential.id.clone(), days_left));
        self.outcome()
    }
}
