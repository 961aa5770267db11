// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier that reports rotation events through `tracing`.

use async_trait::async_trait;
use tracing::warn;

use keyward_core::{KeywardError, RotationCandidate, RotationNotifier};

/// Emits one structured warning per rotation event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl RotationNotifier for LogNotifier {
    async fn credential_expired(&self, credential: &RotationCandidate) -> Result<(), KeywardError> {
        warn!(
            id = %credential.id,
            owner_id = %credential.owner_id,
            name = %credential.name,
            last_rotated_at = %credential.last_rotated_at.to_rfc3339(),
            "credential expired; rotate it to restore service"
        );
        Ok(())
    }

    async fn rotation_due(
        &self,
        credential: &RotationCandidate,
        days_left: i64,
    ) -> Result<(), KeywardError> {
        warn!(
            id = %credential.id,
            owner_id = %credential.owner_id,
            name = %credential.name,
            days_left,
            "credential rotation due soon"
        );
        Ok(())
    }
}
