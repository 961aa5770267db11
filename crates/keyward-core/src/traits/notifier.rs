// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery hook for rotation lifecycle events.

use async_trait::async_trait;

use crate::error::KeywardError;
use crate::types::RotationCandidate;

/// Receives rotation events produced by the policy engine.
#[async_trait]
pub trait RotationNotifier: Send + Sync {
    /// Called exactly once per `Active -> Expired` transition.
    async fn credential_expired(&self, credential: &RotationCandidate) -> Result<(), KeywardError>;

    /// Called on each scan while a credential is inside its warning window.
    async fn rotation_due(
        &self,
        credential: &RotationCandidate,
        days_left: i64,
    ) -> Result<(), KeywardError>;
}
