// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for keyward.
//!
//! Provides the error type, credential data model, sealed-credential
//! framing, and the store/notifier interfaces shared by the cipher, the
//! rotation policy engine, and the storage backend.

pub mod error;
pub mod sealed;
pub mod traits;
pub mod types;

pub use error::{KeywardError, DECRYPTION_FAILED_MESSAGE};
pub use sealed::{KdfParams, KeyDerivationMode, KeyMode, SealedCredential};
pub use traits::{CredentialStore, RotationNotifier};
pub use types::{
    CredentialId, CredentialRecord, CredentialStatus, CredentialSummary, CredentialUpdate,
    Environment, RotationCandidate, RotationInterval,
};
