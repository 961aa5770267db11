// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for keyward.

use thiserror::Error;

use crate::types::CredentialStatus;

/// The user-facing message for every decryption failure.
///
/// Wrong passphrase, wrong service secret, and tampered ciphertext all
/// produce this exact text so callers cannot be used as an oracle.
pub const DECRYPTION_FAILED_MESSAGE: &str = "unable to decrypt -- check your passphrase";

/// The primary error type used across the keyward crates.
#[derive(Debug, Error)]
pub enum KeywardError {
    /// Configuration errors (missing service secret, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, corrupt rows).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Decryption failed. Deliberately carries no cause.
    #[error("{}", DECRYPTION_FAILED_MESSAGE)]
    Decryption,

    /// Stored ciphertext framing could not be parsed.
    #[error("invalid ciphertext format: {0}")]
    InvalidCiphertextFormat(String),

    /// Failures of the cryptographic primitives themselves (RNG, key setup).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// No credential exists with the given id.
    #[error("credential not found: {id}")]
    NotFound { id: String },

    /// Caller supplied an invalid argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A lifecycle status change that is not permitted.
    #[error("cannot change credential status from {from} to {to}")]
    InvalidTransition {
        from: CredentialStatus,
        to: CredentialStatus,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KeywardError {
    /// Wrap any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Returns `true` for failures that should be folded into a generic
    /// "could not decrypt" answer for end users.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::Decryption | Self::InvalidCiphertextFormat(_))
    }
}
