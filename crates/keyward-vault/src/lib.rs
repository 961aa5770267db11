// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM credential cipher and credential vault service for keyward.
//!
//! Credentials are sealed either under a key derived once from the service
//! secret, or under a per-credential key derived from a passphrase the
//! owner holds (Argon2id or PBKDF2-HMAC-SHA512). Forgotten passphrases are
//! unrecoverable.

pub mod cipher;
pub mod crypto;
pub mod kdf;
pub mod prompt;
pub mod vault;

pub use cipher::CredentialCipher;
pub use prompt::{get_passphrase, get_passphrase_with_confirm, read_credential_value};
pub use vault::{CredentialVault, NewCredential, Protection};
