// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key derivation for both cipher modes.
//!
//! Passphrase keys come from Argon2id (Algorithm::Argon2id, Version::V0x13)
//! or PBKDF2-HMAC-SHA512, as recorded in the credential's [`KdfParams`].
//! The service key is PBKDF2-HMAC-SHA512 over the configured service secret.

use std::num::NonZeroU32;

use keyward_core::sealed::SALT_LEN;
use keyward_core::{KdfParams, KeywardError};
use ring::pbkdf2;
use zeroize::Zeroizing;

/// Fixed, non-secret salt for the service key. Changing it strands every
/// service-secret credential.
const SERVICE_KEY_SALT: &[u8] = b"keyward.service-key.v1";

/// PBKDF2 iterations for the service key.
pub const SERVICE_KEY_ITERATIONS: u32 = 100_000;

/// Upper bounds accepted when re-deriving from a stored descriptor.
/// Argon2 memory is allocated before the tag is checked, so this bounds
/// what a tampered row can make us allocate.
const MAX_ARGON2_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ARGON2_ITERATIONS: u32 = 64;
const MAX_ARGON2_PARALLELISM: u32 = 64;
const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;

/// Derive a 32-byte key from passphrase using Argon2id.
///
/// The returned key is wrapped in [`Zeroizing`] for automatic memory zeroing
/// on drop.
pub fn derive_argon2id(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    memory_cost: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<Zeroizing<[u8; 32]>, KeywardError> {
    let params = argon2::Params::new(memory_cost, iterations, parallelism, Some(32))
        .map_err(|e| KeywardError::Crypto(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase, salt, output.as_mut())
        .map_err(|e| KeywardError::Crypto(format!("Argon2id key derivation failed: {e}")))?;

    Ok(output)
}

/// Derive a 32-byte key with PBKDF2-HMAC-SHA512.
pub fn derive_pbkdf2_sha512(
    secret: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; 32]>, KeywardError> {
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| KeywardError::Crypto("PBKDF2 iterations must be non-zero".to_string()))?;

    let mut output = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA512,
        iterations,
        salt,
        secret,
        output.as_mut(),
    );
    Ok(output)
}

/// Derive the key for a passphrase-mode credential from its recorded parameters.
pub fn derive_for(
    params: &KdfParams,
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
) -> Result<Zeroizing<[u8; 32]>, KeywardError> {
    match *params {
        KdfParams::Argon2id {
            memory_cost,
            iterations,
            parallelism,
        } => derive_argon2id(passphrase, salt, memory_cost, iterations, parallelism),
        KdfParams::Pbkdf2Sha512 { iterations } => derive_pbkdf2_sha512(passphrase, salt, iterations),
    }
}

/// Reject stored KDF descriptors whose cost would exhaust the host.
pub fn check_bounds(params: &KdfParams) -> Result<(), KeywardError> {
    let within = match *params {
        KdfParams::Argon2id {
            memory_cost,
            iterations,
            parallelism,
        } => {
            memory_cost <= MAX_ARGON2_MEMORY_KIB
                && iterations <= MAX_ARGON2_ITERATIONS
                && parallelism <= MAX_ARGON2_PARALLELISM
        }
        KdfParams::Pbkdf2Sha512 { iterations } => iterations <= MAX_PBKDF2_ITERATIONS,
    };
    if within {
        Ok(())
    } else {
        Err(KeywardError::InvalidCiphertextFormat(
            "KDF parameters exceed supported limits".to_string(),
        ))
    }
}

/// Derive the process-wide service key from the configured service secret.
pub fn derive_service_key(service_secret: &[u8]) -> Result<Zeroizing<[u8; 32]>, KeywardError> {
    derive_pbkdf2_sha512(service_secret, SERVICE_KEY_SALT, SERVICE_KEY_ITERATIONS)
}
