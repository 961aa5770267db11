// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sealed credential values and their persisted string framing.
//!
//! A [`SealedCredential`] carries everything needed to decrypt it again
//! except the key material itself: which key-derivation mode produced it,
//! the KDF salt and parameters (passphrase mode), and the AEAD nonce.
//!
//! Persisted form, colon-delimited lowercase hex:
//!
//! ```text
//! s1:<nonce>:<ciphertext>
//! p1:<kdf>:<salt>:<nonce>:<ciphertext>
//! ```
//!
//! where `<kdf>` is `argon2id,m=<kib>,t=<n>,p=<n>` or `pbkdf2-sha512,i=<n>`.
//! Everything before the nonce is the header and is authenticated as AEAD
//! associated data.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::KeywardError;

/// AES-256-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Passphrase KDF salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-256-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

const SERVICE_TAG: &str = "s1";
const PASSPHRASE_TAG: &str = "p1";
const SEPARATOR: char = ':';

/// Parameters of the slow KDF used for a passphrase-mode credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfParams {
    Argon2id {
        memory_cost: u32,
        iterations: u32,
        parallelism: u32,
    },
    Pbkdf2Sha512 {
        iterations: u32,
    },
}

impl KdfParams {
    fn encode(&self) -> String {
        match self {
            Self::Argon2id {
                memory_cost,
                iterations,
                parallelism,
            } => format!("argon2id,m={memory_cost},t={iterations},p={parallelism}"),
            Self::Pbkdf2Sha512 { iterations } => format!("pbkdf2-sha512,i={iterations}"),
        }
    }

    fn decode(s: &str) -> Result<Self, KeywardError> {
        let mut parts = s.split(',');
        let algorithm = parts.next().unwrap_or_default();
        let mut fields = Vec::new();
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| format_error(format!("malformed KDF field `{part}`")))?;
            let value: u32 = value
                .parse()
                .map_err(|_| format_error(format!("non-numeric KDF field `{part}`")))?;
            fields.push((key, value));
        }
        let field = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| format_error(format!("missing KDF field `{name}`")))
        };

        match algorithm {
            "argon2id" if fields.len() == 3 => Ok(Self::Argon2id {
                memory_cost: field("m")?,
                iterations: field("t")?,
                parallelism: field("p")?,
            }),
            "pbkdf2-sha512" if fields.len() == 1 => Ok(Self::Pbkdf2Sha512 {
                iterations: field("i")?,
            }),
            _ => Err(format_error(format!("unsupported KDF descriptor `{s}`"))),
        }
    }
}

/// How the symmetric key for a sealed credential is obtained.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyDerivationMode {
    /// Key derived once per process from the configured service secret.
    ServiceSecret,
    /// Key derived per credential from a caller-held passphrase.
    UserPassphrase { salt: [u8; SALT_LEN], kdf: KdfParams },
}

impl fmt::Debug for KeyDerivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceSecret => f.write_str("ServiceSecret"),
            Self::UserPassphrase { kdf, .. } => f
                .debug_struct("UserPassphrase")
                .field("kdf", kdf)
                .finish_non_exhaustive(),
        }
    }
}

/// Payload-free label of a [`KeyDerivationMode`], safe to list and serialize.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    ServiceSecret,
    UserPassphrase,
}

/// An encrypted credential value plus the metadata needed to open it.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedCredential {
    pub mode: KeyDerivationMode,
    pub nonce: [u8; NONCE_LEN],
    /// AES-256-GCM output including the trailing authentication tag.
    pub ciphertext: Vec<u8>,
}

impl fmt::Debug for SealedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedCredential")
            .field("mode", &self.mode)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

impl SealedCredential {
    pub fn key_mode(&self) -> KeyMode {
        match self.mode {
            KeyDerivationMode::ServiceSecret => KeyMode::ServiceSecret,
            KeyDerivationMode::UserPassphrase { .. } => KeyMode::UserPassphrase,
        }
    }

    pub fn requires_passphrase(&self) -> bool {
        self.key_mode() == KeyMode::UserPassphrase
    }

    /// Associated data bound into the AEAD tag: the framing header.
    pub fn associated_data(&self) -> Vec<u8> {
        header(&self.mode).into_bytes()
    }

    /// Encode into the persisted string form.
    pub fn encode(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            header(&self.mode),
            hex::encode(self.nonce),
            hex::encode(&self.ciphertext)
        )
    }

    /// Parse the persisted string form.
    pub fn decode(framed: &str) -> Result<Self, KeywardError> {
        let segments: Vec<&str> = framed.split(SEPARATOR).collect();
        let tag = segments.first().copied().unwrap_or_default();

        let (mode, nonce_hex, ciphertext_hex) = match tag {
            SERVICE_TAG => {
                let [_, nonce, ciphertext] = segments[..] else {
                    return Err(segment_count_error(tag, 3, segments.len()));
                };
                (KeyDerivationMode::ServiceSecret, nonce, ciphertext)
            }
            PASSPHRASE_TAG => {
                let [_, kdf, salt, nonce, ciphertext] = segments[..] else {
                    return Err(segment_count_error(tag, 5, segments.len()));
                };
                let mode = KeyDerivationMode::UserPassphrase {
                    salt: decode_fixed::<SALT_LEN>(salt, "salt")?,
                    kdf: KdfParams::decode(kdf)?,
                };
                (mode, nonce, ciphertext)
            }
            other => {
                return Err(format_error(format!("unknown mode tag `{other}`")));
            }
        };

        let nonce = decode_fixed::<NONCE_LEN>(nonce_hex, "nonce")?;
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|e| format_error(format!("ciphertext is not valid hex: {e}")))?;
        if ciphertext.len() < TAG_LEN {
            return Err(format_error(format!(
                "ciphertext is {} bytes, shorter than the {TAG_LEN}-byte tag",
                ciphertext.len()
            )));
        }

        Ok(Self {
            mode,
            nonce,
            ciphertext,
        })
    }
}

fn header(mode: &KeyDerivationMode) -> String {
    match mode {
        KeyDerivationMode::ServiceSecret => SERVICE_TAG.to_string(),
        KeyDerivationMode::UserPassphrase { salt, kdf } => format!(
            "{PASSPHRASE_TAG}{SEPARATOR}{}{SEPARATOR}{}",
            kdf.encode(),
            hex::encode(salt)
        ),
    }
}

fn decode_fixed<const N: usize>(hex_str: &str, what: &str) -> Result<[u8; N], KeywardError> {
    let bytes =
        hex::decode(hex_str).map_err(|e| format_error(format!("{what} is not valid hex: {e}")))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format_error(format!("{what} must be {N} bytes, got {len}")))
}

fn segment_count_error(tag: &str, expected: usize, got: usize) -> KeywardError {
    format_error(format!(
        "`{tag}` framing expects {expected} segments, got {got}"
    ))
}

fn format_error(message: String) -> KeywardError {
    KeywardError::InvalidCiphertextFormat(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passphrase_sealed() -> SealedCredential {
        SealedCredential {
            mode: KeyDerivationMode::UserPassphrase {
                salt: [7u8; SALT_LEN],
                kdf: KdfParams::Argon2id {
                    memory_cost: 65536,
                    iterations: 3,
                    parallelism: 4,
                },
            },
            nonce: [1u8; NONCE_LEN],
            ciphertext: vec![0xab; 40],
        }
    }

    #[test]
    fn service_framing_has_three_segments() {
        let sealed = SealedCredential {
            mode: KeyDerivationMode::ServiceSecret,
            nonce: [2u8; NONCE_LEN],
            ciphertext: vec![0xcd; 20],
        };
        let framed = sealed.encode();
        assert!(framed.starts_with("s1:"));
        assert_eq!(framed.split(':').count(), 3);
        assert_eq!(SealedCredential::decode(&framed).unwrap(), sealed);
    }

    #[test]
    fn passphrase_framing_carries_kdf_and_salt() {
        let sealed = passphrase_sealed();
        let framed = sealed.encode();
        assert!(framed.starts_with("p1:argon2id,m=65536,t=3,p=4:"));
        assert_eq!(SealedCredential::decode(&framed).unwrap(), sealed);
    }

    #[test]
    fn pbkdf2_descriptor_parses() {
        let mut sealed = passphrase_sealed();
        sealed.mode = KeyDerivationMode::UserPassphrase {
            salt: [9u8; SALT_LEN],
            kdf: KdfParams::Pbkdf2Sha512 { iterations: 100_000 },
        };
        let decoded = SealedCredential::decode(&sealed.encode()).unwrap();
        assert_eq!(decoded.mode, sealed.mode);
    }

    #[test]
    fn wrong_segment_count_is_format_error() {
        for framed in [
            "s1:00",
            "s1:00:11:22",
            "p1:argon2id,m=1,t=1,p=1:00:11",
            "",
            "deadbeef",
        ] {
            let err = SealedCredential::decode(framed).unwrap_err();
            assert!(
                matches!(err, KeywardError::InvalidCiphertextFormat(_)),
                "{framed:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn legacy_two_segment_blob_is_rejected() {
        // `<iv-hex>:<ciphertext-hex>` without a mode tag.
        let legacy = format!("{}:{}", "00".repeat(16), "ab".repeat(32));
        assert!(matches!(
            SealedCredential::decode(&legacy),
            Err(KeywardError::InvalidCiphertextFormat(_))
        ));
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        let framed = format!("s1:{}:{}", "00".repeat(NONCE_LEN), "ab".repeat(TAG_LEN - 1));
        assert!(SealedCredential::decode(&framed).is_err());
    }

    #[test]
    fn wrong_nonce_length_is_rejected() {
        let framed = format!("s1:{}:{}", "00".repeat(8), "ab".repeat(TAG_LEN));
        let err = SealedCredential::decode(&framed).unwrap_err();
        assert!(err.to_string().contains("nonce"));
    }

    #[test]
    fn unknown_kdf_is_rejected() {
        let framed = format!(
            "p1:scrypt,n=1:{}:{}:{}",
            "00".repeat(SALT_LEN),
            "00".repeat(NONCE_LEN),
            "ab".repeat(TAG_LEN)
        );
        assert!(matches!(
            SealedCredential::decode(&framed),
            Err(KeywardError::InvalidCiphertextFormat(_))
        ));
    }

    #[test]
    fn associated_data_differs_between_modes_and_salts() {
        let a = passphrase_sealed();
        let mut b = passphrase_sealed();
        b.mode = KeyDerivationMode::UserPassphrase {
            salt: [8u8; SALT_LEN],
            kdf: KdfParams::Argon2id {
                memory_cost: 65536,
                iterations: 3,
                parallelism: 4,
            },
        };
        assert_ne!(a.associated_data(), b.associated_data());
        assert_eq!(
            SealedCredential {
                mode: KeyDerivationMode::ServiceSecret,
                ..a.clone()
            }
            .associated_data(),
            b"s1".to_vec()
        );
    }

    #[test]
    fn debug_output_hides_salt_and_ciphertext() {
        let rendered = format!("{:?}", passphrase_sealed());
        assert!(!rendered.contains("171")); // 0xab
        assert!(rendered.contains("ciphertext_len"));
    }
}
