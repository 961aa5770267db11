// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for keyward.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;

use keyward_core::KdfParams;
use serde::{Deserialize, Serialize};

/// Top-level keyward configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// Every section defaults except `cipher.service_secret`, which validation requires.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeywardConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Credential store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential cipher settings.
    #[serde(default)]
    pub cipher: CipherConfig,

    /// Rotation policy and scheduler settings.
    #[serde(default)]
    pub rotation: RotationConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in log lines.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "keyward".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite credential store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "keyward.db".to_string()
}

fn default_true() -> bool {
    true
}

/// KDF used for new passphrase-mode encryptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassphraseKdf {
    #[default]
    Argon2id,
    Pbkdf2Sha512,
}

/// Credential cipher configuration.
///
/// Debug output redacts the service secret.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CipherConfig {
    /// Service-wide secret for service-secret mode. No default: required.
    #[serde(default)]
    pub service_secret: Option<String>,

    /// KDF for new passphrase-mode credentials. Existing credentials keep
    /// the KDF recorded in their framing.
    #[serde(default)]
    pub passphrase_kdf: PassphraseKdf,

    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB).
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count (default: 3).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id parallelism lanes (default: 4).
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,

    /// PBKDF2-HMAC-SHA512 iteration count when `passphrase_kdf = "pbkdf2-sha512"`.
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
}

impl CipherConfig {
    /// KDF parameters stamped onto new passphrase-mode credentials.
    pub fn passphrase_kdf_params(&self) -> KdfParams {
        match self.passphrase_kdf {
            PassphraseKdf::Argon2id => KdfParams::Argon2id {
                memory_cost: self.kdf_memory_cost,
                iterations: self.kdf_iterations,
                parallelism: self.kdf_parallelism,
            },
            PassphraseKdf::Pbkdf2Sha512 => KdfParams::Pbkdf2Sha512 {
                iterations: self.pbkdf2_iterations,
            },
        }
    }
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            service_secret: None,
            passphrase_kdf: PassphraseKdf::default(),
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
        }
    }
}

impl fmt::Debug for CipherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherConfig")
            .field(
                "service_secret",
                &self.service_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("passphrase_kdf", &self.passphrase_kdf)
            .field("kdf_memory_cost", &self.kdf_memory_cost)
            .field("kdf_iterations", &self.kdf_iterations)
            .field("kdf_parallelism", &self.kdf_parallelism)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .finish()
    }
}

fn default_kdf_memory_cost() -> u32 {
    65536 // 64 MiB per OWASP recommendation
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

fn default_pbkdf2_iterations() -> u32 {
    100_000
}

/// Rotation policy engine and scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RotationConfig {
    /// Run the periodic expiry scan in `keyward serve`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Rotation interval for new credentials when the owner does not pick one.
    #[serde(default = "default_interval_days")]
    pub default_interval_days: u16,

    /// Seconds between scheduled scans (default: one day).
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Scan once immediately at startup instead of waiting a full interval.
    #[serde(default = "default_true")]
    pub run_on_startup: bool,

    /// Emit "rotation due" notices this many days before expiry.
    #[serde(default = "default_warn_before_days")]
    pub warn_before_days: u16,

    /// Maximum records evaluated concurrently within one scan.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_interval_days: default_interval_days(),
            scan_interval_secs: default_scan_interval_secs(),
            run_on_startup: true,
            warn_before_days: default_warn_before_days(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_interval_days() -> u16 {
    90
}

fn default_scan_interval_secs() -> u64 {
    86_400
}

fn default_warn_before_days() -> u16 {
    7
}

fn default_concurrency() -> usize {
    8
}
