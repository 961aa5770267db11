// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./keyward.toml` > `~/.config/keyward/keyward.toml` > `/etc/keyward/keyward.toml`
//! with environment variable overrides via `KEYWARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KeywardConfig;

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "keyward.toml";

/// System-wide config file.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/keyward/keyward.toml";

/// Path of the per-user config file, if a config dir exists on this platform.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("keyward/keyward.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/keyward/keyward.toml` (system-wide)
/// 3. `~/.config/keyward/keyward.toml` (user XDG config)
/// 4. `./keyward.toml` (local directory)
/// 5. `KEYWARD_*` environment variables
pub fn load_config() -> Result<KeywardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<KeywardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KeywardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_FILE))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config key.
///
/// Only the first underscore after the section name is a separator, so
/// `cipher_service_secret` maps to `cipher.service_secret`.
pub fn env_key_to_path(key: &str) -> String {
    const SECTIONS: [&str; 4] = ["service", "storage", "cipher", "rotation"];

    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")`: `KEYWARD_CIPHER_SERVICE_SECRET` must
/// map to `cipher.service_secret`, not `cipher.service.secret`.
///
/// `KEYWARD_PASSPHRASE` is read by the passphrase prompt and is not config.
fn env_provider() -> Env {
    Env::prefixed("KEYWARD_")
        .ignore(&["passphrase"])
        .map(|key| env_key_to_path(&key.as_str().to_ascii_lowercase()).into())
}
