// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as the presence and strength of the service secret and KDF floors.

use crate::diagnostic::ConfigError;
use crate::model::KeywardConfig;

/// Minimum length of `cipher.service_secret`, in characters.
pub const MIN_SERVICE_SECRET_LEN: usize = 32;

/// Secrets that have shipped as defaults somewhere and must never be accepted.
const KNOWN_INSECURE_SECRETS: &[&str] = &[
    "myAESSecretKey123456789012345678901234567890",
    "changeme",
    "change-me",
    "secret",
    "default",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &KeywardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_service_secret(config.cipher.service_secret.as_deref(), &mut errors);

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "service.log_level `{}` must be one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // Validate passphrase KDF parameters
    if !(32768..=1_048_576).contains(&config.cipher.kdf_memory_cost) {
        errors.push(ConfigError::Validation {
            message: format!(
                "cipher.kdf_memory_cost must be between 32768 (32 MiB) and 1048576 (1 GiB), got {}",
                config.cipher.kdf_memory_cost
            ),
        });
    }

    if config.cipher.kdf_iterations < 2 {
        errors.push(ConfigError::Validation {
            message: format!(
                "cipher.kdf_iterations must be at least 2, got {}",
                config.cipher.kdf_iterations
            ),
        });
    }

    if config.cipher.kdf_parallelism < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "cipher.kdf_parallelism must be at least 1, got {}",
                config.cipher.kdf_parallelism
            ),
        });
    }

    if config.cipher.pbkdf2_iterations < 100_000 {
        errors.push(ConfigError::Validation {
            message: format!(
                "cipher.pbkdf2_iterations must be at least 100000, got {}",
                config.cipher.pbkdf2_iterations
            ),
        });
    }

    // Validate rotation policy
    let interval = config.rotation.default_interval_days;
    if !(1..=365).contains(&interval) {
        errors.push(ConfigError::Validation {
            message: format!(
                "rotation.default_interval_days must be between 1 and 365, got {interval}"
            ),
        });
    }

    if config.rotation.scan_interval_secs < 60 {
        errors.push(ConfigError::Validation {
            message: format!(
                "rotation.scan_interval_secs must be at least 60, got {}",
                config.rotation.scan_interval_secs
            ),
        });
    }

    if config.rotation.concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "rotation.concurrency must be at least 1".to_string(),
        });
    }

    if config.rotation.warn_before_days > 365 {
        errors.push(ConfigError::Validation {
            message: format!(
                "rotation.warn_before_days must be at most 365, got {}",
                config.rotation.warn_before_days
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_service_secret(secret: Option<&str>, errors: &mut Vec<ConfigError>) {
    let Some(secret) = secret.filter(|s| !s.trim().is_empty()) else {
        errors.push(ConfigError::MissingKey {
            key: "cipher.service_secret".to_string(),
        });
        return;
    };

    if KNOWN_INSECURE_SECRETS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(secret))
    {
        errors.push(ConfigError::Validation {
            message: "cipher.service_secret is a known default value; generate a fresh secret"
                .to_string(),
        });
        return;
    }

    let len = secret.chars().count();
    if len < MIN_SERVICE_SECRET_LEN {
        errors.push(ConfigError::Validation {
            message: format!(
                "cipher.service_secret must be at least {MIN_SERVICE_SECRET_LEN} characters, got {len}"
            ),
        });
    }

    let mut chars = secret.chars();
    if let Some(first) = chars.next()
        && chars.all(|c| c == first)
    {
        errors.push(ConfigError::Validation {
            message: "cipher.service_secret must not be a single repeated character".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_SECRET: &str = "q8Yx1v4rT0pLk2mN6bZc9dWf3hJs7gAe";

    fn valid_config() -> KeywardConfig {
        let mut config = KeywardConfig::default();
        config.cipher.service_secret = Some(GOOD_SECRET.to_string());
        config
    }

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors.iter().any(|e| match e {
            ConfigError::Validation { message } => message.contains(needle),
            ConfigError::MissingKey { key } => key.contains(needle),
            _ => false,
        })
    }

    #[test]
    fn default_config_requires_service_secret() {
        let errors = validate_config(&KeywardConfig::default()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingKey { key } if key == "cipher.service_secret")));
    }

    #[test]
    fn config_with_secret_validates() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let mut config = valid_config();
        config.cipher.service_secret = Some("   ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "cipher.service_secret"));
    }

    #[test]
    fn short_secret_fails_validation() {
        let mut config = valid_config();
        config.cipher.service_secret = Some("too-short".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "at least 32 characters"));
    }

    #[test]
    fn known_default_secret_is_rejected() {
        let mut config = valid_config();
        config.cipher.service_secret =
            Some("myAESSecretKey123456789012345678901234567890".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "known default"));
    }

    #[test]
    fn repeated_character_secret_is_rejected() {
        let mut config = valid_config();
        config.cipher.service_secret = Some("a".repeat(48));
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "single repeated character"));
    }

    #[test]
    fn weak_kdf_parameters_fail_validation() {
        let mut config = valid_config();
        config.cipher.kdf_memory_cost = 1024;
        config.cipher.kdf_iterations = 1;
        config.cipher.pbkdf2_iterations = 1000;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "kdf_memory_cost"));
        assert!(has_message(&errors, "kdf_iterations"));
        assert!(has_message(&errors, "pbkdf2_iterations"));
    }

    #[test]
    fn kdf_memory_above_one_gib_is_rejected() {
        let mut config = valid_config();
        config.cipher.kdf_memory_cost = 1_048_577;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "1 GiB"));
    }

    #[test]
    fn rotation_bounds_are_enforced() {
        let mut config = valid_config();
        config.rotation.default_interval_days = 0;
        config.rotation.scan_interval_secs = 5;
        config.rotation.concurrency = 0;
        config.rotation.warn_before_days = 400;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);

        config.rotation.default_interval_days = 366;
        config.rotation.scan_interval_secs = 60;
        config.rotation.concurrency = 1;
        config.rotation.warn_before_days = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "default_interval_days"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = valid_config();
        config.service.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "service.log_level"));
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = valid_config();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }
}
