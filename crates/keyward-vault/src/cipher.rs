// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The credential cipher: AES-256-GCM under either the service key or a
//! per-credential passphrase key.
//!
//! Both modes stay readable forever; the mode tag inside each
//! [`SealedCredential`] decides which key applies. Nonces and salts are
//! always generated here, never supplied by callers.

use std::fmt;

use keyward_config::model::CipherConfig;
use keyward_core::sealed::{NONCE_LEN, SALT_LEN};
use keyward_core::{KdfParams, KeyDerivationMode, KeywardError, SealedCredential};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{crypto, kdf};

/// Bounds for [`CredentialCipher::generate_random_secret`].
pub const MAX_RANDOM_SECRET_BYTES: usize = 1024;

/// Encrypts and decrypts credential values. Cheap to share behind an `Arc`.
pub struct CredentialCipher {
    service_key: Zeroizing<[u8; 32]>,
    passphrase_kdf: KdfParams,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("service_key", &"[REDACTED]")
            .field("passphrase_kdf", &self.passphrase_kdf)
            .finish()
    }
}

impl CredentialCipher {
    /// Build the cipher from validated configuration.
    ///
    /// Fails with [`KeywardError::Config`] when no service secret is set.
    pub fn new(config: &CipherConfig) -> Result<Self, KeywardError> {
        let secret = config
            .service_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                KeywardError::Config(
                    "cipher.service_secret is not set (KEYWARD_CIPHER_SERVICE_SECRET)".to_string(),
                )
            })?;
        Self::from_secret(
            &SecretString::from(secret.to_owned()),
            config.passphrase_kdf_params(),
        )
    }

    /// Build the cipher from a raw service secret and the KDF for new
    /// passphrase encryptions.
    pub fn from_secret(
        service_secret: &SecretString,
        passphrase_kdf: KdfParams,
    ) -> Result<Self, KeywardError> {
        if service_secret.expose_secret().is_empty() {
            return Err(KeywardError::Config(
                "service secret must not be empty".to_string(),
            ));
        }
        let service_key = kdf::derive_service_key(service_secret.expose_secret().as_bytes())?;
        Ok(Self {
            service_key,
            passphrase_kdf,
        })
    }

    /// KDF parameters stamped onto new passphrase-mode credentials.
    pub fn passphrase_kdf(&self) -> KdfParams {
        self.passphrase_kdf
    }

    /// Encrypt under the service key.
    pub fn encrypt_with_service_secret(
        &self,
        plaintext: &str,
    ) -> Result<SealedCredential, KeywardError> {
        seal_with(
            &self.service_key,
            KeyDerivationMode::ServiceSecret,
            plaintext,
        )
    }

    /// Decrypt a service-secret credential.
    pub fn decrypt_with_service_secret(
        &self,
        sealed: &SealedCredential,
    ) -> Result<SecretString, KeywardError> {
        if sealed.mode != KeyDerivationMode::ServiceSecret {
            return Err(KeywardError::InvalidCiphertextFormat(
                "expected service-secret framing, found passphrase framing".to_string(),
            ));
        }
        open_with(&self.service_key, sealed)
    }

    /// Encrypt under a key derived from `passphrase` with a fresh salt.
    ///
    /// CPU-heavy: async callers should run this on a blocking thread.
    pub fn encrypt_with_passphrase(
        &self,
        plaintext: &str,
        passphrase: &SecretString,
    ) -> Result<SealedCredential, KeywardError> {
        let passphrase = non_empty_passphrase(passphrase)?;
        let salt: [u8; SALT_LEN] = crypto::random_bytes()?;
        let key = kdf::derive_for(&self.passphrase_kdf, passphrase, &salt)?;
        let mode = KeyDerivationMode::UserPassphrase {
            salt,
            kdf: self.passphrase_kdf,
        };
        seal_with(&key, mode, plaintext)
    }

    /// Decrypt a passphrase-mode credential using its stored salt and KDF.
    ///
    /// Wrong passphrase and corrupted data are indistinguishable.
    pub fn decrypt_with_passphrase(
        &self,
        sealed: &SealedCredential,
        passphrase: &SecretString,
    ) -> Result<SecretString, KeywardError> {
        let KeyDerivationMode::UserPassphrase { salt, kdf: params } = &sealed.mode else {
            return Err(KeywardError::InvalidCiphertextFormat(
                "expected passphrase framing, found service-secret framing".to_string(),
            ));
        };
        let passphrase = non_empty_passphrase(passphrase)?;
        kdf::check_bounds(params)?;

        let key = kdf::derive_for(params, passphrase, salt).map_err(|e| {
            debug!(error = %e, "key derivation from stored parameters failed");
            KeywardError::Decryption
        })?;
        open_with(&key, sealed)
    }

    /// Decrypt either mode, dispatching on the credential's mode tag.
    pub fn decrypt(
        &self,
        sealed: &SealedCredential,
        passphrase: Option<&SecretString>,
    ) -> Result<SecretString, KeywardError> {
        match (&sealed.mode, passphrase) {
            (KeyDerivationMode::ServiceSecret, _) => self.decrypt_with_service_secret(sealed),
            (KeyDerivationMode::UserPassphrase { .. }, Some(passphrase)) => {
                self.decrypt_with_passphrase(sealed, passphrase)
            }
            (KeyDerivationMode::UserPassphrase { .. }, None) => Err(KeywardError::InvalidInput(
                "credential is passphrase-protected; a passphrase is required".to_string(),
            )),
        }
    }

    /// Generate `byte_len` random bytes, hex encoded.
    pub fn generate_random_secret(byte_len: usize) -> Result<SecretString, KeywardError> {
        if !(1..=MAX_RANDOM_SECRET_BYTES).contains(&byte_len) {
            return Err(KeywardError::InvalidInput(format!(
                "random secret length must be between 1 and {MAX_RANDOM_SECRET_BYTES} bytes, got {byte_len}"
            )));
        }
        let mut bytes = Zeroizing::new(vec![0u8; byte_len]);
        crypto::fill_random(&mut bytes)?;
        Ok(SecretString::from(hex::encode(&*bytes)))
    }

    /// SHA-256 hex digest. Integrity helper only, never a password hash.
    pub fn hash(data: &[u8]) -> String {
        crypto::sha256_hex(data)
    }
}

fn non_empty_passphrase(passphrase: &SecretString) -> Result<&[u8], KeywardError> {
    let bytes = passphrase.expose_secret().as_bytes();
    if bytes.is_empty() {
        return Err(KeywardError::InvalidInput(
            "passphrase must not be empty".to_string(),
        ));
    }
    Ok(bytes)
}

fn seal_with(
    key: &[u8; 32],
    mode: KeyDerivationMode,
    plaintext: &str,
) -> Result<SealedCredential, KeywardError> {
    let mut sealed = SealedCredential {
        mode,
        nonce: [0u8; NONCE_LEN],
        ciphertext: Vec::new(),
    };
    let aad = sealed.associated_data();
    let (ciphertext, nonce) = crypto::seal(key, &aad, plaintext.as_bytes())?;
    sealed.nonce = nonce;
    sealed.ciphertext = ciphertext;
    Ok(sealed)
}

fn open_with(key: &[u8; 32], sealed: &SealedCredential) -> Result<SecretString, KeywardError> {
    let plaintext = Zeroizing::new(
        crypto::open(
            key,
            &sealed.nonce,
            &sealed.associated_data(),
            &sealed.ciphertext,
        )
        .inspect_err(|_| debug!(mode = %sealed.key_mode(), "authentication tag mismatch"))?,
    );
    let text = std::str::from_utf8(&plaintext).map_err(|_| {
        debug!("decrypted credential is not valid UTF-8");
        KeywardError::Decryption
    })?;
    Ok(SecretString::from(text.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::DECRYPTION_FAILED_MESSAGE;
    use proptest::prelude::*;
    use std::sync::OnceLock;

    const SECRET: &str = "q8Yx1v4rT0pLk2mN6bZc9dWf3hJs7gAe";
    const FAST_ARGON2: KdfParams = KdfParams::Argon2id {
        memory_cost: 8192,
        iterations: 1,
        parallelism: 1,
    };

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn cipher() -> CredentialCipher {
        CredentialCipher::from_secret(&secret(SECRET), FAST_ARGON2).unwrap()
    }

    fn shared_cipher() -> &'static CredentialCipher {
        static CIPHER: OnceLock<CredentialCipher> = OnceLock::new();
        CIPHER.get_or_init(cipher)
    }

    fn salt_of(sealed: &SealedCredential) -> [u8; SALT_LEN] {
        match &sealed.mode {
            KeyDerivationMode::UserPassphrase { salt, .. } => *salt,
            KeyDerivationMode::ServiceSecret => panic!("expected passphrase mode"),
        }
    }

    #[test]
    fn new_requires_service_secret() {
        let err = CredentialCipher::new(&CipherConfig::default()).unwrap_err();
        assert!(matches!(err, KeywardError::Config(_)));
    }

    #[test]
    fn new_uses_configured_kdf() {
        let config = CipherConfig {
            service_secret: Some(SECRET.to_string()),
            passphrase_kdf: keyward_config::model::PassphraseKdf::Pbkdf2Sha512,
            ..CipherConfig::default()
        };
        let cipher = CredentialCipher::new(&config).unwrap();
        assert_eq!(
            cipher.passphrase_kdf(),
            KdfParams::Pbkdf2Sha512 { iterations: 100_000 }
        );
    }

    #[test]
    fn debug_redacts_service_key() {
        let rendered = format!("{:?}", cipher());
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn service_secret_roundtrip() {
        let cipher = cipher();
        let sealed = cipher.encrypt_with_service_secret("sk-test-123").unwrap();
        assert_eq!(
            cipher
                .decrypt_with_service_secret(&sealed)
                .unwrap()
                .expose_secret(),
            "sk-test-123"
        );
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = cipher();
        let a = cipher.encrypt_with_service_secret("sk-test-123").unwrap();
        let b = cipher.encrypt_with_service_secret("sk-test-123").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn different_service_secret_cannot_decrypt() {
        let sealed = cipher().encrypt_with_service_secret("sk-test-123").unwrap();
        let other =
            CredentialCipher::from_secret(&secret("another-service-secret-0123456789"), FAST_ARGON2)
                .unwrap();
        let err = other.decrypt_with_service_secret(&sealed).unwrap_err();
        assert!(matches!(err, KeywardError::Decryption));
        assert_eq!(err.to_string(), DECRYPTION_FAILED_MESSAGE);
    }

    #[test]
    fn passphrase_roundtrip_and_wrong_passphrase() {
        let cipher = cipher();
        let sealed = cipher
            .encrypt_with_passphrase("sk-test-abc123", &secret("correct-horse-battery"))
            .unwrap();
        assert!(sealed.requires_passphrase());

        let plain = cipher
            .decrypt_with_passphrase(&sealed, &secret("correct-horse-battery"))
            .unwrap();
        assert_eq!(plain.expose_secret(), "sk-test-abc123");

        let err = cipher
            .decrypt_with_passphrase(&sealed, &secret("wrong-horse"))
            .unwrap_err();
        assert!(matches!(err, KeywardError::Decryption));
        assert_eq!(err.to_string(), DECRYPTION_FAILED_MESSAGE);
    }

    #[test]
    fn wrong_passphrase_and_tampering_share_one_message() {
        let cipher = cipher();
        let mut sealed = cipher
            .encrypt_with_passphrase("sk-user-456", &secret("pass"))
            .unwrap();
        let wrong = cipher
            .decrypt_with_passphrase(&sealed, &secret("nope"))
            .unwrap_err();
        sealed.ciphertext[0] ^= 0x80;
        let tampered = cipher
            .decrypt_with_passphrase(&sealed, &secret("pass"))
            .unwrap_err();
        assert_eq!(wrong.to_string(), tampered.to_string());
    }

    #[test]
    fn empty_passphrase_is_invalid_input() {
        let err = cipher()
            .encrypt_with_passphrase("x", &secret(""))
            .unwrap_err();
        assert!(matches!(err, KeywardError::InvalidInput(_)));
    }

    #[test]
    fn passphrase_encryptions_use_fresh_salts() {
        let cipher = cipher();
        let a = cipher.encrypt_with_passphrase("v", &secret("p")).unwrap();
        let b = cipher.encrypt_with_passphrase("v", &secret("p")).unwrap();
        assert_ne!(salt_of(&a), salt_of(&b));
    }

    #[test]
    fn pbkdf2_mode_roundtrips_through_framing() {
        let cipher = CredentialCipher::from_secret(
            &secret(SECRET),
            KdfParams::Pbkdf2Sha512 { iterations: 100_000 },
        )
        .unwrap();
        let sealed = cipher.encrypt_with_passphrase("sk-pbkdf2", &secret("pw")).unwrap();
        let framed = sealed.encode();
        assert!(framed.starts_with("p1:pbkdf2-sha512,i=100000:"));

        let parsed = SealedCredential::decode(&framed).unwrap();
        let plain = cipher.decrypt(&parsed, Some(&secret("pw"))).unwrap();
        assert_eq!(plain.expose_secret(), "sk-pbkdf2");
    }

    #[test]
    fn old_records_keep_their_kdf_after_config_change() {
        let sealed = cipher()
            .encrypt_with_passphrase("sk-old", &secret("pw"))
            .unwrap();
        let reconfigured = CredentialCipher::from_secret(
            &secret(SECRET),
            KdfParams::Pbkdf2Sha512 { iterations: 200_000 },
        )
        .unwrap();
        let plain = reconfigured.decrypt(&sealed, Some(&secret("pw"))).unwrap();
        assert_eq!(plain.expose_secret(), "sk-old");
    }

    #[test]
    fn editing_kdf_descriptor_fails_authentication() {
        let cipher = cipher();
        let framed = cipher
            .encrypt_with_passphrase("sk-aad", &secret("pw"))
            .unwrap()
            .encode();
        let edited = framed.replacen("t=1", "t=2", 1);
        assert_ne!(edited, framed);
        let parsed = SealedCredential::decode(&edited).unwrap();
        let err = cipher.decrypt(&parsed, Some(&secret("pw"))).unwrap_err();
        assert!(err.is_decryption_failure());
    }

    #[test]
    fn relabelled_mode_tag_fails() {
        let cipher = cipher();
        let sealed = cipher.encrypt_with_service_secret("sk-tag").unwrap();
        let relabelled = SealedCredential {
            mode: KeyDerivationMode::UserPassphrase {
                salt: [0u8; SALT_LEN],
                kdf: FAST_ARGON2,
            },
            ..sealed
        };
        let err = cipher
            .decrypt(&relabelled, Some(&secret("anything")))
            .unwrap_err();
        assert!(err.is_decryption_failure());
    }

    #[test]
    fn cross_mode_decrypt_is_format_error() {
        let cipher = cipher();
        let service = cipher.encrypt_with_service_secret("a").unwrap();
        let passphrase = cipher.encrypt_with_passphrase("b", &secret("p")).unwrap();

        assert!(matches!(
            cipher.decrypt_with_passphrase(&service, &secret("p")),
            Err(KeywardError::InvalidCiphertextFormat(_))
        ));
        assert!(matches!(
            cipher.decrypt_with_service_secret(&passphrase),
            Err(KeywardError::InvalidCiphertextFormat(_))
        ));
    }

    #[test]
    fn decrypt_dispatches_on_mode() {
        let cipher = cipher();
        let service = cipher.encrypt_with_service_secret("svc").unwrap();
        let user = cipher.encrypt_with_passphrase("usr", &secret("p")).unwrap();

        assert_eq!(cipher.decrypt(&service, None).unwrap().expose_secret(), "svc");
        assert_eq!(
            cipher.decrypt(&user, Some(&secret("p"))).unwrap().expose_secret(),
            "usr"
        );
        assert!(matches!(
            cipher.decrypt(&user, None),
            Err(KeywardError::InvalidInput(_))
        ));
    }

    #[test]
    fn random_secret_is_hex_of_requested_length() {
        let value = CredentialCipher::generate_random_secret(32).unwrap();
        assert_eq!(value.expose_secret().len(), 64);
        assert!(value.expose_secret().chars().all(|c| c.is_ascii_hexdigit()));

        let other = CredentialCipher::generate_random_secret(32).unwrap();
        assert_ne!(value.expose_secret(), other.expose_secret());
    }

    #[test]
    fn random_secret_length_is_bounded() {
        assert!(CredentialCipher::generate_random_secret(0).is_err());
        assert!(CredentialCipher::generate_random_secret(1025).is_err());
        assert!(CredentialCipher::generate_random_secret(1024).is_ok());
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            CredentialCipher::hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn service_mode_roundtrips_any_utf8(value in "\\PC{0,256}") {
            let cipher = shared_cipher();
            let framed = cipher.encrypt_with_service_secret(&value).unwrap().encode();
            let parsed = SealedCredential::decode(&framed).unwrap();
            let plain = cipher.decrypt(&parsed, None).unwrap();
            prop_assert_eq!(plain.expose_secret(), value.as_str());
        }
    }
}
