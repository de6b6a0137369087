//! Symmetric authenticated encryption for user passwords.
//!
//! Passwords are encrypted at the chat boundary and only decrypted inside the
//! resolver. Ciphertexts are `base64url(nonce || ciphertext || tag)` under
//! AES-256-GCM with a random 96-bit nonce per message.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use zeroize::{Zeroize, Zeroizing};

/// AES-256 key size in bytes.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("encryption failed")]
    Encryption,

    /// Wrong key, tampered or truncated input. Carries no detail on purpose:
    /// the message may reach a user.
    #[error("ciphertext could not be decrypted")]
    Decryption,
}

/// Process-wide encryption key. Redacted in `Debug`, wiped on drop.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a base64 key (URL-safe or standard alphabet, padded or not).
    ///
    /// A Fernet key string decodes to exactly 32 bytes and is accepted as-is.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let encoded = encoded.trim();
        let decoded = [&URL_SAFE, &URL_SAFE_NO_PAD, &STANDARD, &STANDARD_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(encoded).ok())
            .map(Zeroizing::new)
            .ok_or_else(|| CipherError::InvalidKey("not valid base64".to_string()))?;

        if decoded.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                decoded.len()
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Encrypts/decrypts password strings with a fixed key.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn new(key: &EncryptionKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key.0);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&sealed);
        Ok(URL_SAFE.encode(combined))
    }

    /// Fails with [`CipherError::Decryption`] unless `ciphertext` was produced
    /// by [`CredentialCipher::encrypt`] under the same key.
    pub fn decrypt(&self, ciphertext: &str) -> Result<Zeroizing<String>, CipherError> {
        let data = URL_SAFE
            .decode(ciphertext.trim())
            .map_err(|_| CipherError::Decryption)?;
        if data.len() <= NONCE_LEN {
            return Err(CipherError::Decryption);
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);

        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Decryption)?;

        String::from_utf8(plain)
            .map(Zeroizing::new)
            .map_err(|e| {
                let mut bytes = e.into_bytes();
                bytes.zeroize();
                CipherError::Decryption
            })
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(fill: u8) -> CredentialCipher {
        CredentialCipher::new(&EncryptionKey::from_bytes([fill; KEY_LEN]))
    }

    #[test]
    fn round_trips_passwords() {
        let c = cipher(7);
        for p in ["", "ab", "hunter22", "pässwörd with spaces", "🔑🔑🔑"] {
            let ct = c.encrypt(p).unwrap();
            assert_eq!(c.decrypt(&ct).unwrap().as_str(), p);
        }
    }

    #[test]
    fn nonce_is_fresh_per_encryption() {
        let c = cipher(7);
        assert_ne!(c.encrypt("same").unwrap(), c.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_key_is_a_decryption_error() {
        let ct = cipher(1).encrypt("hunter22").unwrap();
        assert!(matches!(cipher(2).decrypt(&ct), Err(CipherError::Decryption)));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let c = cipher(3);
        let ct = c.encrypt("hunter22").unwrap();
        let mut raw = URL_SAFE.decode(&ct).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE.encode(raw);
        assert!(matches!(c.decrypt(&tampered), Err(CipherError::Decryption)));
    }

    #[test]
    fn garbage_and_truncated_input_are_rejected() {
        let c = cipher(3);
        assert!(matches!(c.decrypt("not base64 !!"), Err(CipherError::Decryption)));
        assert!(matches!(c.decrypt(&URL_SAFE.encode([0u8; 8])), Err(CipherError::Decryption)));
    }

    #[test]
    fn decryption_error_does_not_echo_input() {
        let msg = cipher(1)
            .decrypt("c2VjcmV0LXBhc3N3b3Jk")
            .unwrap_err()
            .to_string();
        assert!(!msg.contains("c2VjcmV0"));
    }

    #[test]
    fn parses_fernet_style_keys() {
        let encoded = URL_SAFE.encode([0xabu8; KEY_LEN]);
        let key = EncryptionKey::from_base64(&encoded).unwrap();
        let c = CredentialCipher::new(&key);
        let ct = c.encrypt("secret").unwrap();
        assert_eq!(c.decrypt(&ct).unwrap().as_str(), "secret");

        let unpadded = STANDARD_NO_PAD.encode([0x01u8; KEY_LEN]);
        assert!(EncryptionKey::from_base64(&unpadded).is_ok());
    }

    #[test]
    fn rejects_short_keys_and_redacts_debug() {
        let short = URL_SAFE.encode([1u8; 16]);
        assert!(matches!(
            EncryptionKey::from_base64(&short),
            Err(CipherError::InvalidKey(_))
        ));
        let key = EncryptionKey::from_bytes([9u8; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "EncryptionKey(<redacted>)");
    }
}
