//! §9 "Encrypted secrets" — node SSH credentials are stored as the
//! ciphertext of `{user, password?, ssh_key?}` under a symmetric key read
//! from configuration. The plaintext is assembled only inside the
//! bootstrap or cleanup engine and never logged.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, AeadCore, Key, Nonce};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid encryption key: expected 32 bytes, got {0}")]
    BadKeyLength(usize),
    #[error("ciphertext too short")]
    Truncated,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("encryption failed")]
    EncryptFailed,
    #[error("malformed plaintext: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Plaintext SSH credentials for a node. `ssh_key` holds a PEM-encoded
/// private key when key-based auth is configured instead of a password.
/// Zeroized on drop so a stack copy never lingers in memory longer than
/// the bootstrap/cleanup call that needed it.
#[derive(Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct AuthPlain {
    #[zeroize(skip)]
    pub user: String,
    pub password: Option<String>,
    pub ssh_key: Option<String>,
}

pub struct AuthCipher {
    cipher: Aes256Gcm,
}

impl AuthCipher {
    /// `key_hex` is a hex-encoded 32-byte AES-256 key, read from
    /// `security.encryption_key` (§6).
    pub fn from_hex_key(key_hex: &str) -> Result<Self, CryptoError> {
        let mut bytes = hex::decode(key_hex).map_err(|_| CryptoError::BadKeyLength(0))?;
        if bytes.len() != 32 {
            let len = bytes.len();
            bytes.zeroize();
            return Err(CryptoError::BadKeyLength(len));
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        let cipher = Aes256Gcm::new(key);
        bytes.zeroize();
        Ok(Self { cipher })
    }

    /// Encrypts `plain` into `nonce || ciphertext`.
    pub fn seal(&self, plain: &AuthPlain) -> Result<Vec<u8>, CryptoError> {
        let json = serde_json::to_vec(plain)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut ciphertext = self
            .cipher
            .encrypt(&nonce, json.as_ref())
            .map_err(|_| CryptoError::EncryptFailed)?;
        let mut out = nonce.to_vec();
        out.append(&mut ciphertext);
        Ok(out)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<AuthPlain, CryptoError> {
        if sealed.len() < 12 {
            return Err(CryptoError::Truncated);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plain_bytes = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptFailed)?;
        Ok(serde_json::from_slice(&plain_bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let cipher = AuthCipher::from_hex_key(&"ab".repeat(32)).unwrap();
        let plain = AuthPlain {
            user: "root".to_string(),
            password: Some("hunter2".to_string()),
            ssh_key: None,
        };
        let sealed = cipher.seal(&plain).unwrap();
        let opened = cipher.open(&sealed).unwrap();
        assert_eq!(opened.user, "root");
        assert_eq!(opened.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn rejects_short_key() {
        assert!(AuthCipher::from_hex_key("abcd").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let cipher = AuthCipher::from_hex_key(&"cd".repeat(32)).unwrap();
        let plain = AuthPlain {
            user: "admin".to_string(),
            password: None,
            ssh_key: Some("-----BEGIN KEY-----".to_string()),
        };
        let mut sealed = cipher.seal(&plain).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(cipher.open(&sealed).is_err());
    }
}
