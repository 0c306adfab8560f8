//! Authenticated encryption for stored third-party API keys.
//!
//! Keys are derived once per process from a base secret and a salt, then used
//! to seal short secrets into URL-safe, versioned ciphertext tokens that are
//! safe to keep in a text column.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// Version prefix on every ciphertext token. Bump when the format changes.
const TOKEN_PREFIX: &str = "rv1:";

/// PBKDF2-HMAC-SHA256 iteration count for key derivation.
const KDF_ITERATIONS: u32 = 310_000;

const NONCE_LEN: usize = 12;

/// Minimum plausible token length: prefix + base64 of nonce + GCM tag.
const MIN_TOKEN_LEN: usize = TOKEN_PREFIX.len() + 37;

#[derive(Debug, Error)]
pub enum CipherError {
    /// Any decryption failure: wrong prefix, bad encoding, truncated payload,
    /// or authentication tag mismatch. Deliberately a single kind so callers
    /// cannot distinguish why a token failed.
    #[error("Invalid or corrupted ciphertext token")]
    InvalidToken,

    #[error("Encryption failed")]
    Encryption,
}

pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    /// Derives a 256-bit key from `base_key` and `salt` and builds the cipher.
    /// Derivation is intentionally slow; construct once at startup and share.
    #[must_use]
    pub fn new(base_key: &str, salt: &str) -> Self {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(
            base_key.as_bytes(),
            salt.as_bytes(),
            KDF_ITERATIONS,
            &mut key,
        );

        // new_from_slice only fails on length mismatch, and the key is 32 bytes.
        let cipher = Aes256Gcm::new_from_slice(&key)
            .unwrap_or_else(|_| unreachable!("derived key is always 32 bytes"));

        Self { cipher }
    }

    /// Encrypts a secret into a versioned token. Empty input passes through
    /// unchanged: "no secret stored" round-trips as an empty string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(payload)))
    }

    /// Decrypts a token produced by [`encrypt`](Self::encrypt). Empty input
    /// returns an empty string.
    pub fn decrypt(&self, token: &str) -> Result<String, CipherError> {
        if token.is_empty() {
            return Ok(String::new());
        }

        let encoded = token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or(CipherError::InvalidToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| CipherError::InvalidToken)?;

        if payload.len() <= NONCE_LEN {
            return Err(CipherError::InvalidToken);
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CipherError::InvalidToken)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidToken)
    }
}

/// Heuristic check for "does this look like one of our tokens". Useful when
/// deciding whether a stored column value needs migration; never a proof.
#[must_use]
pub fn is_probably_encrypted(text: &str) -> bool {
    text.starts_with(TOKEN_PREFIX) && text.len() >= MIN_TOKEN_LEN
}
