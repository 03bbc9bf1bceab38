//! AES-256-GCM encryption for workspace access tokens at rest.
//!
//! Every encryption draws a fresh 12-byte nonce which is stored in front of the ciphertext, so
//! equal tokens never produce equal payloads.

use aes_gcm::aead::rand_core::RngCore as _;
use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::Aes256Gcm;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub const ENCRYPTED_TOKEN_PREFIX: &str = "enc:v1:";

const NONCE_BYTES: usize = 12;
const KEY_BYTES: usize = 32;
const TOKEN_AAD: &[u8] = b"pumi.team_credentials.access_token";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption key must be {KEY_BYTES} bytes encoded as hex")]
    InvalidKey,
    #[error("token must not be empty")]
    EmptyPlaintext,
    #[error("token encryption failed")]
    Encrypt,
    #[error("encrypted token payload is malformed")]
    MalformedPayload,
    #[error("encrypted token failed its integrity check")]
    Integrity,
}

#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    pub fn from_hex_key(key: &SecretString) -> Result<Self, CipherError> {
        let bytes = hex::decode(key.expose_secret().trim()).map_err(|_| CipherError::InvalidKey)?;
        if bytes.len() != KEY_BYTES {
            return Err(CipherError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(&bytes).map_err(|_| CipherError::InvalidKey)?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &SecretString) -> Result<String, CipherError> {
        let plaintext = plaintext.expose_secret();
        if plaintext.is_empty() {
            return Err(CipherError::EmptyPlaintext);
        }

        let mut nonce = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt((&nonce).into(), Payload { msg: plaintext.as_bytes(), aad: TOKEN_AAD })
            .map_err(|_| CipherError::Encrypt)?;

        let mut payload = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(format!("{ENCRYPTED_TOKEN_PREFIX}{}", BASE64_STANDARD.encode(payload)))
    }

    pub fn decrypt(&self, payload: &str) -> Result<SecretString, CipherError> {
        let encoded =
            payload.strip_prefix(ENCRYPTED_TOKEN_PREFIX).ok_or(CipherError::MalformedPayload)?;
        let raw = BASE64_STANDARD.decode(encoded).map_err(|_| CipherError::MalformedPayload)?;
        if raw.len() <= NONCE_BYTES {
            return Err(CipherError::MalformedPayload);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_BYTES);
        let plaintext = self
            .cipher
            .decrypt(nonce.into(), Payload { msg: ciphertext, aad: TOKEN_AAD })
            .map_err(|_| CipherError::Integrity)?;
        let token = String::from_utf8(plaintext).map_err(|_| CipherError::MalformedPayload)?;
        Ok(SecretString::from(token))
    }
}
