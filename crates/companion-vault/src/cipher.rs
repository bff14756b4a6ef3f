//! AES-256-GCM sealing of the stored secret.
//!
//! Wire form: base64(`IV(12) || ciphertext || tag(16)`), standard alphabet
//! with padding.

use crate::{DerivedKey, VaultError, VaultResult};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// IV size for AES-GCM (96 bits).
pub const IV_SIZE: usize = 12;

/// Authentication tag size for AES-GCM (128 bits).
pub const TAG_SIZE: usize = 16;

/// Shortest string that can hold a sealed non-empty secret:
/// base64 of IV + tag + 1 byte of ciphertext.
pub const MIN_ENCRYPTED_LEN: usize = 40;

/// Shape check separating sealed values from legacy plaintext.
///
/// Only a heuristic: a long plaintext made of base64 characters passes it too.
pub fn looks_encrypted(stored: &str) -> bool {
    stored.len() >= MIN_ENCRYPTED_LEN
        && stored
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

/// Seal `plaintext` under `key` with a fresh random IV.
pub(crate) fn seal(key: &DerivedKey, plaintext: &[u8]) -> VaultResult<String> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    seal_with_iv(key, &iv, plaintext)
}

/// Seal with a caller-provided IV. Only for deterministic tests.
pub(crate) fn seal_with_iv(
    key: &DerivedKey,
    iv: &[u8; IV_SIZE],
    plaintext: &[u8],
) -> VaultResult<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    let mut combined = Vec::with_capacity(IV_SIZE + ciphertext.len());
    combined.extend_from_slice(iv);
    combined.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(combined))
}

/// Open a sealed value. Every failure maps to [`VaultError::Decryption`].
pub(crate) fn open(key: &DerivedKey, sealed: &str) -> VaultResult<Vec<u8>> {
    let combined = BASE64
        .decode(sealed)
        .map_err(|e| VaultError::Decryption(format!("base64 decode failed: {}", e)))?;

    if combined.len() < IV_SIZE + TAG_SIZE {
        return Err(VaultError::Decryption(format!(
            "sealed value too short: {} bytes",
            combined.len()
        )));
    }

    let (iv, ciphertext) = combined.split_at(IV_SIZE);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Decryption(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| VaultError::Decryption("authentication failed".to_string()))
}
