// Cryptographic utilities for cookie payload encryption and random tokens

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Encryption key size for AES-256 (256 bits)
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Generate a cryptographically secure random token of `length` bytes
///
/// The result is base64url-encoded without padding, so 32 bytes produce a
/// 43 character string that can be placed in URLs and cookies as-is.
#[must_use]
pub fn generate_nonce(length: usize) -> String {
    let mut nonce = vec![0u8; length];
    rand::rng().fill_bytes(&mut nonce);
    general_purpose::URL_SAFE_NO_PAD.encode(nonce)
}

/// Generate a random 32 byte key, encoded with standard base64
#[must_use]
pub fn generate_encryption_key() -> String {
    let mut key = [0u8; ENCRYPTION_KEY_SIZE];
    rand::rng().fill_bytes(&mut key);
    general_purpose::STANDARD.encode(key)
}

/// Decode the payload segment of a compact JWT into JSON
///
/// Accepts either a full `header.payload.signature` token or the bare payload
/// segment, which is what the ID token cookie stores. No signature checks are
/// performed here.
///
/// # Errors
///
/// Returns an error if:
/// - The token does not have one or three segments
/// - Base64 decoding fails
/// - JSON parsing fails
pub fn decode_jwt_payload(token: &str) -> Result<serde_json::Value> {
    let parts: Vec<&str> = token.split('.').collect();
    let payload_b64 = match parts.as_slice() {
        [payload] | [_, payload, _] => *payload,
        _ => return Err(anyhow!("Invalid JWT format")),
    };

    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| general_purpose::STANDARD.decode(payload_b64))
        .context("Base64 decode failed")?;

    serde_json::from_slice(&payload_bytes).context("JSON parse failed")
}

/// Generic encryption function for any serializable data using AES-256-GCM
///
/// # Arguments
///
/// * `data` - The data to encrypt (must implement Serialize)
/// * `key` - The encryption key (must be 32 bytes for AES-256)
///
/// # Returns
///
/// A Base64URL-encoded string containing the nonce + ciphertext
///
/// # Errors
///
/// Returns an error if:
/// - Serialization fails
/// - Key length is invalid
/// - AES encryption fails
pub fn encrypt_data<T: Serialize>(data: &T, key: &[u8]) -> Result<String> {
    if key.len() != ENCRYPTION_KEY_SIZE {
        return Err(anyhow!(
            "Invalid key length: expected {ENCRYPTION_KEY_SIZE} bytes, got {}",
            key.len()
        ));
    }

    let json_data = serde_json::to_string(data).context("Failed to serialize data")?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(nonce, json_data.as_bytes())
        .map_err(|e| anyhow!("AES encryption failed: {e}"))?;

    // Combine nonce + ciphertext and encode as base64
    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&combined))
}

/// Generic decryption function for any deserializable data using AES-256-GCM
///
/// # Arguments
///
/// * `encrypted_data` - Base64URL-encoded string containing nonce + ciphertext
/// * `key` - The decryption key (must be 32 bytes for AES-256)
///
/// # Errors
///
/// Returns an error if:
/// - Key length is invalid
/// - Base64 decoding fails
/// - Data length is invalid
/// - AES decryption fails (tampering or a different key)
/// - Deserialization fails
pub fn decrypt_data<T: DeserializeOwned>(encrypted_data: &str, key: &[u8]) -> Result<T> {
    if key.len() != ENCRYPTION_KEY_SIZE {
        return Err(anyhow!(
            "Invalid key length: expected {ENCRYPTION_KEY_SIZE} bytes, got {}",
            key.len()
        ));
    }

    let combined = general_purpose::URL_SAFE_NO_PAD
        .decode(encrypted_data)
        .context("Failed to decode base64 data")?;

    if combined.len() < NONCE_SIZE {
        return Err(anyhow!("Invalid data length"));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow!("AES decryption failed: {e}"))?;

    let data: T = serde_json::from_slice(&plaintext)
        .context("Failed to deserialize data from decrypted JSON")?;

    Ok(data)
}

/// Derive a proper 32-byte encryption key from input key material
///
/// The key is the SHA-256 digest of the input, so every byte of a passphrase
/// contributes to it.
///
/// # Note
///
/// A passphrase has far less entropy than a random key. Configure a base64
/// encoded random 32 byte key in production instead of relying on it.
#[must_use]
pub fn derive_encryption_key(input_key: &[u8]) -> [u8; ENCRYPTION_KEY_SIZE] {
    Sha256::digest(input_key).into()
}

/// Resolve the configured cookie key into raw AES-256 key bytes
///
/// A standard base64 value that decodes to exactly 32 bytes is used directly.
/// Anything else goes through [`derive_encryption_key`] and is reported through
/// the returned flag so the caller can warn about it.
#[must_use]
pub fn resolve_encryption_key(configured: &str) -> ([u8; ENCRYPTION_KEY_SIZE], bool) {
    if let Ok(decoded) = general_purpose::STANDARD.decode(configured.trim()) {
        if let Ok(key) = <[u8; ENCRYPTION_KEY_SIZE]>::try_from(decoded.as_slice()) {
            return (key, false);
        }
    }
    (derive_encryption_key(configured.as_bytes()), true)
}
