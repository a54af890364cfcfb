//! encryption module
//!
//! Passphrase based at-rest encryption for stash files.
//!
//! Blob layout: `MAGIC(8) | VERSION(1) | SALT(32) | NONCE(12) | CIPHERTEXT (+16 byte GCM tag)`.
//! The key is derived with Argon2id from the passphrase and a fresh random salt,
//! the payload is sealed with AES-256-GCM under a fresh random nonce.

mod versions;

pub use versions::{current_kdf_params, kdf_params, KdfParams, CURRENT_FORMAT_VERSION};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::error::CryptoError;

/// File marker identifying an encrypted stash
pub const MAGIC: &[u8; 8] = b"SUVE_ENC";

const SALT_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32; // AES-256
const TAG_LENGTH: usize = 16;

const VERSION_OFFSET: usize = MAGIC.len();
const SALT_OFFSET: usize = VERSION_OFFSET + 1;
const NONCE_OFFSET: usize = SALT_OFFSET + SALT_LENGTH;
const HEADER_LENGTH: usize = NONCE_OFFSET + NONCE_LENGTH;

/// Derive the encryption key from a passphrase
fn derive_key(
    passphrase: &str,
    salt: &[u8],
    kdf: KdfParams,
) -> Result<[u8; KEY_LENGTH], CryptoError> {
    let params = Params::new(
        kdf.memory_kib,
        kdf.iterations,
        kdf.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut key = [0u8; KEY_LENGTH];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

/// Whether `data` starts with the encryption marker
///
/// Only inspects the leading bytes, never attempts decryption.
pub fn is_encrypted(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// Encrypt data
///
/// Every call draws a new salt and nonce, so encrypting the same plaintext
/// with the same passphrase twice yields different blobs.
///
/// # Arguments
/// * `plaintext` - plain text data to be encrypted
/// * `passphrase` - encryption passphrase
pub fn encrypt(plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LENGTH];
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::rng().fill_bytes(&mut salt);
    rand::rng().fill_bytes(&mut nonce_bytes);

    let key = derive_key(passphrase, &salt, current_kdf_params())?;

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::Cipher(format!("Failed to create cipher: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Cipher(format!("Encryption failed: {e}")))?;

    let mut blob = Vec::with_capacity(HEADER_LENGTH + ciphertext.len());
    blob.extend_from_slice(MAGIC);
    blob.push(CURRENT_FORMAT_VERSION);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt data
///
/// # Errors
/// - `NotEncrypted` - `data` has no marker
/// - `InvalidFormat` - unsupported version byte or truncated blob
/// - `DecryptionFailed` - wrong passphrase or corrupted ciphertext
pub fn decrypt(data: &[u8], passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    if !is_encrypted(data) {
        return Err(CryptoError::NotEncrypted);
    }
    if data.len() < HEADER_LENGTH + TAG_LENGTH {
        return Err(CryptoError::InvalidFormat(format!(
            "encrypted data too short: {} bytes",
            data.len()
        )));
    }

    let version = data[VERSION_OFFSET];
    let kdf = kdf_params(version).ok_or_else(|| {
        CryptoError::InvalidFormat(format!("unsupported format version: {version}"))
    })?;

    let salt = &data[SALT_OFFSET..NONCE_OFFSET];
    let nonce_bytes = &data[NONCE_OFFSET..HEADER_LENGTH];
    let ciphertext = &data[HEADER_LENGTH..];

    let key = derive_key(passphrase, salt, kdf)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::Cipher(format!("Failed to create cipher: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let plaintext = br#"{"version":3,"service":"param"}"#;
        let passphrase = "strong-passphrase-123";

        let blob = encrypt(plaintext, passphrase).unwrap();
        assert!(is_encrypted(&blob));
        assert_eq!(decrypt(&blob, passphrase).unwrap(), plaintext);
    }

    #[test]
    fn roundtrip_empty_payload() {
        let blob = encrypt(b"", "pw").unwrap();
        assert_eq!(blob.len(), HEADER_LENGTH + TAG_LENGTH);
        assert!(decrypt(&blob, "pw").unwrap().is_empty());
    }

    #[test]
    fn blob_layout() {
        let blob = encrypt(b"abc", "pw").unwrap();
        assert_eq!(&blob[..8], MAGIC);
        assert_eq!(blob[8], CURRENT_FORMAT_VERSION);
        assert_eq!(blob.len(), 8 + 1 + 32 + 12 + 3 + 16);
    }

    #[test]
    fn encrypt_produces_different_output() {
        let plaintext = b"same data";
        let passphrase = "same-passphrase";

        let first = encrypt(plaintext, passphrase).unwrap();
        let second = encrypt(plaintext, passphrase).unwrap();

        assert_ne!(first, second);
        assert_ne!(first[SALT_OFFSET..NONCE_OFFSET], second[SALT_OFFSET..NONCE_OFFSET]);
        assert_eq!(decrypt(&first, passphrase).unwrap(), plaintext);
        assert_eq!(decrypt(&second, passphrase).unwrap(), plaintext);
    }

    #[test]
    fn decrypt_wrong_passphrase_fails() {
        let blob = encrypt(b"secret data", "correct-passphrase").unwrap();
        assert_eq!(
            decrypt(&blob, "wrong-passphrase"),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn decrypt_tampered_ciphertext_fails() {
        let blob = encrypt(b"some data", "pw").unwrap();

        for index in [HEADER_LENGTH, blob.len() - 1] {
            let mut tampered = blob.clone();
            tampered[index] ^= 0x01;
            assert_eq!(decrypt(&tampered, "pw"), Err(CryptoError::DecryptionFailed));
        }
    }

    #[test]
    fn decrypt_tampered_salt_fails() {
        let mut blob = encrypt(b"some data", "pw").unwrap();
        blob[SALT_OFFSET] ^= 0xff;
        assert_eq!(decrypt(&blob, "pw"), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn decrypt_plaintext_is_not_encrypted() {
        let data = br#"{"version":3}"#;
        assert!(!is_encrypted(data));
        assert_eq!(decrypt(data, "pw"), Err(CryptoError::NotEncrypted));
    }

    #[test]
    fn decrypt_unsupported_version_is_invalid_format() {
        let mut blob = encrypt(b"data", "pw").unwrap();
        blob[VERSION_OFFSET] = 99;
        assert!(matches!(
            decrypt(&blob, "pw"),
            Err(CryptoError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decrypt_truncated_blob_is_invalid_format() {
        let mut data = MAGIC.to_vec();
        data.push(CURRENT_FORMAT_VERSION);
        data.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            decrypt(&data, "pw"),
            Err(CryptoError::InvalidFormat(_))
        ));
    }
}
