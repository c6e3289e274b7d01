//! Encryption of stored database passwords.
//!
//! A blob has the form `key:ciphertext`, both halves URL-safe base64. The key
//! is a fresh AES-256-GCM key per call and the ciphertext is `nonce || sealed`.
//! Storing the key next to its ciphertext only obscures the password; it does
//! not protect it from anyone who can read the blob.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE as BASE64, Engine as _};

use crate::api::middleware::AppError;

const SEPARATOR: char = ':';
const NONCE_LEN: usize = 12;

pub struct CredentialVault;

impl CredentialVault {
    /// Encrypt `plaintext` under a freshly generated key.
    pub fn store(plaintext: &str) -> Result<String, AppError> {
        let key = generate_key();
        let sealed = seal(&key, plaintext.as_bytes())
            .map_err(|e| AppError::Unexpected(format!("Failed to encrypt password: {}", e)))?;

        Ok(format!("{}{}{}", BASE64.encode(key), SEPARATOR, BASE64.encode(sealed)))
    }

    /// Recover the plaintext password from a stored blob.
    ///
    /// Blobs without a separator are legacy plaintext and come back unchanged.
    /// A blob that fails to decrypt is also returned as-is, with a warning.
    pub fn retrieve(blob: &str) -> String {
        if blob.is_empty() {
            return String::new();
        }

        let Some((key, sealed)) = blob.split_once(SEPARATOR) else {
            return blob.to_string();
        };

        match open(key, sealed) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!("Error decrypting stored password, using raw value instead: {}", e);
                blob.to_string()
            }
        }
    }
}

fn generate_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| anyhow!("encryption failed: {}", e))?;

    let mut sealed = nonce_bytes.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open(encoded_key: &str, encoded_sealed: &str) -> Result<String> {
    let key: [u8; 32] = BASE64
        .decode(encoded_key)?
        .try_into()
        .map_err(|_| anyhow!("invalid key length"))?;

    let sealed = BASE64.decode(encoded_sealed)?;
    if sealed.len() <= NONCE_LEN {
        return Err(anyhow!("ciphertext too short"));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("decryption failed: {}", e))?;

    Ok(String::from_utf8(plaintext)?)
}
