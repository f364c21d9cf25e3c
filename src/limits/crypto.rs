//! At-rest encryption for the preference file.
//!
//! ChaCha20-Poly1305 with a random 256-bit key kept in its own file next to the
//! data. Sealed blobs are laid out as `nonce (12 bytes) || ciphertext + tag`.

use anyhow::{Context, Result};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::Path;
use tracing::info;

use crate::platform::common::{atomic_write, set_file_permissions};

/// Key length for ChaCha20-Poly1305 (32 bytes)
pub const KEY_LEN: usize = 32;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Seals and opens preference blobs
pub struct Sealer {
    cipher: ChaCha20Poly1305,
}

impl Sealer {
    pub fn from_key(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Load the key file, creating a fresh random key on first use
    pub fn load_or_create(key_path: &Path) -> Result<Self> {
        if key_path.exists() {
            let bytes = std::fs::read(key_path)
                .with_context(|| format!("Failed to read key file: {}", key_path.display()))?;

            let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
                anyhow::anyhow!(
                    "Key file {} has {} bytes, expected {}",
                    key_path.display(),
                    bytes.len(),
                    KEY_LEN
                )
            })?;

            return Ok(Self::from_key(&key));
        }

        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);

        atomic_write(key_path, &key)
            .with_context(|| format!("Failed to write key file: {}", key_path.display()))?;
        set_file_permissions(key_path, 0o600)?;

        info!("Created preference encryption key at {}", key_path.display());
        Ok(Self::from_key(&key))
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            anyhow::bail!("Sealed data is too short ({} bytes)", sealed.len());
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow::anyhow!("Decryption failed: wrong key or corrupted data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_seal_hides_plaintext() {
        let sealer = Sealer::from_key(&[7u8; KEY_LEN]);
        let sealed = sealer.seal(b"passcode=1234").unwrap();

        assert!(!sealed.windows(4).any(|w| w == b"1234"));
        assert_eq!(sealer.open(&sealed).unwrap(), b"passcode=1234");
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let sealed = Sealer::from_key(&[1u8; KEY_LEN]).seal(b"secret").unwrap();
        assert!(Sealer::from_key(&[2u8; KEY_LEN]).open(&sealed).is_err());
    }

    #[test]
    fn test_open_rejects_truncated_data() {
        let sealer = Sealer::from_key(&[1u8; KEY_LEN]);
        assert!(sealer.open(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_load_or_create_reuses_key() {
        let temp_dir = tempdir().unwrap();
        let key_path = temp_dir.path().join("store.key");

        let first = Sealer::load_or_create(&key_path).unwrap();
        let sealed = first.seal(b"limits").unwrap();

        let second = Sealer::load_or_create(&key_path).unwrap();
        assert_eq!(second.open(&sealed).unwrap(), b"limits");
        assert_eq!(std::fs::read(&key_path).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn test_load_rejects_malformed_key_file() {
        let temp_dir = tempdir().unwrap();
        let key_path = temp_dir.path().join("store.key");
        std::fs::write(&key_path, b"short").unwrap();

        assert!(Sealer::load_or_create(&key_path).is_err());
    }
}
