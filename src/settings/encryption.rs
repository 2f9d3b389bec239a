//! At-rest encryption for sensitive settings.
//!
//! AES-256-GCM (AEAD) seals individual setting values before they hit the
//! SQLite database. The symmetric key is generated on first use and kept in
//! a `.key` file next to the database with owner-only permissions.
//!
//! Losing the key file makes every encrypted value permanently unreadable.
//! There is no recovery path - the risk is accepted and documented on
//! [`SettingsStore`](super::store::SettingsStore).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use std::path::Path;

use crate::error::{Error, Result};

/// Key length (bytes) - AES-256
pub const KEY_LEN: usize = 32;

/// Nonce length (bytes) - 96 bits
pub const NONCE_LEN: usize = 12;

/// Authentication tag length (bytes) - 128 bits
pub const TAG_LEN: usize = 16;

/// Seals and opens setting values with a process-local key.
pub struct ValueCipher {
    cipher: Aes256Gcm,
}

impl ValueCipher {
    /// Create a cipher from raw key bytes.
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        // Infallible for a 32-byte slice
        let cipher = Aes256Gcm::new_from_slice(key)
            .unwrap_or_else(|_| unreachable!("KEY_LEN is a valid AES-256 key size"));
        Self { cipher }
    }

    /// Load the key from `key_path`, generating and persisting a fresh one
    /// if the file does not exist yet.
    pub fn load_or_create(key_path: &Path) -> Result<Self> {
        let key = if key_path.exists() {
            let bytes = std::fs::read(key_path)
                .map_err(|e| Error::Encryption(format!("cannot read key file: {}", e)))?;
            let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
                Error::Encryption(format!(
                    "corrupt key file {} (expected {} bytes, found {})",
                    key_path.display(),
                    KEY_LEN,
                    bytes.len()
                ))
            })?;
            key
        } else {
            let mut key = [0u8; KEY_LEN];
            OsRng.fill_bytes(&mut key);
            write_key_file(key_path, &key)?;
            key
        };

        Ok(Self::new(&key))
    }

    /// Encrypt a value with a random nonce.
    /// Returns: nonce (12 bytes) || ciphertext (original + 16 bytes tag)
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| Error::Encryption(format!("encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt a value produced by [`seal`](Self::seal).
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::Encryption("sealed value too short".to_string()));
        }

        let nonce = Nonce::from_slice(&sealed[..NONCE_LEN]);
        let ciphertext = &sealed[NONCE_LEN..];

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::Encryption("decryption failed (wrong or lost key?)".to_string()))
    }
}

/// Write the key file with owner-only permissions.
fn write_key_file(path: &Path, key: &[u8; KEY_LEN]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Encryption(format!("cannot create key directory: {}", e)))?;
    }

    std::fs::write(path, key)
        .map_err(|e| Error::Encryption(format!("cannot write key file: {}", e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .map_err(|e| Error::Encryption(format!("cannot restrict key file: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_key() -> [u8; KEY_LEN] {
        [0x42; KEY_LEN]
    }

    #[test]
    fn test_seal_open_roundtrip() -> Result<()> {
        let cipher = ValueCipher::new(&test_key());
        let plaintext = b"ghp_supersecrettoken";

        let sealed = cipher.seal(plaintext)?;
        let opened = cipher.open(&sealed)?;

        assert_eq!(plaintext.as_slice(), opened.as_slice());
        Ok(())
    }

    #[test]
    fn test_sealed_size() -> Result<()> {
        let cipher = ValueCipher::new(&test_key());
        let sealed = cipher.seal(b"test")?;

        // nonce (12) + plaintext + tag (16)
        assert_eq!(sealed.len(), NONCE_LEN + 4 + TAG_LEN);
        Ok(())
    }

    #[test]
    fn test_fresh_nonce_each_time() -> Result<()> {
        let cipher = ValueCipher::new(&test_key());

        let sealed1 = cipher.seal(b"same value")?;
        let sealed2 = cipher.seal(b"same value")?;

        assert_ne!(sealed1, sealed2);
        Ok(())
    }

    #[test]
    fn test_wrong_key_fails() -> Result<()> {
        let cipher1 = ValueCipher::new(&test_key());
        let cipher2 = ValueCipher::new(&[0x01; KEY_LEN]);

        let sealed = cipher1.seal(b"secret")?;
        assert!(cipher2.open(&sealed).is_err());
        Ok(())
    }

    #[test]
    fn test_tampered_value_fails() -> Result<()> {
        let cipher = ValueCipher::new(&test_key());
        let mut sealed = cipher.seal(b"secret")?;

        if let Some(byte) = sealed.last_mut() {
            *byte ^= 0xFF;
        }

        assert!(cipher.open(&sealed).is_err());
        Ok(())
    }

    #[test]
    fn test_key_file_created_and_reused() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let key_path = temp_dir.path().join(".key");

        let cipher1 = ValueCipher::load_or_create(&key_path)?;
        assert!(key_path.exists());

        let sealed = cipher1.seal(b"persists across opens")?;

        // Second load must read the same key back
        let cipher2 = ValueCipher::load_or_create(&key_path)?;
        assert_eq!(cipher2.open(&sealed)?, b"persists across opens");
        Ok(())
    }

    #[test]
    fn test_corrupt_key_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let key_path = temp_dir.path().join(".key");
        std::fs::write(&key_path, b"way too short").unwrap();

        let result = ValueCipher::load_or_create(&key_path);
        assert!(matches!(result, Err(Error::Encryption(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let key_path = temp_dir.path().join(".key");

        ValueCipher::load_or_create(&key_path)?;

        let mode = std::fs::metadata(&key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }
}
