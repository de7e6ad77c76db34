//! On-disk wallet records: a public address bound to a password-encrypted
//! private key.
//!
//! Record layout, fixed and sequential:
//!
//! ```text
//! [version: 1 byte][address: 20 bytes][salt: 32 bytes][iv || ciphertext]
//! ```
//!
//! The address is plaintext so a directory of wallets can be listed without
//! prompting for any password.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::errors::WalletError;
use crate::crypto::cipher::{KeyCipher, SALT_LEN};
use crate::crypto::keys::{Address, PrivateKey, ADDRESS_LEN};

/// Current record format version. Bump on any change to the derivation
/// parameters or cipher mode.
pub const VAULT_VERSION: u8 = 1;

/// File extension for vault records.
pub const VAULT_EXTENSION: &str = "wlt";

const HEADER_LEN: usize = 1 + ADDRESS_LEN + SALT_LEN;

/// One parsed vault record.
#[derive(Debug)]
pub struct VaultRecord {
    pub version: u8,
    pub address: Address,
    pub salt: [u8; SALT_LEN],
    pub ciphertext: Vec<u8>,
}

/// Load/save/enumerate operations over vault files.
pub struct WalletVault {
    cipher: KeyCipher,
}

impl WalletVault {
    pub fn new(cipher: KeyCipher) -> Self {
        Self { cipher }
    }

    /// Encrypt `key` under `password` and write a fresh record to `path`.
    /// Returns the public address stored in the record.
    pub fn save(
        &self,
        key: &PrivateKey,
        password: &str,
        path: &Path,
    ) -> Result<Address, WalletError> {
        let address = key.address()?;
        let salt = KeyCipher::generate_salt();
        let derived = self.cipher.derive_key(password, &salt)?;
        let ciphertext = self.cipher.encrypt(key.as_bytes(), &derived);

        let mut record = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        record.push(VAULT_VERSION);
        record.extend_from_slice(address.as_bytes());
        record.extend_from_slice(&salt);
        record.extend_from_slice(&ciphertext);
        fs::write(path, &record)?;

        info!(%address, path = %path.display(), "vault record written");
        Ok(address)
    }

    /// Decrypt the record at `path`. A wrong password surfaces as the
    /// recoverable [`WalletError::Integrity`]; callers should re-prompt.
    ///
    /// The padding check alone passes on garbage roughly once per 256 wrong
    /// passwords, so the recovered key is additionally required to derive
    /// the address stored in the record.
    pub fn load(&self, path: &Path, password: &str) -> Result<PrivateKey, WalletError> {
        let record = Self::read_record(path)?;
        let derived = self.cipher.derive_key(password, &record.salt)?;
        let plaintext = self.cipher.decrypt(&record.ciphertext, &derived)?;

        let key = PrivateKey::from_bytes(&plaintext)
            .map_err(|_| WalletError::Integrity("recovered data is not a usable key".to_string()))?;
        let derived_address = key.address()?;
        if derived_address != record.address {
            return Err(WalletError::Integrity(format!(
                "recovered key derives {} but the record is for {}",
                derived_address, record.address
            )));
        }

        debug!(address = %record.address, "vault record decrypted");
        Ok(key)
    }

    /// Read only the plaintext address field of a record. Never needs a
    /// password.
    pub fn read_address(path: &Path) -> Result<Address, WalletError> {
        let record = Self::read_record(path)?;
        Ok(record.address)
    }

    /// Scan `directory` for vault files and return `(path, address)` pairs,
    /// sorted by path. Unreadable or foreign files are skipped with a
    /// warning, not an error.
    pub fn list_records(directory: &Path) -> Result<Vec<(PathBuf, Address)>, WalletError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VAULT_EXTENSION) {
                continue;
            }
            match Self::read_address(&path) {
                Ok(address) => records.push((path, address)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable vault file"),
            }
        }
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }

    fn read_record(path: &Path) -> Result<VaultRecord, WalletError> {
        let data = fs::read(path)?;
        if data.len() <= HEADER_LEN {
            return Err(WalletError::Vault(format!(
                "record too short: {} bytes",
                data.len()
            )));
        }

        let version = data[0];
        if version != VAULT_VERSION {
            return Err(WalletError::Vault(format!(
                "unsupported vault version {} (expected {})",
                version, VAULT_VERSION
            )));
        }

        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&data[1..1 + ADDRESS_LEN]);
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&data[1 + ADDRESS_LEN..HEADER_LEN]);

        Ok(VaultRecord {
            version,
            address: Address::from_bytes(address),
            salt,
            ciphertext: data[HEADER_LEN..].to_vec(),
        })
    }
}

/// Conventional file name for a wallet record: `wallet_<address>.wlt`.
pub fn default_record_name(address: &Address) -> String {
    format!("wallet_{}.{}", address, VAULT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_vault() -> WalletVault {
        WalletVault::new(KeyCipher::new(1_000))
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.wlt");
        let vault = test_vault();
        let key = PrivateKey::generate();

        let address = vault.save(&key, "correct", &path).unwrap();
        let loaded = vault.load(&path, "correct").unwrap();

        assert_eq!(loaded.as_bytes(), key.as_bytes());
        assert_eq!(loaded.address().unwrap(), address);
    }

    #[test]
    fn test_load_wrong_password_is_recoverable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.wlt");
        let vault = test_vault();
        vault.save(&PrivateKey::generate(), "correct", &path).unwrap();

        let err = vault.load(&path, "wrong").unwrap_err();
        assert!(err.is_recoverable(), "expected Integrity, got {:?}", err);
    }

    #[test]
    fn test_read_address_needs_no_password() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.wlt");
        let vault = test_vault();
        let key = PrivateKey::generate();
        let saved = vault.save(&key, "pw", &path).unwrap();

        assert_eq!(WalletVault::read_address(&path).unwrap(), saved);
    }

    #[test]
    fn test_list_records_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let vault = test_vault();

        let key_a = PrivateKey::generate();
        let key_b = PrivateKey::generate();
        vault.save(&key_a, "pw", &dir.path().join("a.wlt")).unwrap();
        vault.save(&key_b, "pw", &dir.path().join("b.wlt")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a wallet").unwrap();
        fs::write(dir.path().join("corrupt.wlt"), b"xx").unwrap();

        let records = WalletVault::list_records(dir.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1, key_a.address().unwrap());
        assert_eq!(records[1].1, key_b.address().unwrap());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.wlt");
        let vault = test_vault();
        vault.save(&PrivateKey::generate(), "pw", &path).unwrap();

        let mut data = fs::read(&path).unwrap();
        data[0] = 9;
        fs::write(&path, &data).unwrap();

        match vault.load(&path, "pw") {
            Err(WalletError::Vault(msg)) => assert!(msg.contains("version")),
            other => panic!("expected Vault error, got {:?}", other),
        }
    }

    #[test]
    fn test_tampered_address_field_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.wlt");
        let vault = test_vault();
        vault.save(&PrivateKey::generate(), "pw", &path).unwrap();

        // Flip a byte inside the stored address: decryption succeeds but the
        // address consistency check must fail.
        let mut data = fs::read(&path).unwrap();
        data[5] ^= 0xff;
        fs::write(&path, &data).unwrap();

        let err = vault.load(&path, "pw").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_default_record_name() {
        let key = PrivateKey::generate();
        let address = key.address().unwrap();
        let name = default_record_name(&address);
        assert!(name.starts_with("wallet_0x"));
        assert!(name.ends_with(".wlt"));
    }
}
