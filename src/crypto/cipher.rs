//! Password-based encryption for private key material.
//!
//! PBKDF2-HMAC-SHA256 turns a password + per-record salt into an AES-256
//! key; payloads are encrypted with AES-256-CBC and PKCS#7 padding, output
//! as `iv || ciphertext`. The padding check on decrypt doubles as the
//! wrong-key/tamper detector, which is why decryption validates it
//! explicitly instead of delegating to a padding helper.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size; also the IV length.
pub const BLOCK_SIZE: usize = 16;
/// Per-record salt length.
pub const SALT_LEN: usize = 32;
/// Derived key length (AES-256).
pub const KEY_LEN: usize = 32;

/// Default PBKDF2 iteration count. Deliberately slow: brute-forcing the
/// password must cost on the order of a second per guess.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 1_000_000;

/// Symmetric cipher used by the vault. The iteration count is carried here
/// so tests and config can lower or raise the work factor.
#[derive(Debug, Clone)]
pub struct KeyCipher {
    iterations: u32,
}

impl KeyCipher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive an AES-256 key from a password and salt. Deterministic:
    /// the same password + salt always yields the same key.
    pub fn derive_key(
        &self,
        password: &str,
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, WalletError> {
        if salt.len() < 8 {
            return Err(WalletError::InvalidKey(
                "salt must be at least 8 bytes".to_string(),
            ));
        }
        debug!(iterations = self.iterations, "deriving vault key");
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut *key);
        Ok(key)
    }

    /// Generate a fresh random salt for a new vault record.
    pub fn generate_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    /// Encrypt `plaintext`, returning `iv || ciphertext`. A fresh IV is
    /// drawn from the OS RNG on every call, so two encryptions of the same
    /// payload never produce the same output.
    pub fn encrypt(&self, plaintext: &[u8], key: &[u8; KEY_LEN]) -> Vec<u8> {
        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);

        let pad_len = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
        let mut padded = Zeroizing::new(plaintext.to_vec());
        padded.extend(std::iter::repeat(pad_len as u8).take(pad_len));

        let ciphertext = Aes256CbcEnc::new(key.into(), (&iv).into())
            .encrypt_padded_vec_mut::<NoPadding>(&padded);

        let mut out = iv.to_vec();
        out.extend_from_slice(&ciphertext);
        out
    }

    /// Decrypt an `iv || ciphertext` blob and strip the padding.
    ///
    /// Every trailing padding byte must equal the padding length; a wrong
    /// key decrypts to garbage that fails this check with high probability,
    /// surfacing as [`WalletError::Integrity`].
    pub fn decrypt(
        &self,
        blob: &[u8],
        key: &[u8; KEY_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        if blob.len() < BLOCK_SIZE * 2 || blob.len() % BLOCK_SIZE != 0 {
            return Err(WalletError::Integrity(format!(
                "ciphertext length {} is not a whole number of blocks",
                blob.len()
            )));
        }
        let (iv, ciphertext) = blob.split_at(BLOCK_SIZE);
        let iv: &[u8; BLOCK_SIZE] = iv
            .try_into()
            .map_err(|_| WalletError::Integrity("missing initialization vector".to_string()))?;

        let padded = Zeroizing::new(
            Aes256CbcDec::new(key.into(), iv.into())
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
                .map_err(|_| WalletError::Integrity("block decryption failed".to_string()))?,
        );

        let pad_len = *padded.last().unwrap_or(&0) as usize;
        if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > padded.len() {
            return Err(WalletError::Integrity("padding check failed".to_string()));
        }
        if !padded[padded.len() - pad_len..].iter().all(|&b| b == pad_len as u8) {
            return Err(WalletError::Integrity("padding check failed".to_string()));
        }

        Ok(Zeroizing::new(padded[..padded.len() - pad_len].to_vec()))
    }
}

impl Default for KeyCipher {
    fn default() -> Self {
        Self::new(DEFAULT_PBKDF2_ITERATIONS)
    }
}
