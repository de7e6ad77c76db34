//! secp256k1 key material, Ethereum-style addresses and personal-message
//! signatures. The curve math itself is `k256`; this module only shapes
//! inputs and outputs the way the marketplace REST layer expects
//! (0x-prefixed hex, 65-byte r||s||v signatures).

use std::fmt;

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::core::errors::WalletError;

/// Address width in bytes.
pub const ADDRESS_LEN: usize = 20;
/// Private key width in bytes.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Public wallet identifier: the last 20 bytes of the Keccak-256 hash of
/// the uncompressed public key. Never secret.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Parse a 0x-prefixed (or bare) 40-digit hex address. Case-insensitive:
    /// browser wallets report checksum-cased addresses.
    pub fn parse(s: &str) -> Result<Self, WalletError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| WalletError::InvalidKey(format!("invalid address hex: {}", e)))?;
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            WalletError::InvalidKey(format!("address must be {} bytes, got {}", ADDRESS_LEN, v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// A raw secp256k1 private key. Zeroized when dropped; never printed.
pub struct PrivateKey(Zeroizing<[u8; PRIVATE_KEY_LEN]>);

impl PrivateKey {
    /// Generate a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        loop {
            let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
            OsRng.fill_bytes(&mut *bytes);
            // Rejection-sample until the bytes land inside the curve order.
            if SigningKey::from_slice(&*bytes).is_ok() {
                return Self(bytes);
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let array: [u8; PRIVATE_KEY_LEN] = bytes.try_into().map_err(|_| {
            WalletError::InvalidKey(format!(
                "private key must be {} bytes, got {}",
                PRIVATE_KEY_LEN,
                bytes.len()
            ))
        })?;
        let key = Zeroizing::new(array);
        SigningKey::from_slice(&*key)
            .map_err(|_| WalletError::InvalidKey("not a valid secp256k1 scalar".to_string()))?;
        Ok(Self(key))
    }

    /// Parse a 0x-prefixed or bare 64-digit hex key.
    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        let digits = s.trim().strip_prefix("0x").unwrap_or_else(|| s.trim());
        let bytes = Zeroizing::new(
            hex::decode(digits)
                .map_err(|e| WalletError::InvalidKey(format!("invalid key hex: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.0
    }

    /// Derive the public address for this key.
    pub fn address(&self) -> Result<Address, WalletError> {
        let signing_key = self.signing_key()?;
        let point = signing_key.verifying_key().to_encoded_point(false);
        // Skip the 0x04 uncompressed-point tag.
        let digest = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
        Ok(Address(address))
    }

    /// Sign a personal message (EIP-191 prefix) and return the signature as
    /// 0x-prefixed hex of `r || s || v`, `v` in {27, 28} — the exact byte
    /// format browser wallets produce and the marketplace layer consumes.
    pub fn sign_personal(&self, message: &[u8]) -> Result<String, WalletError> {
        let signing_key = self.signing_key()?;
        let digest = personal_message_hash(message);
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| WalletError::InvalidKey(format!("signing failed: {}", e)))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(format!("0x{}", hex::encode(out)))
    }

    fn signing_key(&self) -> Result<SigningKey, WalletError> {
        SigningKey::from_slice(&*self.0)
            .map_err(|_| WalletError::InvalidKey("not a valid secp256k1 scalar".to_string()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(<redacted>)")
    }
}

/// Keccak-256 digest of the EIP-191 personal-message envelope.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}
