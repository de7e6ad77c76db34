use std::time::Duration;

use thiserror::Error;

/// Error type for every vault and signing operation in this crate.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Decrypted data failed its integrity check. For vault loads this is
    /// the "wrong password" signal: callers should re-prompt, not abort.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A browser-signed result did not match the published request.
    /// Fatal for that signing attempt.
    #[error("signature validation failed: {field} mismatch (expected '{expected}', got '{actual}')")]
    SigningValidation {
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// No signature arrived before the deadline.
    #[error("timed out after {0:?} waiting for a browser signature")]
    Timeout(Duration),

    /// Relay server / HTTP layer failure.
    #[error("relay transport error: {0}")]
    Transport(String),

    /// Malformed or unreadable vault record.
    #[error("vault error: {0}")]
    Vault(String),

    /// Key material that is not a usable secp256k1 key.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Browser signer used before a connect handshake established its address.
    #[error("browser wallet not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalletError {
    /// Whether the caller can recover by prompting the user again
    /// (wrong password) rather than aborting the workflow step.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WalletError::Integrity(_))
    }

    /// Whether this failure invalidates the current signing attempt.
    pub fn is_fatal_for_signing(&self) -> bool {
        matches!(
            self,
            WalletError::SigningValidation { .. } | WalletError::Timeout(_)
        )
    }
}
