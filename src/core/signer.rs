//! The seam every marketplace action signs through. Two implementations:
//! a local key loaded from the vault, and a browser wallet reached over the
//! signing relay. The workflow layer does not care which one it holds.

use parking_lot::Mutex;
use tracing::info;

use crate::core::errors::WalletError;
use crate::crypto::keys::{Address, PrivateKey};
use crate::relay::session::SigningSession;

/// Anything that can produce a personal-message signature for a
/// marketplace action.
pub trait Signer {
    /// The signing address, once known.
    fn address(&self) -> Option<Address>;

    /// Sign `message`; `description` is shown to the user when signing is
    /// interactive (the browser path) and ignored otherwise.
    fn sign_message(&self, message: &str, description: &str) -> Result<String, WalletError>;
}

/// Signs with a raw private key held in this process.
pub struct LocalSigner {
    key: PrivateKey,
    address: Address,
}

impl LocalSigner {
    pub fn new(key: PrivateKey) -> Result<Self, WalletError> {
        let address = key.address()?;
        Ok(Self { key, address })
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> Option<Address> {
        Some(self.address)
    }

    fn sign_message(&self, message: &str, _description: &str) -> Result<String, WalletError> {
        self.key.sign_personal(message.as_bytes())
    }
}

/// Signs by delegating to a browser wallet through the relay. The key never
/// enters this process.
///
/// [`BrowserSigner::connect`] must run first: it learns which account the
/// browser holds from the first signature, and every later request is
/// pinned to that address.
pub struct BrowserSigner {
    session: SigningSession,
    address: Mutex<Option<Address>>,
}

impl BrowserSigner {
    pub fn new(session: SigningSession) -> Self {
        Self {
            session,
            address: Mutex::new(None),
        }
    }

    /// Perform the connect handshake: have the browser sign `seed_message`
    /// and adopt the reporting account as this signer's address. Returns
    /// the seed signature, which some flows chain into a follow-up request
    /// (e.g. a link signature).
    pub fn connect(
        &self,
        seed_message: &str,
        description: &str,
    ) -> Result<String, WalletError> {
        let result = self.session.request_full(seed_message, description, None)?;
        let address = Address::parse(&result.address).map_err(|_| {
            WalletError::SigningValidation {
                field: "address",
                expected: "a 20-byte hex address".to_string(),
                actual: result.address.clone(),
            }
        })?;
        info!(%address, "browser wallet connected");
        *self.address.lock() = Some(address);
        Ok(result.signature)
    }

    pub fn session(&self) -> &SigningSession {
        &self.session
    }

    /// Stop the underlying relay server.
    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}

impl Signer for BrowserSigner {
    fn address(&self) -> Option<Address> {
        *self.address.lock()
    }

    fn sign_message(&self, message: &str, description: &str) -> Result<String, WalletError> {
        let address = self.address().ok_or(WalletError::NotConnected)?;
        self.session.request(message, description, Some(&address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RelayConfig;
    use crate::relay::mailbox::SigningResult;
    use std::time::Duration;

    fn browser_signer() -> BrowserSigner {
        BrowserSigner::new(SigningSession::new(
            RelayConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            Duration::from_secs(5),
        ))
    }

    fn reply(signer_mailbox: &BrowserSigner, address: &str, message: &str, signature: &str) {
        let mailbox = signer_mailbox.session().mailbox().clone();
        let result = SigningResult {
            address: address.to_string(),
            message: message.to_string(),
            signature: signature.to_string(),
        };
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            mailbox.submit_result(result);
        });
    }

    #[test]
    fn test_local_signer_signs_without_interaction() {
        let key = PrivateKey::generate();
        let address = key.address().unwrap();
        let signer = LocalSigner::new(key).unwrap();

        assert_eq!(signer.address(), Some(address));
        let signature = signer.sign_message("sell order", "ignored").unwrap();
        assert!(signature.starts_with("0x"));
    }

    #[test]
    fn test_browser_signer_requires_connect() {
        let signer = browser_signer();
        assert!(signer.address().is_none());
        let err = signer.sign_message("msg", "desc").unwrap_err();
        assert!(matches!(err, WalletError::NotConnected));
        signer.shutdown();
    }

    #[test]
    fn test_connect_learns_address_and_pins_it() {
        let signer = browser_signer();
        let account = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

        reply(&signer, account, "seed-msg", "0xseedsig");
        let seed_sig = signer.connect("seed-msg", "Connect your wallet.").unwrap();
        assert_eq!(seed_sig, "0xseedsig");
        assert_eq!(signer.address().unwrap(), Address::parse(account).unwrap());

        // A follow-up signed by a different account must be rejected.
        reply(
            &signer,
            "0x0000000000000000000000000000000000000009",
            "link-msg",
            "0xlinksig",
        );
        let err = signer
            .sign_message("link-msg", "Link your wallet.")
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::SigningValidation { field: "address", .. }
        ));
        signer.shutdown();
    }

    #[test]
    fn test_connect_then_chained_signature() {
        let signer = browser_signer();
        let account = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

        reply(&signer, account, "seed-msg", "0xseedsig");
        signer.connect("seed-msg", "Connect your wallet.").unwrap();

        reply(&signer, account, "link-msg", "0xlinksig");
        let link_sig = signer
            .sign_message("link-msg", "Link your wallet.")
            .unwrap();
        assert_eq!(link_sig, "0xlinksig");
        signer.shutdown();
    }
}
