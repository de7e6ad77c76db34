//! One full request → publish → wait → validate cycle for obtaining a
//! single browser signature.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::core::config::RelayConfig;
use crate::core::errors::WalletError;
use crate::crypto::keys::Address;
use crate::relay::mailbox::{SigningMailbox, SigningRequest, SigningResult};
use crate::relay::server::RelayServer;

/// Blocking facade over the relay: publishes a request, parks the calling
/// thread until the browser answers, validates, returns the signature.
///
/// Constructed once per process and shared by every workflow step that
/// needs a signature; the underlying server starts lazily on the first
/// request and stays up until [`SigningSession::shutdown`].
pub struct SigningSession {
    mailbox: Arc<SigningMailbox>,
    server: RelayServer,
    timeout: Duration,
}

impl SigningSession {
    pub fn new(config: RelayConfig, timeout: Duration) -> Self {
        let mailbox = Arc::new(SigningMailbox::new());
        let server = RelayServer::new(mailbox.clone(), config);
        Self {
            mailbox,
            server,
            timeout,
        }
    }

    pub fn mailbox(&self) -> &Arc<SigningMailbox> {
        &self.mailbox
    }

    /// Address of the relay page the user must open, once the server runs.
    pub fn page_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    /// Obtain one signature over `message`. Blocks until the browser
    /// responds or the configured deadline passes.
    ///
    /// The result is accepted only if its message equals `message` byte for
    /// byte and, when `expected_address` is given, it was signed by that
    /// address. On mismatch the request stays published so the user can
    /// retry from the browser side.
    pub fn request(
        &self,
        message: &str,
        description: &str,
        expected_address: Option<&Address>,
    ) -> Result<String, WalletError> {
        Ok(self
            .request_full(message, description, expected_address)?
            .signature)
    }

    /// Like [`SigningSession::request`] but returns the whole result, so
    /// callers can also learn which address signed (the connect handshake
    /// needs this).
    pub fn request_full(
        &self,
        message: &str,
        description: &str,
        expected_address: Option<&Address>,
    ) -> Result<SigningResult, WalletError> {
        let addr = self.server.ensure_running()?;
        self.mailbox.publish(SigningRequest {
            message: message.to_string(),
            description: description.to_string(),
        });

        info!(description, "waiting for browser signature");
        println!(
            "Please go to 'http://{}/' to sign: {}",
            addr, description
        );

        let result = match self.mailbox.await_result(self.timeout) {
            Ok(result) => result,
            Err(e) => {
                // Nobody is waiting anymore; take the request down.
                self.mailbox.clear();
                return Err(e);
            }
        };

        if result.message != message {
            return Err(WalletError::SigningValidation {
                field: "message",
                expected: message.to_string(),
                actual: result.message,
            });
        }
        if let Some(expected) = expected_address {
            let reported = Address::parse(&result.address).map_err(|_| {
                WalletError::SigningValidation {
                    field: "address",
                    expected: expected.to_string(),
                    actual: result.address.clone(),
                }
            })?;
            if reported != *expected {
                return Err(WalletError::SigningValidation {
                    field: "address",
                    expected: expected.to_string(),
                    actual: reported.to_string(),
                });
            }
        }

        self.mailbox.clear();
        Ok(result)
    }

    /// Stop the relay server. Safe to call even if it never started.
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}
