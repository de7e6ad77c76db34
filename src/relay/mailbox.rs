//! Single-slot hand-off point between the relay server thread and the
//! blocked caller.
//!
//! Two independent channels share one lock: the pending-request slot the
//! HTTP handlers read, and a FIFO of results the caller consumes. Only one
//! request is ever outstanding by design; publishing a new one overwrites
//! the slot (last writer wins). Results are never dropped here — a stale
//! result is handed to the current waiter, which validates it against the
//! current expectation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::errors::WalletError;

/// A message awaiting a browser signature, plus the human-readable purpose
/// shown on the signing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub message: String,
    pub description: String,
}

/// What the browser extension reports back after signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningResult {
    pub address: String,
    pub message: String,
    pub signature: String,
}

#[derive(Default)]
struct MailboxState {
    pending: Option<SigningRequest>,
    results: VecDeque<SigningResult>,
}

/// Thread-safe mailbox shared between the relay server and the caller.
#[derive(Default)]
pub struct SigningMailbox {
    state: Mutex<MailboxState>,
    delivered: Condvar,
}

impl SigningMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `request` the one visible to the signing page. Overwrites any
    /// request already pending.
    pub fn publish(&self, request: SigningRequest) {
        let mut state = self.state.lock();
        if let Some(previous) = &state.pending {
            warn!(
                previous = %previous.description,
                next = %request.description,
                "overwriting pending signing request"
            );
        }
        debug!(description = %request.description, "signing request published");
        state.pending = Some(request);
    }

    /// The request the signing page should currently display, if any.
    pub fn current_request(&self) -> Option<SigningRequest> {
        self.state.lock().pending.clone()
    }

    /// Clear the request slot once a session has finished with it.
    pub fn clear(&self) {
        self.state.lock().pending = None;
    }

    /// Producer side, called by the relay server on `POST /signature`.
    pub fn submit_result(&self, result: SigningResult) {
        let mut state = self.state.lock();
        debug!(address = %result.address, "signature result submitted");
        state.results.push_back(result);
        self.delivered.notify_one();
    }

    /// Consumer side: block the calling thread until a result arrives or
    /// the deadline passes. Results are delivered in submission order.
    pub fn await_result(&self, timeout: Duration) -> Result<SigningResult, WalletError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.results.pop_front() {
                return Ok(result);
            }
            if self.delivered.wait_until(&mut state, deadline).timed_out() {
                // Drain check: a result may have landed exactly at the deadline.
                if let Some(result) = state.results.pop_front() {
                    return Ok(result);
                }
                return Err(WalletError::Timeout(timeout));
            }
        }
    }
}
