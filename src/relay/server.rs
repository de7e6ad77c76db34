//! Loopback HTTP bridge between the CLI workflow and a browser wallet
//! extension.
//!
//! The server runs on its own thread with a dedicated single-threaded tokio
//! runtime, so it keeps answering requests while the workflow thread is
//! blocked in [`SigningMailbox::await_result`]. It is started lazily on the
//! first signing request and lives until shutdown or process exit.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::config::RelayConfig;
use crate::core::errors::WalletError;
use crate::relay::mailbox::{SigningMailbox, SigningResult};

/// Shown on `GET /action` when no request is pending.
const IDLE_ACTION_TEXT: &str =
    "No message available for signing, refresh the page or click 'Sign message' to check for new messages.";

const SIGNING_PAGE: &str = include_str!("signing_page.html");

enum ServerState {
    NotStarted,
    Running {
        local_addr: SocketAddr,
        shutdown: watch::Sender<bool>,
        thread: JoinHandle<()>,
    },
    Stopped,
}

/// The relay server. Owns its socket and the shared mailbox; no globals.
pub struct RelayServer {
    mailbox: Arc<SigningMailbox>,
    config: RelayConfig,
    state: Mutex<ServerState>,
}

impl RelayServer {
    pub fn new(mailbox: Arc<SigningMailbox>, config: RelayConfig) -> Self {
        Self {
            mailbox,
            config,
            state: Mutex::new(ServerState::NotStarted),
        }
    }

    /// Start the server if it has not run yet; return the bound address.
    /// Once stopped, a server does not restart.
    pub fn ensure_running(&self) -> Result<SocketAddr, WalletError> {
        let mut state = self.state.lock();
        match &*state {
            ServerState::Running { local_addr, .. } => return Ok(*local_addr),
            ServerState::Stopped => {
                return Err(WalletError::Transport(
                    "relay server already shut down".to_string(),
                ))
            }
            ServerState::NotStarted => {}
        }

        let listener = std::net::TcpListener::bind((self.config.host.as_str(), self.config.port))
            .map_err(|e| {
                WalletError::Transport(format!(
                    "cannot bind {}:{}: {}",
                    self.config.host, self.config.port, e
                ))
            })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| WalletError::Transport(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let mailbox = self.mailbox.clone();
        let thread = std::thread::Builder::new()
            .name("relay-server".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "relay runtime failed to start");
                        return;
                    }
                };
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(l) => l,
                        Err(e) => {
                            error!(error = %e, "relay listener registration failed");
                            return;
                        }
                    };
                    let app = build_router(mailbox);
                    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                        let _ = shutdown_rx.changed().await;
                    });
                    if let Err(e) = serve.await {
                        error!(error = %e, "relay server terminated abnormally");
                    }
                });
            })
            .map_err(|e| WalletError::Transport(format!("cannot spawn relay thread: {}", e)))?;

        info!(%local_addr, "relay server listening");
        *state = ServerState::Running {
            local_addr,
            shutdown,
            thread,
        };
        Ok(local_addr)
    }

    /// Address the server is bound to, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            ServerState::Running { local_addr, .. } => Some(*local_addr),
            _ => None,
        }
    }

    /// Stop the server and join its thread. Safe to call at any point in
    /// the lifecycle: a server that never started just moves to Stopped.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut *state, ServerState::Stopped);
        if let ServerState::Running {
            shutdown, thread, ..
        } = previous
        {
            let _ = shutdown.send(true);
            if thread.join().is_err() {
                error!("relay server thread panicked during shutdown");
            } else {
                info!("relay server stopped");
            }
        }
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_router(mailbox: Arc<SigningMailbox>) -> Router {
    Router::new()
        .route("/", get(signing_page))
        .route("/message", get(pending_message))
        .route("/action", get(pending_action))
        .route("/signature", post(submit_signature))
        .layer(TraceLayer::new_for_http())
        // Loopback-only service; permissive CORS lets the page fetch from
        // whatever host name the user typed (localhost vs 127.0.0.1).
        .layer(CorsLayer::permissive())
        .with_state(mailbox)
}

async fn signing_page() -> Html<&'static str> {
    Html(SIGNING_PAGE)
}

/// The exact bytes the browser wallet must sign, or empty when idle.
async fn pending_message(State(mailbox): State<Arc<SigningMailbox>>) -> String {
    mailbox
        .current_request()
        .map(|r| r.message)
        .unwrap_or_default()
}

/// Human-readable purpose of the pending request, with fallbacks mirroring
/// the signing page's expectations.
async fn pending_action(State(mailbox): State<Arc<SigningMailbox>>) -> String {
    match mailbox.current_request() {
        None => IDLE_ACTION_TEXT.to_string(),
        Some(request) if request.description.is_empty() => format!(
            "Sign the message '{}' to complete a marketplace action.",
            request.message
        ),
        Some(request) => request.description,
    }
}

async fn submit_signature(
    State(mailbox): State<Arc<SigningMailbox>>,
    Json(result): Json<SigningResult>,
) -> StatusCode {
    mailbox.submit_result(result);
    StatusCode::OK
}
