pub mod mailbox;
pub mod server;
pub mod session;

pub use mailbox::{SigningMailbox, SigningRequest, SigningResult};
pub use server::RelayServer;
pub use session::SigningSession;
