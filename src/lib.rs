//! Non-custodial signing core for a layer-2 NFT marketplace.
//!
//! Two halves:
//! - a password-encrypted key vault (`core::vault`) for users who keep the
//!   raw private key on disk, and
//! - a loopback browser-signing relay (`relay`) for users whose key lives
//!   in a browser wallet extension and never leaves it.
//!
//! Both paths end in the same place: a hex-encoded personal-message
//! signature the marketplace REST layer can forward as-is.

pub mod core;
pub mod crypto;
pub mod relay;
