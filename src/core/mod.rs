pub mod config;
pub mod errors;
pub mod signer;
pub mod vault;

pub use config::WalletConfig;
pub use errors::WalletError;
pub use vault::WalletVault;
