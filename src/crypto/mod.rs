pub mod cipher;
pub mod keys;

pub use cipher::KeyCipher;
pub use keys::{Address, PrivateKey};
