//! Configuration loaded from `config.toml`, with per-field defaults so a
//! missing or partial file still yields a working setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::cipher::DEFAULT_PBKDF2_ITERATIONS;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WalletConfig {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Where vault records live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "VaultConfig::default_directory")]
    pub directory: PathBuf,
}

impl VaultConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from(".")
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
        }
    }
}

/// Where the signing relay listens. Loopback only by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "RelayConfig::default_host")]
    pub host: String,
    #[serde(default = "RelayConfig::default_port")]
    pub port: u16,
}

impl RelayConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }
    fn default_port() -> u16 {
        8080
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// PBKDF2 iteration count for vault key derivation.
    #[serde(default = "SecurityConfig::default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    /// How long a signing session waits for the browser before giving up.
    #[serde(default = "SecurityConfig::default_signing_timeout_secs")]
    pub signing_timeout_secs: u64,
}

impl SecurityConfig {
    fn default_pbkdf2_iterations() -> u32 {
        DEFAULT_PBKDF2_ITERATIONS
    }
    fn default_signing_timeout_secs() -> u64 {
        300
    }

    pub fn signing_timeout(&self) -> Duration {
        Duration::from_secs(self.signing_timeout_secs)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: Self::default_pbkdf2_iterations(),
            signing_timeout_secs: Self::default_signing_timeout_secs(),
        }
    }
}

impl WalletConfig {
    /// Parse `path` if it exists, falling back to defaults on a missing
    /// file. A file that exists but does not parse is reported, not hidden
    /// behind defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
