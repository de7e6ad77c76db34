//! Marketplace wallet CLI: manage vault records and obtain signatures,
//! either from a locally stored key or from a browser wallet through the
//! signing relay.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use market_wallet::core::config::WalletConfig;
use market_wallet::core::signer::{BrowserSigner, LocalSigner, Signer};
use market_wallet::core::vault::{default_record_name, WalletVault};
use market_wallet::core::WalletError;
use market_wallet::crypto::cipher::KeyCipher;
use market_wallet::crypto::keys::PrivateKey;
use market_wallet::relay::session::SigningSession;

/// Wrong-password attempts allowed before a load aborts.
const MAX_PASSWORD_ATTEMPTS: u32 = 3;

#[derive(Parser)]
#[command(name = "market-wallet")]
#[command(about = "Marketplace wallet: encrypted key vault and browser-signing relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a password-protected wallet file
    Create {
        /// Private key as hex; a fresh random key is generated when omitted
        #[arg(long)]
        key: Option<String>,
        /// Output path; defaults to wallet_<address>.wlt in the vault directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List wallet files and their addresses
    List,
    /// Show the address stored in a wallet file
    Show {
        #[arg(long)]
        file: PathBuf,
    },
    /// Sign a message with a locally stored key
    Sign {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        message: String,
    },
    /// Connect a browser wallet and sign a message through it
    Connect {
        #[arg(long)]
        message: String,
        /// Purpose text shown on the signing page
        #[arg(long, default_value = "Connect the signing wallet to the marketplace.")]
        description: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let config = WalletConfig::load_or_default(&args.config)?;
    let cipher = KeyCipher::new(config.security.pbkdf2_iterations);
    let vault = WalletVault::new(cipher);

    match args.command {
        Commands::Create { key, output } => create_wallet(&config, &vault, key, output),
        Commands::List => list_wallets(&config),
        Commands::Show { file } => {
            let address = WalletVault::read_address(&file)?;
            println!("{}", address);
            Ok(())
        }
        Commands::Sign { file, message } => sign_local(&vault, &file, &message),
        Commands::Connect {
            message,
            description,
        } => connect_browser(&config, &message, &description),
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to initialize logging")?;
    Ok(())
}

fn create_wallet(
    config: &WalletConfig,
    vault: &WalletVault,
    key_hex: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let key = match key_hex {
        Some(hex) => PrivateKey::from_hex(&hex)?,
        None => {
            info!("no key supplied, generating a fresh one");
            PrivateKey::generate()
        }
    };
    let address = key.address()?;
    println!("Storing key for address: {}", address);

    let password = prompt_new_password()?;
    let path = output
        .unwrap_or_else(|| config.vault.directory.join(default_record_name(&address)));
    vault.save(&key, &password, &path)?;
    println!(
        "Created wallet for address {} at '{}'",
        address,
        path.display()
    );
    Ok(())
}

fn list_wallets(config: &WalletConfig) -> Result<()> {
    let records = WalletVault::list_records(&config.vault.directory)?;
    if records.is_empty() {
        println!("No wallet files in '{}'", config.vault.directory.display());
        return Ok(());
    }
    for (index, (path, address)) in records.iter().enumerate() {
        println!("{}. {} ({})", index + 1, path.display(), address);
    }
    Ok(())
}

fn sign_local(vault: &WalletVault, file: &PathBuf, message: &str) -> Result<()> {
    let key = load_with_retries(vault, file)?;
    let signer = LocalSigner::new(key)?;
    let signature = signer.sign_message(message, "")?;
    println!("{}", signature);
    Ok(())
}

fn connect_browser(config: &WalletConfig, message: &str, description: &str) -> Result<()> {
    let session = SigningSession::new(config.relay.clone(), config.security.signing_timeout());
    let signer = BrowserSigner::new(session);

    let signature = signer.connect(message, description)?;
    let address = signer
        .address()
        .ok_or(WalletError::NotConnected)?;
    println!("Wallet '{}' successfully connected.", address);
    println!("{}", signature);

    signer.shutdown();
    Ok(())
}

/// Prompt for the vault password of `file`, re-prompting on a wrong
/// password up to the attempt limit.
fn load_with_retries(vault: &WalletVault, file: &PathBuf) -> Result<PrivateKey> {
    let address = WalletVault::read_address(file)?;
    for attempt in 1..=MAX_PASSWORD_ATTEMPTS {
        let password =
            rpassword::prompt_password(format!("Enter the password for wallet '{}': ", address))?;
        match vault.load(file, &password) {
            Ok(key) => return Ok(key),
            Err(e) if e.is_recoverable() && attempt < MAX_PASSWORD_ATTEMPTS => {
                println!("Incorrect password, try again.");
            }
            Err(e) => return Err(e.into()),
        }
    }
    bail!("too many wrong password attempts");
}

/// Ask for a new password twice until both entries match.
fn prompt_new_password() -> Result<String> {
    loop {
        let password = rpassword::prompt_password("Enter a password to secure the wallet with: ")?;
        if password.is_empty() {
            println!("Password cannot be empty.");
            continue;
        }
        let confirm = rpassword::prompt_password("Please re-enter the same password: ")?;
        if password == confirm {
            return Ok(password);
        }
        println!("Passwords don't match, try again.");
    }
}
