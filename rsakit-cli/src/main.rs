//! `rsakit` developer CLI.
//!
//! Drives the key store and cipher engine against a software keychain
//! persisted in a directory.
//!
//! ```bash
//! rsakit keygen --private-label app.priv --public-label app.pub
//! rsakit encrypt --public-label app.pub "hello world" > secret.txt
//! rsakit decrypt --private-label app.priv "$(cat secret.txt)"
//! rsakit sign --private-label app.priv "hello world"
//! rsakit verify --public-label app.pub "hello world" <SIGNATURE>
//! rsakit --legacy sign --private-label app.priv -   # message from stdin
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr};
use rsakit_core::keychain::software::SoftwareKeychain;
use rsakit_core::keychain::{AccessFlags, AccessPolicy, ApiGeneration, FileBlobStore};
use rsakit_core::{CipherEngine, KeyPairOptions, KeyStore, DEFAULT_KEY_SIZE_BITS};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const KEYCHAIN_DIR_ENV: &str = "RSAKIT_KEYCHAIN_DIR";

#[derive(Parser, Debug)]
#[command(name = "rsakit", version, about = "Chunked RSA encryption and signatures")]
struct Cli {
    /// Directory holding the keychain (defaults to the platform data directory)
    #[arg(long, global = true, env = KEYCHAIN_DIR_ENV)]
    keychain_dir: Option<PathBuf>,

    /// Emulate a backend that only offers the legacy raw primitives
    #[arg(long, global = true)]
    legacy: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and store a key pair
    Keygen {
        /// Label for the private key
        #[arg(long)]
        private_label: String,
        /// Label for the public key
        #[arg(long)]
        public_label: String,
        /// Modulus size in bits
        #[arg(long, default_value_t = DEFAULT_KEY_SIZE_BITS)]
        bits: usize,
        /// Accessibility policy, e.g. `WhenUnlocked` or `AfterFirstUnlockThisDeviceOnly`
        #[arg(long, default_value_t = AccessPolicy::default())]
        policy: AccessPolicy,
        /// Use-time constraints, e.g. `biometry-any|or|device-passcode`
        #[arg(long)]
        flags: Option<AccessFlags>,
    },
    /// Encrypt text with a stored public key, printing base64
    Encrypt {
        /// Label of the public key
        #[arg(long)]
        public_label: String,
        /// Plaintext, or `-` to read stdin
        text: String,
    },
    /// Decrypt base64 ciphertext with a stored private key
    Decrypt {
        /// Label of the private key
        #[arg(long)]
        private_label: String,
        /// Base64 ciphertext, or `-` to read stdin
        ciphertext: String,
    },
    /// Sign a message with a stored private key, printing base64
    Sign {
        /// Label of the private key
        #[arg(long)]
        private_label: String,
        /// Message, or `-` to read stdin
        message: String,
    },
    /// Verify a base64 signature; exits non-zero when it does not verify
    Verify {
        /// Label of the public key
        #[arg(long)]
        public_label: String,
        /// Message, or `-` to read stdin
        message: String,
        /// Base64 signature
        signature: String,
    },
    /// Delete a key pair
    Delete {
        /// Label of the private key
        #[arg(long)]
        private_label: String,
        /// Label of the public key
        #[arg(long)]
        public_label: String,
    },
    /// Write migratable keys to a backup file
    Backup {
        /// Destination file
        #[arg(long)]
        out: PathBuf,
    },
    /// Import keys from a backup file
    Restore {
        /// Backup file
        #[arg(long = "in")]
        input: PathBuf,
    },
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let keychain = open_keychain(&cli)?;
    run(cli.command, &keychain)
}

fn open_keychain(cli: &Cli) -> eyre::Result<Arc<SoftwareKeychain>> {
    let directory = match &cli.keychain_dir {
        Some(directory) => directory.clone(),
        None => dirs::data_local_dir()
            .ok_or_else(|| {
                eyre!("no data directory; pass --keychain-dir or set {KEYCHAIN_DIR_ENV}")
            })?
            .join("rsakit"),
    };
    debug!(directory = %directory.display(), legacy = cli.legacy, "opening keychain");

    let store = FileBlobStore::new(&directory)
        .wrap_err_with(|| format!("cannot open keychain directory {}", directory.display()))?;
    let api_generation = if cli.legacy {
        ApiGeneration::Legacy
    } else {
        ApiGeneration::Modern
    };
    let keychain = SoftwareKeychain::open(Arc::new(store))
        .wrap_err("cannot load keychain")?
        .with_api_generation(api_generation);
    Ok(Arc::new(keychain))
}

fn run(command: Command, keychain: &Arc<SoftwareKeychain>) -> eyre::Result<()> {
    let store = KeyStore::new(keychain.clone());
    let engine = CipherEngine::for_backend(keychain.as_ref());

    match command {
        Command::Keygen {
            private_label,
            public_label,
            bits,
            policy,
            flags,
        } => {
            let options = KeyPairOptions {
                key_size_bits: bits,
                policy,
                flags,
            };
            let pair = store.generate_key_pair(&private_label, &public_label, &options)?;
            info!(bits = pair.public.key_size_bits(), "key pair generated");
            println!("generated {bits}-bit key pair '{private_label}' / '{public_label}'");
        }
        Command::Encrypt { public_label, text } => {
            let key = store.public_key(&public_label)?;
            println!("{}", engine.encrypt(&key, &read_arg(text)?)?);
        }
        Command::Decrypt {
            private_label,
            ciphertext,
        } => {
            let key = store.private_key(&private_label)?;
            let ciphertext = read_arg(ciphertext)?;
            println!("{}", engine.decrypt(&key, ciphertext.trim())?);
        }
        Command::Sign {
            private_label,
            message,
        } => {
            let key = store.private_key(&private_label)?;
            println!("{}", engine.sign(&key, &read_arg(message)?)?);
        }
        Command::Verify {
            public_label,
            message,
            signature,
        } => {
            let key = store.public_key(&public_label)?;
            if engine.verify(&key, &read_arg(message)?, signature.trim())? {
                println!("valid");
            } else {
                return Err(eyre!("signature does not verify"));
            }
        }
        Command::Delete {
            private_label,
            public_label,
        } => {
            let report = store.delete_key_pair(&private_label, &public_label);
            if !report.is_clean() {
                warn!(?report, "key pair only partially deleted");
                return Err(eyre!("deletion incomplete: {report:?}"));
            }
            println!("deleted '{private_label}' / '{public_label}'");
        }
        Command::Backup { out } => {
            let backup = keychain.backup()?;
            std::fs::write(&out, backup)
                .wrap_err_with(|| format!("cannot write {}", out.display()))?;
            println!("backup written to {}", out.display());
        }
        Command::Restore { input } => {
            let backup = std::fs::read(&input)
                .wrap_err_with(|| format!("cannot read {}", input.display()))?;
            let restored = keychain.restore(&backup)?;
            println!("restored {restored} key(s)");
        }
    }
    Ok(())
}

/// Returns `value`, or all of stdin when `value` is `-`.
fn read_arg(value: String) -> eyre::Result<String> {
    if value != "-" {
        return Ok(value);
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .wrap_err("cannot read stdin")?;
    Ok(buffer)
}
