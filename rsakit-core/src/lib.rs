//! `rsakit` provides RSA encryption, decryption, signing and verification that
//! correctly handles messages larger than one RSA block, plus a key store that
//! generates, persists, retrieves and deletes RSA key pairs under an
//! access-control policy.
//!
//! The [`KeyStore`] and the [`CipherEngine`] never touch key bytes. Both work
//! through a [`keychain::SecureStorage`] backend: a Rust implementation over a
//! platform keychain, or the bundled [`keychain::software::SoftwareKeychain`].
//!
//! The `ffi` feature derives `UniFFI` bindings for the error types, the access
//! policy and the logger bridge only. Backends are plugged in from Rust.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod digest;
pub mod engine;
pub mod keychain;
pub mod logger;

mod error;
pub use error::*;

mod key_store;
pub use key_store::*;

pub use engine::CipherEngine;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("rsakit_core");
