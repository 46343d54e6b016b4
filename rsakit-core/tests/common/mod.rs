//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use rsakit_core::keychain::software::SoftwareKeychain;
use rsakit_core::keychain::{ApiGeneration, AtomicBlobStore, FileBlobStore};
use rsakit_core::{KeyPair, KeyPairOptions, KeyStore};
use uuid::Uuid;

/// Small keys keep generation fast; the engine does not care about the size.
pub const TEST_KEY_BITS: usize = 1024;

pub fn fast_options() -> KeyPairOptions {
    KeyPairOptions {
        key_size_bits: TEST_KEY_BITS,
        ..KeyPairOptions::default()
    }
}

/// Returns a `(private, public)` label pair unique to this call.
pub fn unique_labels(prefix: &str) -> (String, String) {
    let id = Uuid::new_v4();
    (format!("{prefix}.{id}.priv"), format!("{prefix}.{id}.pub"))
}

pub fn ephemeral_backend(api_generation: ApiGeneration) -> Arc<SoftwareKeychain> {
    Arc::new(SoftwareKeychain::ephemeral().with_api_generation(api_generation))
}

pub fn file_backend(
    dir: &std::path::Path,
    api_generation: ApiGeneration,
) -> Arc<SoftwareKeychain> {
    let store: Arc<dyn AtomicBlobStore> =
        Arc::new(FileBlobStore::new(dir).expect("create file blob store"));
    Arc::new(
        SoftwareKeychain::open(store)
            .expect("open keychain")
            .with_api_generation(api_generation),
    )
}

/// Generates a fresh pair on `backend` with unique labels.
pub fn generate(backend: &Arc<SoftwareKeychain>, prefix: &str) -> KeyPair {
    let (private_label, public_label) = unique_labels(prefix);
    KeyStore::new(backend.clone())
        .generate_key_pair(&private_label, &public_label, &fast_options())
        .expect("generate key pair")
}
