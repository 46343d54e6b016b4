//! End-to-end encryption and signature flows through the key store and engine.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use common::{ephemeral_backend, generate, TEST_KEY_BITS};
use rsakit_core::keychain::ApiGeneration;
use rsakit_core::{CipherEngine, CipherError, KeyPairOptions, KeyStore};
use test_case::test_case;

const BLOCK_SIZE: usize = TEST_KEY_BITS / 8;

#[test]
fn test_hello_world_scenario() {
    let backend = ephemeral_backend(ApiGeneration::Modern);
    let store = KeyStore::new(backend.clone());
    let pair = store
        .generate_key_pair("t1", "t2", &KeyPairOptions::default())
        .expect("generate 2048-bit pair");
    let engine = CipherEngine::for_backend(backend.as_ref());

    let ciphertext = engine.encrypt(&pair.public, "hello world").unwrap();
    assert_eq!(STANDARD.decode(&ciphertext).unwrap().len(), 256);
    assert_eq!(engine.decrypt(&pair.private, &ciphertext).unwrap(), "hello world");

    let signature = engine.sign(&pair.private, "hello world").unwrap();
    assert!(engine.verify(&pair.public, "hello world", &signature).unwrap());
    assert!(!engine.verify(&pair.public, "hello worlD", &signature).unwrap());

    // keys fetched by label behave like the ones returned at generation
    let public = store.public_key("t2").unwrap();
    let private = store.private_key("t1").unwrap();
    let ciphertext = engine.encrypt(&public, "again").unwrap();
    assert_eq!(engine.decrypt(&private, &ciphertext).unwrap(), "again");
}

#[test_case(ApiGeneration::Modern, ApiGeneration::Legacy ; "modern to legacy")]
#[test_case(ApiGeneration::Legacy, ApiGeneration::Modern ; "legacy to modern")]
fn test_paths_interoperate(producer: ApiGeneration, consumer: ApiGeneration) {
    let backend = ephemeral_backend(ApiGeneration::Modern);
    let pair = generate(&backend, "interop");
    let producer = CipherEngine::new(producer);
    let consumer = CipherEngine::new(consumer);
    let message = "x".repeat(3 * BLOCK_SIZE);

    let ciphertext = producer.encrypt(&pair.public, &message).unwrap();
    assert_eq!(consumer.decrypt(&pair.private, &ciphertext).unwrap(), message);

    let signature = producer.sign(&pair.private, &message).unwrap();
    assert!(consumer.verify(&pair.public, &message, &signature).unwrap());

    // PKCS#1 v1.5 signatures are deterministic, so both paths agree byte for byte
    assert_eq!(consumer.sign(&pair.private, &message).unwrap(), signature);
}

#[test]
fn test_ciphertext_length_formula() {
    let backend = ephemeral_backend(ApiGeneration::Modern);
    let pair = generate(&backend, "lengths");
    let engine = CipherEngine::for_backend(backend.as_ref());
    let chunk = BLOCK_SIZE - 11;

    for len in [0, 1, chunk - 1, chunk, chunk + 1, 2 * chunk, 2 * chunk + 5, 5 * chunk + 3] {
        let plaintext = "z".repeat(len);
        let ciphertext = engine.encrypt(&pair.public, &plaintext).unwrap();
        let blocks = len.div_ceil(chunk).max(1);
        assert_eq!(
            STANDARD.decode(&ciphertext).unwrap().len(),
            blocks * BLOCK_SIZE,
            "length {len}"
        );
        assert_eq!(engine.decrypt(&pair.private, &ciphertext).unwrap(), plaintext);
    }
}

#[test]
fn test_encryption_is_randomized() {
    let backend = ephemeral_backend(ApiGeneration::Modern);
    let pair = generate(&backend, "random");
    let engine = CipherEngine::for_backend(backend.as_ref());
    let first = engine.encrypt(&pair.public, "same").unwrap();
    let second = engine.encrypt(&pair.public, "same").unwrap();
    assert_ne!(first, second);
}

#[test]
fn test_decrypt_with_other_key_fails() {
    let backend = ephemeral_backend(ApiGeneration::Modern);
    let alice = generate(&backend, "alice");
    let bob = generate(&backend, "bob");
    let engine = CipherEngine::for_backend(backend.as_ref());

    let ciphertext = engine.encrypt(&alice.public, "for alice").unwrap();
    assert!(matches!(
        engine.decrypt(&bob.private, &ciphertext),
        Err(CipherError::DecryptFailed(_))
    ));

    let signature = engine.sign(&alice.private, "from alice").unwrap();
    assert!(!engine.verify(&bob.public, "from alice", &signature).unwrap());
}

#[test]
fn test_truncated_ciphertext_is_data_corrupted() {
    let backend = ephemeral_backend(ApiGeneration::Legacy);
    let pair = generate(&backend, "ragged");
    let engine = CipherEngine::for_backend(backend.as_ref());

    let ciphertext = engine.encrypt(&pair.public, &"y".repeat(200)).unwrap();
    let mut bytes = STANDARD.decode(&ciphertext).unwrap();
    bytes.pop();
    assert_eq!(
        engine.decrypt(&pair.private, &STANDARD.encode(&bytes)),
        Err(CipherError::DataCorrupted)
    );
}
