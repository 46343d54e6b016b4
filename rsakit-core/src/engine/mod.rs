//! Block-chunked RSA encryption and whole-message PKCS#1 v1.5 signatures.
//!
//! RSA with PKCS#1 v1.5 padding can only encrypt `block_size - 11` bytes at a
//! time. The engine splits longer plaintexts into chunks, encrypts each into a
//! fixed-width `block_size` block, and concatenates the blocks before base64
//! encoding. Decryption reverses this. Signatures are never chunked.
//!
//! The engine owns no keys and never talks to the key store; callers pass the
//! [`KeyHandle`]s they obtained elsewhere.

mod strategy;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

pub use strategy::{LegacyStrategy, ModernStrategy, RsaStrategy};

use crate::digest::{MessageDigest, Sha256Digest};
use crate::error::CipherError;
use crate::keychain::{ApiGeneration, KeyHandle, Padding, SecureStorage, Status};

/// Encrypts, decrypts, signs and verifies through one backend API generation.
///
/// # Examples
///
/// ```rust
/// use rsakit_core::engine::CipherEngine;
/// use rsakit_core::keychain::software::SoftwareKeychain;
/// use rsakit_core::{KeyPairOptions, KeyStore};
/// use std::sync::Arc;
///
/// let backend = Arc::new(SoftwareKeychain::ephemeral());
/// let store = KeyStore::new(backend.clone());
/// let options = KeyPairOptions { key_size_bits: 1024, ..KeyPairOptions::default() };
/// let pair = store.generate_key_pair("doc.priv", "doc.pub", &options).unwrap();
///
/// let engine = CipherEngine::for_backend(backend.as_ref());
/// let ciphertext = engine.encrypt(&pair.public, "hello").unwrap();
/// assert_eq!(engine.decrypt(&pair.private, &ciphertext).unwrap(), "hello");
/// ```
#[derive(Clone)]
pub struct CipherEngine {
    api_generation: ApiGeneration,
    strategy: Arc<dyn RsaStrategy>,
}

impl std::fmt::Debug for CipherEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherEngine")
            .field("api_generation", &self.api_generation)
            .finish_non_exhaustive()
    }
}

impl CipherEngine {
    /// Creates an engine for `api_generation`, hashing with SHA-256 on the legacy path.
    #[must_use]
    pub fn new(api_generation: ApiGeneration) -> Self {
        Self::build(api_generation, Arc::new(Sha256Digest))
    }

    /// Creates an engine matching the primitives `backend` offers.
    #[must_use]
    pub fn for_backend(backend: &dyn SecureStorage) -> Self {
        Self::new(backend.api_generation())
    }

    /// Replaces the digest used before legacy raw signing and verification.
    #[must_use]
    pub fn with_digest(self, digest: Arc<dyn MessageDigest>) -> Self {
        Self::build(self.api_generation, digest)
    }

    fn build(api_generation: ApiGeneration, digest: Arc<dyn MessageDigest>) -> Self {
        let strategy: Arc<dyn RsaStrategy> = match api_generation {
            ApiGeneration::Modern => Arc::new(ModernStrategy),
            ApiGeneration::Legacy => Arc::new(LegacyStrategy::new(digest)),
        };
        Self {
            api_generation,
            strategy,
        }
    }

    /// The API generation this engine drives.
    #[must_use]
    pub const fn api_generation(&self) -> ApiGeneration {
        self.api_generation
    }

    /// Encrypts UTF-8 text of any length and returns the base64 ciphertext.
    ///
    /// The output decodes to `max(1, ceil(len / (block_size - 11)))` blocks of
    /// exactly `block_size` bytes each. Empty input still yields one block.
    ///
    /// # Errors
    ///
    /// - [`CipherError::DataCorrupted`] if `plaintext` is not valid UTF-8.
    /// - [`CipherError::EncryptFailed`] if any block fails; no partial output
    ///   is returned.
    pub fn encrypt<T>(&self, public_key: &KeyHandle, plaintext: &T) -> Result<String, CipherError>
    where
        T: AsRef<[u8]> + ?Sized,
    {
        let plaintext = utf8(plaintext.as_ref())?.as_bytes();
        let block_size = public_key.block_size();
        let chunk_size = block_size
            .checked_sub(Padding::PKCS1_OVERHEAD)
            .filter(|size| *size > 0)
            .ok_or(CipherError::EncryptFailed(Status::PARAM))?;

        let chunks: Vec<&[u8]> = if plaintext.is_empty() {
            vec![plaintext]
        } else {
            plaintext.chunks(chunk_size).collect()
        };

        let mut ciphertext = Vec::with_capacity(chunks.len() * block_size);
        for (index, chunk) in chunks.iter().enumerate() {
            let block = self
                .strategy
                .encrypt_block(public_key, chunk)
                .map_err(|status| {
                    log::debug!("encrypting block {index} failed with status {status}");
                    CipherError::EncryptFailed(status)
                })?;
            if block.len() != block_size {
                log::warn!(
                    "backend returned a {}-byte block, expected {block_size}",
                    block.len()
                );
                return Err(CipherError::EncryptFailed(Status::INTERNAL_COMPONENT));
            }
            ciphertext.extend_from_slice(&block);
        }

        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypts base64 ciphertext produced by [`CipherEngine::encrypt`].
    ///
    /// # Errors
    ///
    /// - [`CipherError::DataCorrupted`] if the input is not base64, is empty,
    ///   is not a whole number of blocks, or decrypts to invalid UTF-8.
    /// - [`CipherError::DecryptFailed`] if the backend rejects a block.
    pub fn decrypt<T>(&self, private_key: &KeyHandle, ciphertext: &T) -> Result<String, CipherError>
    where
        T: AsRef<[u8]> + ?Sized,
    {
        let data = STANDARD
            .decode(ciphertext.as_ref())
            .map_err(|_| CipherError::DataCorrupted)?;
        let block_size = private_key.block_size();
        if block_size == 0 || data.is_empty() || data.len() % block_size != 0 {
            log::debug!(
                "ciphertext of {} bytes is not a whole number of {block_size}-byte blocks",
                data.len()
            );
            return Err(CipherError::DataCorrupted);
        }

        let mut plaintext = Vec::with_capacity(data.len());
        for (index, block) in data.chunks_exact(block_size).enumerate() {
            let chunk = self
                .strategy
                .decrypt_block(private_key, block)
                .map_err(|status| {
                    log::debug!("decrypting block {index} failed with status {status}");
                    CipherError::DecryptFailed(status)
                })?;
            plaintext.extend_from_slice(&chunk);
        }

        String::from_utf8(plaintext).map_err(|_| CipherError::DataCorrupted)
    }

    /// Signs the whole message and returns the base64 signature.
    ///
    /// # Errors
    ///
    /// - [`CipherError::DataCorrupted`] if `message` is not valid UTF-8.
    /// - [`CipherError::SigningFailed`] if the backend cannot sign.
    pub fn sign<T>(&self, private_key: &KeyHandle, message: &T) -> Result<String, CipherError>
    where
        T: AsRef<[u8]> + ?Sized,
    {
        let message = utf8(message.as_ref())?;
        let signature = self
            .strategy
            .sign(private_key, message.as_bytes())
            .map_err(|status| {
                log::debug!("signing failed with status {status}");
                CipherError::SigningFailed(status)
            })?;
        Ok(STANDARD.encode(signature))
    }

    /// Checks a base64 signature over the whole message.
    ///
    /// Any backend failure, an invalid signature included, reports `false`.
    ///
    /// # Errors
    ///
    /// [`CipherError::DataCorrupted`] if `message` is not valid UTF-8 or
    /// `signature` is not valid base64.
    pub fn verify<M, S>(
        &self,
        public_key: &KeyHandle,
        message: &M,
        signature: &S,
    ) -> Result<bool, CipherError>
    where
        M: AsRef<[u8]> + ?Sized,
        S: AsRef<[u8]> + ?Sized,
    {
        let message = utf8(message.as_ref())?;
        let signature = STANDARD
            .decode(signature.as_ref())
            .map_err(|_| CipherError::DataCorrupted)?;
        match self
            .strategy
            .verify(public_key, message.as_bytes(), &signature)
        {
            Ok(()) => Ok(true),
            Err(status) => {
                log::debug!("signature rejected with status {status}");
                Ok(false)
            }
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, CipherError> {
    std::str::from_utf8(bytes).map_err(|_| CipherError::DataCorrupted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::software::SoftwareKeychain;
    use crate::keychain::{
        AccessPolicy, Algorithm, BackendResult, GenerationRequest, KeyRole, KeyType,
        PersistentAttributes, PlatformKey, Protection,
    };
    use test_case::test_case;

    const BITS: usize = 1024;
    const BS: usize = BITS / 8;

    fn key_pair(api_generation: ApiGeneration) -> (KeyHandle, KeyHandle) {
        let keychain = SoftwareKeychain::ephemeral().with_api_generation(api_generation);
        keychain
            .generate_key_pair(&GenerationRequest {
                key_type: KeyType::Rsa,
                key_size_bits: BITS,
                private_attributes: PersistentAttributes::permanent("engine.priv"),
                public_attributes: PersistentAttributes::permanent("engine.pub"),
                protection: Protection::Accessible(AccessPolicy::default()),
            })
            .unwrap()
    }

    /// Key whose encryption returns a fixed result.
    #[derive(Debug)]
    struct StubKey {
        encrypted: Result<Vec<u8>, Status>,
    }

    impl PlatformKey for StubKey {
        fn role(&self) -> KeyRole {
            KeyRole::Public
        }

        fn block_size(&self) -> usize {
            BS
        }

        fn label(&self) -> Option<&str> {
            None
        }

        fn create_encrypted_data(&self, _: Algorithm, _: &[u8]) -> BackendResult<Vec<u8>> {
            self.encrypted.clone().map_err(Into::into)
        }

        fn create_decrypted_data(&self, _: Algorithm, _: &[u8]) -> BackendResult<Vec<u8>> {
            Err(Status::UNIMPLEMENTED.into())
        }

        fn create_signature(&self, _: Algorithm, _: &[u8]) -> BackendResult<Vec<u8>> {
            Err(Status::UNIMPLEMENTED.into())
        }

        fn verify_signature(&self, _: Algorithm, _: &[u8], _: &[u8]) -> BackendResult<()> {
            Err(Status::UNIMPLEMENTED.into())
        }

        fn raw_encrypt(&self, _: Padding, _: &[u8], output: &mut [u8]) -> Result<usize, Status> {
            let encrypted = self.encrypted.clone()?;
            output[..encrypted.len()].copy_from_slice(&encrypted);
            Ok(encrypted.len())
        }

        fn raw_decrypt(&self, _: Padding, _: &[u8], _: &mut [u8]) -> Result<usize, Status> {
            Err(Status::UNIMPLEMENTED)
        }

        fn raw_sign(&self, _: Padding, _: &[u8], _: &mut [u8]) -> Result<usize, Status> {
            Err(Status::UNIMPLEMENTED)
        }

        fn raw_verify(&self, _: Padding, _: &[u8], _: &[u8]) -> Result<(), Status> {
            Err(Status::UNIMPLEMENTED)
        }
    }

    fn stub(encrypted: Result<Vec<u8>, Status>) -> KeyHandle {
        KeyHandle::new(Arc::new(StubKey { encrypted }))
    }

    #[test_case(ApiGeneration::Modern, 0, 1 ; "modern empty")]
    #[test_case(ApiGeneration::Modern, 1, 1 ; "modern one byte")]
    #[test_case(ApiGeneration::Modern, BS - 12, 1 ; "modern one under chunk")]
    #[test_case(ApiGeneration::Modern, BS - 11, 1 ; "modern exact chunk")]
    #[test_case(ApiGeneration::Modern, BS - 10, 2 ; "modern one over chunk")]
    #[test_case(ApiGeneration::Modern, 2 * (BS - 11), 2 ; "modern two chunks")]
    #[test_case(ApiGeneration::Modern, 2 * (BS - 11) + 5, 3 ; "modern two chunks and a tail")]
    #[test_case(ApiGeneration::Legacy, 0, 1 ; "legacy empty")]
    #[test_case(ApiGeneration::Legacy, 1, 1 ; "legacy one byte")]
    #[test_case(ApiGeneration::Legacy, BS - 12, 1 ; "legacy one under chunk")]
    #[test_case(ApiGeneration::Legacy, BS - 11, 1 ; "legacy exact chunk")]
    #[test_case(ApiGeneration::Legacy, BS - 10, 2 ; "legacy one over chunk")]
    #[test_case(ApiGeneration::Legacy, 2 * (BS - 11), 2 ; "legacy two chunks")]
    #[test_case(ApiGeneration::Legacy, 2 * (BS - 11) + 5, 3 ; "legacy two chunks and a tail")]
    fn test_round_trip_lengths(api_generation: ApiGeneration, len: usize, blocks: usize) {
        let (public, private) = key_pair(api_generation);
        let engine = CipherEngine::new(api_generation);
        let plaintext = "a".repeat(len);

        let ciphertext = engine.encrypt(&public, &plaintext).unwrap();
        assert_eq!(STANDARD.decode(&ciphertext).unwrap().len(), blocks * BS);
        assert_eq!(engine.decrypt(&private, &ciphertext).unwrap(), plaintext);
    }

    #[test_case(ApiGeneration::Modern ; "modern")]
    #[test_case(ApiGeneration::Legacy ; "legacy")]
    fn test_multibyte_text_round_trip(api_generation: ApiGeneration) {
        let (public, private) = key_pair(api_generation);
        let engine = CipherEngine::new(api_generation);
        // chunk boundaries may split code points; only the joined output is UTF-8
        let plaintext = "grüße, 世界! ".repeat(30);
        let ciphertext = engine.encrypt(&public, plaintext.as_str()).unwrap();
        assert_eq!(engine.decrypt(&private, &ciphertext).unwrap(), plaintext);
    }

    #[test_case(ApiGeneration::Modern ; "modern")]
    #[test_case(ApiGeneration::Legacy ; "legacy")]
    fn test_sign_and_verify(api_generation: ApiGeneration) {
        let (public, private) = key_pair(api_generation);
        let engine = CipherEngine::new(api_generation);
        assert_eq!(engine.api_generation(), api_generation);

        let signature = engine.sign(&private, "message").unwrap();
        assert_eq!(STANDARD.decode(&signature).unwrap().len(), BS);
        assert!(engine.verify(&public, "message", &signature).unwrap());
        assert!(!engine.verify(&public, "messagE", &signature).unwrap());

        let raw = STANDARD.decode(&signature).unwrap();
        for index in [0, BS / 2, BS - 1] {
            let mut tampered = raw.clone();
            tampered[index] ^= 0x01;
            assert!(
                !engine
                    .verify(&public, "message", &STANDARD.encode(tampered))
                    .unwrap(),
                "flipping byte {index} must break the signature"
            );
        }
    }

    #[test]
    fn test_malformed_input_is_data_corrupted() {
        let (public, private) = key_pair(ApiGeneration::Modern);
        let engine = CipherEngine::new(ApiGeneration::Modern);
        let invalid_utf8: &[u8] = &[0xff, 0xfe];

        assert_eq!(
            engine.encrypt(&public, invalid_utf8),
            Err(CipherError::DataCorrupted)
        );
        assert_eq!(
            engine.decrypt(&private, "not base64!"),
            Err(CipherError::DataCorrupted)
        );
        assert_eq!(engine.decrypt(&private, ""), Err(CipherError::DataCorrupted));
        assert_eq!(
            engine.decrypt(&private, &STANDARD.encode([0u8; BS + 1])),
            Err(CipherError::DataCorrupted)
        );
        assert_eq!(
            engine.sign(&private, invalid_utf8),
            Err(CipherError::DataCorrupted)
        );
        assert_eq!(
            engine.verify(&public, "message", "%%%"),
            Err(CipherError::DataCorrupted)
        );
        assert_eq!(
            engine.verify(&public, invalid_utf8, "AAAA"),
            Err(CipherError::DataCorrupted)
        );
    }

    #[test]
    fn test_non_utf8_plaintext_after_decrypt_is_data_corrupted() {
        let (public, private) = key_pair(ApiGeneration::Modern);
        let block = public
            .platform_key()
            .create_encrypted_data(Algorithm::RsaEncryptionPkcs1, &[0xc3])
            .unwrap();
        let engine = CipherEngine::new(ApiGeneration::Modern);
        assert_eq!(
            engine.decrypt(&private, &STANDARD.encode(block)),
            Err(CipherError::DataCorrupted)
        );
    }

    #[test]
    fn test_garbage_block_fails_decryption() {
        let (_, private) = key_pair(ApiGeneration::Legacy);
        let engine = CipherEngine::new(ApiGeneration::Legacy);
        let result = engine.decrypt(&private, &STANDARD.encode([0x5au8; BS]));
        assert!(matches!(result, Err(CipherError::DecryptFailed(_))));
    }

    #[test]
    fn test_wrong_key_role_fails() {
        let (public, private) = key_pair(ApiGeneration::Modern);
        let engine = CipherEngine::new(ApiGeneration::Modern);
        assert_eq!(
            engine.encrypt(&private, "x"),
            Err(CipherError::EncryptFailed(Status::PARAM))
        );
        assert_eq!(
            engine.sign(&public, "x"),
            Err(CipherError::SigningFailed(Status::PARAM))
        );
    }

    #[test_case(ApiGeneration::Modern ; "modern")]
    #[test_case(ApiGeneration::Legacy ; "legacy")]
    fn test_block_failure_returns_no_output(api_generation: ApiGeneration) {
        let engine = CipherEngine::new(api_generation);
        let key = stub(Err(Status::DECODE));
        assert_eq!(
            engine.encrypt(&key, "hello"),
            Err(CipherError::EncryptFailed(Status::DECODE))
        );
    }

    #[test_case(ApiGeneration::Modern ; "modern")]
    #[test_case(ApiGeneration::Legacy ; "legacy")]
    fn test_short_block_is_rejected(api_generation: ApiGeneration) {
        let engine = CipherEngine::new(api_generation);
        let key = stub(Ok(vec![0u8; BS - 1]));
        assert_eq!(
            engine.encrypt(&key, "hello"),
            Err(CipherError::EncryptFailed(Status::INTERNAL_COMPONENT))
        );
    }

    #[test]
    fn test_custom_digest_is_used_on_legacy_path() {
        struct Zeros;
        impl MessageDigest for Zeros {
            fn digest(&self, _message: &[u8]) -> Vec<u8> {
                vec![0u8; 32]
            }
        }

        let (public, private) = key_pair(ApiGeneration::Legacy);
        let engine = CipherEngine::new(ApiGeneration::Legacy).with_digest(Arc::new(Zeros));
        let signature = engine.sign(&private, "one").unwrap();
        // every message hashes alike, so the signature covers any message
        assert!(engine.verify(&public, "two", &signature).unwrap());
        assert!(!CipherEngine::new(ApiGeneration::Legacy)
            .verify(&public, "two", &signature)
            .unwrap());
    }
}
