//! Per-block primitives for each backend API generation.

use std::sync::Arc;

use crate::digest::MessageDigest;
use crate::keychain::{Algorithm, BackendError, KeyHandle, Padding, Status};

/// One RSA operation at a time, expressed against a particular backend API.
///
/// Strategies hold no per-call state. The engine picks one at construction and
/// drives it block by block.
pub trait RsaStrategy: Send + Sync {
    /// Encrypts a single chunk of at most `block_size - 11` bytes.
    ///
    /// # Errors
    ///
    /// Returns the backend status if the block cannot be encrypted.
    fn encrypt_block(&self, public_key: &KeyHandle, chunk: &[u8]) -> Result<Vec<u8>, Status>;

    /// Decrypts a single `block_size`-wide block.
    ///
    /// # Errors
    ///
    /// Returns the backend status if the block cannot be decrypted.
    fn decrypt_block(&self, private_key: &KeyHandle, block: &[u8]) -> Result<Vec<u8>, Status>;

    /// Produces a PKCS#1 v1.5 SHA-256 signature over the whole message.
    ///
    /// # Errors
    ///
    /// Returns the backend status if signing fails.
    fn sign(&self, private_key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, Status>;

    /// Checks a PKCS#1 v1.5 SHA-256 signature over the whole message.
    ///
    /// # Errors
    ///
    /// Returns the backend status if the signature does not verify.
    fn verify(&self, public_key: &KeyHandle, message: &[u8], signature: &[u8])
        -> Result<(), Status>;
}

fn backend_status(operation: &str, err: BackendError) -> Status {
    log::debug!("{operation} failed: {err}");
    err.status
}

/// Direct calls that take an algorithm identifier and return owned buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModernStrategy;

impl RsaStrategy for ModernStrategy {
    fn encrypt_block(&self, public_key: &KeyHandle, chunk: &[u8]) -> Result<Vec<u8>, Status> {
        public_key
            .platform_key()
            .create_encrypted_data(Algorithm::RsaEncryptionPkcs1, chunk)
            .map_err(|err| backend_status("encryption", err))
    }

    fn decrypt_block(&self, private_key: &KeyHandle, block: &[u8]) -> Result<Vec<u8>, Status> {
        private_key
            .platform_key()
            .create_decrypted_data(Algorithm::RsaEncryptionPkcs1, block)
            .map_err(|err| backend_status("decryption", err))
    }

    fn sign(&self, private_key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, Status> {
        private_key
            .platform_key()
            .create_signature(Algorithm::RsaSignatureMessagePkcs1v15Sha256, message)
            .map_err(|err| backend_status("signing", err))
    }

    fn verify(
        &self,
        public_key: &KeyHandle,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), Status> {
        public_key
            .platform_key()
            .verify_signature(
                Algorithm::RsaSignatureMessagePkcs1v15Sha256,
                message,
                signature,
            )
            .map_err(|err| backend_status("verification", err))
    }
}

/// Raw calls with a padding indicator, a caller-sized buffer and a status result.
///
/// Signing goes through the digest collaborator first, since raw signature
/// primitives take a precomputed digest.
#[derive(Clone)]
pub struct LegacyStrategy {
    digest: Arc<dyn MessageDigest>,
}

impl LegacyStrategy {
    /// Creates a legacy strategy hashing with `digest`.
    #[must_use]
    pub const fn new(digest: Arc<dyn MessageDigest>) -> Self {
        Self { digest }
    }
}

impl std::fmt::Debug for LegacyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyStrategy").finish_non_exhaustive()
    }
}

impl RsaStrategy for LegacyStrategy {
    fn encrypt_block(&self, public_key: &KeyHandle, chunk: &[u8]) -> Result<Vec<u8>, Status> {
        let mut buffer = vec![0u8; public_key.block_size()];
        let written = public_key
            .platform_key()
            .raw_encrypt(Padding::Pkcs1, chunk, &mut buffer)?;
        buffer.truncate(written);
        Ok(buffer)
    }

    fn decrypt_block(&self, private_key: &KeyHandle, block: &[u8]) -> Result<Vec<u8>, Status> {
        let mut buffer = vec![0u8; private_key.block_size()];
        let written = private_key
            .platform_key()
            .raw_decrypt(Padding::Pkcs1, block, &mut buffer)?;
        buffer.truncate(written);
        Ok(buffer)
    }

    fn sign(&self, private_key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>, Status> {
        let digest = self.digest.digest(message);
        let mut buffer = vec![0u8; private_key.block_size()];
        let written = private_key
            .platform_key()
            .raw_sign(Padding::Pkcs1Sha256, &digest, &mut buffer)?;
        buffer.truncate(written);
        Ok(buffer)
    }

    fn verify(
        &self,
        public_key: &KeyHandle,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), Status> {
        let digest = self.digest.digest(message);
        public_key
            .platform_key()
            .raw_verify(Padding::Pkcs1Sha256, &digest, signature)
    }
}
