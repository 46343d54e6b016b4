//! Backend interfaces for secure key storage.

use super::access::{AccessControl, AccessFlags, AccessPolicy};
use super::handle::KeyHandle;
use super::status::{BackendError, BackendResult, Status};
use super::types::{Algorithm, ApiGeneration, GenerationRequest, KeyRole, Padding};

/// A key object owned by a secure-storage backend.
///
/// Implementations hold (or reference) the key material; callers only ever see
/// it through a [`KeyHandle`]. Both primitive families are part of the
/// interface. A backend that only offers one of them reports
/// [`Status::UNIMPLEMENTED`] from the other.
pub trait PlatformKey: Send + Sync + std::fmt::Debug {
    /// Whether this is the public or the private half.
    fn role(&self) -> KeyRole;

    /// Modulus size in bytes, i.e. the width of one RSA block.
    fn block_size(&self) -> usize;

    /// Label the key is stored under, if it was persisted.
    fn label(&self) -> Option<&str>;

    /// Encrypts one block with `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns the backend error object if the operation fails.
    fn create_encrypted_data(
        &self,
        algorithm: Algorithm,
        plaintext: &[u8],
    ) -> BackendResult<Vec<u8>>;

    /// Decrypts one block with `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns the backend error object if the operation fails.
    fn create_decrypted_data(
        &self,
        algorithm: Algorithm,
        ciphertext: &[u8],
    ) -> BackendResult<Vec<u8>>;

    /// Signs a raw message; the backend hashes it as `algorithm` requires.
    ///
    /// # Errors
    ///
    /// Returns the backend error object if the operation fails.
    fn create_signature(&self, algorithm: Algorithm, message: &[u8])
        -> BackendResult<Vec<u8>>;

    /// Verifies a signature over a raw message.
    ///
    /// # Errors
    ///
    /// Returns the backend error object if the signature does not verify or the
    /// operation fails.
    fn verify_signature(
        &self,
        algorithm: Algorithm,
        message: &[u8],
        signature: &[u8],
    ) -> BackendResult<()>;

    /// Encrypts `input` into `output`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns the backend status on failure, including an undersized `output`.
    fn raw_encrypt(
        &self,
        padding: Padding,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, Status>;

    /// Decrypts `input` into `output`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns the backend status on failure.
    fn raw_decrypt(
        &self,
        padding: Padding,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, Status>;

    /// Signs a precomputed digest into `output`, returning the signature length.
    ///
    /// # Errors
    ///
    /// Returns the backend status on failure.
    fn raw_sign(
        &self,
        padding: Padding,
        digest: &[u8],
        output: &mut [u8],
    ) -> Result<usize, Status>;

    /// Verifies `signature` over a precomputed digest.
    ///
    /// # Errors
    ///
    /// Returns the backend status when the signature does not verify or the
    /// operation fails.
    fn raw_verify(&self, padding: Padding, digest: &[u8], signature: &[u8])
        -> Result<(), Status>;

    /// Derives the public half from this key's own material.
    ///
    /// # Errors
    ///
    /// The default reports [`Status::UNIMPLEMENTED`]. Backends whose private
    /// key objects can produce their public half override it.
    fn derive_public_key(&self) -> BackendResult<KeyHandle> {
        Err(BackendError::new(
            Status::UNIMPLEMENTED,
            "public key derivation is not supported by this key",
        ))
    }
}

/// A secure key-value store addressed by `(key class, label)`.
///
/// The store is process-wide shared state on real platforms; it is passed
/// around as `Arc<dyn SecureStorage>` so tests can substitute a fake.
pub trait SecureStorage: Send + Sync {
    /// Which primitive family keys from this backend support.
    fn api_generation(&self) -> ApiGeneration;

    /// Compiles `policy` and `flags` into an access-control descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the combination is not supported.
    fn create_access_control(
        &self,
        policy: AccessPolicy,
        flags: AccessFlags,
    ) -> BackendResult<AccessControl> {
        AccessControl::new(policy, flags).map_err(|status| {
            BackendError::new(status, format!("unsupported access flags: {flags}"))
        })
    }

    /// Generates and persists a key pair, returning the private key.
    ///
    /// # Errors
    ///
    /// Returns the backend error object if generation fails.
    fn create_random_key(&self, request: &GenerationRequest) -> BackendResult<KeyHandle>;

    /// Returns the public key belonging to `private_key`.
    ///
    /// The result is derived from the handle itself, not from whatever is
    /// currently stored under its label.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be derived.
    fn copy_public_key(&self, private_key: &KeyHandle) -> BackendResult<KeyHandle>;

    /// Generates and persists a key pair in one step, returning `(public, private)`.
    ///
    /// # Errors
    ///
    /// Returns the backend status if generation fails.
    fn generate_key_pair(
        &self,
        request: &GenerationRequest,
    ) -> Result<(KeyHandle, KeyHandle), Status>;

    /// Finds the single stored key of `role` labelled `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Status::ITEM_NOT_FOUND`] when nothing matches, or the status
    /// explaining why access was refused.
    fn find_one(&self, role: KeyRole, label: &str) -> Result<KeyHandle, Status>;

    /// Deletes the stored key of `role` labelled `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Status::ITEM_NOT_FOUND`] when nothing matches, or another
    /// status if deletion fails.
    fn delete(&self, role: KeyRole, label: &str) -> Result<(), Status>;
}
