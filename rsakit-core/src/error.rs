use thiserror::Error;

use crate::keychain::Status;

/// Error outputs from the cipher/signature engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum CipherError {
    /// Input is not valid base64, not valid UTF-8, or not a whole number of blocks
    #[error("data_corrupted")]
    DataCorrupted,
    /// The backend failed to encrypt a block
    #[error("encrypt_failed: {0}")]
    EncryptFailed(Status),
    /// The backend failed to decrypt a block
    #[error("decrypt_failed: {0}")]
    DecryptFailed(Status),
    /// The backend failed to produce a signature
    #[error("signing_failed: {0}")]
    SigningFailed(Status),
}

/// Error outputs from the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum KeyStoreError {
    /// The requested access flags could not be compiled into a descriptor
    #[error("access_control_creation_failed")]
    AccessControlCreationFailed,
    /// The backend refused to generate the key pair
    #[error("key_generation_failed: {0}")]
    KeyGenerationFailed(Status),
    /// The public half could not be obtained from a freshly generated private key
    #[error("public_key_derivation_failed: {0}")]
    PublicKeyDerivationFailed(Status),
    /// No single accessible public key matches the label
    #[error("public_key_not_found: {0}")]
    PublicKeyNotFound(Status),
    /// No single accessible private key matches the label
    #[error("private_key_not_found: {0}")]
    PrivateKeyNotFound(Status),
}

impl KeyStoreError {
    /// Backend status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<Status> {
        match self {
            Self::AccessControlCreationFailed => None,
            Self::KeyGenerationFailed(status)
            | Self::PublicKeyDerivationFailed(status)
            | Self::PublicKeyNotFound(status)
            | Self::PrivateKeyNotFound(status) => Some(*status),
        }
    }
}
