//! Generation, retrieval and deletion of label-addressed RSA key pairs.

use std::sync::Arc;

use crate::error::KeyStoreError;
use crate::keychain::{
    AccessFlags, AccessPolicy, ApiGeneration, GenerationRequest, KeyHandle, KeyRole, KeyType,
    PersistentAttributes, Protection, SecureStorage, Status,
};

/// Default RSA modulus size in bits.
pub const DEFAULT_KEY_SIZE_BITS: usize = 2048;

/// Options for [`KeyStore::generate_key_pair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPairOptions {
    /// Modulus size in bits.
    pub key_size_bits: usize,
    /// When the stored keys may be used.
    pub policy: AccessPolicy,
    /// Use-time constraints. When present they are compiled together with
    /// `policy` into one access-control descriptor.
    pub flags: Option<AccessFlags>,
}

impl Default for KeyPairOptions {
    fn default() -> Self {
        Self {
            key_size_bits: DEFAULT_KEY_SIZE_BITS,
            policy: AccessPolicy::default(),
            flags: None,
        }
    }
}

/// The two halves of a generated pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Decrypts and signs.
    pub private: KeyHandle,
    /// Encrypts and verifies.
    pub public: KeyHandle,
}

/// Outcome of [`KeyStore::delete_key_pair`].
///
/// A field is `Some` only when deleting that half failed for a reason other
/// than the key being absent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeletionReport {
    /// Failure deleting the private key.
    pub private_failure: Option<Status>,
    /// Failure deleting the public key.
    pub public_failure: Option<Status>,
}

impl DeletionReport {
    /// Returns `true` if both halves are gone (or were never there).
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.private_failure.is_none() && self.public_failure.is_none()
    }
}

/// Key-pair lifecycle over a [`SecureStorage`] backend.
///
/// The store adds no locking. Concurrent generate/delete sequences on the same
/// label must be serialized by the caller.
#[derive(Clone)]
pub struct KeyStore {
    backend: Arc<dyn SecureStorage>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("api_generation", &self.backend.api_generation())
            .finish()
    }
}

impl KeyStore {
    /// Creates a key store on top of `backend`.
    #[must_use]
    pub const fn new(backend: Arc<dyn SecureStorage>) -> Self {
        Self { backend }
    }

    /// Generates an RSA pair and persists both halves under their labels.
    ///
    /// # Errors
    ///
    /// - [`KeyStoreError::AccessControlCreationFailed`] if `options.flags`
    ///   cannot be compiled into a descriptor.
    /// - [`KeyStoreError::KeyGenerationFailed`] if the backend refuses to
    ///   generate, for example because a label is taken or the key size is
    ///   unsupported.
    /// - [`KeyStoreError::PublicKeyDerivationFailed`] if the public half cannot
    ///   be obtained from the new private key.
    pub fn generate_key_pair(
        &self,
        private_label: &str,
        public_label: &str,
        options: &KeyPairOptions,
    ) -> Result<KeyPair, KeyStoreError> {
        let protection = match options.flags {
            Some(flags) => {
                let control = self
                    .backend
                    .create_access_control(options.policy, flags)
                    .map_err(|err| {
                        log::warn!("cannot build access control for '{private_label}': {err}");
                        KeyStoreError::AccessControlCreationFailed
                    })?;
                Protection::AccessControl(control)
            }
            None => Protection::Accessible(options.policy),
        };

        let request = GenerationRequest {
            key_type: KeyType::Rsa,
            key_size_bits: options.key_size_bits,
            private_attributes: PersistentAttributes::permanent(private_label),
            public_attributes: PersistentAttributes::permanent(public_label),
            protection,
        };

        let pair = match self.backend.api_generation() {
            ApiGeneration::Modern => {
                let private = self.backend.create_random_key(&request).map_err(|err| {
                    log::warn!("key generation for '{private_label}' failed: {err}");
                    KeyStoreError::KeyGenerationFailed(err.status)
                })?;
                let public = self.backend.copy_public_key(&private).map_err(|err| {
                    log::warn!("deriving public key for '{private_label}' failed: {err}");
                    KeyStoreError::PublicKeyDerivationFailed(err.status)
                })?;
                KeyPair { private, public }
            }
            ApiGeneration::Legacy => {
                let (public, private) =
                    self.backend.generate_key_pair(&request).map_err(|status| {
                        log::warn!(
                            "key pair generation for '{private_label}' failed with status {status}"
                        );
                        KeyStoreError::KeyGenerationFailed(status)
                    })?;
                KeyPair { private, public }
            }
        };

        log::info!(
            "generated {}-bit key pair '{private_label}' / '{public_label}'",
            options.key_size_bits
        );
        Ok(pair)
    }

    /// Fetches the public key stored under `label`.
    ///
    /// # Errors
    ///
    /// [`KeyStoreError::PublicKeyNotFound`] carrying the backend status when no
    /// single accessible key matches.
    pub fn public_key(&self, label: &str) -> Result<KeyHandle, KeyStoreError> {
        self.backend
            .find_one(KeyRole::Public, label)
            .map_err(|status| {
                log::debug!("public key '{label}' lookup failed with status {status}");
                KeyStoreError::PublicKeyNotFound(status)
            })
    }

    /// Fetches the private key stored under `label`.
    ///
    /// The backend may prompt the user first if the key was stored with
    /// authentication constraints.
    ///
    /// # Errors
    ///
    /// [`KeyStoreError::PrivateKeyNotFound`] carrying the backend status when no
    /// single accessible key matches or access was refused.
    pub fn private_key(&self, label: &str) -> Result<KeyHandle, KeyStoreError> {
        self.backend
            .find_one(KeyRole::Private, label)
            .map_err(|status| {
                log::debug!("private key '{label}' lookup failed with status {status}");
                KeyStoreError::PrivateKeyNotFound(status)
            })
    }

    /// Deletes both halves of a pair. Never fails.
    ///
    /// Both deletions are attempted. Missing keys are not an error; other
    /// failures are logged and reported back.
    pub fn delete_key_pair(&self, private_label: &str, public_label: &str) -> DeletionReport {
        DeletionReport {
            private_failure: self.delete(KeyRole::Private, private_label),
            public_failure: self.delete(KeyRole::Public, public_label),
        }
    }

    fn delete(&self, role: KeyRole, label: &str) -> Option<Status> {
        match self.backend.delete(role, label) {
            Ok(()) | Err(Status::ITEM_NOT_FOUND) => None,
            Err(status) => {
                log::warn!("failed to delete {role} key '{label}': status {status}");
                Some(status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::software::SoftwareKeychain;
    use crate::keychain::{BackendError, BackendResult};

    fn options() -> KeyPairOptions {
        KeyPairOptions {
            key_size_bits: 1024,
            ..KeyPairOptions::default()
        }
    }

    /// Delegates to a software keychain, overriding selected calls.
    struct Faulty {
        inner: SoftwareKeychain,
        copy_public: Option<Status>,
        delete: Option<Status>,
    }

    impl Faulty {
        fn new() -> Self {
            Self {
                inner: SoftwareKeychain::ephemeral(),
                copy_public: None,
                delete: None,
            }
        }
    }

    impl SecureStorage for Faulty {
        fn api_generation(&self) -> ApiGeneration {
            self.inner.api_generation()
        }

        fn create_random_key(&self, request: &GenerationRequest) -> BackendResult<KeyHandle> {
            self.inner.create_random_key(request)
        }

        fn copy_public_key(&self, private_key: &KeyHandle) -> BackendResult<KeyHandle> {
            match self.copy_public {
                Some(status) => Err(BackendError::new(status, "injected failure")),
                None => self.inner.copy_public_key(private_key),
            }
        }

        fn generate_key_pair(
            &self,
            request: &GenerationRequest,
        ) -> Result<(KeyHandle, KeyHandle), Status> {
            self.inner.generate_key_pair(request)
        }

        fn find_one(&self, role: KeyRole, label: &str) -> Result<KeyHandle, Status> {
            self.inner.find_one(role, label)
        }

        fn delete(&self, role: KeyRole, label: &str) -> Result<(), Status> {
            match self.delete {
                Some(status) => Err(status),
                None => self.inner.delete(role, label),
            }
        }
    }

    #[test]
    fn test_default_options() {
        let defaults = KeyPairOptions::default();
        assert_eq!(defaults.key_size_bits, 2048);
        assert_eq!(defaults.policy, AccessPolicy::AfterFirstUnlockThisDeviceOnly);
        assert_eq!(defaults.flags, None);
    }

    #[test]
    fn test_generate_fetch_delete() {
        let store = KeyStore::new(Arc::new(SoftwareKeychain::ephemeral()));
        let pair = store.generate_key_pair("priv", "pub", &options()).unwrap();
        assert_eq!(pair.private.role(), KeyRole::Private);
        assert_eq!(pair.public.role(), KeyRole::Public);
        assert_eq!(pair.public.label(), Some("pub"));

        assert!(store.public_key("pub").is_ok());
        assert!(store.private_key("priv").is_ok());
        assert_eq!(
            store.private_key("pub").unwrap_err(),
            KeyStoreError::PrivateKeyNotFound(Status::ITEM_NOT_FOUND)
        );

        assert!(store.delete_key_pair("priv", "pub").is_clean());
        assert_eq!(
            store.public_key("pub").unwrap_err(),
            KeyStoreError::PublicKeyNotFound(Status::ITEM_NOT_FOUND)
        );
        // second deletion of the same labels is silent
        assert_eq!(store.delete_key_pair("priv", "pub"), DeletionReport::default());
    }

    #[test]
    fn test_legacy_backend_generates_in_one_step() {
        let backend = SoftwareKeychain::ephemeral().with_api_generation(ApiGeneration::Legacy);
        let store = KeyStore::new(Arc::new(backend));
        let pair = store.generate_key_pair("priv", "pub", &options()).unwrap();
        assert_eq!(pair.private.label(), Some("priv"));
        assert_eq!(pair.public.label(), Some("pub"));
    }

    #[test]
    fn test_invalid_flags_fail_before_generation() {
        let backend = Arc::new(SoftwareKeychain::ephemeral());
        let store = KeyStore::new(backend.clone());
        let options = KeyPairOptions {
            flags: Some(AccessFlags::OR | AccessFlags::AND | AccessFlags::USER_PRESENCE),
            ..options()
        };
        assert_eq!(
            store.generate_key_pair("priv", "pub", &options).unwrap_err(),
            KeyStoreError::AccessControlCreationFailed
        );
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn test_generation_errors_carry_status() {
        let store = KeyStore::new(Arc::new(SoftwareKeychain::ephemeral()));
        let unsupported = KeyPairOptions {
            key_size_bits: 1000,
            ..options()
        };
        assert_eq!(
            store.generate_key_pair("priv", "pub", &unsupported).unwrap_err(),
            KeyStoreError::KeyGenerationFailed(Status::PARAM)
        );

        store.generate_key_pair("priv", "pub", &options()).unwrap();
        assert_eq!(
            store.generate_key_pair("priv", "pub", &options()).unwrap_err(),
            KeyStoreError::KeyGenerationFailed(Status::DUPLICATE_ITEM)
        );
    }

    #[test]
    fn test_public_key_derivation_failure() {
        let backend = Faulty {
            copy_public: Some(Status::INTERNAL_COMPONENT),
            ..Faulty::new()
        };
        let store = KeyStore::new(Arc::new(backend));
        assert_eq!(
            store.generate_key_pair("priv", "pub", &options()).unwrap_err(),
            KeyStoreError::PublicKeyDerivationFailed(Status::INTERNAL_COMPONENT)
        );
    }

    #[test]
    fn test_deletion_failures_are_reported_not_raised() {
        let backend = Faulty {
            delete: Some(Status::AUTH_FAILED),
            ..Faulty::new()
        };
        let store = KeyStore::new(Arc::new(backend));
        let report = store.delete_key_pair("priv", "pub");
        assert!(!report.is_clean());
        assert_eq!(report.private_failure, Some(Status::AUTH_FAILED));
        assert_eq!(report.public_failure, Some(Status::AUTH_FAILED));
    }

    #[test]
    fn test_flags_protect_private_key() {
        let store = KeyStore::new(Arc::new(SoftwareKeychain::ephemeral()));
        let options = KeyPairOptions {
            policy: AccessPolicy::WhenUnlockedThisDeviceOnly,
            flags: Some(AccessFlags::BIOMETRY_ANY | AccessFlags::OR | AccessFlags::DEVICE_PASSCODE),
            ..options()
        };
        let pair = store.generate_key_pair("priv", "pub", &options).unwrap();
        assert_eq!(pair.private.key_size_bits(), 1024);
        assert!(store.private_key("priv").is_ok());
    }
}
