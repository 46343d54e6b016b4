//! Software keychain backed by the `rsa` crate.
//!
//! A complete [`SecureStorage`] implementation for hosts without a platform
//! keychain and for tests. Items live in an in-memory table that is written
//! through to an [`AtomicBlobStore`] on every mutation. Accessibility policy is
//! enforced against a simulated [`DeviceState`], and private keys stored with
//! authentication constraints consult a [`UserAuthenticator`] before they are
//! handed out.
//!
//! The keychain can emulate either primitive family. In
//! [`ApiGeneration::Legacy`] mode the modern direct calls report
//! [`Status::UNIMPLEMENTED`], mirroring an older platform.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

use super::access::{AccessFlags, AccessPolicy};
use super::blob_store::{AtomicBlobStore, BlobStoreError, MemoryBlobStore};
use super::envelope::{EnvelopeError, KeychainEnvelope, StoredItem};
use super::handle::KeyHandle;
use super::status::{BackendError, BackendResult, Status};
use super::traits::{PlatformKey, SecureStorage};
use super::types::{
    Algorithm, ApiGeneration, GenerationRequest, KeyRole, Padding, PersistentAttributes,
    Protection,
};

/// Name of the blob holding the item table.
const KEYCHAIN_BLOB: &str = "keychain.cbor";

/// SHA-256 output length, the only digest the raw signature padding accepts.
const SHA256_LEN: usize = 32;

/// RSA modulus sizes, in bits, the software keychain generates.
pub const SUPPORTED_KEY_SIZES: [usize; 6] = [512, 768, 1024, 2048, 3072, 4096];

/// Errors from keychain-level operations that are not part of [`SecureStorage`].
#[derive(Debug, Error)]
pub enum SoftwareKeychainError {
    /// The blob store failed.
    #[error(transparent)]
    Storage(#[from] BlobStoreError),
    /// The persisted table or a backup could not be decoded or encoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The item table lock was poisoned by a panicking writer.
    #[error("keychain item table lock poisoned")]
    Poisoned,
}

/// Simulated device conditions that gate item accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    /// The screen is locked.
    pub locked: bool,
    /// The device has been unlocked at least once since boot.
    pub unlocked_since_boot: bool,
    /// A device passcode is configured.
    pub passcode_set: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            locked: false,
            unlocked_since_boot: true,
            passcode_set: true,
        }
    }
}

impl DeviceState {
    /// Returns `true` if items stored under `policy` are accessible in this state.
    #[must_use]
    pub const fn permits(&self, policy: AccessPolicy) -> bool {
        match policy {
            AccessPolicy::Always | AccessPolicy::AlwaysThisDeviceOnly => true,
            AccessPolicy::AfterFirstUnlock | AccessPolicy::AfterFirstUnlockThisDeviceOnly => {
                self.unlocked_since_boot
            }
            AccessPolicy::WhenUnlocked | AccessPolicy::WhenUnlockedThisDeviceOnly => !self.locked,
            AccessPolicy::WhenPasscodeSetThisDeviceOnly => self.passcode_set && !self.locked,
        }
    }
}

/// Prompts the user before a protected private key is released.
pub trait UserAuthenticator: Send + Sync {
    /// Asks the user to satisfy `flags` for the private key stored under `label`.
    ///
    /// # Errors
    ///
    /// Returns the status to surface when the user declines or fails, for
    /// example [`Status::USER_CANCELED`] or [`Status::AUTH_FAILED`].
    fn authenticate(&self, label: &str, flags: AccessFlags) -> Result<(), Status>;
}

/// Authenticator that approves every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl UserAuthenticator for AutoApprove {
    fn authenticate(&self, label: &str, flags: AccessFlags) -> Result<(), Status> {
        log::debug!("auto-approving authentication ({flags}) for key '{label}'");
        Ok(())
    }
}

/// A [`SecureStorage`] backend that keeps RSA keys in software.
pub struct SoftwareKeychain {
    store: Arc<dyn AtomicBlobStore>,
    items: RwLock<Vec<StoredItem>>,
    device: RwLock<DeviceState>,
    authenticator: Arc<dyn UserAuthenticator>,
    api_generation: ApiGeneration,
}

impl fmt::Debug for SoftwareKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareKeychain")
            .field("api_generation", &self.api_generation)
            .field("device", &self.device_state())
            .finish_non_exhaustive()
    }
}

impl SoftwareKeychain {
    /// Creates an empty keychain that lives only in memory.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::from_parts(Arc::new(MemoryBlobStore::new()), Vec::new())
    }

    /// Opens a keychain persisted in `store`, loading any existing items.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds an unreadable table.
    pub fn open(store: Arc<dyn AtomicBlobStore>) -> Result<Self, SoftwareKeychainError> {
        let items = match store.read(KEYCHAIN_BLOB)? {
            Some(bytes) => KeychainEnvelope::deserialize(&Zeroizing::new(bytes))?.into_items(),
            None => Vec::new(),
        };
        log::debug!("opened software keychain with {} item(s)", items.len());
        Ok(Self::from_parts(store, items))
    }

    fn from_parts(store: Arc<dyn AtomicBlobStore>, items: Vec<StoredItem>) -> Self {
        Self {
            store,
            items: RwLock::new(items),
            device: RwLock::new(DeviceState::default()),
            authenticator: Arc::new(AutoApprove),
            api_generation: ApiGeneration::Modern,
        }
    }

    /// Selects which primitive family the keychain and its keys expose.
    ///
    /// Keys keep the generation that was active when they were handed out.
    #[must_use]
    pub fn with_api_generation(mut self, api_generation: ApiGeneration) -> Self {
        self.api_generation = api_generation;
        self
    }

    /// Installs the hook consulted before protected private keys are released.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn UserAuthenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Replaces the simulated device state.
    pub fn set_device_state(&self, state: DeviceState) {
        *self.device.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Returns the simulated device state.
    #[must_use]
    pub fn device_state(&self) -> DeviceState {
        *self.device.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored items.
    ///
    /// # Errors
    ///
    /// Returns an error if the item table lock is poisoned.
    pub fn len(&self) -> Result<usize, SoftwareKeychainError> {
        Ok(self
            .items
            .read()
            .map_err(|_| SoftwareKeychainError::Poisoned)?
            .len())
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the item table lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, SoftwareKeychainError> {
        Ok(self.len()? == 0)
    }

    /// Serializes every item that may leave the device.
    ///
    /// Items stored under a `*ThisDeviceOnly` policy are never included.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or encoded.
    pub fn backup(&self) -> Result<Vec<u8>, SoftwareKeychainError> {
        let migratable: Vec<StoredItem> = self
            .items
            .read()
            .map_err(|_| SoftwareKeychainError::Poisoned)?
            .iter()
            .filter(|item| !item.policy.is_device_only())
            .cloned()
            .collect();
        log::info!("backing up {} migratable item(s)", migratable.len());
        Ok(KeychainEnvelope::new(migratable).serialize()?)
    }

    /// Imports items from a backup, returning how many were added.
    ///
    /// Items whose `(role, label)` already exists are skipped, as are
    /// device-only items.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup cannot be decoded or the result cannot
    /// be persisted. Nothing is imported in that case.
    pub fn restore(&self, backup: &[u8]) -> Result<usize, SoftwareKeychainError> {
        let incoming = KeychainEnvelope::deserialize(backup)?.into_items();
        let mut items = self
            .items
            .write()
            .map_err(|_| SoftwareKeychainError::Poisoned)?;
        let original_len = items.len();

        for item in incoming {
            if item.policy.is_device_only() {
                log::warn!("skipping device-only item '{}' in backup", item.label);
                continue;
            }
            if items.iter().any(|existing| existing.matches(item.role, &item.label)) {
                log::debug!("skipping existing {} key '{}'", item.role, item.label);
                continue;
            }
            items.push(item);
        }

        let restored = items.len() - original_len;
        if restored > 0 {
            if let Err(err) = self.write_table(&items) {
                items.truncate(original_len);
                return Err(err);
            }
        }
        log::info!("restored {restored} item(s) from backup");
        Ok(restored)
    }

    fn read_items(&self) -> Result<RwLockReadGuard<'_, Vec<StoredItem>>, Status> {
        self.items.read().map_err(|_| Status::INTERNAL_COMPONENT)
    }

    fn write_items(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredItem>>, Status> {
        self.items.write().map_err(|_| Status::INTERNAL_COMPONENT)
    }

    fn write_table(&self, items: &[StoredItem]) -> Result<(), SoftwareKeychainError> {
        let bytes = Zeroizing::new(KeychainEnvelope::new(items.to_vec()).serialize()?);
        self.store.write_atomic(KEYCHAIN_BLOB, &bytes)?;
        Ok(())
    }

    fn persist(&self, items: &[StoredItem]) -> Result<(), Status> {
        self.write_table(items).map_err(|err| {
            log::error!("failed to persist keychain: {err}");
            Status::INTERNAL_COMPONENT
        })
    }

    fn require_modern(&self, operation: &str) -> BackendResult<()> {
        require_modern(self.api_generation, operation)
    }

    /// Generates a pair, stores its permanent halves and returns `(public, private)`.
    fn generate(&self, request: &GenerationRequest) -> BackendResult<(KeyHandle, KeyHandle)> {
        let bits = request.key_size_bits;
        if !SUPPORTED_KEY_SIZES.contains(&bits) {
            return Err(BackendError::new(
                Status::PARAM,
                format!("unsupported RSA key size {bits}"),
            ));
        }

        let policy = request.protection.policy();
        if policy == AccessPolicy::WhenPasscodeSetThisDeviceOnly
            && !self.device_state().passcode_set
        {
            return Err(BackendError::new(
                Status::NOT_AVAILABLE,
                "no device passcode is set",
            ));
        }
        let control_flags = match request.protection {
            Protection::Accessible(_) => None,
            Protection::AccessControl(control) => Some(control.flags()),
        };

        let halves = [
            (KeyRole::Private, &request.private_attributes),
            (KeyRole::Public, &request.public_attributes),
        ];
        check_duplicates(&self.read_items()?, &halves)?;

        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|err| rsa_error(&err, "key generation failed"))?;
        let public_key = RsaPublicKey::from(&private_key);
        let pair_id = OsRng.next_u64();

        let private_der = Zeroizing::new(
            private_key
                .to_pkcs8_der()
                .map_err(|err| {
                    BackendError::new(Status::INTERNAL_COMPONENT, format!("PKCS#8 encoding: {err}"))
                })?
                .as_bytes()
                .to_vec(),
        );
        let public_der = Zeroizing::new(
            public_key
                .to_public_key_der()
                .map_err(|err| {
                    BackendError::new(Status::INTERNAL_COMPONENT, format!("SPKI encoding: {err}"))
                })?
                .as_bytes()
                .to_vec(),
        );

        let mut new_items = Vec::with_capacity(2);
        if request.private_attributes.permanent {
            new_items.push(StoredItem {
                role: KeyRole::Private,
                label: request.private_attributes.label.clone(),
                pair_id,
                policy,
                control_flags,
                der: private_der,
            });
        }
        if request.public_attributes.permanent {
            new_items.push(StoredItem {
                role: KeyRole::Public,
                label: request.public_attributes.label.clone(),
                pair_id,
                policy,
                control_flags: None,
                der: public_der,
            });
        }

        {
            let mut items = self.write_items()?;
            check_duplicates(&items, &halves)?;
            let original_len = items.len();
            items.extend(new_items);
            if let Err(status) = self.persist(&items) {
                items.truncate(original_len);
                return Err(BackendError::new(status, "failed to persist generated keys"));
            }
        }

        log::debug!(
            "generated {bits}-bit pair '{}' / '{}' ({policy})",
            request.private_attributes.label,
            request.public_attributes.label
        );
        let public = SoftwareKey::public(
            public_key,
            Some(request.public_attributes.label.clone()),
            self.api_generation,
        );
        let private = SoftwareKey::private(
            private_key,
            Some(request.private_attributes.label.clone()),
            request
                .public_attributes
                .permanent
                .then(|| request.public_attributes.label.clone()),
            self.api_generation,
        );
        Ok((public.into_handle(), private.into_handle()))
    }

    /// Builds a handle for `item`. `public_label` is where the public half of a
    /// private item is stored, if anywhere.
    fn handle_for(
        &self,
        item: &StoredItem,
        public_label: Option<String>,
    ) -> Result<KeyHandle, Status> {
        let label = Some(item.label.clone());
        let key = match item.role {
            KeyRole::Private => SoftwareKey::private(
                RsaPrivateKey::from_pkcs8_der(&item.der).map_err(|err| {
                    log::error!("stored private key '{}' is unreadable: {err}", item.label);
                    Status::DECODE
                })?,
                label,
                public_label,
                self.api_generation,
            ),
            KeyRole::Public => SoftwareKey::public(
                RsaPublicKey::from_public_key_der(&item.der).map_err(|err| {
                    log::error!("stored public key '{}' is unreadable: {err}", item.label);
                    Status::DECODE
                })?,
                label,
                self.api_generation,
            ),
        };
        Ok(key.into_handle())
    }
}

fn check_duplicates(
    items: &[StoredItem],
    halves: &[(KeyRole, &PersistentAttributes)],
) -> BackendResult<()> {
    for (role, attributes) in halves {
        if attributes.permanent && items.iter().any(|item| item.matches(*role, &attributes.label)) {
            return Err(BackendError::new(
                Status::DUPLICATE_ITEM,
                format!("a {role} key labelled '{}' already exists", attributes.label),
            ));
        }
    }
    Ok(())
}

impl SecureStorage for SoftwareKeychain {
    fn api_generation(&self) -> ApiGeneration {
        self.api_generation
    }

    fn create_random_key(&self, request: &GenerationRequest) -> BackendResult<KeyHandle> {
        self.require_modern("create_random_key")?;
        let (_, private) = self.generate(request)?;
        Ok(private)
    }

    fn copy_public_key(&self, private_key: &KeyHandle) -> BackendResult<KeyHandle> {
        self.require_modern("copy_public_key")?;
        if private_key.role() != KeyRole::Private {
            return Err(BackendError::new(Status::PARAM, "expected a private key"));
        }
        private_key.platform_key().derive_public_key()
    }

    fn generate_key_pair(
        &self,
        request: &GenerationRequest,
    ) -> Result<(KeyHandle, KeyHandle), Status> {
        self.generate(request).map_err(|err| {
            log::debug!("key pair generation failed: {err}");
            err.status
        })
    }

    fn find_one(&self, role: KeyRole, label: &str) -> Result<KeyHandle, Status> {
        let (item, public_label) = {
            let items = self.read_items()?;
            let item = items
                .iter()
                .find(|item| item.matches(role, label))
                .cloned()
                .ok_or(Status::ITEM_NOT_FOUND)?;
            let public_label = items
                .iter()
                .find(|other| other.role == KeyRole::Public && other.pair_id == item.pair_id)
                .map(|other| other.label.clone());
            (item, public_label)
        };

        if !self.device_state().permits(item.policy) {
            log::debug!(
                "{role} key '{label}' is not accessible ({}) in the current device state",
                item.policy
            );
            return Err(Status::INTERACTION_NOT_ALLOWED);
        }
        if role == KeyRole::Private {
            if let Some(flags) = item.control_flags {
                if !flags.authentication_constraints().is_empty() {
                    self.authenticator.authenticate(label, flags)?;
                }
            }
        }
        self.handle_for(&item, public_label)
    }

    fn delete(&self, role: KeyRole, label: &str) -> Result<(), Status> {
        let mut items = self.write_items()?;
        let index = items
            .iter()
            .position(|item| item.matches(role, label))
            .ok_or(Status::ITEM_NOT_FOUND)?;
        let removed = items.remove(index);
        if let Err(status) = self.persist(&items) {
            items.insert(index, removed);
            return Err(status);
        }
        log::debug!("deleted {role} key '{label}'");
        Ok(())
    }
}

fn require_modern(api_generation: ApiGeneration, operation: &str) -> BackendResult<()> {
    match api_generation {
        ApiGeneration::Modern => Ok(()),
        ApiGeneration::Legacy => Err(BackendError::new(
            Status::UNIMPLEMENTED,
            format!("{operation} is not available on this backend"),
        )),
    }
}

fn rsa_status(err: &rsa::Error) -> Status {
    match err {
        rsa::Error::MessageTooLong
        | rsa::Error::InputNotHashed
        | rsa::Error::InvalidPaddingScheme => Status::PARAM,
        rsa::Error::Decryption => Status::DECODE,
        rsa::Error::Verification => Status::VERIFY_FAILED,
        _ => Status::INTERNAL_COMPONENT,
    }
}

fn rsa_error(err: &rsa::Error, context: &str) -> BackendError {
    BackendError::new(rsa_status(err), format!("{context}: {err}"))
}

enum KeyMaterial {
    Public(RsaPublicKey),
    Private(Box<RsaPrivateKey>),
}

/// An RSA key handed out by [`SoftwareKeychain`].
struct SoftwareKey {
    material: KeyMaterial,
    label: Option<String>,
    /// Label of the stored public half, set on private keys only.
    public_label: Option<String>,
    api_generation: ApiGeneration,
}

impl SoftwareKey {
    const fn public(
        key: RsaPublicKey,
        label: Option<String>,
        api_generation: ApiGeneration,
    ) -> Self {
        Self {
            material: KeyMaterial::Public(key),
            label,
            public_label: None,
            api_generation,
        }
    }

    fn private(
        key: RsaPrivateKey,
        label: Option<String>,
        public_label: Option<String>,
        api_generation: ApiGeneration,
    ) -> Self {
        Self {
            material: KeyMaterial::Private(Box::new(key)),
            label,
            public_label,
            api_generation,
        }
    }

    fn into_handle(self) -> KeyHandle {
        KeyHandle::new(Arc::new(self))
    }

    const fn public_key(&self) -> Result<&RsaPublicKey, Status> {
        match &self.material {
            KeyMaterial::Public(key) => Ok(key),
            KeyMaterial::Private(_) => Err(Status::PARAM),
        }
    }

    fn private_key(&self) -> Result<&RsaPrivateKey, Status> {
        match &self.material {
            KeyMaterial::Private(key) => Ok(key.as_ref()),
            KeyMaterial::Public(_) => Err(Status::PARAM),
        }
    }

    fn modern_public(&self, operation: &str) -> BackendResult<&RsaPublicKey> {
        require_modern(self.api_generation, operation)?;
        self.public_key().map_err(|status| {
            BackendError::new(status, format!("{operation} requires a public key"))
        })
    }

    fn modern_private(&self, operation: &str) -> BackendResult<&RsaPrivateKey> {
        require_modern(self.api_generation, operation)?;
        self.private_key().map_err(|status| {
            BackendError::new(status, format!("{operation} requires a private key"))
        })
    }
}

impl fmt::Debug for SoftwareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareKey")
            .field("role", &self.role())
            .field("label", &self.label)
            .field("bits", &(self.block_size() * 8))
            .finish_non_exhaustive()
    }
}

fn expect_algorithm(actual: Algorithm, expected: Algorithm) -> BackendResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(BackendError::new(
            Status::PARAM,
            format!("algorithm {actual:?} is not supported here"),
        ))
    }
}

fn expect_padding(actual: Padding, expected: Padding) -> Result<(), Status> {
    if actual == expected {
        Ok(())
    } else {
        Err(Status::PARAM)
    }
}

fn copy_into(output: &mut [u8], bytes: &[u8]) -> Result<usize, Status> {
    let target = output.get_mut(..bytes.len()).ok_or(Status::PARAM)?;
    target.copy_from_slice(bytes);
    Ok(bytes.len())
}

impl PlatformKey for SoftwareKey {
    fn role(&self) -> KeyRole {
        match self.material {
            KeyMaterial::Public(_) => KeyRole::Public,
            KeyMaterial::Private(_) => KeyRole::Private,
        }
    }

    fn block_size(&self) -> usize {
        match &self.material {
            KeyMaterial::Public(key) => key.size(),
            KeyMaterial::Private(key) => key.size(),
        }
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn create_encrypted_data(
        &self,
        algorithm: Algorithm,
        plaintext: &[u8],
    ) -> BackendResult<Vec<u8>> {
        let key = self.modern_public("create_encrypted_data")?;
        expect_algorithm(algorithm, Algorithm::RsaEncryptionPkcs1)?;
        key.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|err| rsa_error(&err, "encryption failed"))
    }

    fn create_decrypted_data(
        &self,
        algorithm: Algorithm,
        ciphertext: &[u8],
    ) -> BackendResult<Vec<u8>> {
        let key = self.modern_private("create_decrypted_data")?;
        expect_algorithm(algorithm, Algorithm::RsaEncryptionPkcs1)?;
        key.decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|err| rsa_error(&err, "decryption failed"))
    }

    fn create_signature(&self, algorithm: Algorithm, message: &[u8]) -> BackendResult<Vec<u8>> {
        let key = self.modern_private("create_signature")?;
        expect_algorithm(algorithm, Algorithm::RsaSignatureMessagePkcs1v15Sha256)?;
        let digest = Sha256::digest(message);
        key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|err| rsa_error(&err, "signing failed"))
    }

    fn verify_signature(
        &self,
        algorithm: Algorithm,
        message: &[u8],
        signature: &[u8],
    ) -> BackendResult<()> {
        let key = self.modern_public("verify_signature")?;
        expect_algorithm(algorithm, Algorithm::RsaSignatureMessagePkcs1v15Sha256)?;
        let digest = Sha256::digest(message);
        key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .map_err(|err| rsa_error(&err, "signature verification failed"))
    }

    fn raw_encrypt(
        &self,
        padding: Padding,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, Status> {
        expect_padding(padding, Padding::Pkcs1)?;
        let key = self.public_key()?;
        if output.len() < key.size() {
            return Err(Status::PARAM);
        }
        let ciphertext = key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, input)
            .map_err(|err| rsa_status(&err))?;
        copy_into(output, &ciphertext)
    }

    fn raw_decrypt(
        &self,
        padding: Padding,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, Status> {
        expect_padding(padding, Padding::Pkcs1)?;
        let key = self.private_key()?;
        let plaintext = Zeroizing::new(
            key.decrypt(Pkcs1v15Encrypt, input)
                .map_err(|err| rsa_status(&err))?,
        );
        copy_into(output, &plaintext)
    }

    fn raw_sign(
        &self,
        padding: Padding,
        digest: &[u8],
        output: &mut [u8],
    ) -> Result<usize, Status> {
        expect_padding(padding, Padding::Pkcs1Sha256)?;
        let key = self.private_key()?;
        if digest.len() != SHA256_LEN || output.len() < key.size() {
            return Err(Status::PARAM);
        }
        let signature = key
            .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
            .map_err(|err| rsa_status(&err))?;
        copy_into(output, &signature)
    }

    fn raw_verify(
        &self,
        padding: Padding,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), Status> {
        expect_padding(padding, Padding::Pkcs1Sha256)?;
        let key = self.public_key()?;
        if digest.len() != SHA256_LEN {
            return Err(Status::PARAM);
        }
        key.verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature)
            .map_err(|_| Status::VERIFY_FAILED)
    }

    fn derive_public_key(&self) -> BackendResult<KeyHandle> {
        let key = self.private_key().map_err(|status| {
            BackendError::new(status, "only a private key has a public half to derive")
        })?;
        Ok(Self::public(
            RsaPublicKey::from(key),
            self.public_label.clone(),
            self.api_generation,
        )
        .into_handle())
    }
}
