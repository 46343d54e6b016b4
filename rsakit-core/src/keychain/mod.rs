//! Secure-storage backend contract and the bundled software keychain.
//!
//! [`SecureStorage`] is the seam between the key store and whatever actually
//! holds key material: a Rust implementation over a platform keychain, the
//! [`software::SoftwareKeychain`] shipped here, or a test fake. Keys come back
//! as [`KeyHandle`]s wrapping a [`PlatformKey`].

mod access;
mod blob_store;
mod envelope;
mod handle;
pub mod software;
mod status;
mod traits;
mod types;

pub use access::{AccessControl, AccessFlags, AccessPolicy};
pub use blob_store::{
    AtomicBlobStore, BlobStoreError, BlobStoreResult, FileBlobStore, MemoryBlobStore,
};
pub use envelope::EnvelopeError;
pub use handle::KeyHandle;
pub use status::{BackendError, BackendResult, Status};
pub use traits::{PlatformKey, SecureStorage};
pub use types::{
    Algorithm, ApiGeneration, GenerationRequest, KeyRole, KeyType, Padding,
    PersistentAttributes, Protection,
};
