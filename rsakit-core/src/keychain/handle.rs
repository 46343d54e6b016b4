//! Opaque key handles.

use std::fmt;
use std::sync::Arc;

use super::traits::PlatformKey;
use super::types::KeyRole;

/// Opaque reference to a key held by a secure-storage backend.
///
/// Cloning a handle clones the reference, not the key. The backend owns the
/// key's lifetime; deleting the stored item does not invalidate handles that
/// are already live.
#[derive(Clone)]
pub struct KeyHandle {
    key: Arc<dyn PlatformKey>,
}

impl KeyHandle {
    /// Wraps a backend key object.
    #[must_use]
    pub const fn new(key: Arc<dyn PlatformKey>) -> Self {
        Self { key }
    }

    /// Whether this is the public or the private half.
    #[must_use]
    pub fn role(&self) -> KeyRole {
        self.key.role()
    }

    /// Width of one RSA block (modulus size) in bytes.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.key.block_size()
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn key_size_bits(&self) -> usize {
        self.key.block_size() * 8
    }

    /// Label the key is stored under, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.key.label()
    }

    /// The backend key object.
    #[must_use]
    pub fn platform_key(&self) -> &dyn PlatformKey {
        self.key.as_ref()
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("role", &self.role())
            .field("label", &self.label())
            .field("block_size", &self.block_size())
            .finish()
    }
}
