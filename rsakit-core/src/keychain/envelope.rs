//! Versioned CBOR envelope holding the software keychain's item table.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use super::access::{AccessFlags, AccessPolicy};
use super::types::KeyRole;

const ENVELOPE_VERSION: u32 = 1;

/// Errors raised while encoding or decoding a keychain envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// CBOR encoding or decoding failed.
    #[error("envelope serialization error: {0}")]
    Serialization(String),
    /// The envelope was written by an incompatible version.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u32),
}

/// One persisted key.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct StoredItem {
    pub(crate) role: KeyRole,
    pub(crate) label: String,
    /// Shared by the two halves of a generated pair.
    pub(crate) pair_id: u64,
    pub(crate) policy: AccessPolicy,
    /// Present when the item was stored with an access-control descriptor.
    pub(crate) control_flags: Option<AccessFlags>,
    /// PKCS#8 for private keys, SPKI for public keys.
    pub(crate) der: Zeroizing<Vec<u8>>,
}

impl StoredItem {
    pub(crate) fn matches(&self, role: KeyRole, label: &str) -> bool {
        self.role == role && self.label == label
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct KeychainEnvelope {
    version: u32,
    items: Vec<StoredItem>,
}

impl KeychainEnvelope {
    pub(crate) const fn new(items: Vec<StoredItem>) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            items,
        }
    }

    pub(crate) fn into_items(self) -> Vec<StoredItem> {
        self.items
    }

    pub(crate) fn serialize(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| EnvelopeError::Serialization(err.to_string()))?;
        Ok(bytes)
    }

    pub(crate) fn deserialize(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Self = ciborium::de::from_reader(bytes)
            .map_err(|err| EnvelopeError::Serialization(err.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(envelope.version));
        }
        Ok(envelope)
    }
}
