//! Value types exchanged with a secure-storage backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::access::{AccessControl, AccessPolicy};

/// Which half of a key pair a key is. Also the key class used to address stored items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRole {
    /// Public key: encrypts and verifies.
    Public,
    /// Private key: decrypts and signs.
    Private,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

/// Which family of primitives a backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiGeneration {
    /// Direct calls taking an algorithm identifier and returning an owned buffer
    /// (or an error object).
    Modern,
    /// Raw calls taking a padding indicator and a caller-sized output buffer,
    /// returning a status code.
    Legacy,
}

/// Asymmetric key algorithm requested at generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// RSA.
    Rsa,
}

/// Algorithm identifiers accepted by the modern primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// RSA encryption with PKCS#1 v1.5 padding.
    RsaEncryptionPkcs1,
    /// PKCS#1 v1.5 signature over SHA-256 of the raw message; the backend hashes.
    RsaSignatureMessagePkcs1v15Sha256,
}

/// Padding indicators accepted by the legacy raw primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Padding {
    /// PKCS#1 v1.5 encryption padding (11 bytes of overhead).
    Pkcs1,
    /// PKCS#1 v1.5 signature padding over a caller-computed SHA-256 digest.
    Pkcs1Sha256,
}

impl Padding {
    /// Bytes of padding overhead PKCS#1 v1.5 encryption adds to every block.
    pub const PKCS1_OVERHEAD: usize = 11;
}

/// Attributes for one half of a generated pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentAttributes {
    /// Persist the key in secure storage.
    pub permanent: bool,
    /// Label the key is addressed by.
    pub label: String,
}

impl PersistentAttributes {
    /// Attributes for a key persisted under `label`.
    #[must_use]
    pub fn permanent(label: impl Into<String>) -> Self {
        Self {
            permanent: true,
            label: label.into(),
        }
    }
}

/// How generated keys are protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// A bare accessibility policy.
    Accessible(AccessPolicy),
    /// A compiled access-control descriptor; the policy lives inside it.
    AccessControl(AccessControl),
}

impl Protection {
    /// Returns the accessibility policy regardless of representation.
    #[must_use]
    pub const fn policy(&self) -> AccessPolicy {
        match self {
            Self::Accessible(policy) => *policy,
            Self::AccessControl(control) => control.policy(),
        }
    }
}

/// A single key-pair generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Key algorithm.
    pub key_type: KeyType,
    /// Modulus size in bits.
    pub key_size_bits: usize,
    /// Private-key attributes.
    pub private_attributes: PersistentAttributes,
    /// Public-key attributes.
    pub public_attributes: PersistentAttributes,
    /// Protection applied to the stored items.
    pub protection: Protection,
}
