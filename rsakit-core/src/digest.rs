//! Message digest collaborator for the legacy signing path.

use sha2::{Digest, Sha256};

/// Computes the digest a raw PKCS#1 v1.5 signature is taken over.
///
/// Legacy backends sign a caller-computed digest rather than the message, so
/// the engine hashes before calling them. The output must be the raw digest
/// bytes (32 bytes for SHA-256), not a textual encoding.
pub trait MessageDigest: Send + Sync {
    /// Hashes `message`.
    fn digest(&self, message: &[u8]) -> Vec<u8>;
}

/// SHA-256 from the `sha2` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Digest;

impl MessageDigest for Sha256Digest {
    fn digest(&self, message: &[u8]) -> Vec<u8> {
        Sha256::digest(message).to_vec()
    }
}
