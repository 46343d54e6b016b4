//! Backend status codes and error values.

use std::fmt;

use thiserror::Error;

/// Status code reported by a secure-storage backend.
///
/// The values follow the platform keychain's `OSStatus` numbering so codes
/// surfaced by a native backend and by the software keychain read the same in
/// logs. This layer never interprets a code beyond the few constants below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    /// No error.
    pub const SUCCESS: Self = Self(0);
    /// Function or operation not implemented.
    pub const UNIMPLEMENTED: Self = Self(-4);
    /// One or more parameters passed to the function were not valid.
    pub const PARAM: Self = Self(-50);
    /// The user canceled the operation.
    pub const USER_CANCELED: Self = Self(-128);
    /// An internal component failed.
    pub const INTERNAL_COMPONENT: Self = Self(-2070);
    /// No keychain is available.
    pub const NOT_AVAILABLE: Self = Self(-25291);
    /// Authorization or authentication failed.
    pub const AUTH_FAILED: Self = Self(-25293);
    /// The item already exists.
    pub const DUPLICATE_ITEM: Self = Self(-25299);
    /// The item cannot be found.
    pub const ITEM_NOT_FOUND: Self = Self(-25300);
    /// Interaction with the keychain is not allowed in the current state.
    pub const INTERACTION_NOT_ALLOWED: Self = Self(-25308);
    /// Unable to decode the provided data.
    pub const DECODE: Self = Self(-26275);
    /// A cryptographic verification failure occurred.
    pub const VERIFY_FAILED: Self = Self(-67808);

    /// Returns the raw status value.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Returns `true` for [`Status::SUCCESS`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// Converts a raw status into a `Result`, treating anything but success as an error.
    ///
    /// # Errors
    ///
    /// Returns `Err(self)` when the status is not [`Status::SUCCESS`].
    pub const fn into_result(self) -> Result<(), Self> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

/// Error object returned by the modern (direct-call) backend primitives.
///
/// Carries the status that the typed errors preserve, plus a human-readable
/// description that is only ever logged.
#[derive(Debug, Clone, Error)]
#[error("{description} (status {status})")]
pub struct BackendError {
    /// Status value reported by the backend.
    pub status: Status,
    /// Backend-provided description of the failure.
    pub description: String,
}

impl BackendError {
    /// Creates a new backend error.
    #[must_use]
    pub fn new(status: Status, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
        }
    }
}

impl From<Status> for BackendError {
    fn from(status: Status) -> Self {
        Self::new(status, "backend call failed")
    }
}

/// Result type for modern backend calls.
pub type BackendResult<T> = Result<T, BackendError>;
