//! Access-control policy for stored keys.
//!
//! A key is stored either with a bare [`AccessPolicy`] or, when use-time
//! constraints are requested, with an [`AccessControl`] descriptor that folds
//! the policy and the [`AccessFlags`] into a single value.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::status::Status;

/// When a stored key may be used.
///
/// The `*ThisDeviceOnly` variants are never migrated to another device: a
/// keychain backup leaves them behind.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum AccessPolicy {
    /// Usable only while the device is unlocked. Migrates with backups.
    WhenUnlocked,
    /// Usable once the device has been unlocked after a restart. Migrates with backups.
    AfterFirstUnlock,
    /// Always usable regardless of lock state. Migrates with backups.
    Always,
    /// Usable only while the device is unlocked. Never leaves the device.
    WhenUnlockedThisDeviceOnly,
    /// Usable once the device has been unlocked after a restart. Never leaves the device.
    #[default]
    AfterFirstUnlockThisDeviceOnly,
    /// Always usable regardless of lock state. Never leaves the device.
    AlwaysThisDeviceOnly,
    /// Usable only while unlocked and only while a passcode is set. Never leaves the device.
    ///
    /// Removing the device passcode makes these items unusable.
    WhenPasscodeSetThisDeviceOnly,
}

impl AccessPolicy {
    /// Returns `true` if items with this policy must stay on the device that created them.
    #[must_use]
    pub const fn is_device_only(self) -> bool {
        matches!(
            self,
            Self::WhenUnlockedThisDeviceOnly
                | Self::AfterFirstUnlockThisDeviceOnly
                | Self::AlwaysThisDeviceOnly
                | Self::WhenPasscodeSetThisDeviceOnly
        )
    }
}

/// Use-time constraints attached to a key at generation.
///
/// Combine with `|`. An empty set is valid and adds no constraint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessFlags(u32);

impl AccessFlags {
    /// No constraints.
    pub const NONE: Self = Self(0);
    /// Require the user's presence (biometry or passcode).
    pub const USER_PRESENCE: Self = Self(1 << 0);
    /// Require biometry with any enrolled identity.
    pub const BIOMETRY_ANY: Self = Self(1 << 1);
    /// Require biometry with the identities enrolled when the key was created.
    pub const BIOMETRY_CURRENT_SET: Self = Self(1 << 3);
    /// Require the device passcode.
    pub const DEVICE_PASSCODE: Self = Self(1 << 4);
    /// Any one of the listed constraints suffices.
    pub const OR: Self = Self(1 << 14);
    /// All of the listed constraints must be satisfied.
    pub const AND: Self = Self(1 << 15);
    /// The constraints apply to private-key operations.
    pub const PRIVATE_KEY_USAGE: Self = Self(1 << 30);

    const AUTHENTICATION: Self = Self(
        Self::USER_PRESENCE.0
            | Self::BIOMETRY_ANY.0
            | Self::BIOMETRY_CURRENT_SET.0
            | Self::DEVICE_PASSCODE.0,
    );

    /// Returns the raw bit set.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a flag set from raw bits, dropping unknown bits.
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        let known = Self::AUTHENTICATION.0
            | Self::OR.0
            | Self::AND.0
            | Self::PRIVATE_KEY_USAGE.0;
        Self(bits & known)
    }

    /// Returns `true` if every flag in `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns only the flags that demand user authentication.
    #[must_use]
    pub const fn authentication_constraints(self) -> Self {
        Self(self.0 & Self::AUTHENTICATION.0)
    }
}

impl BitOr for AccessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(AccessFlags, &str); 7] = [
            (AccessFlags::USER_PRESENCE, "user-presence"),
            (AccessFlags::BIOMETRY_ANY, "biometry-any"),
            (AccessFlags::BIOMETRY_CURRENT_SET, "biometry-current-set"),
            (AccessFlags::DEVICE_PASSCODE, "device-passcode"),
            (AccessFlags::OR, "or"),
            (AccessFlags::AND, "and"),
            (AccessFlags::PRIVATE_KEY_USAGE, "private-key-usage"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

impl std::str::FromStr for AccessFlags {
    type Err = String;

    /// Parses a `|`- or `,`-separated list such as `biometry-any|or|device-passcode`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(['|', ','])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(Self::NONE, |acc, part| {
                let flag = match part {
                    "none" => Self::NONE,
                    "user-presence" => Self::USER_PRESENCE,
                    "biometry-any" => Self::BIOMETRY_ANY,
                    "biometry-current-set" => Self::BIOMETRY_CURRENT_SET,
                    "device-passcode" => Self::DEVICE_PASSCODE,
                    "or" => Self::OR,
                    "and" => Self::AND,
                    "private-key-usage" => Self::PRIVATE_KEY_USAGE,
                    other => return Err(format!("unknown access flag `{other}`")),
                };
                Ok(acc | flag)
            })
    }
}

/// Compiled access-control descriptor: a policy plus use-time constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    policy: AccessPolicy,
    flags: AccessFlags,
}

impl AccessControl {
    /// Compiles a descriptor, rejecting contradictory flag combinations.
    ///
    /// # Errors
    ///
    /// Returns [`Status::PARAM`] when `OR` and `AND` are both set, when both
    /// biometry variants are set, or when a combinator joins fewer than two
    /// constraints.
    pub fn new(policy: AccessPolicy, flags: AccessFlags) -> Result<Self, Status> {
        if flags.contains(AccessFlags::OR | AccessFlags::AND) {
            return Err(Status::PARAM);
        }
        if flags.contains(AccessFlags::BIOMETRY_ANY | AccessFlags::BIOMETRY_CURRENT_SET) {
            return Err(Status::PARAM);
        }
        let combinator = flags.contains(AccessFlags::OR) || flags.contains(AccessFlags::AND);
        if combinator && flags.authentication_constraints().bits().count_ones() < 2 {
            return Err(Status::PARAM);
        }
        Ok(Self { policy, flags })
    }

    /// Returns the accessibility policy folded into the descriptor.
    #[must_use]
    pub const fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Returns the use-time constraints.
    #[must_use]
    pub const fn flags(&self) -> AccessFlags {
        self.flags
    }

    /// Returns `true` if using the key requires authenticating the user.
    #[must_use]
    pub const fn requires_authentication(&self) -> bool {
        !self.flags.authentication_constraints().is_empty()
    }
}
