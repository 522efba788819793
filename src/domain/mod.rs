//! Domain types for accounts and authorization with strong typing.
//!
//! This module provides type-safe wrappers and domain primitives shared by the
//! credential store, the auth service and the access gate. It follows the
//! Newtype pattern to keep raw database integers out of the public surface.

pub mod audit;
pub mod session;

pub use audit::{AuditEvent, AuditKind};
pub use session::{Account, Session};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current UTC time as fixed-width RFC 3339 (microseconds, `Z` suffix), so
/// stored timestamps sort lexicographically in time order.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Unique identifier for a user record.
///
/// Assigned by the database and never reused after deletion.
///
/// # Examples
///
/// ```rust
/// use stockgate::domain::UserId;
///
/// let id = UserId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UserId(i32);

impl UserId {
    /// Creates a new `UserId` from a raw i32 value.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `id` is negative.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        debug_assert!(id >= 0, "UserId should be non-negative");
        Self(id)
    }

    /// Returns the underlying i32 value.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UserId> for i32 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<i32> for UserId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl Serialize for UserId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

/// Permission level of an account.
///
/// Levels are totally ordered; a higher role subsumes every permission of a
/// lower one. The discriminants are the values stored in `users.role`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(i32)]
pub enum Role {
    Disabled = 1,
    #[default]
    Client = 2,
    Staff = 3,
    Manager = 4,
    Administrator = 5,
}

impl Role {
    pub const ALL: [Self; 5] = [
        Self::Disabled,
        Self::Client,
        Self::Staff,
        Self::Manager,
        Self::Administrator,
    ];

    /// Returns the stored integer level.
    #[must_use]
    pub const fn level(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Client => "Client",
            Self::Staff => "Staff",
            Self::Manager => "Manager",
            Self::Administrator => "Administrator",
        }
    }

    /// Returns true if this role satisfies `required`.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when an integer or name does not denote a role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl TryFrom<i32> for Role {
    type Error = UnknownRole;

    fn try_from(level: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|role| role.level() == level)
            .ok_or_else(|| UnknownRole(level.to_string()))
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    /// Accepts either the role name (case-insensitive) or its numeric level.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(level) = trimmed.parse::<i32>() {
            return Self::try_from(level);
        }

        Self::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownRole(trimmed.to_string()))
    }
}
