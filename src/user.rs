//! Defines a registered user of the ledger and the public view of one.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Email, PasswordHash};

/// The name given to users who sign up without one.
pub(crate) const DEFAULT_USER_NAME: &str = "User";

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user as stored in the `fin_users` table.
///
/// Users are created once at signup and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID.
    pub id: UserId,
    /// The user's display name.
    pub name: String,
    /// The user's normalized email address, which doubles as their session token.
    pub email: Email,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// When the user signed up.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// The parts of the user that are safe to hand back to callers.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// A user without their credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's ID.
    pub id: UserId,
    /// The user's display name.
    pub name: String,
    /// The user's normalized email address.
    pub email: Email,
}

/// Trim `raw_name`, falling back to [DEFAULT_USER_NAME] if nothing is left.
pub(crate) fn normalize_name(raw_name: &str) -> String {
    match raw_name.trim() {
        "" => DEFAULT_USER_NAME.to_owned(),
        name => name.to_owned(),
    }
}

#[cfg(test)]
mod user_tests {
    use time::macros::datetime;

    use crate::{Email, PasswordHash};

    use super::{User, UserId, normalize_name};

    #[test]
    fn normalize_name_trims() {
        assert_eq!(normalize_name("  Ann "), "Ann");
    }

    #[test]
    fn blank_name_defaults_to_user() {
        assert_eq!(normalize_name("   "), "User");
    }

    #[test]
    fn user_serializes_with_camel_case_keys() {
        let user = User {
            id: UserId::new(42),
            name: "Ann".to_owned(),
            email: Email::new("ann@x.com"),
            password_hash: PasswordHash::new_unchecked("hunter2"),
            created_at: datetime!(2024-01-02 03:04:05 UTC),
        };

        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["id"], 42);
        assert_eq!(json["email"], "ann@x.com");
        assert_eq!(json["passwordHash"], "hunter2");
        assert_eq!(json["createdAt"], "2024-01-02T03:04:05Z");
    }

    #[test]
    fn profile_omits_password() {
        let user = User {
            id: UserId::new(1),
            name: "Ann".to_owned(),
            email: Email::new("ann@x.com"),
            password_hash: PasswordHash::new_unchecked("hunter2"),
            created_at: datetime!(2024-01-02 03:04:05 UTC),
        };

        let json = serde_json::to_value(user.profile()).unwrap();

        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["name"], "Ann");
    }
}
