use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A normalized email address: surrounding whitespace removed and lowercased.
///
/// Two emails that differ only by case compare equal once normalized, which
/// is what makes email uniqueness case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Normalize `raw_email`.
    ///
    /// No format validation is done, any string is accepted.
    pub fn new(raw_email: &str) -> Self {
        Self(raw_email.trim().to_lowercase())
    }

    /// Create a new `Email` without normalizing it.
    ///
    /// The caller should ensure that `raw_email` is already trimmed and lowercase,
    /// e.g. because it was read back from the ledger's storage.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if a non-normalized email is provided it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(raw_email: String) -> Self {
        Self(raw_email)
    }

    /// Check whether `other` names this email, ignoring case.
    pub fn matches(&self, other: &str) -> bool {
        self.0.to_lowercase() == other.trim().to_lowercase()
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
