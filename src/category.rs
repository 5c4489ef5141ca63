//! Categories group a user's transactions, e.g. 'Groceries', 'Salary'.
//!
//! Each category belongs to one user and one [TransactionType]. Categories are
//! created lazily the first time a transaction names them and are never updated
//! or deleted.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Email, Error,
    identity::Identity,
    storage::{Table, TableStorage, generate_id},
    transaction::TransactionType,
};

/// Identifier for a category.
pub type CategoryId = i64;

/// A trimmed, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name from `name` with surrounding whitespace removed.
    ///
    /// Returns `None` if nothing is left after trimming.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();

        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is trimmed and not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Whether two names are the same when case is ignored.
    pub fn eq_ignore_case(&self, other: &CategoryName) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category as stored in the `fin_categories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The email of the user that owns the category.
    pub user_email: Email,
    /// The name of the category as it was first entered.
    pub name: CategoryName,
    /// Whether the category is for income or expenses.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// When the category was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Category {
    fn is_owned_by(&self, identity: &Identity) -> bool {
        self.user_email == identity.email
    }
}

/// Creates and retrieves the categories of the logged in user.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    storage: TableStorage,
}

impl CategoryStore {
    /// Create a category store.
    pub fn new(storage: TableStorage) -> Self {
        Self { storage }
    }

    /// Get the categories owned by `identity`, optionally only those of `kind`.
    ///
    /// Without an identity this returns no categories rather than an error.
    pub fn list(&self, identity: Option<&Identity>, kind: Option<TransactionType>) -> Vec<Category> {
        let Some(identity) = identity else {
            return Vec::new();
        };

        self.storage
            .get::<Category>(Table::Categories)
            .into_iter()
            .filter(|category| category.is_owned_by(identity))
            .filter(|category| kind.is_none_or(|kind| category.kind == kind))
            .collect()
    }

    /// Get the category of `kind` named `name`, creating it if it does not exist.
    ///
    /// Names are compared ignoring case and surrounding whitespace, so "Salary"
    /// and " salary" resolve to the same category. A new category keeps the
    /// trimmed name as given. Returns `None` if `name` is blank.
    ///
    /// # Errors
    /// This function will return an [Error::NotAuthenticated] if `identity` is
    /// `None`, or another [Error] if the new category could not be stored.
    pub fn upsert_by_name(
        &self,
        identity: Option<&Identity>,
        kind: TransactionType,
        name: &str,
    ) -> Result<Option<Category>, Error> {
        let identity = identity.ok_or(Error::NotAuthenticated)?;

        let Some(name) = CategoryName::new(name) else {
            return Ok(None);
        };

        let category = self
            .storage
            .update(Table::Categories, |categories: &mut Vec<Category>| {
                let existing = categories.iter().find(|category| {
                    category.is_owned_by(identity)
                        && category.kind == kind
                        && category.name.eq_ignore_case(&name)
                });

                if let Some(category) = existing {
                    return category.clone();
                }

                let id = generate_id(|id| categories.iter().any(|category| category.id == id));
                let category = Category {
                    id,
                    user_email: identity.email.clone(),
                    name,
                    kind,
                    created_at: OffsetDateTime::now_utc(),
                };
                tracing::debug!("Creating {kind} category {} ({id})", category.name);
                categories.push(category.clone());

                category
            })?;

        Ok(Some(category))
    }
}
