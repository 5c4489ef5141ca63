//! Finledger is a persistent, per-user financial ledger.
//!
//! Users sign up and log in through the [IdentityStore], record income and
//! expenses with the [TransactionStore], group them into categories with the
//! [CategoryStore] and get range totals and a 12-month trend from the
//! [SummaryEngine].
//!
//! Every store shares one [TableStorage] handle, which keeps each logical table
//! as a JSON document inside a SQLite database. The [Ledger] type wires the
//! stores together.

#![warn(missing_docs)]

mod category;
mod config;
mod db;
mod email;
mod identity;
mod ledger;
mod password;
mod storage;
mod summary;
mod transaction;
mod user;

pub use category::{Category, CategoryId, CategoryName, CategoryStore};
pub use config::{LedgerConfig, LocalTime};
pub use db::{initialize as initialize_db, open as open_db};
pub use email::Email;
pub use identity::{Identity, IdentityStore, Session};
pub use ledger::Ledger;
pub use password::PasswordHash;
pub use storage::{Table, TableStorage};
pub use summary::{Summary, SummaryEngine, SummaryRange, TrendBucket, summarize};
pub use transaction::{
    CategoryRef, NewTransaction, Transaction, TransactionId, TransactionQuery, TransactionStore,
    TransactionType, coerce_amount,
};
pub use user::{User, UserId, UserProfile};

/// The errors that may occur in the ledger.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A user with the same email address (ignoring case) is already registered.
    #[error("the email is already registered")]
    DuplicateEmail,

    /// The email did not belong to a registered user or the password did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The operation needs a logged in user, but there was none.
    #[error("not authenticated")]
    NotAuthenticated,

    /// An unexpected error occurred with the underlying hashing library.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A record could not be converted to or from JSON.
    #[error("could not serialize records: {0}")]
    JsonError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", value);
        Error::SqlError(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JsonError(value.to_string())
    }
}
