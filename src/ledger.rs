//! Wires every store of the ledger to one shared database connection.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    CategoryStore, Error, IdentityStore, LedgerConfig, SummaryEngine, TableStorage,
    TransactionStore, db::initialize,
};

/// The stores of a ledger, all sharing the same [TableStorage].
///
/// Operations on categories, transactions and summaries take the identity they
/// act for explicitly, usually the result of [IdentityStore::current_user].
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Signs users up, in and out.
    pub identities: IdentityStore,
    /// The categories of every user.
    pub categories: CategoryStore,
    /// The transactions of every user.
    pub transactions: TransactionStore,
    /// Summaries of a user's transactions.
    pub summaries: SummaryEngine,
}

impl Ledger {
    /// Create a ledger backed by `db_connection`.
    ///
    /// This function will modify the database by adding the storage table if it
    /// does not exist yet.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the database could not be initialized.
    pub fn new(db_connection: Connection, config: LedgerConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let storage = TableStorage::new(Arc::new(Mutex::new(db_connection)));

        Ok(Self::with_storage(storage, config))
    }

    /// Create a ledger from an existing storage handle.
    pub fn with_storage(storage: TableStorage, config: LedgerConfig) -> Self {
        let identities = IdentityStore::new(storage.clone(), config.password_hash_cost);
        let categories = CategoryStore::new(storage.clone());
        let transactions = TransactionStore::new(storage, categories.clone(), config.clone());
        let summaries = SummaryEngine::new(transactions.clone(), config);

        Self {
            identities,
            categories,
            transactions,
            summaries,
        }
    }
}
