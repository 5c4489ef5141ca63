//! Creates the SQLite table that backs the ledger's [TableStorage](crate::TableStorage).

use std::path::Path;

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::Error;

/// Create the key-value table that holds every serialized ledger table.
///
/// Each row maps a table key (e.g. `fin_users`) to the JSON text of that table.
/// Calling this on an already initialized database is a no-op.
///
/// # Errors
/// Returns an [Error::SqlError] if the table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    transaction.execute(
        "CREATE TABLE IF NOT EXISTS storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
                )",
        (),
    )?;

    transaction.commit()?;

    Ok(())
}

/// Open the database file at `path`, creating and initializing it if needed.
///
/// # Errors
/// Returns an [Error::SqlError] if the file could not be opened or initialized.
pub fn open(path: &Path) -> Result<Connection, Error> {
    tracing::debug!("Opening ledger database at {path:?}");
    let connection = Connection::open(path)?;
    initialize(&connection)?;

    Ok(connection)
}

#[cfg(test)]
mod db_tests {
    use rusqlite::Connection;

    use super::{initialize, open};

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert!(initialize(&connection).is_ok());
    }

    #[test]
    fn open_creates_storage_table() {
        let dir = tempfile::tempdir().unwrap();
        let connection = open(&dir.path().join("ledger.db")).unwrap();

        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM storage", [], |row| row.get(0))
            .unwrap();

        assert_eq!(count, 0);
    }
}
