//! Persistent table storage.
//!
//! Every logical table of the ledger (users, the session token, categories and
//! transactions) is kept as one JSON document in the `storage` table created by
//! [initialize](crate::initialize_db). Reading a table never fails: a missing or
//! corrupt document reads as an empty table, and records that cannot be decoded
//! are skipped without affecting the rest of the table.

use std::sync::{Arc, Mutex, MutexGuard};

use rand::Rng;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::Error;

/// Generated IDs are drawn from `0..ID_UPPER_BOUND`.
const ID_UPPER_BOUND: i64 = 1_000_000_000;

/// The logical tables stored in a [TableStorage].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// Registered users.
    Users,
    /// The session token of the logged in user, a single string.
    Token,
    /// Transaction categories of every user.
    Categories,
    /// Transactions of every user.
    Transactions,
}

impl Table {
    /// The key the table is stored under.
    pub fn key(self) -> &'static str {
        match self {
            Self::Users => "fin_users",
            Self::Token => "access_token",
            Self::Categories => "fin_categories",
            Self::Transactions => "fin_transactions",
        }
    }
}

/// Reads and writes whole tables of records to a shared SQLite connection.
///
/// Cloning the storage is cheap and every clone refers to the same database.
#[derive(Debug, Clone)]
pub struct TableStorage {
    connection: Arc<Mutex<Connection>>,
}

impl TableStorage {
    /// Create a table storage from an initialized database connection.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get every record in `table`, in the order they were stored.
    ///
    /// Returns an empty vector if the table does not exist yet, its contents
    /// are not a JSON list, or the database could not be read. Records that
    /// cannot be decoded as `T` are left out.
    pub fn get<T: DeserializeOwned>(&self, table: Table) -> Vec<T> {
        let connection = self.lock();

        match read_raw(&connection, table) {
            Ok(raw) => parse_records(table, raw).records,
            Err(error) => {
                tracing::warn!("Could not read table {}: {error}", table.key());
                Vec::new()
            }
        }
    }

    /// Replace the contents of `table` with `records`.
    ///
    /// # Errors
    /// Returns an error if the records could not be serialized or written.
    pub fn set<T: Serialize>(&self, table: Table, records: &[T]) -> Result<(), Error> {
        let text = serde_json::to_string(records)?;
        write_raw(&self.lock(), table, &text)
    }

    /// Read `table`, let `f` modify the records and write the result back.
    ///
    /// The read and the write happen inside one immediate database transaction
    /// while the storage lock is held, so two callers can never both modify the
    /// same snapshot of the table, even from different connections.
    ///
    /// `f` only sees the records that could be decoded as `T`. The others are
    /// written back unchanged at their original positions.
    ///
    /// # Errors
    /// Returns an error if the records could not be serialized or written. The
    /// table is left unchanged in that case.
    pub fn update<T, R, F>(&self, table: Table, f: F) -> Result<R, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> R,
    {
        let mut connection = self.lock();
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw = read_raw(&transaction, table)?;
        let mut parsed = parse_records(table, raw);
        let result = f(&mut parsed.records);

        let text = serde_json::to_string(&parsed.into_values()?)?;
        write_raw(&transaction, table, &text)?;
        transaction.commit()?;

        Ok(result)
    }

    /// Get the single value stored in `table`, if there is one.
    ///
    /// Like [TableStorage::get], unreadable values are treated as absent.
    pub fn get_value<T: DeserializeOwned>(&self, table: Table) -> Option<T> {
        let raw = match read_raw(&self.lock(), table) {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!("Could not read value {}: {error}", table.key());
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!("Ignoring corrupt value {}: {error}", table.key());
                None
            }
        }
    }

    /// Store a single value in `table`, replacing whatever was there.
    ///
    /// # Errors
    /// Returns an error if the value could not be serialized or written.
    pub fn set_value<T: Serialize>(&self, table: Table, value: &T) -> Result<(), Error> {
        let text = serde_json::to_string(value)?;
        write_raw(&self.lock(), table, &text)
    }

    /// Delete `table` entirely. Removing a missing table is not an error.
    ///
    /// # Errors
    /// Returns an error if the database could not be written.
    pub fn remove(&self, table: Table) -> Result<(), Error> {
        self.lock()
            .execute("DELETE FROM storage WHERE key = ?1", (table.key(),))?;

        Ok(())
    }
}

fn read_raw(connection: &Connection, table: Table) -> Result<Option<String>, rusqlite::Error> {
    connection
        .query_row(
            "SELECT value FROM storage WHERE key = ?1",
            (table.key(),),
            |row| row.get(0),
        )
        .optional()
}

fn write_raw(connection: &Connection, table: Table, text: &str) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO storage (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (table.key(), text),
    )?;

    Ok(())
}

/// The contents of a table as read from storage.
struct ParsedTable<T> {
    /// The records that could be decoded, in stored order.
    records: Vec<T>,
    /// The records that could not be decoded with their position in the table.
    undecodable: Vec<(usize, Value)>,
}

impl<T: Serialize> ParsedTable<T> {
    /// Encode the records and put the undecodable ones back where they were.
    fn into_values(self) -> Result<Vec<Value>, serde_json::Error> {
        let mut values = self
            .records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        for (position, value) in self.undecodable {
            values.insert(position.min(values.len()), value);
        }

        Ok(values)
    }
}

fn parse_records<T: DeserializeOwned>(table: Table, raw: Option<String>) -> ParsedTable<T> {
    let mut parsed = ParsedTable {
        records: Vec::new(),
        undecodable: Vec::new(),
    };

    let Some(raw) = raw else {
        return parsed;
    };

    let values: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(error) => {
            tracing::warn!("Treating corrupt table {} as empty: {error}", table.key());
            return parsed;
        }
    };

    for (position, value) in values.into_iter().enumerate() {
        match T::deserialize(&value) {
            Ok(record) => parsed.records.push(record),
            Err(error) => {
                tracing::warn!(
                    "Skipping record {position} of table {}: {error}",
                    table.key()
                );
                parsed.undecodable.push((position, value));
            }
        }
    }

    parsed
}

/// Draw a random ID that `is_taken` does not reject.
///
/// IDs are random integers below one billion. Callers pass a check against the
/// table the ID is for, so an ID is only reused across different tables.
pub(crate) fn generate_id(is_taken: impl Fn(i64) -> bool) -> i64 {
    let mut rng = rand::thread_rng();

    loop {
        let id = rng.gen_range(0..ID_UPPER_BOUND);

        if !is_taken(id) {
            return id;
        }

        tracing::debug!("Generated ID {id} is already taken, drawing another");
    }
}
