//! Defines transactions, the records of money earned or spent, and the store
//! that creates and lists them.

use std::{collections::HashMap, fmt::Display};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    CategoryStore, Email, Error, LedgerConfig,
    category::CategoryId,
    identity::Identity,
    storage::{Table, TableStorage, generate_id},
};

/// The category label of transactions without a category.
const UNCATEGORIZED: &str = "Uncategorized";
/// The category label of transactions whose category no longer exists.
const UNKNOWN_CATEGORY: &str = "Unknown Category";

/// Identifier for a transaction.
pub type TransactionId = i64;

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Income => write!(f, "income"),
            Self::Expense => write!(f, "expense"),
        }
    }
}

/// An expense or income as stored in the `fin_transactions` table.
///
/// To create a new `Transaction`, use [Transaction::build] and pass the
/// builder to [TransactionStore::add].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The email of the user that owns the transaction.
    pub user_email: Email,
    /// Whether the transaction is income or an expense.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The amount of money earned or spent. Always stored as given: expenses
    /// are not negated.
    pub amount: f64,
    /// The category of the transaction.
    ///
    /// This is a weak reference, the category is not guaranteed to exist.
    pub category_id: Option<CategoryId>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened.
    ///
    /// Stored records may hold a bare `YYYY-MM-DD` date, which is read as
    /// midnight UTC.
    #[serde(with = "occurred_at_format")]
    pub occurred_at: OffsetDateTime,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Transaction {
    /// Start building a new transaction.
    ///
    /// Shortcut for [NewTransaction::new] for discoverability.
    pub fn build(kind: TransactionType, amount: f64) -> NewTransaction {
        NewTransaction::new(kind, amount)
    }

    fn is_owned_by(&self, identity: &Identity) -> bool {
        self.user_email == identity.email
    }
}

mod occurred_at_format {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use time::{
        Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
    };

    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        time::serde::rfc3339::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;

        if let Ok(date_time) = OffsetDateTime::parse(&raw, &Rfc3339) {
            return Ok(date_time);
        }

        Date::parse(&raw, format_description!("[year]-[month]-[day]"))
            .map(|date| date.midnight().assume_utc())
            .map_err(|_| {
                D::Error::custom(format!("{raw:?} is not an RFC 3339 date-time or a date"))
            })
    }
}

/// How a new transaction refers to its category.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryRef {
    /// An existing category, used as is.
    Id(CategoryId),
    /// A category name, resolved with [CategoryStore::upsert_by_name].
    Name(String),
}

/// The details of a transaction that has not been added yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Whether the transaction is income or an expense.
    pub kind: TransactionType,
    /// The amount of money. Zero and negative amounts are allowed, non-finite
    /// amounts are stored as zero.
    pub amount: f64,
    /// The category, if any.
    pub category: Option<CategoryRef>,
    /// A description, empty descriptions are stored as none.
    pub description: Option<String>,
    /// When the transaction happened, defaults to the time it is added.
    pub occurred_at: Option<OffsetDateTime>,
}

impl NewTransaction {
    /// Create a new transaction with no category, description or date.
    pub fn new(kind: TransactionType, amount: f64) -> Self {
        Self {
            kind,
            amount,
            category: None,
            description: None,
            occurred_at: None,
        }
    }

    /// Set the category to an existing category ID.
    pub fn category_id(mut self, id: CategoryId) -> Self {
        self.category = Some(CategoryRef::Id(id));
        self
    }

    /// Set the category by name, creating the category if needed when the
    /// transaction is added.
    pub fn category_name(mut self, name: &str) -> Self {
        self.category = Some(CategoryRef::Name(name.to_owned()));
        self
    }

    /// Set the description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    /// Set when the transaction happened.
    pub fn occurred_at(mut self, occurred_at: OffsetDateTime) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

/// Convert user input into an amount.
///
/// Surrounding whitespace is ignored and empty input is zero. Input that is not
/// a finite number is also zero rather than an error.
pub fn coerce_amount(raw_amount: &str) -> f64 {
    let raw_amount = raw_amount.trim();

    if raw_amount.is_empty() {
        return 0.0;
    }

    match raw_amount.parse::<f64>() {
        Ok(amount) if amount.is_finite() => amount,
        _ => {
            tracing::debug!("Coercing invalid amount {raw_amount:?} to 0");
            0.0
        }
    }
}

/// Defines which transactions [TransactionStore::list] returns.
///
/// The filters are applied before the page is taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    /// The maximum number of transactions to return. `None` uses the store's
    /// default page size.
    pub limit: Option<usize>,
    /// The number of transactions to skip.
    pub offset: usize,
    /// Only include income or only include expenses.
    pub kind: Option<TransactionType>,
    /// Only include transactions on or after this local date.
    pub date_from: Option<Date>,
    /// Only include transactions on or before this local date.
    pub date_to: Option<Date>,
    /// Only include transactions whose description or category name contains
    /// this text, ignoring case. Empty text matches everything.
    pub search: Option<String>,
}

/// Creates and retrieves the transactions of the logged in user.
#[derive(Debug, Clone)]
pub struct TransactionStore {
    storage: TableStorage,
    categories: CategoryStore,
    config: LedgerConfig,
}

impl TransactionStore {
    /// Create a transaction store that resolves category names with `categories`.
    ///
    /// `config` sets the default page size and the time zone of date filters.
    pub fn new(storage: TableStorage, categories: CategoryStore, config: LedgerConfig) -> Self {
        Self {
            storage,
            categories,
            config,
        }
    }

    /// Add a transaction owned by `identity`.
    ///
    /// If the transaction names its category, the category is looked up ignoring
    /// case and created if it does not exist yet. Category IDs are not checked.
    ///
    /// # Errors
    /// This function will return an [Error::NotAuthenticated] if `identity` is
    /// `None`, or another [Error] if the transaction could not be stored.
    pub fn add(
        &self,
        identity: Option<&Identity>,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, Error> {
        let identity = identity.ok_or(Error::NotAuthenticated)?;

        let category_id = match &new_transaction.category {
            Some(CategoryRef::Id(id)) => Some(*id),
            Some(CategoryRef::Name(name)) => self
                .categories
                .upsert_by_name(Some(identity), new_transaction.kind, name)?
                .map(|category| category.id),
            None => None,
        };

        let amount = if new_transaction.amount.is_finite() {
            new_transaction.amount
        } else {
            0.0
        };
        let description = new_transaction
            .description
            .filter(|description| !description.is_empty());
        let now = OffsetDateTime::now_utc();

        let transaction = self
            .storage
            .update(Table::Transactions, |transactions: &mut Vec<Transaction>| {
                let id = generate_id(|id| transactions.iter().any(|other| other.id == id));
                let transaction = Transaction {
                    id,
                    user_email: identity.email.clone(),
                    kind: new_transaction.kind,
                    amount,
                    category_id,
                    description,
                    occurred_at: new_transaction.occurred_at.unwrap_or(now),
                    created_at: now,
                    updated_at: now,
                };
                transactions.push(transaction.clone());

                transaction
            })?;

        tracing::debug!(
            "Added {} transaction {} of {} for {}",
            transaction.kind,
            transaction.id,
            transaction.amount,
            transaction.user_email
        );

        Ok(transaction)
    }

    /// Get a page of the transactions owned by `identity` that match `query`,
    /// most recent first.
    ///
    /// Transactions that happened at the same time keep the order they were
    /// added in. Without an identity this returns no transactions.
    pub fn list(&self, identity: Option<&Identity>, query: TransactionQuery) -> Vec<Transaction> {
        let limit = query.limit.unwrap_or(self.config.default_page_size);
        let local = self.config.local_time();
        let search = query
            .search
            .as_deref()
            .filter(|search| !search.is_empty())
            .map(str::to_lowercase);
        let category_names: HashMap<CategoryId, String> = if search.is_some() {
            self.categories
                .list(identity, None)
                .into_iter()
                .map(|category| (category.id, category.name.to_string()))
                .collect()
        } else {
            HashMap::new()
        };

        let mut transactions: Vec<Transaction> = self
            .owned(identity)
            .into_iter()
            .filter(|transaction| query.kind.is_none_or(|kind| transaction.kind == kind))
            .filter(|transaction| {
                let date = local.to_local(transaction.occurred_at).date();
                query.date_from.is_none_or(|from| date >= from)
                    && query.date_to.is_none_or(|to| date <= to)
            })
            .filter(|transaction| {
                search.as_deref().is_none_or(|search| {
                    let description = transaction.description.as_deref().unwrap_or_default();
                    let category = category_label(transaction.category_id, &category_names);

                    description.to_lowercase().contains(search)
                        || category.to_lowercase().contains(search)
                })
            })
            .collect();
        // Stable sort, ties stay in insertion order.
        transactions.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        transactions
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .collect()
    }

    /// Get every transaction owned by `identity` in the order they were added.
    pub fn owned(&self, identity: Option<&Identity>) -> Vec<Transaction> {
        let Some(identity) = identity else {
            return Vec::new();
        };

        self.storage
            .get::<Transaction>(Table::Transactions)
            .into_iter()
            .filter(|transaction| transaction.is_owned_by(identity))
            .collect()
    }
}

/// The name a transaction's category is shown and searched by.
fn category_label(
    category_id: Option<CategoryId>,
    category_names: &HashMap<CategoryId, String>,
) -> &str {
    match category_id {
        None => UNCATEGORIZED,
        Some(id) => category_names
            .get(&id)
            .map_or(UNKNOWN_CATEGORY, String::as_str),
    }
}
