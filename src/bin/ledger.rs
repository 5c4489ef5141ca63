use std::{error::Error, path::PathBuf, process::exit};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use time::{
    Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use finledger::{
    Ledger, LedgerConfig, NewTransaction, PasswordHash, SummaryRange, Transaction,
    TransactionQuery, TransactionType, coerce_amount, open_db,
};

/// A command line client for a finledger database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the ledger SQLite database. Created if it does not exist.
    #[arg(long)]
    db_path: PathBuf,

    /// The canonical time zone name (e.g. "Pacific/Auckland") used for
    /// calendar months and years in summaries. Defaults to UTC.
    #[arg(long)]
    timezone: Option<String>,

    /// The bcrypt cost used to hash passwords at signup.
    #[arg(long, default_value_t = PasswordHash::DEFAULT_COST)]
    hash_cost: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new user.
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in, replacing any existing session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session.
    Logout,
    /// Show the logged in user.
    Whoami,
    /// Record a transaction for the logged in user.
    Add {
        #[arg(long = "type", value_enum)]
        kind: KindArg,
        /// The amount. Anything that is not a number is recorded as 0.
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        /// The ID of an existing category.
        #[arg(long, conflicts_with = "category")]
        category_id: Option<i64>,
        /// A category name, created if it does not exist yet.
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// When the transaction happened as an RFC 3339 date-time. Defaults to now.
        #[arg(long, value_parser = parse_date_time)]
        occurred_at: Option<OffsetDateTime>,
    },
    /// List the logged in user's transactions, most recent first.
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Only list income or only list expenses.
        #[arg(long = "type", value_enum)]
        kind: Option<KindArg>,
        /// Only list transactions on or after this date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        from: Option<Date>,
        /// Only list transactions on or before this date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        to: Option<Date>,
        /// Only list transactions whose description or category contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// List the logged in user's categories.
    Categories {
        #[arg(long = "type", value_enum)]
        kind: Option<KindArg>,
    },
    /// Summarize the logged in user's transactions.
    Summary {
        /// One of last_30_days, last_90_days or ytd.
        #[arg(long, default_value = "last_30_days")]
        range: SummaryRange,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Income,
    Expense,
}

impl From<KindArg> for TransactionType {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Income => TransactionType::Income,
            KindArg::Expense => TransactionType::Expense,
        }
    }
}

fn parse_date_time(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(raw, &Rfc3339)
}

fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
}

fn main() {
    setup_logging();

    let args = Args::parse();

    if let Err(error) = run(args) {
        print_error(error);
        exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = LedgerConfig {
        password_hash_cost: args.hash_cost,
        timezone: args.timezone,
        ..Default::default()
    };
    let ledger = Ledger::new(open_db(&args.db_path)?, config)?;
    let identity = ledger.identities.current_user();

    match args.command {
        Command::Signup {
            name,
            email,
            password,
        } => print_json(&ledger.identities.signup(&name, &email, &password)?),
        Command::Login { email, password } => {
            print_json(&ledger.identities.login(&email, &password)?)
        }
        Command::Logout => {
            ledger.identities.logout()?;
            Ok(())
        }
        Command::Whoami => print_json(&identity),
        Command::Add {
            kind,
            amount,
            category_id,
            category,
            description,
            occurred_at,
        } => {
            let mut new_transaction = Transaction::build(kind.into(), coerce_amount(&amount));
            new_transaction = match (category_id, category) {
                (Some(id), _) => new_transaction.category_id(id),
                (None, Some(name)) => new_transaction.category_name(&name),
                (None, None) => new_transaction,
            };
            new_transaction = NewTransaction {
                description,
                occurred_at,
                ..new_transaction
            };

            print_json(&ledger.transactions.add(identity.as_ref(), new_transaction)?)
        }
        Command::List {
            limit,
            offset,
            kind,
            from,
            to,
            search,
        } => {
            let query = TransactionQuery {
                limit,
                offset,
                kind: kind.map(TransactionType::from),
                date_from: from,
                date_to: to,
                search,
            };

            print_json(&ledger.transactions.list(identity.as_ref(), query))
        }
        Command::Categories { kind } => print_json(
            &ledger
                .categories
                .list(identity.as_ref(), kind.map(TransactionType::from)),
        ),
        Command::Summary { range } => print_json(&ledger.summaries.get(identity.as_ref(), range)),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_error(error: impl ToString) {
    eprintln!("\x1b[31;1m{}\x1b[0m", error.to_string());
}
