//! Summarizes a user's transactions: totals over a range, the lifetime balance,
//! the savings rate and a 12-month income/expense trend.
//!
//! Sums are accumulated at full precision and only rounded in the [Summary]
//! that is handed back.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Duration, Month, OffsetDateTime};

use crate::{
    LedgerConfig, LocalTime, Transaction, TransactionStore, TransactionType, identity::Identity,
};

/// The number of monthly buckets in a trend.
const TREND_MONTHS: usize = 12;

/// The time window that the range totals of a [Summary] cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryRange {
    /// The 30 days up to now.
    #[default]
    #[serde(rename = "last_30_days")]
    Last30Days,
    /// The 90 days up to now.
    #[serde(rename = "last_90_days")]
    Last90Days,
    /// From midnight on the 1st of January of the current year up to now.
    #[serde(rename = "ytd")]
    YearToDate,
}

impl SummaryRange {
    /// Parse a range name, falling back to [SummaryRange::Last30Days] for
    /// anything unrecognized.
    pub fn parse(raw_range: &str) -> Self {
        match raw_range {
            "last_30_days" => Self::Last30Days,
            "last_90_days" => Self::Last90Days,
            "ytd" => Self::YearToDate,
            other => {
                tracing::debug!("Unknown summary range {other:?}, using last_30_days");
                Self::Last30Days
            }
        }
    }

    /// The name of the range.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Last30Days => "last_30_days",
            Self::Last90Days => "last_90_days",
            Self::YearToDate => "ytd",
        }
    }

    /// The start of the range ending at `now`.
    ///
    /// The start of the year is local midnight on the 1st of January, in the
    /// UTC offset `local` has at that time.
    pub fn window_start(self, now: OffsetDateTime, local: LocalTime) -> OffsetDateTime {
        match self {
            Self::Last30Days => now - Duration::days(30),
            Self::Last90Days => now - Duration::days(90),
            Self::YearToDate => {
                let now = local.to_local(now);
                let new_years_day = now.date() - Duration::days(i64::from(now.ordinal()) - 1);
                let midnight = new_years_day.midnight();
                midnight.assume_offset(local.offset_at(midnight.assume_utc()))
            }
        }
    }
}

impl FromStr for SummaryRange {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// The income and expenses of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    /// The month formatted as "YYYY-MM".
    pub month: String,
    /// The total income of the month.
    pub income: f64,
    /// The total expenses of the month.
    pub expense: f64,
}

/// An overview of a user's finances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Lifetime income minus lifetime expenses, regardless of the range.
    pub total_balance: f64,
    /// The income within the range.
    pub monthly_income: f64,
    /// The expenses within the range.
    pub monthly_expenses: f64,
    /// The share of the range's income that was not spent, between 0 and 1.
    pub savings_rate: f64,
    /// The current calendar month and the 11 before it, oldest first.
    pub trend: Vec<TrendBucket>,
}

/// Summarize `transactions` as of `now`.
///
/// Calendar months are taken in the time zone of `local`, using the UTC offset
/// at the time of each transaction. Transactions outside the 12-month trend
/// window still count towards the total balance.
pub fn summarize(
    transactions: &[Transaction],
    range: SummaryRange,
    now: OffsetDateTime,
    local: LocalTime,
) -> Summary {
    let now = local.to_local(now);
    let window = range.window_start(now, local)..=now;

    let mut income = 0.0;
    let mut expenses = 0.0;
    let mut total_income = 0.0;
    let mut total_expenses = 0.0;
    let mut trend = empty_trend(now);

    for transaction in transactions {
        let in_window = window.contains(&transaction.occurred_at);
        let local_date = local.to_local(transaction.occurred_at);
        let label = month_label(local_date.year(), local_date.month());
        let bucket = trend.iter_mut().find(|bucket| bucket.month == label);

        match transaction.kind {
            TransactionType::Income => {
                total_income += transaction.amount;
                if in_window {
                    income += transaction.amount;
                }
                if let Some(bucket) = bucket {
                    bucket.income += transaction.amount;
                }
            }
            TransactionType::Expense => {
                total_expenses += transaction.amount;
                if in_window {
                    expenses += transaction.amount;
                }
                if let Some(bucket) = bucket {
                    bucket.expense += transaction.amount;
                }
            }
        }
    }

    Summary {
        total_balance: round_to(total_income - total_expenses, 2),
        monthly_income: round_to(income, 2),
        monthly_expenses: round_to(expenses, 2),
        savings_rate: round_to(savings_rate(income, expenses), 3),
        trend,
    }
}

/// The share of `income` left after `expenses`, never negative.
///
/// Zero when there is no income.
fn savings_rate(income: f64, expenses: f64) -> f64 {
    if income > 0.0 {
        (1.0 - expenses / income).max(0.0)
    } else {
        0.0
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn month_label(year: i32, month: Month) -> String {
    format!("{year:04}-{:02}", u8::from(month))
}

/// Zeroed buckets for the month of `now` and the 11 months before it, oldest first.
fn empty_trend(now: OffsetDateTime) -> Vec<TrendBucket> {
    let mut year = now.year();
    let mut month = now.month();
    let mut trend = Vec::with_capacity(TREND_MONTHS);

    for _ in 0..TREND_MONTHS {
        trend.push(TrendBucket {
            month: month_label(year, month),
            income: 0.0,
            expense: 0.0,
        });

        if month == Month::January {
            year -= 1;
        }
        month = month.previous();
    }

    trend.reverse();
    trend
}

/// Summarizes the transactions of the logged in user.
#[derive(Debug, Clone)]
pub struct SummaryEngine {
    transactions: TransactionStore,
    config: LedgerConfig,
}

impl SummaryEngine {
    /// Create a summary engine that reads from `transactions` and takes
    /// calendar months and years in the time zone of `config`.
    pub fn new(transactions: TransactionStore, config: LedgerConfig) -> Self {
        Self {
            transactions,
            config,
        }
    }

    /// Summarize the transactions of `identity` as of now.
    ///
    /// Without an identity, the summary is all zeros.
    pub fn get(&self, identity: Option<&Identity>, range: SummaryRange) -> Summary {
        self.get_at(identity, range, OffsetDateTime::now_utc())
    }

    /// Summarize the transactions of `identity` as of `now`.
    pub fn get_at(
        &self,
        identity: Option<&Identity>,
        range: SummaryRange,
        now: OffsetDateTime,
    ) -> Summary {
        let transactions = self.transactions.owned(identity);
        tracing::debug!(
            "Summarizing {} transactions over {}",
            transactions.len(),
            range.as_str()
        );

        summarize(&transactions, range, now, self.config.local_time())
    }
}


#[cfg(test)]
mod summarize_tests {
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{Email, LedgerConfig, LocalTime, Transaction, TransactionType};

    use super::{Summary, SummaryRange};

    fn transaction(kind: TransactionType, amount: f64, occurred_at: OffsetDateTime) -> Transaction {
        Transaction {
            id: 0,
            user_email: Email::new("ann@x.com"),
            kind,
            amount,
            category_id: None,
            description: None,
            occurred_at,
            created_at: occurred_at,
            updated_at: occurred_at,
        }
    }

    fn income(amount: f64, occurred_at: OffsetDateTime) -> Transaction {
        transaction(TransactionType::Income, amount, occurred_at)
    }

    fn expense(amount: f64, occurred_at: OffsetDateTime) -> Transaction {
        transaction(TransactionType::Expense, amount, occurred_at)
    }

    const NOW: OffsetDateTime = datetime!(2024-06-15 12:00 UTC);

    fn summarize(
        transactions: &[Transaction],
        range: SummaryRange,
        now: OffsetDateTime,
    ) -> Summary {
        super::summarize(transactions, range, now, LocalTime::UTC)
    }

    fn auckland() -> LocalTime {
        LedgerConfig {
            timezone: Some("Pacific/Auckland".to_owned()),
            ..Default::default()
        }
        .local_time()
    }

    #[test]
    fn no_transactions() {
        let summary = summarize(&[], SummaryRange::Last30Days, NOW);

        assert_eq!(summary.total_balance, 0.0);
        assert_eq!(summary.monthly_income, 0.0);
        assert_eq!(summary.monthly_expenses, 0.0);
        assert_eq!(summary.savings_rate, 0.0);
        assert_eq!(summary.trend.len(), 12);
        assert!(
            summary
                .trend
                .iter()
                .all(|bucket| bucket.income == 0.0 && bucket.expense == 0.0)
        );
    }

    #[test]
    fn range_totals() {
        let transactions = [
            income(100.0, NOW - Duration::days(10)),
            income(50.0, NOW - Duration::days(45)),
            income(25.0, datetime!(2024-01-02 0:00 UTC)),
            income(7.0, datetime!(2023-12-01 0:00 UTC)),
            expense(30.0, NOW - Duration::days(1)),
        ];

        let last_30 = summarize(&transactions, SummaryRange::Last30Days, NOW);
        let last_90 = summarize(&transactions, SummaryRange::Last90Days, NOW);
        let ytd = summarize(&transactions, SummaryRange::YearToDate, NOW);

        assert_eq!(last_30.monthly_income, 100.0);
        assert_eq!(last_30.monthly_expenses, 30.0);
        assert_eq!(last_90.monthly_income, 150.0);
        assert_eq!(ytd.monthly_income, 175.0);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let transactions = [
            income(1.0, NOW - Duration::days(30)),
            income(2.0, NOW),
            income(4.0, NOW - Duration::days(30) - Duration::seconds(1)),
            income(8.0, NOW + Duration::seconds(1)),
        ];

        let summary = summarize(&transactions, SummaryRange::Last30Days, NOW);

        assert_eq!(summary.monthly_income, 3.0);
        assert_eq!(summary.total_balance, 15.0);
    }

    #[test]
    fn total_balance_ignores_range() {
        let transactions = [
            income(1000.0, datetime!(2019-01-01 0:00 UTC)),
            expense(250.5, datetime!(2020-01-01 0:00 UTC)),
            income(10.0, NOW),
            expense(0.25, NOW),
        ];

        for range in [
            SummaryRange::Last30Days,
            SummaryRange::Last90Days,
            SummaryRange::YearToDate,
        ] {
            let summary = summarize(&transactions, range, NOW);

            assert_eq!(summary.total_balance, 759.25);
        }
    }

    #[test]
    fn savings_rate_is_zero_without_income() {
        let transactions = [expense(20.0, NOW)];

        let summary = summarize(&transactions, SummaryRange::Last30Days, NOW);

        assert_eq!(summary.savings_rate, 0.0);
    }

    #[test]
    fn savings_rate_is_one_without_expenses() {
        let transactions = [income(100.0, NOW)];

        let summary = summarize(&transactions, SummaryRange::Last30Days, NOW);

        assert_eq!(summary.savings_rate, 1.0);
    }

    #[test]
    fn savings_rate_is_clamped_to_zero() {
        let transactions = [income(100.0, NOW), expense(150.0, NOW)];

        let summary = summarize(&transactions, SummaryRange::Last30Days, NOW);

        assert_eq!(summary.savings_rate, 0.0);
    }

    #[test]
    fn outputs_are_rounded() {
        let transactions = [
            income(0.1, NOW),
            income(0.2, NOW),
            income(2.7, NOW),
            expense(1.0, NOW),
        ];

        let summary = summarize(&transactions, SummaryRange::Last30Days, NOW);

        assert_eq!(summary.monthly_income, 3.0);
        assert_eq!(summary.total_balance, 2.0);
        assert_eq!(summary.savings_rate, 0.667);
    }

    #[test]
    fn trend_covers_current_and_previous_eleven_months() {
        let summary = summarize(&[], SummaryRange::Last30Days, NOW);

        let labels: Vec<&str> = summary.trend.iter().map(|b| b.month.as_str()).collect();

        assert_eq!(
            labels,
            vec![
                "2023-07", "2023-08", "2023-09", "2023-10", "2023-11", "2023-12", "2024-01",
                "2024-02", "2024-03", "2024-04", "2024-05", "2024-06",
            ]
        );
    }

    #[test]
    fn trend_wraps_in_january() {
        let summary = summarize(&[], SummaryRange::Last30Days, datetime!(2024-01-10 0:00 UTC));

        assert_eq!(summary.trend.first().unwrap().month, "2023-02");
        assert_eq!(summary.trend.last().unwrap().month, "2024-01");
    }

    #[test]
    fn trend_sums_by_month() {
        let transactions = [
            income(1200.0, datetime!(2024-06-01 0:00 UTC)),
            income(300.0, datetime!(2024-06-10 0:00 UTC)),
            expense(80.0, datetime!(2024-06-11 0:00 UTC)),
            expense(20.0, datetime!(2023-07-31 23:59 UTC)),
        ];

        let summary = summarize(&transactions, SummaryRange::Last30Days, NOW);

        let june = summary.trend.last().unwrap();
        assert_eq!(june.income, 1500.0);
        assert_eq!(june.expense, 80.0);
        let oldest = summary.trend.first().unwrap();
        assert_eq!(oldest.month, "2023-07");
        assert_eq!(oldest.expense, 20.0);
    }

    #[test]
    fn transactions_older_than_trend_only_count_towards_balance() {
        let thirteen_months_ago = datetime!(2023-05-15 12:00 UTC);
        let transactions = [income(500.0, thirteen_months_ago), income(100.0, NOW)];

        let summary = summarize(&transactions, SummaryRange::Last30Days, NOW);

        assert!(summary.trend.iter().all(|bucket| bucket.month != "2023-05"));
        let trend_income: f64 = summary.trend.iter().map(|bucket| bucket.income).sum();
        assert_eq!(trend_income, 100.0);
        assert_eq!(summary.total_balance, 600.0);
    }

    #[test]
    fn future_transactions_are_left_out_of_trend() {
        let transactions = [income(9.0, datetime!(2024-07-01 0:00 UTC))];

        let summary = summarize(&transactions, SummaryRange::Last30Days, NOW);

        assert!(summary.trend.iter().all(|bucket| bucket.income == 0.0));
        assert_eq!(summary.total_balance, 9.0);
    }

    #[test]
    fn trend_uses_local_month() {
        let now = datetime!(2024-03-01 05:00 +13:00);
        // 2024-03-01 09:00 in Auckland.
        let transactions = [income(10.0, datetime!(2024-02-29 20:00 UTC))];

        let summary = super::summarize(&transactions, SummaryRange::Last30Days, now, auckland());

        let march = summary.trend.last().unwrap();
        assert_eq!(march.month, "2024-03");
        assert_eq!(march.income, 10.0);
    }

    #[test]
    fn trend_uses_offset_at_time_of_transaction() {
        // Summarized in NZST (+12:00), but the transaction happened during
        // NZDT (+13:00) at 2024-04-01 00:30 local time.
        let now = datetime!(2024-06-15 12:00 +12:00);
        let transactions = [expense(10.0, datetime!(2024-03-31 11:30 UTC))];

        let summary = super::summarize(&transactions, SummaryRange::Last30Days, now, auckland());

        let april = summary
            .trend
            .iter()
            .find(|bucket| bucket.month == "2024-04")
            .unwrap();
        let march = summary
            .trend
            .iter()
            .find(|bucket| bucket.month == "2024-03")
            .unwrap();
        assert_eq!(april.expense, 10.0);
        assert_eq!(march.expense, 0.0);
    }

    #[test]
    fn trend_months_follow_local_now() {
        // Already July in Auckland.
        let now = datetime!(2024-06-30 13:00 UTC);

        let summary = super::summarize(&[], SummaryRange::Last30Days, now, auckland());

        assert_eq!(summary.trend.last().unwrap().month, "2024-07");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let summary = summarize(&[income(1.0, NOW)], SummaryRange::Last30Days, NOW);

        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["totalBalance"], 1.0);
        assert_eq!(json["monthlyIncome"], 1.0);
        assert_eq!(json["monthlyExpenses"], 0.0);
        assert_eq!(json["savingsRate"], 1.0);
        assert_eq!(json["trend"][11]["month"], "2024-06");
        assert_eq!(json["trend"][11]["expense"], 0.0);
    }
}
