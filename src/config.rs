//! Runtime configuration for a [Ledger](crate::Ledger).

use std::fmt::Debug;

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone, Tz};

use crate::PasswordHash;

/// The config for a ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// The bcrypt cost used when hashing passwords at signup.
    pub password_hash_cost: u32,
    /// The number of transactions listed when no limit is given.
    pub default_page_size: usize,
    /// The canonical name of the time zone (e.g. "Pacific/Auckland") that
    /// calendar days, months and years are computed in. `None` means UTC.
    pub timezone: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            password_hash_cost: PasswordHash::DEFAULT_COST,
            default_page_size: 20,
            timezone: None,
        }
    }
}

impl LedgerConfig {
    /// Resolve the configured time zone.
    ///
    /// Unknown time zone names fall back to UTC.
    pub fn local_time(&self) -> LocalTime {
        let Some(name) = &self.timezone else {
            return LocalTime::UTC;
        };

        match time_tz::timezones::get_by_name(name) {
            Some(tz) => LocalTime { tz: Some(tz) },
            None => {
                tracing::warn!("Unknown time zone {name:?}, using UTC");
                LocalTime::UTC
            }
        }
    }
}

/// Converts instants to the wall-clock time of a time zone.
///
/// The UTC offset is looked up for each instant, so daylight saving time is
/// taken into account for past dates as well as the current one.
#[derive(Clone, Copy)]
pub struct LocalTime {
    tz: Option<&'static Tz>,
}

impl LocalTime {
    /// Wall-clock time in UTC.
    pub const UTC: Self = Self { tz: None };

    /// The UTC offset of the time zone at `instant`.
    pub fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        match self.tz {
            Some(tz) => tz.get_offset_utc(&instant).to_utc(),
            None => UtcOffset::UTC,
        }
    }

    /// `instant` expressed in the time zone's offset at that instant.
    pub fn to_local(&self, instant: OffsetDateTime) -> OffsetDateTime {
        instant.to_offset(self.offset_at(instant))
    }

    /// The current time in the time zone.
    pub fn now(&self) -> OffsetDateTime {
        self.to_local(OffsetDateTime::now_utc())
    }
}

impl Debug for LocalTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tz {
            Some(tz) => write!(f, "LocalTime({})", tz.name()),
            None => write!(f, "LocalTime(UTC)"),
        }
    }
}
