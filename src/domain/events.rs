//! Event records ingested from the two external systems
//!
//! An [`Event`] is immutable once ingested. Within one [`SourceSystem`] the
//! `id` is unique and is the key used for reconciliation.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Type};
use std::fmt;
use std::str::FromStr;

/// Identifier of an event within its source system
pub type EventId = i64;

/// Origin tag of an event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceSystem {
    /// The system events are first scraped from
    Famly,
    /// The system missing events are replayed into
    BabyConnect,
}

impl SourceSystem {
    pub const ALL: [Self; 2] = [Self::Famly, Self::BabyConnect];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Famly => "famly",
            Self::BabyConnect => "baby_connect",
        }
    }

    /// Display name used in progress messages and error details
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Famly => "Famly",
            Self::BabyConnect => "Baby Connect",
        }
    }

    /// Name of the progress entry a scrape of this system reports under
    #[must_use]
    pub const fn progress_name(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "famly" => Ok(Self::Famly),
            "baby_connect" => Ok(Self::BabyConnect),
            other => Err(format!("Invalid SourceSystem: {other}")),
        }
    }
}

impl Type<sqlx::Sqlite> for SourceSystem {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> Encode<'q, sqlx::Sqlite> for SourceSystem {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as Encode<sqlx::Sqlite>>::encode(self.as_str().to_string(), buf)
    }
}

impl<'r> Decode<'r, sqlx::Sqlite> for SourceSystem {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse::<Self>().map_err(Into::into)
    }
}

/// A record ingested from one of the external systems
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub source_system: SourceSystem,
    pub created_at: DateTime<Utc>,
    /// Opaque to the engine; handed to the target writer unchanged.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(id: EventId, source_system: SourceSystem, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            source_system,
            created_at,
            payload: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Time range handed to an ingestion driver
///
/// `days_back = 0` covers today only; `from` is UTC midnight of
/// `today - days_back` and `until` is the moment the window was computed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ScrapeWindow {
    pub days_back: u32,
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl ScrapeWindow {
    pub fn ending_at(days_back: u32, now: DateTime<Utc>) -> Self {
        let first_day = now.date_naive() - Duration::days(i64::from(days_back));
        Self {
            days_back,
            from: first_day.and_time(NaiveTime::MIN).and_utc(),
            until: now,
        }
    }

    pub fn ending_now(days_back: u32) -> Self {
        Self::ending_at(days_back, Utc::now())
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.until
    }
}
