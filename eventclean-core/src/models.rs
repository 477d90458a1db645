//! Staging and canonical record types.
//!
//! Staging records mirror the raw files: every field is optional free text.
//! Canonical records are strongly typed so that a value which breaks a
//! domain constraint cannot be represented at all.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Exact character length of a canonical user identifier.
pub const USER_ID_LENGTH: usize = 36;

/// Canonical user identifier: exactly 36 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Builds a user id, returning `None` unless the value is exactly
    /// [`USER_ID_LENGTH`] characters long.
    pub fn parse(value: &str) -> Option<Self> {
        (value.chars().count() == USER_ID_LENGTH).then(|| Self(value.to_string()))
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
            .ok_or_else(|| format!("user id must be {} characters", USER_ID_LENGTH))
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// User category enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Category {
    A,
    B,
    C,
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    /// Parses the single-character code; anything else is out of domain.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            _ => None,
        }
    }

    /// The persisted single-character code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hour of day, 0 through 23.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Hour(u8);

impl Hour {
    /// Latest valid hour.
    pub const MAX: i32 = 23;

    /// Returns `None` outside 0..=23.
    pub fn new(value: i32) -> Option<Self> {
        if (0..=Self::MAX).contains(&value) {
            u8::try_from(value).ok().map(Self)
        } else {
            None
        }
    }

    /// The hour as stored (`int` column).
    pub fn value(self) -> i32 {
        i32::from(self.0)
    }
}

impl TryFrom<i32> for Hour {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("hour {} outside 0..=23", value))
    }
}

impl From<Hour> for i32 {
    fn from(value: Hour) -> Self {
        value.value()
    }
}

/// Canonical user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Primary key
    pub userid: UserId,
    /// Whether the user holds a subscription
    pub subscriber: bool,
    /// Single-letter user category
    pub category: Category,
}

impl UserRecord {
    /// Subscriber flag as persisted (`0` or `1`).
    pub fn subscriber_flag(&self) -> i32 {
        i32::from(self.subscriber)
    }
}

/// Canonical event-participation row.
///
/// `userid` is not required to exist in the user table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventRecord {
    /// Participating user
    pub userid: UserId,
    /// Day of the event, inside the validity window
    pub event_date: NaiveDate,
    /// Hour of day the event started
    pub hour: Hour,
    /// Points awarded; may be negative
    pub points: i64,
}

/// A staged user row exactly as read from the raw file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingUserRecord {
    /// 1-based data row ordinal in the source file
    pub source_line: u64,
    /// Raw `userid` text
    pub userid: Option<String>,
    /// Raw `subscriber` text
    pub subscriber: Option<String>,
    /// Raw `category` text
    pub category: Option<String>,
}

/// A staged event row exactly as read from the raw file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingEventRecord {
    /// 1-based data row ordinal in the source file
    pub source_line: u64,
    /// Raw `userid` text
    pub userid: Option<String>,
    /// Raw `event_date` text, in any of the accepted layouts
    pub event_date: Option<String>,
    /// Raw `hour` text
    pub hour: Option<String>,
    /// Raw `points` text, stray quotes and question marks included
    pub points: Option<String>,
}

/// Complete contents of both staging tables at one point in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSnapshot {
    /// Staged user rows in source order
    pub users: Vec<StagingUserRecord>,
    /// Staged event rows in source order
    pub events: Vec<StagingEventRecord>,
}

/// The two record streams handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// The user table
    Users,
    /// The event-performance table
    Events,
}

impl RecordKind {
    /// Staging table name.
    pub fn staging_table(&self) -> &'static str {
        match self {
            Self::Users => "users_staging",
            Self::Events => "event_performance_staging",
        }
    }

    /// Canonical table name.
    pub fn canonical_table(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Events => "event_performance",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Users => write!(f, "users"),
            Self::Events => write!(f, "events"),
        }
    }
}

/// A staged column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// `userid`, in both tables
    UserId,
    /// `subscriber`
    Subscriber,
    /// `category`
    Category,
    /// `event_date`
    EventDate,
    /// `hour`
    Hour,
    /// `points`
    Points,
}

impl Field {
    /// Column names of the user staging table, in file order.
    pub const USER_FIELDS: [Self; 3] = [Self::UserId, Self::Subscriber, Self::Category];

    /// Column names of the event staging table, in file order.
    pub const EVENT_FIELDS: [Self; 4] = [Self::UserId, Self::EventDate, Self::Hour, Self::Points];

    /// Column name as it appears in headers and tables.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::UserId => "userid",
            Self::Subscriber => "subscriber",
            Self::Category => "category",
            Self::EventDate => "event_date",
            Self::Hour => "hour",
            Self::Points => "points",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Common view over staged rows of either table.
pub trait StagingRow {
    /// The table this row belongs to.
    const KIND: RecordKind;
    /// Required columns, in file order.
    const FIELDS: &'static [Field];

    /// 1-based data row ordinal in the source file.
    fn source_line(&self) -> u64;

    /// Raw value of one of this table's fields.
    fn value(&self, field: Field) -> Option<&str>;

    /// Required fields that are null, in column order.
    fn null_fields(&self) -> Vec<Field> {
        Self::FIELDS
            .iter()
            .copied()
            .filter(|field| self.value(*field).is_none())
            .collect()
    }
}

impl StagingRow for StagingUserRecord {
    const KIND: RecordKind = RecordKind::Users;
    const FIELDS: &'static [Field] = &Field::USER_FIELDS;

    fn source_line(&self) -> u64 {
        self.source_line
    }

    fn value(&self, field: Field) -> Option<&str> {
        match field {
            Field::UserId => self.userid.as_deref(),
            Field::Subscriber => self.subscriber.as_deref(),
            Field::Category => self.category.as_deref(),
            _ => None,
        }
    }
}

impl StagingRow for StagingEventRecord {
    const KIND: RecordKind = RecordKind::Events;
    const FIELDS: &'static [Field] = &Field::EVENT_FIELDS;

    fn source_line(&self) -> u64 {
        self.source_line
    }

    fn value(&self, field: Field) -> Option<&str> {
        match field {
            Field::UserId => self.userid.as_deref(),
            Field::EventDate => self.event_date.as_deref(),
            Field::Hour => self.hour.as_deref(),
            Field::Points => self.points.as_deref(),
            _ => None,
        }
    }
}
