//! Record identifiers, ranges and raw log records.
//!
//! A session's log is an append-only sequence of flat string maps. The log
//! store assigns every record a [`RecordId`] made of a millisecond timestamp
//! and a sequence number; ids are totally ordered by `(timestamp, sequence)`.

use crate::error::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::str::FromStr;

/// Position of a record within a session's log.
///
/// The canonical string form is `"{timestamp}-{sequence}"`, which is also the
/// syntax log stores accept in range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId {
    timestamp: u64,
    sequence: u64,
}

impl RecordId {
    /// The smallest possible id.
    pub const MIN: RecordId = RecordId::new(0, 0);

    /// The largest possible id.
    pub const MAX: RecordId = RecordId::new(u64::MAX, u64::MAX);

    pub const fn new(timestamp: u64, sequence: u64) -> Self {
        Self {
            timestamp,
            sequence,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The id immediately after this one, if any.
    pub fn successor(&self) -> Option<RecordId> {
        match self.sequence.checked_add(1) {
            Some(sequence) => Some(RecordId::new(self.timestamp, sequence)),
            None => self
                .timestamp
                .checked_add(1)
                .map(|timestamp| RecordId::new(timestamp, 0)),
        }
    }

    /// The id immediately before this one, if any.
    pub fn predecessor(&self) -> Option<RecordId> {
        match self.sequence.checked_sub(1) {
            Some(sequence) => Some(RecordId::new(self.timestamp, sequence)),
            None => self
                .timestamp
                .checked_sub(1)
                .map(|timestamp| RecordId::new(timestamp, u64::MAX)),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.timestamp, self.sequence)
    }
}

impl FromStr for RecordId {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ScopeError::InvalidRecordId(s.to_string());

        let (timestamp, sequence) = s.split_once('-').ok_or_else(invalid)?;
        let timestamp = parse_component(timestamp).ok_or_else(invalid)?;
        let sequence = parse_component(sequence).ok_or_else(invalid)?;

        Ok(RecordId::new(timestamp, sequence))
    }
}

// `u64::from_str` accepts a leading '+', which is not part of the format.
fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl TryFrom<String> for RecordId {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

/// One end of a [`RecordRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecordBound {
    Inclusive(RecordId),
    Exclusive(RecordId),
    Unbounded,
}

impl RecordBound {
    pub fn is_bounded(&self) -> bool {
        !matches!(self, RecordBound::Unbounded)
    }

    pub fn id(&self) -> Option<RecordId> {
        match self {
            RecordBound::Inclusive(id) | RecordBound::Exclusive(id) => Some(*id),
            RecordBound::Unbounded => None,
        }
    }

    /// Store syntax for this bound used as the start of a range.
    ///
    /// `-` is the smallest id, a leading `(` marks an exclusive bound.
    pub fn format_lower(&self) -> String {
        match self {
            RecordBound::Inclusive(id) => id.to_string(),
            RecordBound::Exclusive(id) => format!("({}", id),
            RecordBound::Unbounded => "-".to_string(),
        }
    }

    /// Store syntax for this bound used as the end of a range; `+` is the
    /// largest id.
    pub fn format_upper(&self) -> String {
        match self {
            RecordBound::Inclusive(id) => id.to_string(),
            RecordBound::Exclusive(id) => format!("({}", id),
            RecordBound::Unbounded => "+".to_string(),
        }
    }

    fn from_std(bound: Bound<&RecordId>) -> Self {
        match bound {
            Bound::Included(id) => RecordBound::Inclusive(*id),
            Bound::Excluded(id) => RecordBound::Exclusive(*id),
            Bound::Unbounded => RecordBound::Unbounded,
        }
    }
}

/// An interval over record ids with independently inclusive, exclusive or
/// open ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRange {
    pub lower: RecordBound,
    pub upper: RecordBound,
}

impl RecordRange {
    pub fn new(lower: RecordBound, upper: RecordBound) -> Self {
        Self { lower, upper }
    }

    /// The whole log.
    pub fn all() -> Self {
        Self::new(RecordBound::Unbounded, RecordBound::Unbounded)
    }

    /// Builds a range from any standard range expression, e.g. `a..=b` or `a..`.
    pub fn from_bounds(bounds: impl RangeBounds<RecordId>) -> Self {
        Self::new(
            RecordBound::from_std(bounds.start_bound()),
            RecordBound::from_std(bounds.end_bound()),
        )
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        let above = match self.lower {
            RecordBound::Inclusive(lower) => *id >= lower,
            RecordBound::Exclusive(lower) => *id > lower,
            RecordBound::Unbounded => true,
        };
        let below = match self.upper {
            RecordBound::Inclusive(upper) => *id <= upper,
            RecordBound::Exclusive(upper) => *id < upper,
            RecordBound::Unbounded => true,
        };
        above && below
    }

    /// Same upper bound, starting strictly after `id`.
    pub fn after(&self, id: RecordId) -> Self {
        Self::new(RecordBound::Exclusive(id), self.upper)
    }

    /// Same lower bound, ending strictly before `id`.
    pub fn before(&self, id: RecordId) -> Self {
        Self::new(self.lower, RecordBound::Exclusive(id))
    }

    /// `(start, end)` in the log store's range-query syntax.
    pub fn to_store_syntax(&self) -> (String, String) {
        (self.lower.format_lower(), self.upper.format_upper())
    }
}

impl Default for RecordRange {
    fn default() -> Self {
        Self::all()
    }
}

/// Field holding the record's timestamp.
pub const FIELD_TIMESTAMP: &str = "timestamp";
/// Field holding the numeric source port id.
pub const FIELD_SRC: &str = "src";
/// Field holding the numeric destination port id.
pub const FIELD_DST: &str = "dst";
/// Field holding the serialized payload.
pub const FIELD_DATA: &str = "data";
/// Field whose presence marks the end-of-session record.
pub const FIELD_STOP: &str = "stop";

/// A record exactly as read from the log: field name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(HashMap<String, String>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether this record is the session's stop sentinel.
    pub fn is_stop(&self) -> bool {
        self.0.contains_key(FIELD_STOP)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, String>> for RawRecord {
    fn from(fields: HashMap<String, String>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A raw record together with the id the log store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: RecordId,
    pub record: RawRecord,
}

impl LogEntry {
    pub fn new(id: RecordId, record: RawRecord) -> Self {
        Self { id, record }
    }
}
