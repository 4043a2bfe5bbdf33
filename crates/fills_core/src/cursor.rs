use std::fmt;

use crate::OrderFilledEvent;

/// Seconds since the Unix epoch, as reported by the indexer.
pub type Timestamp = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Sticky,
}

/// Resume position of the harvester.
///
/// `Timestamp(t)` means every event with `timestamp <= t` is persisted.
/// `Sticky { timestamp, id }` means every event before `timestamp` is
/// persisted, and at `timestamp` every event with an id `<= id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cursor {
    Timestamp(Timestamp),
    Sticky { timestamp: Timestamp, id: String },
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::Timestamp(0)
    }
}

impl Cursor {
    pub fn mode(&self) -> Mode {
        match self {
            Cursor::Timestamp(_) => Mode::Normal,
            Cursor::Sticky { .. } => Mode::Sticky,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Cursor::Timestamp(ts) | Cursor::Sticky { timestamp: ts, .. } => *ts,
        }
    }

    pub fn is_sticky(&self) -> bool {
        self.mode() == Mode::Sticky
    }

    /// Filter selecting the events that still need to be fetched.
    pub fn filter(&self) -> WhereFilter {
        match self {
            Cursor::Timestamp(ts) => WhereFilter::TimestampGt(*ts),
            Cursor::Sticky { timestamp, id } => WhereFilter::TimestampEqIdGt {
                timestamp: *timestamp,
                id: id.clone(),
            },
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Timestamp(ts) => write!(f, "timestamp > {ts}"),
            Cursor::Sticky { timestamp, id } => write!(f, "timestamp = {timestamp}, id > {id}"),
        }
    }
}

/// The `where` clause of one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhereFilter {
    /// `{ timestamp_gt: T }`
    TimestampGt(Timestamp),
    /// `{ timestamp: T, id_gt: ID }`
    TimestampEqIdGt { timestamp: Timestamp, id: String },
}

impl WhereFilter {
    /// Whether an event falls inside this filter, using the indexer's ordering
    /// rules (integer timestamps, ids compared as plain strings).
    pub fn matches(&self, event: &OrderFilledEvent) -> bool {
        match self {
            WhereFilter::TimestampGt(ts) => event.timestamp > *ts,
            WhereFilter::TimestampEqIdGt { timestamp, id } => {
                event.timestamp == *timestamp && event.id.as_str() > id.as_str()
            }
        }
    }
}

/// One page request: a filter plus the `first` limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub filter: WhereFilter,
    pub first: usize,
}
