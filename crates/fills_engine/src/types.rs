use std::fmt;
use std::time::Duration;

use fills_core::{BatchReport, Cursor, FinishReason, HarvestCounters};
use thiserror::Error;

use crate::PersistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    /// Harvest is starting from this cursor.
    Started { cursor: Cursor, run_label: String },
    /// A non-empty batch was processed.
    Batch(BatchReport),
    /// A sticky timestamp returned an empty page and was left behind.
    StickyDrained { timestamp: i64 },
    /// A fetch failed and will be retried after `delay`.
    Retrying {
        attempt: usize,
        delay: Duration,
        error: FetchError,
    },
    Finished(HarvestOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutcome {
    pub reason: FinishReason,
    pub cursor: Cursor,
    pub counters: HarvestCounters,
}

impl HarvestOutcome {
    /// Rows appended to the store during this run.
    pub fn appended(&self) -> u64 {
        self.counters.appended
    }

    pub fn cancelled(&self) -> bool {
        self.reason == FinishReason::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidEndpoint,
    HttpStatus(u16),
    Timeout,
    Network,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    /// Body was not a valid GraphQL response.
    Decode,
    /// The service answered with GraphQL `errors`.
    Query,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidEndpoint => write!(f, "invalid endpoint"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Query => write!(f, "query error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("record store failure: {0}")]
    Persist(#[from] PersistError),
    #[error("fetch failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: usize, last: FetchError },
}
