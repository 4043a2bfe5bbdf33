use crate::{FillRecord, Query, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue one page request.
    Fetch(Query),
    /// Describe a processed batch.
    Report(BatchReport),
    /// Append these rows to the store, in order, as one unit.
    Persist { records: Vec<FillRecord> },
    /// Harvest is over; no further effects follow.
    Finish { reason: FinishReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// An empty page was returned while not sticky.
    Exhausted,
    /// A short page was returned while not sticky.
    ShortBatch,
    Cancelled,
}

/// How the cursor moved after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Short batch in normal mode; advanced to its last timestamp.
    Advance,
    /// Full batch of a single timestamp; paging by id within it.
    Sticky,
    /// Full batch spanning several timestamps; sticking to the last one.
    StickyBoundary,
    /// Short batch that drained a sticky timestamp.
    StickyComplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// 1-based batch number within this run.
    pub number: u64,
    pub first_timestamp: Timestamp,
    pub last_timestamp: Timestamp,
    /// Events returned by the source.
    pub fetched: usize,
    /// Events dropped as repeated ids within the batch.
    pub duplicates: usize,
    /// Rows dropped because the store already held them.
    pub overlapping: usize,
    pub transition: Transition,
}

impl BatchReport {
    /// Rows that will be appended for this batch.
    pub fn appended(&self) -> usize {
        self.fetched - self.duplicates - self.overlapping
    }
}
