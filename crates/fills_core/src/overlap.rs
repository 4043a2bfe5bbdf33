use std::collections::HashMap;

use crate::{Cursor, FillRecord, Mode, Timestamp};

/// Stored rows at the last persisted timestamp, used to avoid re-appending
/// them when a resumed harvest fetches that timestamp again.
///
/// Rows are matched as a multiset: each stored row suppresses at most one
/// fetched row with identical content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OverlapFilter {
    timestamp: Option<Timestamp>,
    remaining: HashMap<FillRecord, usize>,
}

impl OverlapFilter {
    /// Build a filter from the store's trailing rows. Rows not sharing the
    /// timestamp of the last row are ignored.
    pub fn new(tail: Vec<FillRecord>) -> Self {
        let Some(timestamp) = tail.last().map(|record| record.timestamp) else {
            return Self::default();
        };
        let mut remaining = HashMap::new();
        for record in tail.into_iter().filter(|r| r.timestamp == timestamp) {
            *remaining.entry(record).or_insert(0) += 1;
        }
        Self {
            timestamp: Some(timestamp),
            remaining,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Rows still able to suppress a fetched duplicate.
    pub fn pending(&self) -> usize {
        self.remaining.values().sum()
    }

    /// Remove already-stored rows from `records`. Returns the rows to append
    /// and how many were suppressed.
    pub fn apply(&mut self, records: Vec<FillRecord>) -> (Vec<FillRecord>, usize) {
        if self.is_empty() {
            return (records, 0);
        }
        let before = records.len();
        let kept: Vec<_> = records
            .into_iter()
            .filter(|record| !self.consume(record))
            .collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }

    /// Forget the stored rows once the cursor can no longer return events at
    /// the overlapping timestamp.
    pub fn retire_behind(&mut self, cursor: &Cursor) {
        let Some(timestamp) = self.timestamp else {
            return;
        };
        let passed = match cursor.mode() {
            Mode::Normal => cursor.timestamp() >= timestamp,
            Mode::Sticky => cursor.timestamp() > timestamp,
        };
        if passed {
            *self = Self::default();
        }
    }

    fn consume(&mut self, record: &FillRecord) -> bool {
        if Some(record.timestamp) != self.timestamp {
            return false;
        }
        let Some(count) = self.remaining.get_mut(record) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.remaining.remove(record);
        }
        true
    }
}
