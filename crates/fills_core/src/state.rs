use crate::{Cursor, OverlapFilter, Query};

/// Page size used by the indexer's `first` argument unless configured.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarvestCounters {
    /// Non-empty pages received.
    pub batches: u64,
    pub fetched: u64,
    pub appended: u64,
    pub duplicates_dropped: u64,
    pub overlap_dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestState {
    cursor: Cursor,
    page_size: usize,
    phase: Phase,
    overlap: OverlapFilter,
    counters: HarvestCounters,
}

impl Default for HarvestState {
    fn default() -> Self {
        Self::new(Cursor::default(), DEFAULT_PAGE_SIZE)
    }
}

impl HarvestState {
    /// A page size of zero is treated as one.
    pub fn new(cursor: Cursor, page_size: usize) -> Self {
        Self {
            cursor,
            page_size: page_size.max(1),
            phase: Phase::Idle,
            overlap: OverlapFilter::default(),
            counters: HarvestCounters::default(),
        }
    }

    pub fn with_overlap(mut self, overlap: OverlapFilter) -> Self {
        self.overlap = overlap;
        self.overlap.retire_behind(&self.cursor);
        self
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn counters(&self) -> HarvestCounters {
        self.counters
    }

    pub fn overlap(&self) -> &OverlapFilter {
        &self.overlap
    }

    /// The request that continues from the current cursor.
    pub fn next_query(&self) -> Query {
        Query {
            filter: self.cursor.filter(),
            first: self.page_size,
        }
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn move_cursor(&mut self, cursor: Cursor) {
        self.overlap.retire_behind(&cursor);
        self.cursor = cursor;
    }

    pub(crate) fn overlap_mut(&mut self) -> &mut OverlapFilter {
        &mut self.overlap
    }

    pub(crate) fn counters_mut(&mut self) -> &mut HarvestCounters {
        &mut self.counters
    }
}
