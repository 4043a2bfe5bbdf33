use fills_core::{Cursor, FillRecord, Timestamp};
use fills_logging::{fills_info, fills_warn};

use crate::{format_utc, OverlapPolicy, RecordStore};

/// Where a harvest restarts, derived from the store contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResumePoint {
    pub cursor: Cursor,
    /// Stored rows at the last stored timestamp, loaded only for
    /// [`OverlapPolicy::StoreTail`].
    pub overlap: Vec<FillRecord>,
}

/// Derive the resume cursor from the store. Never fails.
///
/// An absent, empty or unreadable store yields `Timestamp(0)`. Otherwise the
/// cursor is one second before the last stored timestamp, so a timestamp that
/// was only partly written before a crash is fetched again in full.
pub fn recover(store: &dyn RecordStore) -> Cursor {
    Cursor::Timestamp(resume_timestamp(store).unwrap_or(0))
}

/// [`recover`] plus the overlap rows the chosen policy needs.
pub fn resume_point(store: &dyn RecordStore, policy: OverlapPolicy) -> ResumePoint {
    let resume = resume_timestamp(store);
    let overlap = match (policy, resume) {
        (OverlapPolicy::StoreTail, Some(_)) => match store.tail_records() {
            Ok(rows) => rows,
            Err(err) => {
                fills_warn!(
                    "Could not load stored tail rows ({}); resuming without overlap filter",
                    err
                );
                Vec::new()
            }
        },
        _ => Vec::new(),
    };

    ResumePoint {
        cursor: Cursor::Timestamp(resume.unwrap_or(0)),
        overlap,
    }
}

/// One second before the last stored timestamp, or `None` when the store
/// offers no usable resume state.
fn resume_timestamp(store: &dyn RecordStore) -> Option<Timestamp> {
    match store.last_timestamp() {
        Ok(Some(last)) => match last.checked_sub(1) {
            Some(resume) => {
                fills_info!("Resuming from timestamp {} ({})", last, format_utc(last));
                Some(resume)
            }
            None => {
                fills_warn!(
                    "Last stored timestamp {} has no predecessor; starting from beginning of time (timestamp 0)",
                    last
                );
                None
            }
        },
        Ok(None) => {
            fills_info!("No existing records found, starting from beginning of time (timestamp 0)");
            None
        }
        Err(err) => {
            fills_warn!(
                "Could not read record store ({}); falling back to beginning of time (timestamp 0)",
                err
            );
            None
        }
    }
}
