//! Fills core: pure pagination state machine for order-filled harvesting.
mod cursor;
mod effect;
mod event;
mod msg;
mod overlap;
mod state;
mod update;

pub use cursor::{Cursor, Mode, Query, Timestamp, WhereFilter};
pub use effect::{BatchReport, Effect, FinishReason, Transition};
pub use event::{dedup_by_id, sort_batch, FillRecord, OrderFilledEvent, RECORD_COLUMNS};
pub use msg::Msg;
pub use overlap::OverlapFilter;
pub use state::{HarvestCounters, HarvestState, Phase, DEFAULT_PAGE_SIZE};
pub use update::update;
