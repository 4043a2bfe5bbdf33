//! Fills engine: IO around the pagination core (GraphQL source, CSV store,
//! resume recovery, retrying harvest driver).
mod fetch;
mod graphql;
mod harvest;
mod persist;
mod recovery;
mod retry;
mod store;
mod time;
mod types;

pub use fetch::{EventSource, FetchSettings, GraphqlSource, DEFAULT_ENDPOINT};
pub use graphql::{build_request_body, decode_response, ORDER_FILLED_QUERY};
pub use harvest::{
    HarvestConfig, Harvester, LogProgressSink, OverlapPolicy, ProgressSink,
};
pub use persist::{ensure_output_dir, PersistError};
pub use recovery::{recover, resume_point, ResumePoint};
pub use retry::RetryPolicy;
pub use store::{CsvRecordStore, RecordStore};
pub use time::format_utc;
pub use types::{FailureKind, FetchError, HarvestError, HarvestEvent, HarvestOutcome};
