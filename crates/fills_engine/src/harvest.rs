use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Local;
use fills_core::{
    update, Effect, FinishReason, HarvestState, Msg, OverlapFilter, Transition, DEFAULT_PAGE_SIZE,
};
use fills_logging::{fills_debug, fills_info, fills_warn};
use tokio_util::sync::CancellationToken;

use crate::retry::fetch_with_retry;
use crate::{
    format_utc, resume_point, EventSource, HarvestError, HarvestEvent, HarvestOutcome,
    RecordStore, ResumePoint, RetryPolicy,
};

/// How rows re-fetched after a resume are matched against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Drop re-fetched rows identical to the stored rows at the last timestamp.
    #[default]
    StoreTail,
    /// Only drop ids repeated within one batch.
    BatchLocal,
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub page_size: usize,
    pub retry: RetryPolicy,
    pub overlap: OverlapPolicy,
    /// Label identifying this run in logs.
    pub run_label: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
            overlap: OverlapPolicy::default(),
            run_label: Local::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Writes progress through the `fills_*` logging macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::Started { cursor, run_label } => {
                fills_info!("Starting harvest of orderFilledEvents (run {run_label}) at {cursor}");
            }
            HarvestEvent::Batch(report) => {
                let n = report.number;
                let last = report.last_timestamp;
                let readable = format_utc(last);
                let count = report.fetched;
                match report.transition {
                    Transition::Sticky => fills_info!(
                        "Batch {n}: Timestamp {last} ({readable}), Records: {count} [STICKY - continuing at same timestamp]"
                    ),
                    Transition::StickyBoundary => fills_info!(
                        "Batch {n}: Timestamps {}-{last} ({readable}), Records: {count} [STICKY - ensuring complete timestamp]",
                        report.first_timestamp
                    ),
                    Transition::StickyComplete => fills_info!(
                        "Batch {n}: Timestamp {last} ({readable}), Records: {count} [STICKY COMPLETE]"
                    ),
                    Transition::Advance => fills_info!(
                        "Batch {n}: Last timestamp {last} ({readable}), Records: {count}"
                    ),
                }
                if report.duplicates > 0 || report.overlapping > 0 {
                    fills_debug!(
                        "Batch {n}: dropped {} repeated ids and {} already-stored rows, appending {}",
                        report.duplicates,
                        report.overlapping,
                        report.appended()
                    );
                }
            }
            HarvestEvent::StickyDrained { timestamp } => {
                fills_debug!("Timestamp {timestamp} exhausted, advancing past it");
            }
            HarvestEvent::Retrying {
                attempt,
                delay,
                error,
            } => {
                fills_warn!("Query error on attempt {attempt}: {error}; retrying in {delay:?}");
            }
            HarvestEvent::Finished(outcome) => {
                let counters = outcome.counters;
                fills_info!(
                    "Finished orderFilledEvents ({:?}): {} new records from {} fetched in {} batches",
                    outcome.reason,
                    counters.appended,
                    counters.fetched,
                    counters.batches
                );
            }
        }
    }
}

/// Drives the pagination state machine against a source and a store.
pub struct Harvester<S, R> {
    source: S,
    store: R,
    config: HarvestConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl<S, R> Harvester<S, R>
where
    S: EventSource,
    R: RecordStore,
{
    pub fn new(source: S, store: R, config: HarvestConfig) -> Self {
        Self {
            source,
            store,
            config,
            sink: Arc::new(LogProgressSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Recover the resume point from the store, then harvest to completion.
    pub async fn harvest(&mut self) -> Result<HarvestOutcome, HarvestError> {
        let resume = resume_point(&self.store, self.config.overlap);
        self.run_from(resume).await
    }

    /// Harvest starting at an explicit resume point.
    pub async fn run_from(&mut self, resume: ResumePoint) -> Result<HarvestOutcome, HarvestError> {
        let overlap = match self.config.overlap {
            OverlapPolicy::StoreTail => OverlapFilter::new(resume.overlap),
            OverlapPolicy::BatchLocal => OverlapFilter::default(),
        };
        let state = HarvestState::new(resume.cursor, self.config.page_size).with_overlap(overlap);
        self.sink.emit(HarvestEvent::Started {
            cursor: state.cursor().clone(),
            run_label: self.config.run_label.clone(),
        });

        let (mut state, effects) = update(state, Msg::Start);
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            let msg = match effect {
                Effect::Fetch(query) => {
                    let was_sticky = state.cursor().is_sticky();
                    let sink = Arc::clone(&self.sink);
                    let fetched = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => None,
                        result = fetch_with_retry(
                            &self.source,
                            &query,
                            &self.config.retry,
                            |attempt, delay, error| {
                                sink.emit(HarvestEvent::Retrying {
                                    attempt,
                                    delay,
                                    error: error.clone(),
                                });
                            },
                        ) => Some(result?),
                    };
                    match fetched {
                        None => Msg::Cancel,
                        Some(batch) => {
                            if batch.is_empty() && was_sticky {
                                self.sink.emit(HarvestEvent::StickyDrained {
                                    timestamp: state.cursor().timestamp(),
                                });
                            }
                            Msg::BatchFetched(batch)
                        }
                    }
                }
                Effect::Report(report) => {
                    self.sink.emit(HarvestEvent::Batch(report));
                    Msg::NoOp
                }
                Effect::Persist { records } => {
                    let written = self.store.append(&records)?;
                    Msg::BatchAppended { records: written }
                }
                Effect::Finish { reason } => {
                    return Ok(self.finish(&state, reason));
                }
            };
            let (next, effects) = update(state, msg);
            state = next;
            queue.extend(effects);
        }

        Ok(self.finish(&state, FinishReason::Exhausted))
    }

    fn finish(&self, state: &HarvestState, reason: FinishReason) -> HarvestOutcome {
        let outcome = HarvestOutcome {
            reason,
            cursor: state.cursor().clone(),
            counters: state.counters(),
        };
        self.sink.emit(HarvestEvent::Finished(outcome.clone()));
        outcome
    }
}
