use crate::{
    dedup_by_id, sort_batch, BatchReport, Cursor, Effect, FinishReason, HarvestState, Mode, Msg,
    OrderFilledEvent, Phase, Transition,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Effects must be executed in order. A `Persist` always precedes the
/// `Fetch` or `Finish` emitted for the same batch.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start => {
            if state.phase() == Phase::Idle {
                state.set_phase(Phase::Fetching);
                vec![Effect::Fetch(state.next_query())]
            } else {
                Vec::new()
            }
        }
        Msg::BatchFetched(events) => {
            if state.phase() != Phase::Fetching {
                return (state, Vec::new());
            }
            if events.is_empty() {
                on_empty_batch(&mut state)
            } else {
                on_batch(&mut state, events)
            }
        }
        Msg::BatchAppended { records } => {
            state.counters_mut().appended += records as u64;
            Vec::new()
        }
        Msg::Cancel => {
            if state.is_finished() {
                Vec::new()
            } else {
                state.set_phase(Phase::Finished);
                vec![Effect::Finish {
                    reason: FinishReason::Cancelled,
                }]
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn on_empty_batch(state: &mut HarvestState) -> Vec<Effect> {
    match state.cursor().mode() {
        Mode::Sticky => {
            // Every id at the sticky timestamp has been seen.
            let drained = state.cursor().timestamp();
            state.move_cursor(Cursor::Timestamp(drained));
            vec![Effect::Fetch(state.next_query())]
        }
        Mode::Normal => {
            state.set_phase(Phase::Finished);
            vec![Effect::Finish {
                reason: FinishReason::Exhausted,
            }]
        }
    }
}

fn on_batch(state: &mut HarvestState, mut events: Vec<OrderFilledEvent>) -> Vec<Effect> {
    sort_batch(&mut events);
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return on_empty_batch(state);
    };
    let first_timestamp = first.timestamp;
    let last_timestamp = last.timestamp;
    let last_id = last.id.clone();

    let fetched = events.len();
    let previous_mode = state.cursor().mode();
    let full = fetched >= state.page_size();

    let (next_cursor, transition) = if full {
        // A full page may have been cut inside its last timestamp.
        let transition = if first_timestamp == last_timestamp {
            Transition::Sticky
        } else {
            Transition::StickyBoundary
        };
        let cursor = Cursor::Sticky {
            timestamp: last_timestamp,
            id: last_id,
        };
        (cursor, transition)
    } else {
        let transition = match previous_mode {
            Mode::Sticky => Transition::StickyComplete,
            Mode::Normal => Transition::Advance,
        };
        (Cursor::Timestamp(last_timestamp), transition)
    };

    let (events, duplicates) = dedup_by_id(events);
    let records = events.iter().map(OrderFilledEvent::record).collect();
    let (records, overlapping) = state.overlap_mut().apply(records);
    state.move_cursor(next_cursor);

    let counters = state.counters_mut();
    counters.batches += 1;
    counters.fetched += fetched as u64;
    counters.duplicates_dropped += duplicates as u64;
    counters.overlap_dropped += overlapping as u64;
    let number = counters.batches;

    let mut effects = Vec::with_capacity(3);
    effects.push(Effect::Report(BatchReport {
        number,
        first_timestamp,
        last_timestamp,
        fetched,
        duplicates,
        overlapping,
        transition,
    }));
    if !records.is_empty() {
        effects.push(Effect::Persist { records });
    }

    if !full && previous_mode == Mode::Normal {
        state.set_phase(Phase::Finished);
        effects.push(Effect::Finish {
            reason: FinishReason::ShortBatch,
        });
    } else {
        effects.push(Effect::Fetch(state.next_query()));
    }
    effects
}
