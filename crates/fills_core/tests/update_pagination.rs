use std::sync::Once;

use fills_core::{
    update, BatchReport, Cursor, Effect, FillRecord, FinishReason, HarvestState, Mode, Msg,
    OrderFilledEvent, Query, Timestamp, Transition, WhereFilter,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(fills_logging::initialize_for_tests);
}

fn event(timestamp: Timestamp, id: &str) -> OrderFilledEvent {
    OrderFilledEvent {
        id: id.to_string(),
        timestamp,
        maker: "0xmaker".to_string(),
        maker_asset_id: "0".to_string(),
        maker_amount_filled: "100".to_string(),
        taker: "0xtaker".to_string(),
        taker_asset_id: "1".to_string(),
        taker_amount_filled: "50".to_string(),
        transaction_hash: format!("tx-{timestamp}-{id}"),
        fee: None,
        order_hash: None,
    }
}

/// What the indexer would answer: matching events in `(timestamp, id)` order.
fn page(source: &[OrderFilledEvent], query: &Query) -> Vec<OrderFilledEvent> {
    let mut matching: Vec<_> = source
        .iter()
        .filter(|e| query.filter.matches(e))
        .cloned()
        .collect();
    matching.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
    matching.truncate(query.first);
    matching
}

#[derive(Debug, Default)]
struct Run {
    queries: Vec<Query>,
    reports: Vec<BatchReport>,
    /// Cursor mode right after each non-empty batch.
    modes: Vec<Mode>,
    persisted: Vec<FillRecord>,
    finish: Option<FinishReason>,
}

fn run(mut state: HarvestState, source: &[OrderFilledEvent]) -> (HarvestState, Run) {
    let mut out = Run::default();
    let (next, mut pending) = update(state, Msg::Start);
    state = next;
    while !pending.is_empty() {
        let effect = pending.remove(0);
        let (next, effects) = match effect {
            Effect::Fetch(query) => {
                let batch = page(source, &query);
                out.queries.push(query);
                update(state, Msg::BatchFetched(batch))
            }
            Effect::Report(report) => {
                out.reports.push(report);
                (state, Vec::new())
            }
            Effect::Persist { records } => {
                let count = records.len();
                out.persisted.extend(records);
                update(state, Msg::BatchAppended { records: count })
            }
            Effect::Finish { reason } => {
                out.finish = Some(reason);
                (state, Vec::new())
            }
        };
        state = next;
        if !out.reports.is_empty() && out.modes.len() < out.reports.len() {
            out.modes.push(state.cursor().mode());
        }
        pending.extend(effects);
        assert!(out.queries.len() < 10_000, "harvest did not terminate");
    }
    (state, out)
}

#[test]
fn short_batch_terminates_after_single_fetch() {
    init_logging();
    let source: Vec<_> = (1..=500).map(|i| event(i, &format!("{i:04}"))).collect();

    let (state, run) = run(HarvestState::new(Cursor::Timestamp(0), 1000), &source);

    assert_eq!(run.queries.len(), 1);
    assert_eq!(run.queries[0].filter, WhereFilter::TimestampGt(0));
    assert_eq!(run.queries[0].first, 1000);
    assert_eq!(run.persisted.len(), 500);
    assert_eq!(run.finish, Some(FinishReason::ShortBatch));
    assert_eq!(run.reports[0].transition, Transition::Advance);
    assert_eq!(state.cursor(), &Cursor::Timestamp(500));
    assert!(state.is_finished());
    assert_eq!(state.counters().appended, 500);
}

#[test]
fn empty_source_finishes_without_persisting() {
    init_logging();
    let (state, run) = run(HarvestState::default(), &[]);

    assert_eq!(run.queries.len(), 1);
    assert!(run.persisted.is_empty());
    assert!(run.reports.is_empty());
    assert_eq!(run.finish, Some(FinishReason::Exhausted));
    assert_eq!(state.counters().appended, 0);
    assert_eq!(state.cursor(), &Cursor::Timestamp(0));
}

#[test]
fn crowded_timestamp_is_paged_by_id() {
    init_logging();
    let source: Vec<_> = (0..2500).map(|i| event(100, &format!("0x{i:05}"))).collect();

    let (state, run) = run(HarvestState::new(Cursor::Timestamp(0), 1000), &source);

    let sizes: Vec<_> = run.reports.iter().map(|r| r.fetched).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);
    assert_eq!(run.modes, vec![Mode::Sticky, Mode::Sticky, Mode::Normal]);
    let transitions: Vec<_> = run.reports.iter().map(|r| r.transition).collect();
    assert_eq!(
        transitions,
        vec![
            Transition::Sticky,
            Transition::Sticky,
            Transition::StickyComplete
        ]
    );
    assert_eq!(
        run.queries[1].filter,
        WhereFilter::TimestampEqIdGt {
            timestamp: 100,
            id: "0x00999".to_string()
        }
    );
    assert_eq!(
        run.queries[2].filter,
        WhereFilter::TimestampEqIdGt {
            timestamp: 100,
            id: "0x01999".to_string()
        }
    );
    // After the drained timestamp, one normal fetch confirms there is nothing newer.
    assert_eq!(run.queries.len(), 4);
    assert_eq!(run.queries[3].filter, WhereFilter::TimestampGt(100));
    assert_eq!(run.finish, Some(FinishReason::Exhausted));

    assert_eq!(run.persisted.len(), 2500);
    assert!(run.persisted.iter().all(|r| r.timestamp == 100));
    assert_eq!(state.counters().batches, 3);
}

#[test]
fn full_mixed_batch_sticks_to_its_last_timestamp() {
    init_logging();
    let source = vec![
        event(1, "a"),
        event(2, "a"),
        event(2, "b"),
        event(2, "c"),
        event(3, "a"),
    ];

    let state = HarvestState::new(Cursor::Timestamp(0), 3);
    let (state, _) = update(state, Msg::Start);
    let (state, effects) = update(state, Msg::BatchFetched(source[..3].to_vec()));

    assert_eq!(
        state.cursor(),
        &Cursor::Sticky {
            timestamp: 2,
            id: "b".to_string()
        }
    );
    let report = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Report(report) => Some(report.clone()),
            _ => None,
        })
        .expect("report effect");
    assert_eq!(report.transition, Transition::StickyBoundary);
    assert_eq!(report.first_timestamp, 1);
    assert_eq!(report.last_timestamp, 2);
    assert_eq!(
        effects.last(),
        Some(&Effect::Fetch(Query {
            filter: WhereFilter::TimestampEqIdGt {
                timestamp: 2,
                id: "b".to_string()
            },
            first: 3,
        }))
    );
}

#[test]
fn short_batch_that_drains_sticky_timestamp_keeps_going() {
    init_logging();
    let source = vec![
        event(10, "a"),
        event(10, "b"),
        event(10, "c"),
        event(20, "x"),
    ];

    let (_state, run) = run(HarvestState::new(Cursor::Timestamp(0), 2), &source);

    let filters: Vec<_> = run.queries.iter().map(|q| q.filter.clone()).collect();
    assert_eq!(
        filters,
        vec![
            WhereFilter::TimestampGt(0),
            WhereFilter::TimestampEqIdGt {
                timestamp: 10,
                id: "b".to_string()
            },
            WhereFilter::TimestampGt(10),
        ]
    );
    assert_eq!(run.persisted.len(), 4);
    assert_eq!(run.finish, Some(FinishReason::ShortBatch));
}

#[test]
fn empty_page_while_sticky_returns_to_normal() {
    init_logging();
    let state = HarvestState::new(
        Cursor::Sticky {
            timestamp: 42,
            id: "z".to_string(),
        },
        5,
    );
    let (state, _) = update(state, Msg::Start);
    let (state, effects) = update(state, Msg::BatchFetched(Vec::new()));

    assert_eq!(state.cursor(), &Cursor::Timestamp(42));
    assert!(!state.is_finished());
    assert_eq!(
        effects,
        vec![Effect::Fetch(Query {
            filter: WhereFilter::TimestampGt(42),
            first: 5,
        })]
    );
}

#[test]
fn batch_is_sorted_and_deduplicated_before_persist() {
    init_logging();
    let batch = vec![event(5, "b"), event(4, "z"), event(5, "a"), event(5, "b")];

    let (state, _) = update(HarvestState::new(Cursor::Timestamp(0), 10), Msg::Start);
    let (state, effects) = update(state, Msg::BatchFetched(batch));

    let persisted: Vec<_> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Persist { records } => Some(records.clone()),
            _ => None,
        })
        .flatten()
        .map(|r| r.transaction_hash)
        .collect();
    assert_eq!(persisted, vec!["tx-4-z", "tx-5-a", "tx-5-b"]);
    assert_eq!(state.counters().duplicates_dropped, 1);
    assert_eq!(state.cursor(), &Cursor::Timestamp(5));
}

#[test]
fn cancel_stops_before_next_fetch() {
    init_logging();
    let (state, _) = update(HarvestState::default(), Msg::Start);
    let (state, effects) = update(state, Msg::Cancel);

    assert!(state.is_finished());
    assert_eq!(
        effects,
        vec![Effect::Finish {
            reason: FinishReason::Cancelled
        }]
    );

    let (_state, effects) = update(state, Msg::BatchFetched(vec![event(1, "a")]));
    assert!(effects.is_empty());
}

#[test]
fn every_event_is_persisted_exactly_once_across_page_sizes() {
    init_logging();
    // Tie counts vary from 1 to 7 per timestamp.
    let mut source = Vec::new();
    for ts in 1..=60 {
        for n in 0..((ts * 7) % 8).max(1) {
            source.push(event(ts, &format!("id{n:02}")));
        }
    }
    let mut expected: Vec<_> = source.iter().map(|e| e.transaction_hash.clone()).collect();
    expected.sort();

    for page_size in [1, 2, 3, 5, 7, 8, 50, 1000] {
        let (_state, run) = run(HarvestState::new(Cursor::Timestamp(0), page_size), &source);
        let mut stored: Vec<_> = run
            .persisted
            .iter()
            .map(|r| r.transaction_hash.clone())
            .collect();
        let in_order = run
            .persisted
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp);
        assert!(in_order, "page size {page_size} broke ordering");
        stored.sort();
        assert_eq!(stored, expected, "page size {page_size}");
    }
}
