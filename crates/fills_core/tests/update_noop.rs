use fills_core::{update, Cursor, HarvestState, Msg, OrderFilledEvent};

#[test]
fn update_is_noop() {
    let state = HarvestState::default();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn batch_before_start_is_ignored() {
    let state = HarvestState::new(Cursor::Timestamp(7), 10);
    let batch = vec![OrderFilledEvent {
        id: "a".to_string(),
        timestamp: 8,
        ..OrderFilledEvent::default()
    }];

    let (next, effects) = update(state.clone(), Msg::BatchFetched(batch));

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn start_twice_fetches_once() {
    let (state, effects) = update(HarvestState::default(), Msg::Start);
    assert_eq!(effects.len(), 1);

    let (_state, effects) = update(state, Msg::Start);
    assert!(effects.is_empty());
}
