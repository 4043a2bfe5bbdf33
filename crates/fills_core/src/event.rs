use std::collections::HashSet;

use crate::Timestamp;

/// Header of the record store, in column order.
pub const RECORD_COLUMNS: [&str; 8] = [
    "timestamp",
    "maker",
    "makerAssetId",
    "makerAmountFilled",
    "taker",
    "takerAssetId",
    "takerAmountFilled",
    "transactionHash",
];

/// An order-filled event as returned by the indexer.
///
/// Only `timestamp` and `id` are interpreted; every other field is carried
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderFilledEvent {
    pub id: String,
    pub timestamp: Timestamp,
    pub maker: String,
    pub maker_asset_id: String,
    pub maker_amount_filled: String,
    pub taker: String,
    pub taker_asset_id: String,
    pub taker_amount_filled: String,
    pub transaction_hash: String,
    pub fee: Option<String>,
    pub order_hash: Option<String>,
}

impl OrderFilledEvent {
    /// Projection written to the record store.
    pub fn record(&self) -> FillRecord {
        FillRecord {
            timestamp: self.timestamp,
            maker: self.maker.clone(),
            maker_asset_id: self.maker_asset_id.clone(),
            maker_amount_filled: self.maker_amount_filled.clone(),
            taker: self.taker.clone(),
            taker_asset_id: self.taker_asset_id.clone(),
            taker_amount_filled: self.taker_amount_filled.clone(),
            transaction_hash: self.transaction_hash.clone(),
        }
    }
}

/// One row of the record store. Field order matches [`RECORD_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FillRecord {
    pub timestamp: Timestamp,
    pub maker: String,
    pub maker_asset_id: String,
    pub maker_amount_filled: String,
    pub taker: String,
    pub taker_asset_id: String,
    pub taker_amount_filled: String,
    pub transaction_hash: String,
}

impl FillRecord {
    pub fn to_row(&self) -> [String; 8] {
        [
            self.timestamp.to_string(),
            self.maker.clone(),
            self.maker_asset_id.clone(),
            self.maker_amount_filled.clone(),
            self.taker.clone(),
            self.taker_asset_id.clone(),
            self.taker_amount_filled.clone(),
            self.transaction_hash.clone(),
        ]
    }
}

/// Sort a batch by `(timestamp, id)` ascending.
pub fn sort_batch(events: &mut [OrderFilledEvent]) {
    events.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
}

/// Drop events whose id already appeared earlier in the batch.
///
/// Returns the surviving events (order preserved) and how many were dropped.
pub fn dedup_by_id(events: Vec<OrderFilledEvent>) -> (Vec<OrderFilledEvent>, usize) {
    let before = events.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<_> = events
        .into_iter()
        .filter(|event| seen.insert(event.id.clone()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
