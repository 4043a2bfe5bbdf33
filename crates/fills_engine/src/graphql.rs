//! GraphQL request and response shapes for `orderFilledEvents`.

use fills_core::{OrderFilledEvent, Query, WhereFilter};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{FailureKind, FetchError};

/// Ordered page of order-filled events. `$where` is either
/// `{timestamp_gt}` or `{timestamp, id_gt}`.
pub const ORDER_FILLED_QUERY: &str = r#"query OrderFilledEvents($first: Int!, $where: OrderFilledEvent_filter) {
  orderFilledEvents(orderBy: timestamp, orderDirection: asc, first: $first, where: $where) {
    fee
    id
    maker
    makerAmountFilled
    makerAssetId
    orderHash
    taker
    takerAmountFilled
    takerAssetId
    timestamp
    transactionHash
  }
}"#;

/// JSON body for one page request. BigInt arguments are sent as strings.
pub fn build_request_body(query: &Query) -> Value {
    let filter = match &query.filter {
        WhereFilter::TimestampGt(ts) => json!({ "timestamp_gt": ts.to_string() }),
        WhereFilter::TimestampEqIdGt { timestamp, id } => json!({
            "timestamp": timestamp.to_string(),
            "id_gt": id,
        }),
    };
    json!({
        "query": ORDER_FILLED_QUERY,
        "variables": {
            "first": query.first,
            "where": filter,
        },
    })
}

/// Decode a GraphQL response body into events, in the order received.
///
/// A null `orderFilledEvents` is read as an empty page.
pub fn decode_response(body: &[u8]) -> Result<Vec<OrderFilledEvent>, FetchError> {
    let response: GraphqlResponse = serde_json::from_slice(body)
        .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(FetchError::new(FailureKind::Query, messages.join("; ")));
    }

    let data = response
        .data
        .ok_or_else(|| FetchError::new(FailureKind::Decode, "response has no data"))?;
    Ok(data
        .order_filled_events
        .unwrap_or_default()
        .into_iter()
        .map(WireEvent::into_event)
        .collect())
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    #[serde(default)]
    order_filled_events: Option<Vec<WireEvent>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    id: String,
    #[serde(deserialize_with = "timestamp_scalar")]
    timestamp: i64,
    #[serde(deserialize_with = "opaque")]
    maker: String,
    #[serde(deserialize_with = "opaque")]
    maker_asset_id: String,
    #[serde(deserialize_with = "opaque")]
    maker_amount_filled: String,
    #[serde(deserialize_with = "opaque")]
    taker: String,
    #[serde(deserialize_with = "opaque")]
    taker_asset_id: String,
    #[serde(deserialize_with = "opaque")]
    taker_amount_filled: String,
    #[serde(deserialize_with = "opaque")]
    transaction_hash: String,
    #[serde(default, deserialize_with = "opaque_opt")]
    fee: Option<String>,
    #[serde(default, deserialize_with = "opaque_opt")]
    order_hash: Option<String>,
}

impl WireEvent {
    fn into_event(self) -> OrderFilledEvent {
        OrderFilledEvent {
            id: self.id,
            timestamp: self.timestamp,
            maker: self.maker,
            maker_asset_id: self.maker_asset_id,
            maker_amount_filled: self.maker_amount_filled,
            taker: self.taker,
            taker_asset_id: self.taker_asset_id,
            taker_amount_filled: self.taker_amount_filled,
            transaction_hash: self.transaction_hash,
            fee: self.fee,
            order_hash: self.order_hash,
        }
    }
}

fn scalar_to_string<E: de::Error>(value: Value) -> Result<String, E> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(E::custom(format!("expected string or number, got {other}"))),
    }
}

fn opaque<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_to_string(Value::deserialize(deserializer)?)
}

fn opaque_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        other => scalar_to_string(other).map(Some),
    }
}

fn timestamp_scalar<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = opaque(deserializer)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|err| de::Error::custom(format!("invalid timestamp {raw:?}: {err}")))
}
