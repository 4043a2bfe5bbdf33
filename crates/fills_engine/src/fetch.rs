use std::time::Duration;

use bytes::BytesMut;
use fills_core::{OrderFilledEvent, Query};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::graphql::{build_request_body, decode_response};
use crate::{FailureKind, FetchError};

/// Public Goldsky deployment of the Polymarket orderbook subgraph.
pub const DEFAULT_ENDPOINT: &str = "https://api.goldsky.com/api/public/project_cl6mb8i9h0003e201j6li0diw/subgraphs/orderbook-subgraph/0.0.1/gn";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Source of order-filled pages.
///
/// Implementations return the events matching `query.filter`, ordered by
/// `(timestamp, id)`, at most `query.first` of them.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch(&self, query: &Query) -> Result<Vec<OrderFilledEvent>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct GraphqlSource {
    endpoint: Url,
    settings: FetchSettings,
    client: reqwest::Client,
}

impl GraphqlSource {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&settings.endpoint)
            .map_err(|err| FetchError::new(FailureKind::InvalidEndpoint, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            endpoint,
            settings,
            client,
        })
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<BytesMut, FetchError> {
        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, content_len));
            }
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, next_len));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl EventSource for GraphqlSource {
    async fn fetch(&self, query: &Query) -> Result<Vec<OrderFilledEvent>, FetchError> {
        let payload = serde_json::to_vec(&build_request_body(query))
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = self.read_body(response).await?;
        decode_response(&body)
    }
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "response too large",
    )
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
