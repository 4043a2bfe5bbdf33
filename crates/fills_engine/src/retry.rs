use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backoff::backoff::Constant;
use backoff::future::retry_notify;
use backoff::Error as BackoffError;
use fills_core::{OrderFilledEvent, Query};

use crate::{EventSource, FetchError, HarvestError};

/// Fixed-delay retry for failed fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Total attempts per fetch, first one included. `None` retries forever.
    pub max_attempts: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    fn allows_another(&self, attempts_made: usize) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max.max(1),
            None => true,
        }
    }
}

/// Run `source.fetch(query)` until it succeeds or the policy gives up.
///
/// `notify` is called before each wait with the number of attempts made so
/// far, the delay, and the error that triggered the retry.
pub(crate) async fn fetch_with_retry<N>(
    source: &dyn EventSource,
    query: &Query,
    policy: &RetryPolicy,
    mut notify: N,
) -> Result<Vec<OrderFilledEvent>, HarvestError>
where
    N: FnMut(usize, Duration, &FetchError),
{
    let counter = AtomicUsize::new(0);
    let attempts = &counter;

    let result = retry_notify(
        Constant::new(policy.delay),
        move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            source.fetch(query).await.map_err(|err| {
                if policy.allows_another(attempt) {
                    BackoffError::transient(err)
                } else {
                    BackoffError::permanent(err)
                }
            })
        },
        |err: FetchError, delay: Duration| {
            notify(attempts.load(Ordering::Relaxed), delay, &err);
        },
    )
    .await;

    result.map_err(|last| HarvestError::RetriesExhausted {
        attempts: counter.load(Ordering::Relaxed),
        last,
    })
}
