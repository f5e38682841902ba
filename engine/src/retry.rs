use std::time::Duration;

use log::warn;
use tokio::time::sleep;

use crate::error::AdapterError;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(350);

/// Repeats an outbound call once when it failed at the transport layer.
///
/// Application failures (non-success status, refusals, bad payloads) are
/// returned from the first attempt untouched. The second attempt's outcome is
/// final, whatever it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        match call().await {
            Err(err) if err.is_transport() => {
                warn!("{err}, retrying once in {:?}", self.delay);
                sleep(self.delay).await;
                call().await
            }
            res => res,
        }
    }
}
