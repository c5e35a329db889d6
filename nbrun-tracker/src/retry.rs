//! Throttling retry
//!
//! The processing service rate-limits describe and list calls. A throttled
//! call is a scheduling delay, not a failure: it is retried after a fixed
//! backoff for as long as the service keeps throttling. Every other error is
//! returned to the caller on the first occurrence.

use nbrun_client::ClientError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Backoff between attempts of a throttled call
pub const DEFAULT_THROTTLE_BACKOFF: Duration = Duration::from_secs(1);

/// Runs `call` until it returns anything other than a throttling error
pub async fn retry_throttled<T, F, Fut>(
    backoff: Duration,
    what: &str,
    mut call: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut throttled = 0u32;

    loop {
        match call().await {
            Err(e) if e.is_throttling() => {
                throttled += 1;
                debug!(
                    "{} throttled ({} time(s)), retrying in {:?}",
                    what, throttled, backoff
                );
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}
