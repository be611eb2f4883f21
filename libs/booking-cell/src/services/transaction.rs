use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::models::BookingError;

pub const MAX_BOOKING_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 100;

fn is_retryable(err: &BookingError) -> bool {
    match err {
        BookingError::LockContended => true,
        BookingError::Store(store_err) => store_err.is_transient(),
        // Business-rule rejections never change on retry.
        _ => false,
    }
}

/// Runs a booking attempt up to [`MAX_BOOKING_ATTEMPTS`] times with
/// linear backoff. Only lock contention and transient store failures
/// are retried; business-rule rejections surface immediately.
///
/// Contention that survives every attempt means the slot really is
/// being taken, so it is reported as [`BookingError::SlotConflict`].
/// An exhausted transient store failure stays an infrastructure error.
pub async fn run_booking_transaction<F, Fut, T>(
    operation: &str,
    mut attempt_fn: F,
) -> Result<T, BookingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BookingError>>,
{
    let mut last_err = BookingError::LockContended;

    for attempt in 1..=MAX_BOOKING_ATTEMPTS {
        match attempt_fn().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(err) if is_retryable(&err) && attempt < MAX_BOOKING_ATTEMPTS => {
                warn!(
                    "{} attempt {}/{} failed ({}), retrying",
                    operation, attempt, MAX_BOOKING_ATTEMPTS, err
                );
                last_err = err;
                tokio::time::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * attempt as u64))
                    .await;
            }
            Err(err) => {
                last_err = err;
                break;
            }
        }
    }

    match last_err {
        BookingError::LockContended => Err(BookingError::SlotConflict),
        err => Err(err),
    }
}
