//! Resilient HTTP fetching
//!
//! Requests are retried with exponential backoff and bounded per attempt by a
//! timeout. Callers get either the parsed payload of the first successful
//! attempt or the error of the last one.

mod client;
mod error;
mod retry;

pub use client::{RequestOptions, ResilientFetcher};
pub use error::{AttemptRecord, FetchError, RetryFailure};
pub use retry::{
    retry_with_backoff, RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY_MS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_MS,
};
