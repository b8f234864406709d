use std::time::Duration;
use thiserror::Error;

/// Hard failures visible above the fan-out boundary.
///
/// Everything else degrades: partial fan-out failures shrink the result set,
/// stale or missing data becomes an empty result, and unknown corners are
/// simply inactive.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed date/time strings or a negative queue length. Surfaced
    /// immediately, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing store could not be reached at all. Distinct from "no
    /// data"; callers retry on a later poll.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Failures raised by a time-series store implementation. Classified at the
/// fan-out boundary; never crosses it directly.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed record: {0}")]
    BadRecord(String),
}
