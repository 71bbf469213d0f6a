use std::time::Duration;

use thiserror::Error;

/// Failure while retrieving or interpreting spreadsheet pages.
///
/// A single failed page aborts the whole fetch cycle; nothing is retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch data from spreadsheet source: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("spreadsheet source returned status {status}")]
    Status { status: u16 },
    #[error("unable to parse last row number from range '{0}'")]
    Range(String),
    #[error("required column '{0}' is missing from the header row")]
    MissingHeader(&'static str),
    #[error("invalid data structure")]
    InvalidStructure,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// A gated downstream call was attempted before its cooldown elapsed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("API call rate limited, retry in {retry_after:?}")]
pub struct RateLimitError {
    pub retry_after: Duration,
}

#[derive(Debug, Error)]
pub enum InsightsError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("insights are not configured")]
    Disabled,
    #[error("completion request failed: {0}")]
    Completion(#[source] anyhow::Error),
}
