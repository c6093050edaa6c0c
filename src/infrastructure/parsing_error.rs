//! Error types for fetching and parsing listing pages
//!
//! A missing field is never an error: field resolution yields `None` and the
//! record carries the gap. These types cover page-level failures only.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("HTTP request failed for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP error {status}: {url}")]
    Status { status: u16, url: String },

    #[error("Rate limited on {url} after {attempts} attempts")]
    RateLimitExhausted { url: String, attempts: u32 },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("HTTP client configuration error: {message}")]
    ClientBuild { message: String },
}

impl FetchError {
    pub fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn status(status: u16, url: &str) -> Self {
        Self::Status {
            status,
            url: url.to_string(),
        }
    }

    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Body { .. } | Self::Status { .. } => true,
            Self::RateLimitExhausted { .. } | Self::ClientBuild { .. } => false,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimitExhausted { .. } => Some(429),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ParsingError {
    #[error("Invalid pattern for field '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("No filters found on search page {url}")]
    NoFiltersFound { url: String, controls_seen: usize },
}

impl ParsingError {
    pub fn invalid_pattern(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidPattern {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn no_filters_found(url: &str, controls_seen: usize) -> Self {
        Self::NoFiltersFound {
            url: url.to_string(),
            controls_seen,
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
pub type FetchResult<T> = Result<T, FetchError>;
