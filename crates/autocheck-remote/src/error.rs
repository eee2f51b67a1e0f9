//! Errors raised while building remote clients, and the mapping of HTTP
//! failures onto the core fetch taxonomy.

use autocheck_core::FetchError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Map a non-success status to a fetch error. 404 is handled by callers.
pub fn status_error(status: StatusCode, url: &str) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound(url.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FetchError::AccessDenied(format!("HTTP {} for {}", status.as_u16(), url))
        }
        _ => FetchError::Transient(format!("HTTP {} for {}", status.as_u16(), url)),
    }
}

/// Transport failures are always transient.
pub fn transport_error(err: reqwest::Error) -> FetchError {
    FetchError::Transient(err.to_string())
}
