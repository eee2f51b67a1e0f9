//! Error taxonomy for autocheck.
//!
//! Everything below the per-check and per-student granularity is contained and
//! turned into a result record; only [`ConfigError`] is allowed to abort a batch.

use thiserror::Error;

/// Maximum length of an error message embedded in a check outcome.
pub const CHECK_DETAIL_LIMIT: usize = 200;

/// Maximum length of an error message embedded in a student result.
pub const STUDENT_ERROR_LIMIT: usize = 200;

/// Maximum length of an LLM failure reason carried by the sentinel verdict.
pub const ANALYSIS_ERROR_LIMIT: usize = 100;

/// Errors raised by the hosting API or the archive download.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Repository or resource is absent.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Private repository or bad credentials.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Network or HTTP failure.
    #[error("fetch failed: {0}")]
    Transient(String),

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Result type for collaborator fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Errors raised while evaluating a single check. Always converted into an
/// `ERROR` outcome for that check.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("missing parameter '{0}'")]
    MissingParam(&'static str),

    #[error("parameter '{name}' must be {expected}")]
    InvalidParam {
        name: &'static str,
        expected: &'static str,
    },

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Errors raised by the language-model collaborator.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("model returned no content (model: {0})")]
    EmptyResponse(String),

    #[error("could not parse verdict: {0}")]
    Parse(String),

    #[error("no model available: {0}")]
    NoModel(String),
}

/// Malformed or missing startup inputs. Fatal: aborts the batch before dispatch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("roster file not found: {0}")]
    RosterNotFound(String),

    #[error("lab specification not found: {0}")]
    SpecNotFound(String),

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("check '{id}' has unknown type '{check_type}'")]
    UnknownCheckType { id: String, check_type: String },

    #[error("duplicate check id '{0}'")]
    DuplicateCheckId(String),

    #[error("check id must not be empty")]
    EmptyCheckId,

    #[error("roster is empty: {0}")]
    EmptyRoster(String),

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Umbrella error for batch runs and report writing.
#[derive(Debug, Error)]
pub enum AutocheckError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("report error: {0}")]
    Report(String),
}

/// Result type for batch-level operations.
pub type Result<T> = std::result::Result<T, AutocheckError>;

/// Truncate `text` to at most `max_chars` characters, appending `...` when cut.
pub fn bounded(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
