//! Error types for the harvester.
//!
//! `HarvesterError` covers the whole taxonomy a harvest run can hit:
//! configuration problems, transport failures, errors signalled in-band by
//! the remote archive, and structural conversion failures. Record-level
//! validation failures are deliberately absent: they are absorbed by the
//! converter and never surface as errors.

use thiserror::Error;

/// OAI-PMH error code sent when a `from` date selects no records.
pub const NO_RECORDS_MATCH: &str = "noRecordsMatch";

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// Missing or malformed configuration setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid date format.
    #[error("Invalid date format: '{0}'. Expected YYYY-MM-DD (e.g., 2024-01-01)")]
    InvalidDate(String),

    /// Query parameters failed validation.
    #[error("Invalid query parameter '{field}': {reason}")]
    InvalidQuery { field: &'static str, reason: String },

    /// Continuation cursor unusable for a request.
    #[error("Invalid resumption token: {0}")]
    InvalidCursor(String),

    /// HTTP client could not be built or the request could not be sent.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Round trip to the archive failed (network, timeout or non-success status).
    #[error("Fetch from {url} failed{}: {message}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// The archive answered with an in-band `<error>` element.
    #[error("Archive returned an error{}: {message}", .code.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    RemoteError {
        code: Option<String>,
        message: String,
    },

    /// Response body could not be converted into a page.
    #[error("Conversion of the response failed: {0}")]
    Conversion(String),

    /// Input handed to the converter is not text.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarvesterError {
    /// Whether this is the archive telling us nothing matched the query.
    #[must_use]
    pub fn is_no_records_match(&self) -> bool {
        matches!(self, Self::RemoteError { code: Some(code), .. } if code == NO_RECORDS_MATCH)
    }

    /// Whether this error is a configuration or validation problem.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidDate(_) | Self::InvalidQuery { .. }
        )
    }
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;
