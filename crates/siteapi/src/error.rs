//! Error types for site API calls.
//!
//! Errors are categorized so callers can tell a transient network failure
//! from a rejected request or a bad configuration, and give useful advice.

use reconcile::RequestError;
use std::fmt;

/// Result type alias for site API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of site API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS, TLS, timeout or server-side failure (transient).
    Network,
    /// Credentials missing or refused.
    Auth,
    /// Entity or route does not exist.
    NotFound,
    /// The site refused the request as invalid.
    Rejected,
    /// Response body could not be understood.
    Format,
    /// Client configuration is unusable.
    Config,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Not found on the site",
            Self::Rejected => "Request rejected by the site",
            Self::Format => "Unexpected response format",
            Self::Config => "Invalid site configuration",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the site is reachable and try again",
            Self::Auth => "Check the API token and its permissions",
            Self::NotFound => "Verify the site URL and that the entity still exists",
            Self::Rejected => "Check the manifest values sent for this entity",
            Self::Format => "Verify the site URL points at the REST API root",
            Self::Config => "Check the [site] section of the project config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the site.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The site answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// No response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body was not valid JSON.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The configured base URL cannot be used.
    #[error("invalid site URL '{0}': must start with http:// or https://")]
    InvalidBaseUrl(String),

    /// The background request task did not complete.
    #[error("request task failed: {0}")]
    Task(String),
}

impl Error {
    /// Create a status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Status { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                404 | 410 => ErrorCategory::NotFound,
                408 | 429 | 500..=599 => ErrorCategory::Network,
                _ => ErrorCategory::Rejected,
            },
            Error::Timeout(_) | Error::Transport(_) | Error::Task(_) => ErrorCategory::Network,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::InvalidBaseUrl(_) => ErrorCategory::Config,
        }
    }

    /// Whether this error is typically transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::status(code, format!("HTTP {code}")),
            ureq::Error::Timeout(which) => Self::Timeout(format!("{which:?}")),
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<Error> for RequestError {
    fn from(err: Error) -> Self {
        match err {
            Error::Status { status, message } => RequestError::Status { status, message },
            Error::InvalidResponse(message) => RequestError::InvalidResponse(message),
            other => RequestError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Rejected.is_retryable());
        assert!(!ErrorCategory::Format.is_retryable());
        assert!(!ErrorCategory::Config.is_retryable());
    }

    #[test]
    fn test_error_category_advice() {
        assert!(!ErrorCategory::Auth.advice().is_empty());
        assert!(ErrorCategory::Config.advice().contains("[site]"));
    }

    #[test]
    fn test_error_category_display() {
        let display = format!("{}", ErrorCategory::Network);
        assert!(display.contains("Network"));
    }

    #[test]
    fn test_status_categories() {
        assert_eq!(Error::status(401, "").category(), ErrorCategory::Auth);
        assert_eq!(Error::status(403, "").category(), ErrorCategory::Auth);
        assert_eq!(Error::status(404, "").category(), ErrorCategory::NotFound);
        assert_eq!(Error::status(400, "").category(), ErrorCategory::Rejected);
        assert_eq!(Error::status(422, "").category(), ErrorCategory::Rejected);
        assert!(Error::status(503, "").is_retryable());
        assert!(Error::status(429, "").is_retryable());
    }

    #[test]
    fn test_from_ureq_status() {
        let err: Error = ureq::Error::StatusCode(502).into();
        assert!(matches!(err, Error::Status { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_invalid_base_url_is_config() {
        let err = Error::InvalidBaseUrl("ftp://example.com".into());
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn test_into_request_error() {
        let err: RequestError = Error::status(409, "slug taken").into();
        assert_eq!(err, RequestError::status(409, "slug taken"));

        let err: RequestError = Error::Timeout("global".into()).into();
        assert!(matches!(err, RequestError::Transport(m) if m.contains("timed out")));

        let err: RequestError = Error::InvalidResponse("eof".into()).into();
        assert_eq!(err, RequestError::InvalidResponse("eof".into()));
    }
}
