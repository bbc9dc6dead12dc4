//! Error types for the reconcile crate

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single call through a [`Requester`](crate::Requester)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The platform answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RequestError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// Errors that abort a whole engine call
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Manifest or live-state input is malformed
    #[error("malformed {source_name}: {message}")]
    Structural {
        source_name: &'static str,
        message: String,
    },

    /// Reading live state from the site failed
    #[error("failed to read live {resource}: {source}")]
    LiveRead {
        resource: &'static str,
        #[source]
        source: RequestError,
    },

    /// Snapshot file could not be read or written
    #[error("snapshot I/O error at {}: {source}", .path.display())]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot with this id already exists on disk
    #[error("snapshot {0} already exists")]
    SnapshotExists(String),

    /// Snapshot document could not be encoded or decoded
    #[error("invalid snapshot {}: {source}", .path.display())]
    SnapshotFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ReconcileError {
    pub(crate) fn structural(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Structural {
            source_name,
            message: message.into(),
        }
    }

    pub(crate) fn snapshot_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SnapshotIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from reading the site rather than local input
    pub fn is_live_read(&self) -> bool {
        matches!(self, Self::LiveRead { .. })
    }
}

/// Result type for reconcile operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_read_is_distinguishable() {
        let err = ReconcileError::LiveRead {
            resource: "pages",
            source: RequestError::Transport("connection refused".into()),
        };
        assert!(err.is_live_read());
        assert!(err.to_string().contains("live pages"));

        let err = ReconcileError::structural("manifest", "pages must be an array");
        assert!(!err.is_live_read());
        assert_eq!(
            err.to_string(),
            "malformed manifest: pages must be an array"
        );
    }

    #[test]
    fn test_request_error_display() {
        let err = RequestError::status(403, "forbidden");
        assert_eq!(err.to_string(), "HTTP 403: forbidden");
    }
}
