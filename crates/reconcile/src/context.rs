//! Request seam and execution callbacks
//!
//! These traits keep the engine independent of any HTTP client, terminal
//! UI or signal handling. Every network interaction goes through one
//! [`Requester`].

use crate::error::RequestError;
use crate::executor::OperationOutcome;
use crate::planner::SyncOperation;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// HTTP-style method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Whether the method only reads state
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method and optional JSON body of a request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInit {
    pub method: Method,
    pub body: Option<Value>,
}

impl RequestInit {
    pub fn get() -> Self {
        Self {
            method: Method::Get,
            body: None,
        }
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
        }
    }

    pub fn put(body: Value) -> Self {
        Self {
            method: Method::Put,
            body: Some(body),
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::Delete,
            body: None,
        }
    }
}

/// Asynchronous request function supplied by the caller
///
/// `endpoint` is a path rooted at the platform's `/entities/...` surface.
/// Timeouts and transport retries are the implementation's concern; the
/// engine records a failed call and moves on.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn request(&self, endpoint: &str, init: RequestInit) -> Result<Value, RequestError>;
}

#[async_trait]
impl<R: Requester + ?Sized> Requester for &R {
    async fn request(&self, endpoint: &str, init: RequestInit) -> Result<Value, RequestError> {
        (**self).request(endpoint, init).await
    }
}

#[async_trait]
impl<R: Requester + ?Sized> Requester for Arc<R> {
    async fn request(&self, endpoint: &str, init: RequestInit) -> Result<Value, RequestError> {
        (**self).request(endpoint, init).await
    }
}

/// Progress callback for sync and rollback runs
pub trait ProgressCallback: Send {
    /// Called before an operation is attempted
    fn on_operation_start(&mut self, index: usize, total: usize, operation: &SyncOperation);

    /// Called once an operation has an outcome (including skips)
    fn on_operation_complete(&mut self, outcome: &OperationOutcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_operation_start(&mut self, _index: usize, _total: usize, _operation: &SyncOperation) {}
    fn on_operation_complete(&mut self, _outcome: &OperationOutcome) {}
}

/// Cooperative cancellation flag checked between operations
///
/// Cancelling never interrupts an in-flight request; operations not yet
/// started are recorded as skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
