//! Sync executor - applies planned operations one at a time
//!
//! Operations run sequentially in plan order. A failed operation is recorded
//! with its error and the run continues; nothing is retried.

use crate::context::{CancelToken, ProgressCallback, Requester};
use crate::diff::DiffResult;
use crate::planner::{PlannedOperation, SyncOperation, SyncOptions, SyncPlan, plan_sync};
use crate::types::ExecutionMode;
use serde::{Deserialize, Serialize};

/// Outcome status of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// What happened to one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: SyncOperation,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why a skipped operation was not executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OperationOutcome {
    pub fn succeeded(operation: SyncOperation) -> Self {
        Self {
            operation,
            status: OperationStatus::Succeeded,
            error: None,
            reason: None,
        }
    }

    pub fn failed(operation: SyncOperation, error: impl Into<String>) -> Self {
        Self {
            operation,
            status: OperationStatus::Failed,
            error: Some(error.into()),
            reason: None,
        }
    }

    pub fn skipped(operation: SyncOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            status: OperationStatus::Skipped,
            error: None,
            reason: Some(reason.into()),
        }
    }
}

/// Counts of operation outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SyncSummary {
    /// Add an outcome to the summary
    pub fn add(&mut self, status: OperationStatus) {
        self.total += 1;
        match status {
            OperationStatus::Succeeded => self.succeeded += 1,
            OperationStatus::Failed => self.failed += 1,
            OperationStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Result of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub operations: Vec<OperationOutcome>,
    pub summary: SyncSummary,
}

impl SyncResult {
    pub fn from_outcomes(operations: Vec<OperationOutcome>) -> Self {
        let mut summary = SyncSummary::default();
        for outcome in &operations {
            summary.add(outcome.status);
        }
        Self {
            success: summary.failed == 0,
            operations,
            summary,
        }
    }

    /// Outcomes that failed
    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.operations
            .iter()
            .filter(|o| o.status == OperationStatus::Failed)
    }
}

/// Plan and execute a diff against the site
pub async fn execute_sync<R, P>(
    diff: &DiffResult,
    requester: &R,
    options: &SyncOptions,
    progress: &mut P,
) -> SyncResult
where
    R: Requester + ?Sized,
    P: ProgressCallback + ?Sized,
{
    let plan = plan_sync(diff, options);
    execute_plan(&plan, requester, options.mode, None, progress).await
}

/// Execute an already-built plan
///
/// In dry-run mode no request is made and every operation comes back as
/// skipped. A cancelled token turns every operation not yet started into a
/// skip.
pub async fn execute_plan<R, P>(
    plan: &SyncPlan,
    requester: &R,
    mode: ExecutionMode,
    cancel: Option<&CancelToken>,
    progress: &mut P,
) -> SyncResult
where
    R: Requester + ?Sized,
    P: ProgressCallback + ?Sized,
{
    let total = plan.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, planned) in plan.operations.iter().enumerate() {
        progress.on_operation_start(index, total, &planned.operation);

        let outcome = if let Some(reason) = &planned.skip_reason {
            OperationOutcome::skipped(planned.operation.clone(), reason.clone())
        } else if mode.is_dry_run() {
            OperationOutcome::skipped(planned.operation.clone(), "dry run")
        } else if cancel.is_some_and(CancelToken::is_cancelled) {
            OperationOutcome::skipped(planned.operation.clone(), "cancelled")
        } else {
            apply_operation(planned, requester).await
        };

        progress.on_operation_complete(&outcome);
        outcomes.push(outcome);
    }

    let result = SyncResult::from_outcomes(outcomes);
    log::info!(
        "Executed {} operations: {} succeeded, {} failed, {} skipped",
        result.summary.total,
        result.summary.succeeded,
        result.summary.failed,
        result.summary.skipped
    );
    result
}

pub(crate) async fn apply_operation<R: Requester + ?Sized>(
    planned: &PlannedOperation,
    requester: &R,
) -> OperationOutcome {
    let operation = planned.operation.clone();

    let (endpoint, init) = match operation.to_request() {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Cannot {}: {}", operation, e);
            return OperationOutcome::failed(operation, e);
        }
    };

    log::debug!("{} {}", init.method, endpoint);
    match requester.request(&endpoint, init).await {
        Ok(_) => OperationOutcome::succeeded(operation),
        Err(e) => {
            log::warn!("Failed to {}: {}", operation, e);
            OperationOutcome::failed(operation, e.to_string())
        }
    }
}
