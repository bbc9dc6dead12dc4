//! # Reconcile
//!
//! Manifest reconciliation for a remote content platform.
//!
//! This crate compares a declared manifest of pages and plugins against the
//! live state of a site, turns the difference into an ordered list of
//! writes, applies them, and can undo a sync from the snapshot taken just
//! before it.
//!
//! ## Core Concepts
//!
//! - **Manifest**: Desired pages (keyed by slug) and plugin activation
//! - **DiffResult**: Per-entity additions, removals, modifications, matches
//! - **SyncPlan**: Creates, updates, deletes, then plugin toggles
//! - **PreSyncSnapshot**: Prior state of everything a sync will touch
//! - **Rollback**: The inverse plan of a snapshot
//!
//! ## Example
//!
//! ```no_run
//! use reconcile::{Manifest, NoProgress, SyncRequest, run_sync};
//! use reconcile::testing::FakeSite;
//! use std::path::Path;
//!
//! # async fn demo() -> reconcile::Result<()> {
//! let manifest = Manifest::from_json_str(
//!     r#"{"pages": [{"slug": "home", "title": "Home"}], "plugins": {}}"#,
//! )?;
//! let site = FakeSite::new().with_page("home", "Old Home");
//!
//! let run = run_sync(
//!     SyncRequest::new(Path::new("."), &manifest),
//!     &site,
//!     &mut NoProgress,
//! )
//! .await?;
//! assert!(run.result.success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Seams
//!
//! - [`Requester`]: The only way the engine talks to the site
//! - [`ProgressCallback`]: Receives per-operation progress
//! - [`CancelToken`]: Stops a run between operations
//!
//! Writes are always sequential. Failed operations are recorded and the run
//! continues; nothing is retried.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod live;
pub mod manifest;
pub mod planner;
pub mod rollback;
pub mod session;
pub mod snapshot;
pub mod testing;
pub mod types;

// Re-export main types at crate root
pub use context::{
    CancelToken, Method, NoProgress, ProgressCallback, RequestInit, Requester,
};
pub use diff::{DiffEntry, DiffKind, DiffOptions, DiffResult, DiffSummary, compute_diff};
pub use error::{ReconcileError, RequestError, Result};
pub use executor::{
    OperationOutcome, OperationStatus, SyncResult, SyncSummary, execute_plan, execute_sync,
};
pub use live::{fetch_live_pages, fetch_live_plugins, parse_live_pages, parse_live_plugins};
pub use manifest::Manifest;
pub use planner::{
    OperationPayload, OperationType, PagePayload, PlannedOperation, SyncOperation, SyncOptions,
    SyncPlan, plan_sync,
};
pub use rollback::{
    RollbackLookup, RollbackOptions, RollbackResult, execute_rollback, plan_rollback,
    rollback_by_id,
};
pub use session::{
    DEFAULT_KEEP_SNAPSHOTS, LiveState, SyncRequest, SyncRun, compute_live_diff, run_sync,
};
pub use snapshot::{
    PageSnapshotEntry, PluginSnapshotEntry, PreSyncSnapshot, SnapshotSummary,
    cleanup_old_snapshots, create_pre_sync_snapshot, generate_sync_id, list_pre_sync_snapshots,
    load_pre_sync_snapshot, save_pre_sync_snapshot, snapshot_dir,
};
pub use types::{
    DesiredEntity, EntityType, ExecutionMode, LiveEntity, LivePage, LivePlugin, ManifestPage,
    PageField, PluginEntry,
};
