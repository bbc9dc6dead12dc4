//! One complete sync: read, diff, snapshot, write, prune

use crate::context::{CancelToken, ProgressCallback, Requester};
use crate::diff::{DiffOptions, DiffResult, compute_diff};
use crate::error::Result;
use crate::executor::{SyncResult, execute_plan};
use crate::live::{fetch_live_pages, fetch_live_plugins};
use crate::manifest::Manifest;
use crate::planner::{SyncOptions, plan_sync};
use crate::snapshot::{
    cleanup_old_snapshots, create_pre_sync_snapshot, generate_sync_id, save_pre_sync_snapshot,
};
use crate::types::{LivePage, LivePlugin};
use std::path::{Path, PathBuf};

/// Default number of snapshots kept after a sync
pub const DEFAULT_KEEP_SNAPSHOTS: usize = 10;

/// Inputs of a sync run
#[derive(Debug, Clone)]
pub struct SyncRequest<'a> {
    pub project_root: &'a Path,
    pub manifest: &'a Manifest,
    pub diff_options: DiffOptions,
    pub sync_options: SyncOptions,
    /// Snapshots to retain after a successful snapshot write
    pub keep_snapshots: usize,
    pub cancel: Option<CancelToken>,
}

impl<'a> SyncRequest<'a> {
    pub fn new(project_root: &'a Path, manifest: &'a Manifest) -> Self {
        Self {
            project_root,
            manifest,
            diff_options: DiffOptions::default(),
            sync_options: SyncOptions::default(),
            keep_snapshots: DEFAULT_KEEP_SNAPSHOTS,
            cancel: None,
        }
    }
}

/// What a sync run did
#[derive(Debug, Clone)]
pub struct SyncRun {
    /// Set when a snapshot was taken
    pub sync_id: Option<String>,
    pub snapshot_path: Option<PathBuf>,
    pub diff: DiffResult,
    pub result: SyncResult,
    /// Snapshot ids removed by retention
    pub pruned: Vec<String>,
}

/// Read live state and compute the diff for a manifest
pub async fn compute_live_diff<R: Requester + ?Sized>(
    manifest: &Manifest,
    requester: &R,
    options: DiffOptions,
) -> Result<(DiffResult, LiveState)> {
    let pages = fetch_live_pages(requester).await?;
    let plugins = if options.include_plugins {
        fetch_live_plugins(requester).await?
    } else {
        Vec::new()
    };

    let diff = compute_diff(&manifest.pages, &manifest.plugins, &pages, &plugins, options)?;
    Ok((diff, LiveState { pages, plugins }))
}

/// Live entities as read at the start of a run
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub pages: Vec<LivePage>,
    pub plugins: Vec<LivePlugin>,
}

/// Run a full sync
///
/// The snapshot is persisted before the first write; if that fails the run
/// aborts with nothing written. Dry runs and plans without executable
/// operations take no snapshot. Retention failures are only logged.
pub async fn run_sync<R, P>(
    request: SyncRequest<'_>,
    requester: &R,
    progress: &mut P,
) -> Result<SyncRun>
where
    R: Requester + ?Sized,
    P: ProgressCallback + ?Sized,
{
    let (diff, live) = compute_live_diff(request.manifest, requester, request.diff_options).await?;
    let options = request.sync_options;
    let plan = plan_sync(&diff, &options);

    let mut sync_id = None;
    let mut snapshot_path = None;
    if plan.has_writes() && !options.mode.is_dry_run() {
        let id = generate_sync_id();
        let snapshot = create_pre_sync_snapshot(&diff, &live.pages, &live.plugins, &id, &options);
        snapshot_path = Some(save_pre_sync_snapshot(request.project_root, &snapshot)?);
        log::info!("Captured snapshot {}", id);
        sync_id = Some(id);
    }

    let result = execute_plan(
        &plan,
        requester,
        options.mode,
        request.cancel.as_ref(),
        progress,
    )
    .await;

    let pruned = if sync_id.is_some() {
        match cleanup_old_snapshots(request.project_root, request.keep_snapshots) {
            Ok(pruned) => pruned,
            Err(e) => {
                log::warn!("Snapshot cleanup failed: {}", e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    Ok(SyncRun {
        sync_id,
        snapshot_path,
        diff,
        result,
        pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::error::ReconcileError;
    use crate::live::PAGES_ENDPOINT;
    use crate::snapshot::{list_pre_sync_snapshots, load_pre_sync_snapshot};
    use crate::testing::FakeSite;
    use crate::types::ManifestPage;
    use tempfile::{NamedTempFile, TempDir};

    fn manifest(pages: Vec<ManifestPage>) -> Manifest {
        Manifest {
            pages,
            ..Manifest::default()
        }
    }

    #[tokio::test]
    async fn test_snapshot_saved_before_writes() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new().with_page("home", "Old Home");
        let manifest = manifest(vec![
            ManifestPage::new("home", "Home"),
            ManifestPage::new("about", "About"),
        ]);

        let run = run_sync(SyncRequest::new(dir.path(), &manifest), &site, &mut NoProgress)
            .await
            .unwrap();

        assert!(run.result.success);
        let sync_id = run.sync_id.unwrap();
        assert!(run.snapshot_path.unwrap().exists());

        let snapshot = load_pre_sync_snapshot(dir.path(), &sync_id).unwrap().unwrap();
        assert_eq!(snapshot.pages.len(), 2);
        let home = snapshot.pages.iter().find(|p| p.slug == "home").unwrap();
        assert_eq!(home.prior_state.as_ref().unwrap().title, "Old Home");
    }

    #[tokio::test]
    async fn test_no_snapshot_for_dry_run_or_noop() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new().with_page("home", "Home");

        let noop = manifest(vec![ManifestPage::new("home", "Home")]);
        let run = run_sync(SyncRequest::new(dir.path(), &noop), &site, &mut NoProgress)
            .await
            .unwrap();
        assert!(run.sync_id.is_none());

        let changed = manifest(vec![ManifestPage::new("home", "New Home")]);
        let mut request = SyncRequest::new(dir.path(), &changed);
        request.sync_options = SyncOptions::dry_run();
        let run = run_sync(request, &site, &mut NoProgress).await.unwrap();
        assert!(run.sync_id.is_none());
        assert_eq!(run.result.summary.skipped, 1);

        assert!(list_pre_sync_snapshots(dir.path()).unwrap().is_empty());
        assert_eq!(site.write_count(), 0);
    }

    #[tokio::test]
    async fn test_second_sync_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new()
            .with_page("home", "Old Home")
            .with_page("legacy", "Legacy");
        let manifest = manifest(vec![
            ManifestPage::new("home", "Home"),
            ManifestPage::new("about", "About"),
        ]);
        let mut request = SyncRequest::new(dir.path(), &manifest);
        request.diff_options.strict_mode = true;
        request.sync_options.sync_deletions = true;

        let first = run_sync(request.clone(), &site, &mut NoProgress).await.unwrap();
        assert!(first.result.success);

        let writes = site.write_count();
        let second = run_sync(request, &site, &mut NoProgress).await.unwrap();
        assert!(!second.diff.summary.has_differences);
        assert_eq!(second.result.summary.total, 0);
        assert!(second.sync_id.is_none());
        assert_eq!(site.write_count(), writes);
    }

    #[tokio::test]
    async fn test_snapshot_failure_aborts_before_writes() {
        // A regular file where the project directory should be
        let file = NamedTempFile::new().unwrap();
        let site = FakeSite::new().with_page("home", "Old Home");
        let manifest = manifest(vec![ManifestPage::new("home", "Home")]);

        let err = run_sync(SyncRequest::new(file.path(), &manifest), &site, &mut NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::SnapshotIo { .. }));
        assert_eq!(site.write_count(), 0);
        assert_eq!(site.page("home").unwrap().title, "Old Home");
    }

    #[tokio::test]
    async fn test_live_read_failure_surfaces() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new().failing_endpoint(PAGES_ENDPOINT);
        let manifest = manifest(vec![ManifestPage::new("home", "Home")]);

        let err = run_sync(SyncRequest::new(dir.path(), &manifest), &site, &mut NoProgress)
            .await
            .unwrap_err();
        assert!(err.is_live_read());
    }

    #[tokio::test]
    async fn test_retention_after_twelve_syncs() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new().with_page("home", "Home 0");

        let mut pruned = Vec::new();
        for n in 1..=12 {
            let manifest = manifest(vec![ManifestPage::new("home", format!("Home {n}"))]);
            let run = run_sync(SyncRequest::new(dir.path(), &manifest), &site, &mut NoProgress)
                .await
                .unwrap();
            assert!(run.sync_id.is_some());
            pruned.extend(run.pruned);
        }

        assert_eq!(pruned.len(), 2);
        assert_eq!(list_pre_sync_snapshots(dir.path()).unwrap().len(), 10);
    }
}
