//! Pre-sync snapshots
//!
//! Before a mutating sync writes anything, the prior state of every entity
//! it is about to touch is captured into one JSON document under
//! `<root>/.sitesync/rollback/<sync_id>.json`. Documents are written once
//! and never modified; retention removes the oldest ones.

use crate::diff::{DiffEntry, DiffResult};
use crate::error::{ReconcileError, Result};
use crate::planner::{OperationType, SyncOptions, plan_sync};
use crate::types::{EntityType, LivePage, LivePlugin};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

/// Directory under the project root holding engine state
pub const STATE_DIR: &str = ".sitesync";
const ROLLBACK_DIR: &str = "rollback";
const SYNC_ID_PREFIX: &str = "sync-";
const SYNC_ID_FORMAT: &str = "%Y%m%dT%H%M%S%6fZ";

/// Last issued id timestamp, in microseconds since the epoch
static LAST_SYNC_MICROS: AtomicI64 = AtomicI64::new(0);

/// Prior state of one page the sync plans to touch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshotEntry {
    pub slug: String,
    pub planned_operation: OperationType,
    /// `None` when the page did not exist before the sync
    pub prior_state: Option<LivePage>,
}

/// Prior activation of one plugin the sync plans to toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSnapshotEntry {
    pub slug: String,
    pub was_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub plugin_toggles: usize,
}

impl SnapshotSummary {
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.deletes + self.plugin_toggles
    }
}

/// Everything needed to undo one sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreSyncSnapshot {
    pub sync_id: String,
    pub captured_at: DateTime<Utc>,
    pub pages: Vec<PageSnapshotEntry>,
    pub plugins: Vec<PluginSnapshotEntry>,
    pub summary: SnapshotSummary,
}

/// Generate a new sync id
///
/// Ids look like `sync-20260301T120000123456Z`. They sort lexicographically
/// in creation order and are strictly increasing within the process, even
/// when the clock does not advance between calls.
pub fn generate_sync_id() -> String {
    let now = Utc::now().timestamp_micros();
    let previous = LAST_SYNC_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    let micros = now.max(previous + 1);

    let stamp = DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now);
    format!("{SYNC_ID_PREFIX}{}", stamp.format(SYNC_ID_FORMAT))
}

/// Timestamp encoded in a sync id, if it is one
pub fn parse_sync_id(sync_id: &str) -> Option<DateTime<Utc>> {
    let stamp = sync_id.strip_prefix(SYNC_ID_PREFIX)?;
    NaiveDateTime::parse_from_str(stamp, SYNC_ID_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Directory holding the snapshots of a project
pub fn snapshot_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR).join(ROLLBACK_DIR)
}

/// Path of the snapshot document for a sync id
pub fn snapshot_path(project_root: &Path, sync_id: &str) -> PathBuf {
    snapshot_dir(project_root).join(format!("{sync_id}.json"))
}

/// Capture the prior state of everything the sync will write
///
/// Only operations that will actually execute are captured, so a removal
/// held back by `sync_deletions = false` is never recreated on rollback.
/// The live lists are authoritative; the diff's `before` is the fallback.
pub fn create_pre_sync_snapshot(
    diff: &DiffResult,
    live_pages: &[LivePage],
    live_plugins: &[LivePlugin],
    sync_id: &str,
    options: &SyncOptions,
) -> PreSyncSnapshot {
    let plan = plan_sync(diff, options);
    let mut pages = Vec::new();
    let mut plugins = Vec::new();
    let mut summary = SnapshotSummary::default();

    for operation in plan.executable() {
        match operation.entity_type {
            EntityType::Page => {
                let prior_state = match operation.op_type {
                    OperationType::Create => None,
                    _ => live_pages
                        .iter()
                        .find(|p| p.slug == operation.key)
                        .cloned()
                        .or_else(|| {
                            entry_for(&diff.pages, &operation.key)
                                .and_then(DiffEntry::live_page)
                                .cloned()
                        }),
                };
                match operation.op_type {
                    OperationType::Create => summary.creates += 1,
                    OperationType::Update => summary.updates += 1,
                    _ => summary.deletes += 1,
                }
                pages.push(PageSnapshotEntry {
                    slug: operation.key.clone(),
                    planned_operation: operation.op_type,
                    prior_state,
                });
            }
            EntityType::Plugin => {
                let was_active = live_plugins
                    .iter()
                    .find(|p| p.slug == operation.key)
                    .map(|p| p.active)
                    .or_else(|| {
                        entry_for(&diff.plugins, &operation.key)
                            .and_then(DiffEntry::live_plugin)
                            .map(|p| p.active)
                    })
                    // A toggle always flips the current state.
                    .unwrap_or(operation.op_type == OperationType::Deactivate);
                summary.plugin_toggles += 1;
                plugins.push(PluginSnapshotEntry {
                    slug: operation.key.clone(),
                    was_active,
                });
            }
        }
    }

    PreSyncSnapshot {
        sync_id: sync_id.to_string(),
        captured_at: parse_sync_id(sync_id).unwrap_or_else(Utc::now),
        pages,
        plugins,
        summary,
    }
}

/// Persist a snapshot, refusing to replace an existing one
///
/// The document is written to a temporary file and fsynced, then hard
/// linked into place. Linking fails if the target exists, so a snapshot is
/// never overwritten. Returns the final path.
pub fn save_pre_sync_snapshot(project_root: &Path, snapshot: &PreSyncSnapshot) -> Result<PathBuf> {
    if !is_valid_sync_id(&snapshot.sync_id) {
        return Err(ReconcileError::structural(
            "snapshot",
            format!("invalid sync id '{}'", snapshot.sync_id),
        ));
    }

    let dir = snapshot_dir(project_root);
    fs::create_dir_all(&dir).map_err(|e| ReconcileError::snapshot_io(&dir, e))?;

    let final_path = snapshot_path(project_root, &snapshot.sync_id);
    if final_path.exists() {
        return Err(ReconcileError::SnapshotExists(snapshot.sync_id.clone()));
    }

    let json = serde_json::to_string_pretty(snapshot).map_err(|source| {
        ReconcileError::SnapshotFormat {
            path: final_path.clone(),
            source,
        }
    })?;

    let tmp_path = dir.join(format!(".{}.{}.tmp", snapshot.sync_id, std::process::id()));
    let written = write_synced(&tmp_path, json.as_bytes())
        .and_then(|()| fs::hard_link(&tmp_path, &final_path));
    let _ = fs::remove_file(&tmp_path);

    match written {
        Ok(()) => {
            log::debug!("Saved snapshot {}", final_path.display());
            Ok(final_path)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(ReconcileError::SnapshotExists(snapshot.sync_id.clone()))
        }
        Err(e) => Err(ReconcileError::snapshot_io(final_path, e)),
    }
}

/// All readable snapshots, newest first
///
/// Files that cannot be read or parsed are skipped with a warning.
pub fn list_pre_sync_snapshots(project_root: &Path) -> Result<Vec<PreSyncSnapshot>> {
    Ok(scan(project_root)?
        .into_iter()
        .map(|(_, snapshot)| snapshot)
        .collect())
}

/// Load one snapshot by id
///
/// Returns `Ok(None)` when no such snapshot exists, including for ids that
/// could not name a snapshot file.
pub fn load_pre_sync_snapshot(
    project_root: &Path,
    sync_id: &str,
) -> Result<Option<PreSyncSnapshot>> {
    if !is_valid_sync_id(sync_id) {
        return Ok(None);
    }

    let path = snapshot_path(project_root, sync_id);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ReconcileError::snapshot_io(path, e)),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| ReconcileError::SnapshotFormat { path, source })
}

/// Delete all but the `keep` most recent snapshots
///
/// `keep` is clamped to at least one. Removal goes oldest first; the ids
/// removed are returned in that order.
pub fn cleanup_old_snapshots(project_root: &Path, keep: usize) -> Result<Vec<String>> {
    let keep = keep.max(1);
    let snapshots = scan(project_root)?;
    let mut removed = Vec::new();

    for (path, snapshot) in snapshots.into_iter().skip(keep).rev() {
        fs::remove_file(&path).map_err(|e| ReconcileError::snapshot_io(&path, e))?;
        log::debug!("Pruned snapshot {}", snapshot.sync_id);
        removed.push(snapshot.sync_id);
    }

    Ok(removed)
}

fn scan(project_root: &Path) -> Result<Vec<(PathBuf, PreSyncSnapshot)>> {
    let dir = snapshot_dir(project_root);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ReconcileError::snapshot_io(dir, e)),
    };

    let mut snapshots = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ReconcileError::snapshot_io(&dir, e))?;
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }

        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| {
                serde_json::from_str::<PreSyncSnapshot>(&s).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(snapshot) => snapshots.push((path, snapshot)),
            Err(e) => log::warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
        }
    }

    snapshots.sort_by(|(_, a), (_, b)| {
        b.captured_at
            .cmp(&a.captured_at)
            .then_with(|| b.sync_id.cmp(&a.sync_id))
    });
    Ok(snapshots)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn is_valid_sync_id(sync_id: &str) -> bool {
    !sync_id.is_empty()
        && !sync_id.starts_with('.')
        && !sync_id.contains(['/', '\\'])
        && !sync_id.contains("..")
}

fn entry_for<'a>(entries: &'a [DiffEntry], key: &str) -> Option<&'a DiffEntry> {
    entries.iter().find(|e| e.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffOptions, compute_diff};
    use crate::types::{ManifestPage, PluginEntry};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn live(id: u64, slug: &str, title: &str) -> LivePage {
        LivePage {
            id,
            slug: slug.into(),
            title: title.into(),
            status: "publish".into(),
            template: Some("wide".into()),
            parent: None,
            menu_order: 4,
        }
    }

    fn empty_snapshot(sync_id: &str) -> PreSyncSnapshot {
        PreSyncSnapshot {
            sync_id: sync_id.to_string(),
            captured_at: parse_sync_id(sync_id).unwrap_or_else(Utc::now),
            pages: Vec::new(),
            plugins: Vec::new(),
            summary: SnapshotSummary::default(),
        }
    }

    fn sample() -> (DiffResult, Vec<LivePage>, Vec<LivePlugin>) {
        let manifest = vec![
            ManifestPage::new("home", "Home"),
            ManifestPage::new("about", "About"),
        ];
        let live_pages = vec![live(1, "home", "Old Home"), live(2, "legacy", "Legacy")];
        let live_plugins = vec![LivePlugin {
            slug: "seo-plugin".into(),
            name: "SEO".into(),
            active: true,
            version: None,
        }];
        let plugins: BTreeMap<_, _> = [("seo-plugin".to_string(), PluginEntry { enabled: false })]
            .into_iter()
            .collect();
        let diff = compute_diff(
            &manifest,
            &plugins,
            &live_pages,
            &live_plugins,
            DiffOptions {
                strict_mode: true,
                include_plugins: true,
            },
        )
        .unwrap();
        (diff, live_pages, live_plugins)
    }

    #[test]
    fn test_sync_ids_strictly_increase() {
        let ids: Vec<String> = (0..200).map(|_| generate_sync_id()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        assert!(ids[0].starts_with("sync-"));
        assert!(parse_sync_id(&ids[0]).is_some());
    }

    #[test]
    fn test_capture_prior_state() {
        let (diff, live_pages, live_plugins) = sample();
        let options = SyncOptions {
            sync_deletions: true,
            ..SyncOptions::default()
        };
        let snapshot =
            create_pre_sync_snapshot(&diff, &live_pages, &live_plugins, "sync-1", &options);

        let about = snapshot.pages.iter().find(|p| p.slug == "about").unwrap();
        assert_eq!(about.planned_operation, OperationType::Create);
        assert!(about.prior_state.is_none());

        let home = snapshot.pages.iter().find(|p| p.slug == "home").unwrap();
        assert_eq!(home.planned_operation, OperationType::Update);
        assert_eq!(home.prior_state.as_ref().unwrap().title, "Old Home");

        let legacy = snapshot.pages.iter().find(|p| p.slug == "legacy").unwrap();
        assert_eq!(legacy.planned_operation, OperationType::Delete);
        assert_eq!(legacy.prior_state.as_ref().unwrap().id, 2);

        assert_eq!(
            snapshot.plugins,
            vec![PluginSnapshotEntry {
                slug: "seo-plugin".into(),
                was_active: true
            }]
        );
        assert_eq!(snapshot.summary.total(), 4);
    }

    #[test]
    fn test_held_back_deletions_are_not_captured() {
        let (diff, live_pages, live_plugins) = sample();
        let snapshot = create_pre_sync_snapshot(
            &diff,
            &live_pages,
            &live_plugins,
            "sync-1",
            &SyncOptions::default(),
        );
        assert!(snapshot.pages.iter().all(|p| p.slug != "legacy"));
        assert_eq!(snapshot.summary.deletes, 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let (diff, live_pages, live_plugins) = sample();
        let id = generate_sync_id();
        let snapshot =
            create_pre_sync_snapshot(&diff, &live_pages, &live_plugins, &id, &SyncOptions::default());

        let path = save_pre_sync_snapshot(dir.path(), &snapshot).unwrap();
        assert_eq!(path, dir.path().join(".sitesync/rollback").join(format!("{id}.json")));

        let loaded = load_pre_sync_snapshot(dir.path(), &id).unwrap().unwrap();
        assert_eq!(loaded, snapshot);

        // No temporary files left behind
        let names: Vec<_> = fs::read_dir(snapshot_dir(dir.path()))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_save_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let snapshot = empty_snapshot(&generate_sync_id());
        save_pre_sync_snapshot(dir.path(), &snapshot).unwrap();

        let err = save_pre_sync_snapshot(dir.path(), &snapshot).unwrap_err();
        assert!(matches!(err, ReconcileError::SnapshotExists(_)));
    }

    #[test]
    fn test_load_missing_or_unsafe_id() {
        let dir = TempDir::new().unwrap();
        assert!(load_pre_sync_snapshot(dir.path(), "sync-nope").unwrap().is_none());
        assert!(load_pre_sync_snapshot(dir.path(), "../etc/passwd").unwrap().is_none());
        assert!(load_pre_sync_snapshot(dir.path(), "a\\b").unwrap().is_none());
        assert!(load_pre_sync_snapshot(dir.path(), "").unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first_and_skips_corrupt() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<String> = (0..3).map(|_| generate_sync_id()).collect();
        for id in &ids {
            save_pre_sync_snapshot(dir.path(), &empty_snapshot(id)).unwrap();
        }
        fs::write(snapshot_dir(dir.path()).join("broken.json"), "{not json").unwrap();

        let listed: Vec<String> = list_pre_sync_snapshots(dir.path())
            .unwrap()
            .into_iter()
            .map(|s| s.sync_id)
            .collect();
        assert_eq!(listed, vec![ids[2].clone(), ids[1].clone(), ids[0].clone()]);
    }

    #[test]
    fn test_list_without_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_pre_sync_snapshots(dir.path()).unwrap().is_empty());
        assert!(cleanup_old_snapshots(dir.path(), 10).unwrap().is_empty());
    }

    #[test]
    fn test_retention_keeps_ten_of_twelve() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<String> = (0..12).map(|_| generate_sync_id()).collect();
        for id in &ids {
            save_pre_sync_snapshot(dir.path(), &empty_snapshot(id)).unwrap();
        }

        let removed = cleanup_old_snapshots(dir.path(), 10).unwrap();
        assert_eq!(removed, vec![ids[0].clone(), ids[1].clone()]);

        let remaining = list_pre_sync_snapshots(dir.path()).unwrap();
        assert_eq!(remaining.len(), 10);
        assert_eq!(remaining.last().unwrap().sync_id, ids[2]);
        assert_eq!(remaining[0].sync_id, ids[11]);
    }

    #[test]
    fn test_cleanup_always_keeps_one() {
        let dir = TempDir::new().unwrap();
        for _ in 0..3 {
            save_pre_sync_snapshot(dir.path(), &empty_snapshot(&generate_sync_id())).unwrap();
        }
        let removed = cleanup_old_snapshots(dir.path(), 0).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(list_pre_sync_snapshots(dir.path()).unwrap().len(), 1);
    }
}
