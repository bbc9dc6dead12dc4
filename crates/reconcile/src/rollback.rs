//! Rollback executor - replays a snapshot in reverse
//!
//! Each captured entry maps to its inverse operation:
//!
//! | planned    | rollback                                   |
//! |------------|--------------------------------------------|
//! | create     | delete (id looked up by slug at run time)  |
//! | update     | update restoring every captured field      |
//! | delete     | create from the captured state             |
//! | activate / deactivate | toggle back to `was_active`     |
//!
//! Recreations run first so restored pages can point at recreated parents,
//! then restorations, then removals of created pages in reverse capture
//! order, then plugins.

use crate::context::{CancelToken, ProgressCallback, RequestInit, Requester};
use crate::error::Result;
use crate::executor::{OperationOutcome, SyncResult, apply_operation, execute_plan};
use crate::live::{PAGES_ENDPOINT, first_page_id};
use crate::planner::{OperationType, PagePayload, PlannedOperation, SyncOperation, SyncPlan};
use crate::snapshot::{PageSnapshotEntry, PreSyncSnapshot, load_pre_sync_snapshot};
use crate::types::ExecutionMode;
use std::path::Path;

/// Rollbacks report exactly like syncs
pub type RollbackResult = SyncResult;

#[derive(Debug, Clone, Default)]
pub struct RollbackOptions {
    pub mode: ExecutionMode,
    pub cancel: Option<CancelToken>,
}

impl RollbackOptions {
    pub fn dry_run() -> Self {
        Self {
            mode: ExecutionMode::DryRun,
            cancel: None,
        }
    }
}

/// Outcome of looking up and running a rollback by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackLookup {
    Completed(RollbackResult),
    NotFound { sync_id: String },
}

/// Build the inverse plan of a snapshot
pub fn plan_rollback(snapshot: &PreSyncSnapshot) -> SyncPlan {
    let mut plan = SyncPlan::new();

    for entry in pages_planned(snapshot, OperationType::Delete) {
        plan.push(match &entry.prior_state {
            Some(prior) => {
                PlannedOperation::execute(SyncOperation::create_page(PagePayload::from_live(prior)))
            }
            None => PlannedOperation::skip(
                SyncOperation::create_page(PagePayload {
                    slug: entry.slug.clone(),
                    ..PagePayload::default()
                }),
                "no prior state captured",
            ),
        });
    }

    for entry in pages_planned(snapshot, OperationType::Update) {
        plan.push(match &entry.prior_state {
            Some(prior) => PlannedOperation::execute(SyncOperation::update_page(
                Some(prior.id),
                PagePayload::from_live(prior),
            )),
            None => PlannedOperation::skip(
                SyncOperation::update_page(
                    None,
                    PagePayload {
                        slug: entry.slug.clone(),
                        ..PagePayload::default()
                    },
                ),
                "no prior state captured",
            ),
        });
    }

    let created: Vec<_> = pages_planned(snapshot, OperationType::Create).collect();
    for entry in created.into_iter().rev() {
        plan.push(PlannedOperation::execute(SyncOperation::delete_page(
            entry.slug.clone(),
            None,
        )));
    }

    for plugin in &snapshot.plugins {
        plan.push(PlannedOperation::execute(SyncOperation::toggle_plugin(
            plugin.slug.clone(),
            plugin.was_active,
        )));
    }

    plan
}

/// Undo a sync from its snapshot
///
/// Runs with the same best-effort policy as a sync. Deletions of pages the
/// sync created first look the page up by slug; a page that is already gone
/// is recorded as skipped. In dry-run mode nothing is requested.
pub async fn execute_rollback<R, P>(
    snapshot: &PreSyncSnapshot,
    requester: &R,
    options: &RollbackOptions,
    progress: &mut P,
) -> RollbackResult
where
    R: Requester + ?Sized,
    P: ProgressCallback + ?Sized,
{
    let plan = plan_rollback(snapshot);
    log::info!(
        "Rolling back {} ({} operations)",
        snapshot.sync_id,
        plan.len()
    );

    if options.mode.is_dry_run() {
        return execute_plan(&plan, requester, options.mode, None, progress).await;
    }

    let total = plan.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, planned) in plan.operations.iter().enumerate() {
        progress.on_operation_start(index, total, &planned.operation);

        let outcome = if let Some(reason) = &planned.skip_reason {
            OperationOutcome::skipped(planned.operation.clone(), reason.clone())
        } else if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            OperationOutcome::skipped(planned.operation.clone(), "cancelled")
        } else if needs_lookup(&planned.operation) {
            remove_created_page(&planned.operation, requester).await
        } else {
            apply_operation(planned, requester).await
        };

        progress.on_operation_complete(&outcome);
        outcomes.push(outcome);
    }

    let result = SyncResult::from_outcomes(outcomes);
    log::info!(
        "Rollback {}: {} succeeded, {} failed, {} skipped",
        snapshot.sync_id,
        result.summary.succeeded,
        result.summary.failed,
        result.summary.skipped
    );
    result
}

/// Load a snapshot by id and roll it back
pub async fn rollback_by_id<R, P>(
    project_root: &Path,
    sync_id: &str,
    requester: &R,
    options: &RollbackOptions,
    progress: &mut P,
) -> Result<RollbackLookup>
where
    R: Requester + ?Sized,
    P: ProgressCallback + ?Sized,
{
    let Some(snapshot) = load_pre_sync_snapshot(project_root, sync_id)? else {
        return Ok(RollbackLookup::NotFound {
            sync_id: sync_id.to_string(),
        });
    };
    let result = execute_rollback(&snapshot, requester, options, progress).await;
    Ok(RollbackLookup::Completed(result))
}

fn pages_planned(
    snapshot: &PreSyncSnapshot,
    op: OperationType,
) -> impl Iterator<Item = &PageSnapshotEntry> {
    snapshot
        .pages
        .iter()
        .filter(move |p| p.planned_operation == op)
}

fn needs_lookup(operation: &SyncOperation) -> bool {
    operation.op_type == OperationType::Delete && operation.target_id.is_none()
}

async fn remove_created_page<R: Requester + ?Sized>(
    operation: &SyncOperation,
    requester: &R,
) -> OperationOutcome {
    let lookup = format!("{PAGES_ENDPOINT}?slug={}", operation.key);
    let found = match requester.request(&lookup, RequestInit::get()).await {
        Ok(value) => first_page_id(&value),
        Err(e) => {
            log::warn!("Failed to look up page '{}': {}", operation.key, e);
            return OperationOutcome::failed(operation.clone(), e.to_string());
        }
    };

    let Some(id) = found else {
        log::debug!("Page '{}' is already gone", operation.key);
        return OperationOutcome::skipped(operation.clone(), "page no longer exists");
    };

    let resolved = PlannedOperation::execute(SyncOperation::delete_page(
        operation.key.clone(),
        Some(id),
    ));
    apply_operation(&resolved, requester).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Method, NoProgress};
    use crate::diff::{DiffOptions, compute_diff};
    use crate::executor::{OperationStatus, execute_sync};
    use crate::planner::SyncOptions;
    use crate::snapshot::{
        PluginSnapshotEntry, SnapshotSummary, create_pre_sync_snapshot, generate_sync_id,
        save_pre_sync_snapshot,
    };
    use crate::testing::FakeSite;
    use crate::types::{LivePage, ManifestPage, PluginEntry};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn snapshot(pages: Vec<PageSnapshotEntry>, plugins: Vec<PluginSnapshotEntry>) -> PreSyncSnapshot {
        PreSyncSnapshot {
            sync_id: generate_sync_id(),
            captured_at: Utc::now(),
            pages,
            plugins,
            summary: SnapshotSummary::default(),
        }
    }

    fn created(slug: &str) -> PageSnapshotEntry {
        PageSnapshotEntry {
            slug: slug.into(),
            planned_operation: OperationType::Create,
            prior_state: None,
        }
    }

    fn prior(id: u64, slug: &str, title: &str) -> LivePage {
        LivePage {
            id,
            slug: slug.into(),
            title: title.into(),
            status: "publish".into(),
            template: None,
            parent: None,
            menu_order: 0,
        }
    }

    #[test]
    fn test_plan_order() {
        let snap = snapshot(
            vec![
                created("first"),
                PageSnapshotEntry {
                    slug: "home".into(),
                    planned_operation: OperationType::Update,
                    prior_state: Some(prior(1, "home", "Old Home")),
                },
                created("second"),
                PageSnapshotEntry {
                    slug: "legacy".into(),
                    planned_operation: OperationType::Delete,
                    prior_state: Some(prior(2, "legacy", "Legacy")),
                },
            ],
            vec![PluginSnapshotEntry {
                slug: "seo-plugin".into(),
                was_active: false,
            }],
        );

        let ops: Vec<(OperationType, String)> = plan_rollback(&snap)
            .operations
            .into_iter()
            .map(|p| (p.operation.op_type, p.operation.key))
            .collect();
        assert_eq!(
            ops,
            vec![
                (OperationType::Create, "legacy".to_string()),
                (OperationType::Update, "home".to_string()),
                (OperationType::Delete, "second".to_string()),
                (OperationType::Delete, "first".to_string()),
                (OperationType::Deactivate, "seo-plugin".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_rollback_of_create_deletes_once() {
        let site = FakeSite::new()
            .with_page("home", "Home")
            .with_page("about", "About");
        let snap = snapshot(vec![created("about")], Vec::new());

        let result =
            execute_rollback(&snap, &site, &RollbackOptions::default(), &mut NoProgress).await;

        assert!(result.success);
        assert_eq!(result.summary.succeeded, 1);
        assert!(site.page("about").is_none());
        assert!(site.page("home").is_some());

        let methods: Vec<Method> = site.requests().iter().map(|(m, _)| *m).collect();
        assert_eq!(methods.iter().filter(|m| **m == Method::Delete).count(), 1);
        assert_eq!(methods.iter().filter(|m| **m == Method::Put).count(), 0);
        assert_eq!(methods.iter().filter(|m| **m == Method::Post).count(), 0);
    }

    #[tokio::test]
    async fn test_rollback_of_vanished_create_is_skipped() {
        let site = FakeSite::new();
        let snap = snapshot(vec![created("about")], Vec::new());

        let result =
            execute_rollback(&snap, &site, &RollbackOptions::default(), &mut NoProgress).await;

        assert!(result.success);
        assert_eq!(result.operations[0].status, OperationStatus::Skipped);
        assert_eq!(site.write_count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_requests() {
        let site = FakeSite::new().with_page("about", "About");
        let snap = snapshot(
            vec![created("about")],
            vec![PluginSnapshotEntry {
                slug: "seo-plugin".into(),
                was_active: true,
            }],
        );

        let result =
            execute_rollback(&snap, &site, &RollbackOptions::dry_run(), &mut NoProgress).await;

        assert_eq!(result.summary.skipped, 2);
        assert_eq!(site.request_count(), 0);
    }

    #[tokio::test]
    async fn test_full_round_trip_restores_site() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new()
            .with_live_page(LivePage {
                template: Some("wide".into()),
                menu_order: 2,
                ..prior(0, "home", "Old Home")
            })
            .with_page("legacy", "Legacy")
            .with_plugin("seo-plugin", true);
        let before_pages = site.pages();

        let mut home = ManifestPage::new("home", "Home");
        home.template = Some(String::new());
        let manifest = vec![home, ManifestPage::new("about", "About")];
        let plugins: BTreeMap<_, _> = [("seo-plugin".to_string(), PluginEntry { enabled: false })]
            .into_iter()
            .collect();
        let options = SyncOptions {
            sync_deletions: true,
            ..SyncOptions::default()
        };

        let live_pages = site.pages();
        let live_plugins = site.plugins();
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
        let snap = create_pre_sync_snapshot(
            &diff,
            &live_pages,
            &live_plugins,
            &generate_sync_id(),
            &options,
        );
        save_pre_sync_snapshot(dir.path(), &snap).unwrap();

        let synced = execute_sync(&diff, &site, &options, &mut NoProgress).await;
        assert!(synced.success);
        assert!(site.page("legacy").is_none());
        assert_eq!(site.page("home").unwrap().template, None);

        let lookup = rollback_by_id(
            dir.path(),
            &snap.sync_id,
            &site,
            &RollbackOptions::default(),
            &mut NoProgress,
        )
        .await
        .unwrap();
        let RollbackLookup::Completed(result) = lookup else {
            panic!("snapshot should exist");
        };
        assert!(result.success);

        let home = site.page("home").unwrap();
        assert_eq!(home.title, "Old Home");
        assert_eq!(home.template.as_deref(), Some("wide"));
        assert_eq!(home.menu_order, 2);
        assert!(site.page("about").is_none());
        assert_eq!(site.page("legacy").unwrap().title, "Legacy");
        assert!(site.plugin("seo-plugin").unwrap().active);
        assert_eq!(site.pages().len(), before_pages.len());
    }

    #[tokio::test]
    async fn test_restore_clears_fields_added_by_sync() {
        let site = FakeSite::new().with_page("home", "Home");
        let snap = snapshot(
            vec![PageSnapshotEntry {
                slug: "home".into(),
                planned_operation: OperationType::Update,
                prior_state: Some(prior(1, "home", "Home")),
            }],
            Vec::new(),
        );
        site.request(
            "/entities/pages/1",
            RequestInit::put(serde_json::json!({"slug": "home", "template": "wide"})),
        )
        .await
        .unwrap();

        execute_rollback(&snap, &site, &RollbackOptions::default(), &mut NoProgress).await;
        assert_eq!(site.page("home").unwrap().template, None);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new();
        let lookup = rollback_by_id(
            dir.path(),
            "sync-missing",
            &site,
            &RollbackOptions::default(),
            &mut NoProgress,
        )
        .await
        .unwrap();
        assert_eq!(
            lookup,
            RollbackLookup::NotFound {
                sync_id: "sync-missing".into()
            }
        );
        assert_eq!(site.request_count(), 0);
    }
}
