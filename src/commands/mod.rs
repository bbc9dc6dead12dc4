pub mod diff;
pub mod rollback;
pub mod snapshots;
pub mod sync;

use anyhow::{Context as AnyhowContext, Result, bail};
use reconcile::{CancelToken, Manifest, list_pre_sync_snapshots};
use siteapi::{HttpRequester, SiteConfig};
use std::path::PathBuf;

use crate::Context;
use crate::config::ProjectConfig;
use crate::paths;
use crate::ui;

/// Alias accepted wherever a sync id is expected
pub const LATEST: &str = "latest";

/// A resolved project: its root directory and configuration
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    pub fn load(ctx: &Context) -> Result<Self> {
        let root = paths::project_root(ctx.project.as_deref())?;
        log::debug!("Project root: {}", root.display());
        let config = ProjectConfig::load(&root)?;
        Ok(Self { root, config })
    }

    pub fn manifest(&self) -> Result<Manifest> {
        self.config.load_manifest(&self.root)
    }

    /// HTTP requester for the configured site
    pub fn connect(&self) -> Result<HttpRequester> {
        let url = self.config.site_url()?;
        let mut site = SiteConfig::new(url).timeout(self.config.timeout());
        match self.config.token() {
            Some(token) => site = site.token(token),
            None => log::debug!(
                "{} is not set, sending unauthenticated requests",
                self.config.site.token_env
            ),
        }
        HttpRequester::new(site).with_context(|| format!("Cannot connect to {url}"))
    }

    /// Turn "latest" into the newest snapshot id; other ids pass through
    pub fn resolve_sync_id(&self, sync_id: &str) -> Result<String> {
        if sync_id != LATEST {
            return Ok(sync_id.to_string());
        }

        let snapshots = list_pre_sync_snapshots(&self.root)?;
        match snapshots.into_iter().next() {
            Some(newest) => Ok(newest.sync_id),
            None => bail!("No snapshots yet. Snapshots are taken by `sitesync sync`"),
        }
    }
}

/// Cancel the returned token on the first Ctrl-C
///
/// The request in flight finishes; the remaining operations are skipped.
pub fn cancel_on_ctrl_c() -> CancelToken {
    let token = CancelToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ui::warn("Interrupted, finishing the current operation");
            handle.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{PreSyncSnapshot, SnapshotSummary, save_pre_sync_snapshot};
    use tempfile::TempDir;

    fn project(dir: &TempDir) -> Project {
        Project {
            root: dir.path().to_path_buf(),
            config: ProjectConfig::default(),
        }
    }

    fn snapshot(sync_id: &str) -> PreSyncSnapshot {
        PreSyncSnapshot {
            sync_id: sync_id.to_string(),
            captured_at: reconcile::snapshot::parse_sync_id(sync_id).unwrap(),
            pages: Vec::new(),
            plugins: Vec::new(),
            summary: SnapshotSummary::default(),
        }
    }

    #[test]
    fn test_resolve_latest() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        assert!(project.resolve_sync_id(LATEST).is_err());

        for id in ["sync-20260101T000000000000Z", "sync-20260301T000000000000Z"] {
            save_pre_sync_snapshot(dir.path(), &snapshot(id)).unwrap();
        }
        assert_eq!(
            project.resolve_sync_id(LATEST).unwrap(),
            "sync-20260301T000000000000Z"
        );
        assert_eq!(project.resolve_sync_id("abc").unwrap(), "abc");
    }

    #[test]
    fn test_connect_requires_url() {
        let dir = TempDir::new().unwrap();
        let mut project = project(&dir);
        assert!(project.connect().is_err());

        project.config.site.url = Some("https://example.com/api/".into());
        let requester = project.connect().unwrap();
        assert_eq!(requester.base_url(), "https://example.com/api");
    }
}
