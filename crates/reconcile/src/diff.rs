//! Diff computation between manifest and live state
//!
//! [`compute_diff`] is a pure function: the same inputs and options always
//! produce the same [`DiffResult`], and malformed input fails the whole call.

use crate::error::{ReconcileError, Result};
use crate::types::{
    DesiredEntity, EntityType, LiveEntity, LivePage, LivePlugin, ManifestPage, PageField,
    PluginEntry, normalized,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Kind of difference found for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Addition,
    Removal,
    Modification,
    Match,
}

impl DiffKind {
    /// Whether this kind represents a pending change
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Match)
    }
}

/// Comparison result for a single page or plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub kind: DiffKind,
    pub entity_type: EntityType,
    /// Slug of the entity
    pub key: String,
    /// Live state, when the entity exists on the site
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<LiveEntity>,
    /// Desired state, when the entity is in the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<DesiredEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<PageField>,
}

impl DiffEntry {
    /// Live page captured in `before`, if any
    pub fn live_page(&self) -> Option<&LivePage> {
        match &self.before {
            Some(LiveEntity::Page(page)) => Some(page),
            _ => None,
        }
    }

    /// Live plugin captured in `before`, if any
    pub fn live_plugin(&self) -> Option<&LivePlugin> {
        match &self.before {
            Some(LiveEntity::Plugin(plugin)) => Some(plugin),
            _ => None,
        }
    }

    /// Manifest page captured in `after`, if any
    pub fn desired_page(&self) -> Option<&ManifestPage> {
        match &self.after {
            Some(DesiredEntity::Page(page)) => Some(page),
            _ => None,
        }
    }

    /// Desired plugin activation captured in `after`, if any
    pub fn desired_enabled(&self) -> Option<bool> {
        match &self.after {
            Some(DesiredEntity::Plugin { enabled, .. }) => Some(*enabled),
            _ => None,
        }
    }
}

/// Counts of pending changes across pages and plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub modifications: usize,
    pub has_differences: bool,
}

impl DiffSummary {
    /// Create a summary from lists of entries
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a DiffEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.kind {
                DiffKind::Addition => summary.additions += 1,
                DiffKind::Removal => summary.removals += 1,
                DiffKind::Modification => summary.modifications += 1,
                DiffKind::Match => {}
            }
        }
        summary.has_differences = summary.total() > 0;
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }
}

/// Full diff between manifest and live state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub pages: Vec<DiffEntry>,
    pub plugins: Vec<DiffEntry>,
    pub summary: DiffSummary,
}

impl DiffResult {
    /// All entries that represent a pending change
    pub fn changes(&self) -> impl Iterator<Item = &DiffEntry> {
        self.pages
            .iter()
            .chain(self.plugins.iter())
            .filter(|e| e.kind.is_change())
    }
}

/// Options controlling diff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Treat live pages absent from the manifest as pending removals
    pub strict_mode: bool,
    /// Compare plugin activation state
    pub include_plugins: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            include_plugins: true,
        }
    }
}

/// Compute the diff between desired and live state
///
/// Entities are matched by exact, case-sensitive slug. Pages keep manifest
/// declaration order, with strict-mode removals appended in live order.
pub fn compute_diff(
    manifest_pages: &[ManifestPage],
    manifest_plugins: &BTreeMap<String, PluginEntry>,
    live_pages: &[LivePage],
    live_plugins: &[LivePlugin],
    options: DiffOptions,
) -> Result<DiffResult> {
    let live_by_slug = index_live_pages(live_pages)?;
    check_manifest_pages(manifest_pages)?;

    let mut pages = Vec::with_capacity(manifest_pages.len());
    for desired in manifest_pages {
        pages.push(diff_page(desired, live_by_slug.get(desired.slug.as_str()).copied()));
    }

    if options.strict_mode {
        let declared: HashSet<&str> = manifest_pages.iter().map(|p| p.slug.as_str()).collect();
        pages.extend(
            live_pages
                .iter()
                .filter(|live| !declared.contains(live.slug.as_str()))
                .map(|live| DiffEntry {
                    kind: DiffKind::Removal,
                    entity_type: EntityType::Page,
                    key: live.slug.clone(),
                    before: Some(LiveEntity::Page(live.clone())),
                    after: None,
                    changed_fields: Vec::new(),
                }),
        );
    }

    let plugins = if options.include_plugins {
        diff_plugins(manifest_plugins, live_plugins)?
    } else {
        Vec::new()
    };

    let summary = DiffSummary::from_entries(pages.iter().chain(plugins.iter()));
    log::debug!(
        "Diff: {} additions, {} removals, {} modifications",
        summary.additions,
        summary.removals,
        summary.modifications
    );

    Ok(DiffResult {
        pages,
        plugins,
        summary,
    })
}

fn index_live_pages(live_pages: &[LivePage]) -> Result<HashMap<&str, &LivePage>> {
    let mut by_slug = HashMap::with_capacity(live_pages.len());
    for page in live_pages {
        if page.slug.is_empty() {
            return Err(ReconcileError::structural(
                "live pages",
                format!("page {} has an empty slug", page.id),
            ));
        }
        if by_slug.insert(page.slug.as_str(), page).is_some() {
            return Err(ReconcileError::structural(
                "live pages",
                format!("duplicate slug '{}'", page.slug),
            ));
        }
    }
    Ok(by_slug)
}

fn check_manifest_pages(manifest_pages: &[ManifestPage]) -> Result<()> {
    let mut seen = HashSet::with_capacity(manifest_pages.len());
    for (index, page) in manifest_pages.iter().enumerate() {
        if page.slug.is_empty() {
            return Err(ReconcileError::structural(
                "manifest",
                format!("page #{index} has an empty slug"),
            ));
        }
        if !seen.insert(page.slug.as_str()) {
            return Err(ReconcileError::structural(
                "manifest",
                format!("duplicate page slug '{}'", page.slug),
            ));
        }
    }
    Ok(())
}

fn diff_page(desired: &ManifestPage, live: Option<&LivePage>) -> DiffEntry {
    let after = Some(DesiredEntity::Page(desired.clone()));

    let Some(live) = live else {
        return DiffEntry {
            kind: DiffKind::Addition,
            entity_type: EntityType::Page,
            key: desired.slug.clone(),
            before: None,
            after,
            changed_fields: Vec::new(),
        };
    };

    let changed_fields = changed_page_fields(desired, live);
    DiffEntry {
        kind: if changed_fields.is_empty() {
            DiffKind::Match
        } else {
            DiffKind::Modification
        },
        entity_type: EntityType::Page,
        key: desired.slug.clone(),
        before: Some(LiveEntity::Page(live.clone())),
        after,
        changed_fields,
    }
}

/// Fields the manifest declares that differ from the live page
///
/// Unset optional fields are left alone; an absent template or parent is
/// the same as an empty one.
pub fn changed_page_fields(desired: &ManifestPage, live: &LivePage) -> Vec<PageField> {
    let mut changed = Vec::new();

    if desired.title != live.title {
        changed.push(PageField::Title);
    }
    if let Some(template) = &desired.template
        && template.as_str() != normalized(live.template.as_deref())
    {
        changed.push(PageField::Template);
    }
    if let Some(parent) = &desired.parent
        && parent.as_str() != normalized(live.parent.as_deref())
    {
        changed.push(PageField::Parent);
    }
    if let Some(order) = desired.menu_order
        && order != live.menu_order
    {
        changed.push(PageField::MenuOrder);
    }
    if let Some(status) = &desired.status
        && *status != live.status
    {
        changed.push(PageField::Status);
    }

    changed
}

fn diff_plugins(
    manifest_plugins: &BTreeMap<String, PluginEntry>,
    live_plugins: &[LivePlugin],
) -> Result<Vec<DiffEntry>> {
    let mut live_by_slug: HashMap<&str, &LivePlugin> = HashMap::with_capacity(live_plugins.len());
    for plugin in live_plugins {
        if live_by_slug.insert(plugin.slug.as_str(), plugin).is_some() {
            return Err(ReconcileError::structural(
                "live plugins",
                format!("duplicate slug '{}'", plugin.slug),
            ));
        }
    }

    let mut entries = Vec::with_capacity(manifest_plugins.len());
    for (slug, entry) in manifest_plugins {
        if slug.is_empty() {
            return Err(ReconcileError::structural(
                "manifest",
                "plugin with an empty slug",
            ));
        }

        let after = Some(DesiredEntity::Plugin {
            slug: slug.clone(),
            enabled: entry.enabled,
        });
        let live = live_by_slug.get(slug.as_str()).copied();

        let kind = match live {
            None => DiffKind::Addition,
            Some(live) if live.active != entry.enabled => DiffKind::Modification,
            Some(_) => DiffKind::Match,
        };

        entries.push(DiffEntry {
            kind,
            entity_type: EntityType::Plugin,
            key: slug.clone(),
            before: live.map(|p| LiveEntity::Plugin(p.clone())),
            after,
            changed_fields: Vec::new(),
        });
    }

    Ok(entries)
}
