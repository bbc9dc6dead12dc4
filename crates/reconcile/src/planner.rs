//! Sync planner - turns a diff into an ordered list of operations

use crate::diff::{DiffEntry, DiffKind, DiffResult};
use crate::live::{PAGES_ENDPOINT, PLUGINS_ENDPOINT};
use crate::context::RequestInit;
use crate::types::{EntityType, ExecutionMode, LivePage, ManifestPage, PageField};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Write operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Activate,
    Deactivate,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
        };
        f.write_str(s)
    }
}

/// Page fields sent to the platform
///
/// Unset fields are omitted from the request body. An empty template or
/// parent clears the value on the site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePayload {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl PagePayload {
    /// Every field the manifest declares, for a new page
    pub fn from_manifest(page: &ManifestPage) -> Self {
        Self {
            slug: page.slug.clone(),
            title: Some(page.title.clone()),
            template: page.template.clone(),
            parent: page.parent.clone(),
            menu_order: page.menu_order,
            status: page.status.clone(),
        }
    }

    /// Only the fields that changed, with their desired values
    pub fn changed(page: &ManifestPage, fields: &[PageField]) -> Self {
        let mut payload = Self {
            slug: page.slug.clone(),
            ..Self::default()
        };
        for field in fields {
            match field {
                PageField::Title => payload.title = Some(page.title.clone()),
                PageField::Template => payload.template = page.template.clone(),
                PageField::Parent => payload.parent = page.parent.clone(),
                PageField::MenuOrder => payload.menu_order = page.menu_order,
                PageField::Status => payload.status = page.status.clone(),
            }
        }
        payload
    }

    /// The complete captured state of a live page
    pub fn from_live(page: &LivePage) -> Self {
        Self {
            slug: page.slug.clone(),
            title: Some(page.title.clone()),
            template: Some(page.template.clone().unwrap_or_default()),
            parent: Some(page.parent.clone().unwrap_or_default()),
            menu_order: Some(page.menu_order),
            status: Some(page.status.clone()),
        }
    }
}

/// Typed request body of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationPayload {
    Page(PagePayload),
    Plugin { active: bool },
}

/// A single write against the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub entity_type: EntityType,
    /// Slug of the entity
    pub key: String,
    /// Platform id, needed for page updates and deletions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<OperationPayload>,
}

impl SyncOperation {
    pub fn create_page(payload: PagePayload) -> Self {
        Self {
            op_type: OperationType::Create,
            entity_type: EntityType::Page,
            key: payload.slug.clone(),
            target_id: None,
            payload: Some(OperationPayload::Page(payload)),
        }
    }

    pub fn update_page(target_id: Option<u64>, payload: PagePayload) -> Self {
        Self {
            op_type: OperationType::Update,
            entity_type: EntityType::Page,
            key: payload.slug.clone(),
            target_id,
            payload: Some(OperationPayload::Page(payload)),
        }
    }

    pub fn delete_page(key: impl Into<String>, target_id: Option<u64>) -> Self {
        Self {
            op_type: OperationType::Delete,
            entity_type: EntityType::Page,
            key: key.into(),
            target_id,
            payload: None,
        }
    }

    pub fn toggle_plugin(key: impl Into<String>, active: bool) -> Self {
        Self {
            op_type: if active {
                OperationType::Activate
            } else {
                OperationType::Deactivate
            },
            entity_type: EntityType::Plugin,
            key: key.into(),
            target_id: None,
            payload: Some(OperationPayload::Plugin { active }),
        }
    }

    /// Endpoint and request for this operation
    ///
    /// Fails when a page update or deletion has no platform id to target.
    pub fn to_request(&self) -> Result<(String, RequestInit), String> {
        let body = || {
            self.payload
                .as_ref()
                .map(|p| serde_json::to_value(p).unwrap_or_default())
                .unwrap_or_else(|| json!({}))
        };
        let target = || {
            self.target_id
                .ok_or_else(|| format!("no platform id for {} '{}'", self.entity_type, self.key))
        };

        match (self.entity_type, self.op_type) {
            (EntityType::Page, OperationType::Create) => {
                Ok((PAGES_ENDPOINT.to_string(), RequestInit::post(body())))
            }
            (EntityType::Page, OperationType::Update) => Ok((
                format!("{PAGES_ENDPOINT}/{}", target()?),
                RequestInit::put(body()),
            )),
            (EntityType::Page, OperationType::Delete) => Ok((
                format!("{PAGES_ENDPOINT}/{}", target()?),
                RequestInit::delete(),
            )),
            (EntityType::Plugin, OperationType::Activate | OperationType::Deactivate) => Ok((
                format!("{PLUGINS_ENDPOINT}/{}", self.key),
                RequestInit::put(json!({
                    "active": self.op_type == OperationType::Activate
                })),
            )),
            (entity, op) => Err(format!("unsupported operation: {op} {entity}")),
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.op_type, self.entity_type, self.key)
    }
}

/// An operation plus whether it will run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOperation {
    pub operation: SyncOperation,
    /// Why the operation will not be executed, if it won't
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl PlannedOperation {
    pub fn execute(operation: SyncOperation) -> Self {
        Self {
            operation,
            skip_reason: None,
        }
    }

    pub fn skip(operation: SyncOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            skip_reason: Some(reason.into()),
        }
    }

    pub fn is_executable(&self) -> bool {
        self.skip_reason.is_none()
    }
}

/// Ordered operations for one sync or rollback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub operations: Vec<PlannedOperation>,
}

impl SyncPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, planned: PlannedOperation) {
        self.operations.push(planned);
    }

    /// Operations that will actually be sent
    pub fn executable(&self) -> impl Iterator<Item = &SyncOperation> {
        self.operations
            .iter()
            .filter(|p| p.is_executable())
            .map(|p| &p.operation)
    }

    /// Whether any operation would write to the site
    pub fn has_writes(&self) -> bool {
        self.executable().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Options for a sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub mode: ExecutionMode,
    /// Leave pages out of the run entirely
    pub skip_pages: bool,
    /// Leave plugins out of the run entirely
    pub skip_plugins: bool,
    /// Turn removal entries into delete operations
    pub sync_deletions: bool,
}

impl SyncOptions {
    pub fn dry_run() -> Self {
        Self {
            mode: ExecutionMode::DryRun,
            ..Self::default()
        }
    }
}

/// Build the ordered plan for a diff
///
/// Order: page creations, page modifications, page deletions, then plugin
/// toggles. Deleting last keeps parents around while children are updated.
pub fn plan_sync(diff: &DiffResult, options: &SyncOptions) -> SyncPlan {
    let mut plan = SyncPlan::new();

    if !options.skip_pages {
        for entry in pages_of_kind(diff, DiffKind::Addition) {
            if let Some(page) = entry.desired_page() {
                plan.push(PlannedOperation::execute(SyncOperation::create_page(
                    PagePayload::from_manifest(page),
                )));
            }
        }

        for entry in pages_of_kind(diff, DiffKind::Modification) {
            if let Some(page) = entry.desired_page() {
                plan.push(PlannedOperation::execute(SyncOperation::update_page(
                    entry.live_page().map(|p| p.id),
                    PagePayload::changed(page, &entry.changed_fields),
                )));
            }
        }

        for entry in pages_of_kind(diff, DiffKind::Removal) {
            let operation =
                SyncOperation::delete_page(entry.key.clone(), entry.live_page().map(|p| p.id));
            plan.push(if options.sync_deletions {
                PlannedOperation::execute(operation)
            } else {
                PlannedOperation::skip(operation, "deletions disabled")
            });
        }
    }

    if !options.skip_plugins {
        for entry in diff.plugins.iter().filter(|e| e.kind.is_change()) {
            let Some(enabled) = entry.desired_enabled() else {
                continue;
            };
            let operation = SyncOperation::toggle_plugin(entry.key.clone(), enabled);
            plan.push(match entry.kind {
                DiffKind::Addition if enabled => {
                    PlannedOperation::skip(operation, "plugin not installed")
                }
                // Not installed and not wanted: nothing to toggle.
                DiffKind::Addition => continue,
                _ => PlannedOperation::execute(operation),
            });
        }
    }

    plan
}

fn pages_of_kind(diff: &DiffResult, kind: DiffKind) -> impl Iterator<Item = &DiffEntry> {
    diff.pages.iter().filter(move |e| e.kind == kind)
}
