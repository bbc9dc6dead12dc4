//! Core entity types for site reconciliation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of entity managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Page,
    Plugin,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page => write!(f, "page"),
            Self::Plugin => write!(f, "plugin"),
        }
    }
}

/// A page as declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPage {
    pub slug: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Slug of the parent page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ManifestPage {
    /// Create a page with only slug and title set
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            template: None,
            parent: None,
            menu_order: None,
            status: None,
        }
    }
}

/// Desired activation state of a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntry {
    pub enabled: bool,
}

/// A page as observed on the live site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivePage {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub template: Option<String>,
    /// Slug of the parent page, resolved from the platform's parent id
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub menu_order: i64,
}

/// A plugin as observed on the live site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivePlugin {
    pub slug: String,
    pub name: String,
    pub active: bool,
    #[serde(default)]
    pub version: Option<String>,
}

/// Live state of an entity, as captured before a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveEntity {
    Page(LivePage),
    Plugin(LivePlugin),
}

/// Desired state of an entity, as declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DesiredEntity {
    Page(ManifestPage),
    Plugin { slug: String, enabled: bool },
}

/// Page fields compared between manifest and live state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageField {
    Title,
    Template,
    Parent,
    MenuOrder,
    Status,
}

impl PageField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Template => "template",
            Self::Parent => "parent",
            Self::MenuOrder => "menu_order",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for PageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the engine performs writes or only plans them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Apply,
    DryRun,
}

impl ExecutionMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Apply }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Treat a missing optional string and an empty one as the same value
pub(crate) fn normalized(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_page_defaults_from_json() {
        let page: ManifestPage =
            serde_json::from_str(r#"{"slug":"home","title":"Home"}"#).unwrap();
        assert_eq!(page, ManifestPage::new("home", "Home"));
    }

    #[test]
    fn test_entity_tagging() {
        let entity = LiveEntity::Plugin(LivePlugin {
            slug: "seo".into(),
            name: "SEO".into(),
            active: true,
            version: None,
        });
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "plugin");
        assert_eq!(json["slug"], "seo");
    }

    #[test]
    fn test_execution_mode() {
        assert!(ExecutionMode::from_dry_run(true).is_dry_run());
        assert!(!ExecutionMode::default().is_dry_run());
    }
}
