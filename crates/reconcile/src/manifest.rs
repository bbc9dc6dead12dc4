//! Desired state declared by the user

use crate::error::{ReconcileError, Result};
use crate::types::{ManifestPage, PluginEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parsed manifest: pages in declaration order, plugins keyed by slug
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub pages: Vec<ManifestPage>,
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginEntry>,
}

impl Manifest {
    /// Build a manifest from an already-parsed JSON document
    ///
    /// The shape is checked before deserializing so that a wrong container
    /// type is reported as such rather than as a serde error deep inside.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(root) = &value else {
            return Err(ReconcileError::structural(
                "manifest",
                "top level must be an object",
            ));
        };

        if let Some(pages) = root.get("pages")
            && !pages.is_array()
            && !pages.is_null()
        {
            return Err(ReconcileError::structural(
                "manifest",
                "`pages` must be an array",
            ));
        }

        if let Some(plugins) = root.get("plugins")
            && !plugins.is_object()
            && !plugins.is_null()
        {
            return Err(ReconcileError::structural(
                "manifest",
                "`plugins` must be an object keyed by slug",
            ));
        }

        let mut root = root.clone();
        root.retain(|_, v| !v.is_null());
        serde_json::from_value(Value::Object(root))
            .map_err(|e| ReconcileError::structural("manifest", e.to_string()))
    }

    /// Parse a manifest from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ReconcileError::structural("manifest", e.to_string()))?;
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let manifest = Manifest::from_value(json!({
            "pages": [
                {"slug": "home", "title": "Home"},
                {"slug": "about", "title": "About Us", "parent": "home", "menu_order": 2}
            ],
            "plugins": {"seo-plugin": {"enabled": true}}
        }))
        .unwrap();

        assert_eq!(manifest.pages.len(), 2);
        assert_eq!(manifest.pages[1].parent.as_deref(), Some("home"));
        assert!(manifest.plugins["seo-plugin"].enabled);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let manifest = Manifest::from_value(json!({})).unwrap();
        assert!(manifest.pages.is_empty());
        assert!(manifest.plugins.is_empty());
    }

    #[test]
    fn test_pages_must_be_array() {
        let err = Manifest::from_value(json!({"pages": {"slug": "home"}})).unwrap_err();
        assert!(matches!(err, ReconcileError::Structural { .. }));
    }

    #[test]
    fn test_plugins_must_be_object() {
        let err = Manifest::from_value(json!({"plugins": ["seo"]})).unwrap_err();
        assert!(err.to_string().contains("plugins"));
    }

    #[test]
    fn test_page_missing_title_is_structural() {
        let err = Manifest::from_json_str(r#"{"pages":[{"slug":"home"}]}"#).unwrap_err();
        assert!(matches!(err, ReconcileError::Structural { .. }));
    }
}
