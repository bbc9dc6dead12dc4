//! Live-state reads and normalization
//!
//! The platform's REST responses are loosely typed: titles may be plain
//! strings or `{"rendered": ...}` objects, parents are numeric ids, plugins
//! are keyed by their main file. Everything is normalized here into
//! [`LivePage`] and [`LivePlugin`] so the rest of the engine never looks at
//! raw JSON.

use crate::context::{RequestInit, Requester};
use crate::error::{ReconcileError, Result};
use crate::types::{LivePage, LivePlugin};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

pub const PAGES_ENDPOINT: &str = "/entities/pages";
pub const PLUGINS_ENDPOINT: &str = "/entities/plugins";

const PER_PAGE: usize = 100;
const MAX_PAGE_REQUESTS: usize = 500;

/// Fetch every page from the site, following pagination
pub async fn fetch_live_pages<R: Requester + ?Sized>(requester: &R) -> Result<Vec<LivePage>> {
    let mut raw = Vec::new();

    for page in 1..=MAX_PAGE_REQUESTS {
        let endpoint = format!("{PAGES_ENDPOINT}?per_page={PER_PAGE}&page={page}");
        let batch = requester
            .request(&endpoint, RequestInit::get())
            .await
            .map_err(|source| ReconcileError::LiveRead {
                resource: "pages",
                source,
            })?;

        let Value::Array(items) = batch else {
            return Err(ReconcileError::structural(
                "live pages",
                "expected a JSON array",
            ));
        };

        let count = items.len();
        raw.extend(items);
        if count < PER_PAGE {
            break;
        }
    }

    log::debug!("Fetched {} live pages", raw.len());
    parse_live_pages(&Value::Array(raw))
}

/// Fetch every installed plugin from the site
pub async fn fetch_live_plugins<R: Requester + ?Sized>(requester: &R) -> Result<Vec<LivePlugin>> {
    let value = requester
        .request(PLUGINS_ENDPOINT, RequestInit::get())
        .await
        .map_err(|source| ReconcileError::LiveRead {
            resource: "plugins",
            source,
        })?;

    let plugins = parse_live_plugins(&value)?;
    log::debug!("Fetched {} live plugins", plugins.len());
    Ok(plugins)
}

/// Normalize a JSON array of platform pages
pub fn parse_live_pages(value: &Value) -> Result<Vec<LivePage>> {
    let items = value
        .as_array()
        .ok_or_else(|| ReconcileError::structural("live pages", "expected a JSON array"))?;

    let mut partial = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| {
            ReconcileError::structural("live pages", format!("entry {index} is not an object"))
        })?;
        partial.push(parse_page_fields(obj, index)?);
    }

    let slugs_by_id: HashMap<u64, String> = partial
        .iter()
        .map(|(page, _)| (page.id, page.slug.clone()))
        .collect();

    Ok(partial
        .into_iter()
        .map(|(mut page, parent_id)| {
            page.parent = parent_id.map(|id| match slugs_by_id.get(&id) {
                Some(slug) => slug.clone(),
                None => {
                    log::warn!(
                        "Page '{}' has parent id {} which is not among the fetched pages",
                        page.slug,
                        id
                    );
                    format!("#{id}")
                }
            });
            page
        })
        .collect())
}

/// Normalize a JSON array of platform plugins
pub fn parse_live_plugins(value: &Value) -> Result<Vec<LivePlugin>> {
    let items = value
        .as_array()
        .ok_or_else(|| ReconcileError::structural("live plugins", "expected a JSON array"))?;

    let mut plugins = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| {
            ReconcileError::structural("live plugins", format!("entry {index} is not an object"))
        })?;

        let slug = plugin_slug(obj).ok_or_else(|| {
            ReconcileError::structural("live plugins", format!("entry {index} has no slug"))
        })?;
        if !seen.insert(slug.clone()) {
            log::warn!("Ignoring duplicate live plugin entry for '{}'", slug);
            continue;
        }

        let active = match obj.get("active") {
            Some(Value::Bool(b)) => *b,
            _ => matches!(
                obj.get("status").and_then(Value::as_str),
                Some("active" | "network-active")
            ),
        };

        plugins.push(LivePlugin {
            name: rendered_string(obj.get("name")).unwrap_or_else(|| slug.clone()),
            slug,
            active,
            version: rendered_string(obj.get("version")),
        });
    }

    Ok(plugins)
}

/// Extract the platform id of the first page in a lookup response
pub(crate) fn first_page_id(value: &Value) -> Option<u64> {
    value
        .as_array()?
        .first()?
        .as_object()?
        .get("id")?
        .as_u64()
}

fn parse_page_fields(obj: &Map<String, Value>, index: usize) -> Result<(LivePage, Option<u64>)> {
    let id = obj.get("id").and_then(Value::as_u64).ok_or_else(|| {
        ReconcileError::structural("live pages", format!("entry {index} has no numeric id"))
    })?;
    let slug = obj
        .get("slug")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ReconcileError::structural("live pages", format!("entry {index} has no slug"))
        })?
        .to_string();

    let parent_id = obj
        .get("parent")
        .and_then(Value::as_u64)
        .filter(|id| *id != 0);

    let page = LivePage {
        id,
        slug,
        title: rendered_string(obj.get("title")).unwrap_or_default(),
        status: rendered_string(obj.get("status")).unwrap_or_else(|| "publish".to_string()),
        template: rendered_string(obj.get("template")).filter(|t| !t.is_empty()),
        parent: None,
        menu_order: obj.get("menu_order").and_then(Value::as_i64).unwrap_or(0),
    };

    Ok((page, parent_id))
}

fn plugin_slug(obj: &Map<String, Value>) -> Option<String> {
    if let Some(slug) = obj.get("slug").and_then(Value::as_str)
        && !slug.is_empty()
    {
        return Some(slug.to_string());
    }

    // "seo-plugin/seo-plugin.php" or "hello.php"
    let file = obj.get("plugin").and_then(Value::as_str)?;
    let first = file.split('/').next()?;
    let slug = first.strip_suffix(".php").unwrap_or(first);
    (!slug.is_empty()).then(|| slug.to_string())
}

/// Read a string that may be plain or wrapped as `{"rendered": ...}`
fn rendered_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("rendered")
            .or_else(|| obj.get("raw"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
