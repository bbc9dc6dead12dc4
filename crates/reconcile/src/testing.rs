//! In-memory site for tests and offline experiments
//!
//! [`FakeSite`] implements [`Requester`] over the same `/entities/...`
//! surface the engine writes to, answers in the platform's loose JSON shape,
//! and records every request it receives.
//!
//! ```
//! use reconcile::testing::FakeSite;
//!
//! let site = FakeSite::new()
//!     .with_page("home", "Home")
//!     .with_plugin("seo-plugin", false);
//! assert_eq!(site.pages().len(), 1);
//! assert_eq!(site.request_count(), 0);
//! ```

use crate::context::{Method, RequestInit, Requester};
use crate::error::RequestError;
use crate::live::{PAGES_ENDPOINT, PLUGINS_ENDPOINT};
use crate::planner::PagePayload;
use crate::types::{LivePage, LivePlugin};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct SiteState {
    pages: Vec<LivePage>,
    plugins: Vec<LivePlugin>,
    next_id: u64,
    requests: Vec<(Method, String)>,
    failures: Vec<Failure>,
}

#[derive(Debug, Clone)]
struct Failure {
    prefix: String,
    writes_only: bool,
}

/// In-memory platform answering engine requests
#[derive(Debug, Default)]
pub struct FakeSite {
    state: Mutex<SiteState>,
}

impl FakeSite {
    /// Create an empty site
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a published page
    pub fn with_page(self, slug: &str, title: &str) -> Self {
        self.with_live_page(LivePage {
            id: 0,
            slug: slug.to_string(),
            title: title.to_string(),
            status: "publish".to_string(),
            template: None,
            parent: None,
            menu_order: 0,
        })
    }

    /// Add a page with every field given; its id is reassigned
    pub fn with_live_page(self, mut page: LivePage) -> Self {
        {
            let mut state = self.lock();
            state.next_id += 1;
            page.id = state.next_id;
            state.pages.push(page);
        }
        self
    }

    /// Add an installed plugin
    pub fn with_plugin(self, slug: &str, active: bool) -> Self {
        self.lock().plugins.push(LivePlugin {
            slug: slug.to_string(),
            name: slug.to_string(),
            active,
            version: Some("1.0.0".to_string()),
        });
        self
    }

    /// Fail every request whose endpoint starts with `prefix`
    pub fn failing_endpoint(self, prefix: &str) -> Self {
        self.lock().failures.push(Failure {
            prefix: prefix.to_string(),
            writes_only: false,
        });
        self
    }

    /// Fail non-read requests whose endpoint starts with `prefix`
    pub fn failing_write(self, prefix: &str) -> Self {
        self.lock().failures.push(Failure {
            prefix: prefix.to_string(),
            writes_only: true,
        });
        self
    }

    /// Current pages, in creation order
    pub fn pages(&self) -> Vec<LivePage> {
        self.lock().pages.clone()
    }

    /// Current plugins
    pub fn plugins(&self) -> Vec<LivePlugin> {
        self.lock().plugins.clone()
    }

    pub fn page(&self, slug: &str) -> Option<LivePage> {
        self.lock().pages.iter().find(|p| p.slug == slug).cloned()
    }

    pub fn plugin(&self, slug: &str) -> Option<LivePlugin> {
        self.lock().plugins.iter().find(|p| p.slug == slug).cloned()
    }

    /// Every request received, as (method, endpoint)
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Number of requests that were not reads
    pub fn write_count(&self) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|(method, _)| !method.is_read())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Requester for FakeSite {
    async fn request(&self, endpoint: &str, init: RequestInit) -> Result<Value, RequestError> {
        let mut state = self.lock();
        state.requests.push((init.method, endpoint.to_string()));

        let injected = state.failures.iter().any(|f| {
            endpoint.starts_with(&f.prefix) && (!f.writes_only || !init.method.is_read())
        });
        if injected {
            return Err(RequestError::status(500, "injected failure"));
        }

        let (path, query) = endpoint.split_once('?').unwrap_or((endpoint, ""));
        let rest = path.strip_prefix(PAGES_ENDPOINT);

        match (init.method, rest, path) {
            (Method::Get, Some(""), _) => Ok(state.list_pages(query)),
            (Method::Post, Some(""), _) => state.create_page(init.body),
            (Method::Put, Some(id), _) => state.update_page(parse_id(id)?, init.body),
            (Method::Delete, Some(id), _) => state.delete_page(parse_id(id)?),
            (Method::Get, None, PLUGINS_ENDPOINT) => Ok(state.list_plugins()),
            (Method::Put, None, _) => match path.strip_prefix(PLUGINS_ENDPOINT) {
                Some(slug) => state.toggle_plugin(slug.trim_start_matches('/'), init.body),
                None => Err(not_found(endpoint)),
            },
            _ => Err(not_found(endpoint)),
        }
    }
}

impl SiteState {
    fn list_pages(&self, query: &str) -> Value {
        let mut slug = None;
        let mut per_page = usize::MAX;
        let mut page = 1usize;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("slug", v)) => slug = Some(v),
                Some(("per_page", v)) => per_page = v.parse().unwrap_or(per_page),
                Some(("page", v)) => page = v.parse().unwrap_or(1),
                _ => {}
            }
        }

        let matching: Vec<Value> = self
            .pages
            .iter()
            .filter(|p| slug.is_none_or(|s| p.slug == s))
            .skip(per_page.saturating_mul(page.saturating_sub(1)))
            .take(per_page)
            .map(|p| self.page_json(p))
            .collect();
        Value::Array(matching)
    }

    fn create_page(&mut self, body: Option<Value>) -> Result<Value, RequestError> {
        let payload = parse_payload(body)?;
        if self.pages.iter().any(|p| p.slug == payload.slug) {
            return Err(RequestError::status(
                400,
                format!("slug '{}' already exists", payload.slug),
            ));
        }

        self.next_id += 1;
        let page = LivePage {
            id: self.next_id,
            slug: payload.slug,
            title: payload.title.unwrap_or_default(),
            status: payload.status.unwrap_or_else(|| "publish".to_string()),
            template: payload.template.filter(|t| !t.is_empty()),
            parent: payload.parent.filter(|p| !p.is_empty()),
            menu_order: payload.menu_order.unwrap_or(0),
        };
        let json = self.page_json(&page);
        self.pages.push(page);
        Ok(json)
    }

    fn update_page(&mut self, id: u64, body: Option<Value>) -> Result<Value, RequestError> {
        let payload = parse_payload(body)?;
        let page = self
            .pages
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| RequestError::status(404, format!("page {id} not found")))?;

        if let Some(title) = payload.title {
            page.title = title;
        }
        if let Some(template) = payload.template {
            page.template = Some(template).filter(|t| !t.is_empty());
        }
        if let Some(parent) = payload.parent {
            page.parent = Some(parent).filter(|p| !p.is_empty());
        }
        if let Some(order) = payload.menu_order {
            page.menu_order = order;
        }
        if let Some(status) = payload.status {
            page.status = status;
        }

        let page = page.clone();
        Ok(self.page_json(&page))
    }

    fn delete_page(&mut self, id: u64) -> Result<Value, RequestError> {
        let index = self
            .pages
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| RequestError::status(404, format!("page {id} not found")))?;
        self.pages.remove(index);
        Ok(json!({"deleted": true, "id": id}))
    }

    fn list_plugins(&self) -> Value {
        Value::Array(
            self.plugins
                .iter()
                .map(|p| {
                    json!({
                        "plugin": format!("{0}/{0}.php", p.slug),
                        "name": p.name,
                        "status": if p.active { "active" } else { "inactive" },
                        "version": p.version,
                    })
                })
                .collect(),
        )
    }

    fn toggle_plugin(&mut self, slug: &str, body: Option<Value>) -> Result<Value, RequestError> {
        let active = body
            .as_ref()
            .and_then(|b| b.get("active"))
            .and_then(Value::as_bool)
            .ok_or_else(|| RequestError::status(400, "missing `active`"))?;
        let plugin = self
            .plugins
            .iter_mut()
            .find(|p| p.slug == slug)
            .ok_or_else(|| RequestError::status(404, format!("plugin '{slug}' not installed")))?;
        plugin.active = active;
        Ok(json!({"slug": slug, "active": active}))
    }

    /// Platform-shaped JSON: rendered title, numeric parent id
    fn page_json(&self, page: &LivePage) -> Value {
        let parent_id = page
            .parent
            .as_deref()
            .and_then(|slug| self.pages.iter().find(|p| p.slug == slug))
            .map_or(0, |p| p.id);
        json!({
            "id": page.id,
            "slug": page.slug,
            "title": {"rendered": page.title},
            "status": page.status,
            "template": page.template.clone().unwrap_or_default(),
            "parent": parent_id,
            "menu_order": page.menu_order,
        })
    }
}

fn parse_id(segment: &str) -> Result<u64, RequestError> {
    segment
        .trim_start_matches('/')
        .parse()
        .map_err(|_| RequestError::status(404, format!("no such page: {segment}")))
}

fn parse_payload(body: Option<Value>) -> Result<PagePayload, RequestError> {
    let body = body.ok_or_else(|| RequestError::status(400, "missing body"))?;
    serde_json::from_value(body).map_err(|e| RequestError::status(400, e.to_string()))
}

fn not_found(endpoint: &str) -> RequestError {
    RequestError::status(404, format!("no route for {endpoint}"))
}
