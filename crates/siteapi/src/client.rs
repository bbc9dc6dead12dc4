//! HTTP requester backed by a blocking `ureq` agent.
//!
//! Every call runs on tokio's blocking pool so the async engine never
//! stalls its executor on socket I/O.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reconcile::{Method, RequestError, RequestInit, Requester};
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;

/// Default global timeout for one request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("sitesync/", env!("CARGO_PKG_VERSION"));

/// Connection settings for a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Root of the REST API; endpoints are appended to it.
    pub base_url: String,
    /// Bearer token sent with every request, if any.
    pub token: Option<String>,
    /// Global timeout for one request.
    pub timeout: Duration,
}

impl SiteConfig {
    /// Create settings for a base URL with no token and the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`Requester`] that talks to a real site over HTTP.
///
/// # Example
///
/// ```no_run
/// use siteapi::{HttpRequester, SiteConfig};
///
/// let requester = HttpRequester::new(
///     SiteConfig::new("https://example.com/api").token("secret"),
/// )
/// .unwrap();
/// assert_eq!(requester.url("/entities/pages"), "https://example.com/api/entities/pages");
/// ```
#[derive(Clone)]
pub struct HttpRequester {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpRequester {
    /// Create a requester, validating the base URL.
    pub fn new(config: SiteConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidBaseUrl(config.base_url));
        }

        // Non-2xx answers are read as responses so their bodies can be
        // turned into error messages.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            base_url,
            token: config.token.filter(|t| !t.is_empty()),
        })
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Perform one request on the current thread.
    pub fn request_blocking(&self, endpoint: &str, init: RequestInit) -> Result<Value> {
        let url = self.url(endpoint);
        log::debug!("{} {}", init.method, url);
        send(&self.agent, &url, self.token.as_deref(), init)
    }
}

impl fmt::Debug for HttpRequester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequester")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Requester for HttpRequester {
    async fn request(
        &self,
        endpoint: &str,
        init: RequestInit,
    ) -> std::result::Result<Value, RequestError> {
        let this = self.clone();
        let endpoint = endpoint.to_string();

        tokio::task::spawn_blocking(move || this.request_blocking(&endpoint, init))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
            .map_err(RequestError::from)
    }
}

fn send(agent: &ureq::Agent, url: &str, token: Option<&str>, init: RequestInit) -> Result<Value> {
    let auth = token.map(|t| format!("Bearer {t}"));
    let auth = auth.as_deref();
    let body = init.body.unwrap_or_else(|| json!({}));

    let mut response = match init.method {
        Method::Get => with_headers(agent.get(url), auth).call()?,
        Method::Delete => with_headers(agent.delete(url), auth).call()?,
        Method::Post => with_headers(agent.post(url), auth).send_json(&body)?,
        Method::Put => with_headers(agent.put(url), auth).send_json(&body)?,
    };

    let status = response.status().as_u16();
    let text = response.body_mut().read_to_string()?;

    if !(200..300).contains(&status) {
        log::debug!("{} {} -> {}", init.method, url, status);
        return Err(Error::status(status, error_message(&text, status)));
    }

    parse_body(&text)
}

fn with_headers<B>(request: ureq::RequestBuilder<B>, auth: Option<&str>) -> ureq::RequestBuilder<B> {
    let request = request
        .header("Accept", "application/json")
        .header("User-Agent", USER_AGENT);
    match auth {
        Some(value) => request.header("Authorization", value),
        None => request,
    }
}

/// Empty bodies (204, bare DELETE) read as `null`.
fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

/// Pull a human message out of an error body, if it has one.
fn error_message(text: &str, status: u16) -> String {
    let from_json = serde_json::from_str::<Value>(text).ok().and_then(|v| {
        ["message", "error"]
            .iter()
            .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
    });

    from_json
        .or_else(|| {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.chars().take(200).collect())
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}
