//! Project configuration (`sitesync.toml` / `sitesync.json`)
//!
//! ```toml
//! manifest = "manifest.json"
//!
//! [site]
//! url = "https://example.com/api"
//! token_env = "SITESYNC_TOKEN"
//! timeout_secs = 30
//!
//! [sync]
//! strict = false
//! sync_deletions = false
//! include_plugins = true
//!
//! [snapshots]
//! keep = 10
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{DEFAULT_KEEP_SNAPSHOTS, DiffOptions, Manifest};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Base name of the project config file
pub const CONFIG_NAME: &str = "sitesync";

/// Environment variable overriding `site.url`
pub const ENV_SITE_URL: &str = "SITESYNC_SITE_URL";

// ============================================================================
// Format
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    /// Format of a file, by extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Find the config file in a directory, preferring TOML over JSON
pub fn find_config_file(dir: &Path) -> Option<(PathBuf, ConfigFormat)> {
    [ConfigFormat::Toml, ConfigFormat::Json]
        .into_iter()
        .map(|format| {
            (
                dir.join(format!("{CONFIG_NAME}.{}", format.extension())),
                format,
            )
        })
        .find(|(path, _)| path.is_file())
}

// ============================================================================
// Project Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Manifest path, relative to the project root
    pub manifest: String,
    pub site: SiteSection,
    pub sync: SyncSection,
    pub snapshots: SnapshotsSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub url: Option<String>,
    /// Name of the environment variable holding the API token
    pub token_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub strict: bool,
    pub sync_deletions: bool,
    pub include_plugins: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotsSection {
    pub keep: usize,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            manifest: "manifest.json".to_string(),
            site: SiteSection::default(),
            sync: SyncSection::default(),
            snapshots: SnapshotsSection::default(),
        }
    }
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            url: None,
            token_env: "SITESYNC_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            strict: false,
            sync_deletions: false,
            include_plugins: true,
        }
    }
}

impl Default for SnapshotsSection {
    fn default() -> Self {
        Self {
            keep: DEFAULT_KEEP_SNAPSHOTS,
        }
    }
}

impl ProjectConfig {
    /// Load the project config, applying environment overrides
    ///
    /// A project without a config file gets the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_with(root, std::env::var(ENV_SITE_URL).ok())
    }

    fn load_with(root: &Path, site_url: Option<String>) -> Result<Self> {
        let mut config = match find_config_file(root) {
            Some((path, format)) => {
                log::debug!("Loading config from {}", path.display());
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Could not read {}", path.display()))?;
                Self::parse(&content, format)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?
            }
            None => {
                log::debug!("No config file in {}, using defaults", root.display());
                Self::default()
            }
        };

        if let Some(url) = site_url.filter(|u| !u.trim().is_empty()) {
            log::debug!("Using site URL from {}", ENV_SITE_URL);
            config.site.url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse config text in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).context("Invalid TOML format"),
            ConfigFormat::Json => serde_json::from_str(content).context("Invalid JSON format"),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.manifest.trim().is_empty() {
            bail!("'manifest' must name a file");
        }
        if self.site.timeout_secs == 0 {
            bail!("'site.timeout_secs' must be greater than zero");
        }
        if self.snapshots.keep == 0 {
            bail!("'snapshots.keep' must be at least 1");
        }
        Ok(())
    }

    /// Configured site URL
    pub fn site_url(&self) -> Result<&str> {
        self.site
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .with_context(|| {
                format!("No site URL configured. Set [site] url in {CONFIG_NAME}.toml or {ENV_SITE_URL}")
            })
    }

    /// API token from the configured environment variable, if set
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.site.token_env)
            .ok()
            .filter(|t| !t.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.site.timeout_secs)
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            strict_mode: self.sync.strict,
            include_plugins: self.sync.include_plugins,
        }
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.manifest)
    }

    /// Read and validate the manifest
    ///
    /// `.toml` manifests are accepted and read the same way as JSON.
    pub fn load_manifest(&self, root: &Path) -> Result<Manifest> {
        let path = self.manifest_path(root);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;

        let manifest = match ConfigFormat::from_path(&path) {
            Some(ConfigFormat::Toml) => {
                let value: toml::Value =
                    toml::from_str(&content).context("Invalid TOML in manifest")?;
                let json = serde_json::to_value(value).context("Manifest is not JSON-compatible")?;
                Manifest::from_value(json)
            }
            _ => Manifest::from_json_str(&content),
        };

        manifest.with_context(|| format!("Invalid manifest {}", path.display()))
    }
}

// ============================================================================
// Tests
// ============================================================================
