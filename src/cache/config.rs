//! Cache Configuration
//!
//! Loaded from YAML or built in code. Every field has a default, so an empty
//! document is a valid configuration.
//!
//! ```yaml
//! enabled: true
//! hit_threshold: 3
//! namespace:
//!   site: shop
//!   stage: prod
//!   locales: [en_US]
//! backends:
//!   redis_url: redis://127.0.0.1:6379
//!   file_dir: /var/cache/shop
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::tier::DEFAULT_HIT_THRESHOLD;
use crate::error::{Error, Result};

/// Values used to build the default key prefix
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Deployment / site identifier
    pub site: String,
    /// Environment / stage identifier
    pub stage: String,
    /// Locale identifiers
    pub locales: Vec<String>,
}

impl NamespaceConfig {
    /// Prefix of the form `site_stage_locale1-locale2_`. Empty parts are
    /// skipped; an empty namespace yields an empty prefix.
    pub fn prefix(&self) -> String {
        let locales = self.locales.join("-");
        [self.site.as_str(), self.stage.as_str(), locales.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| format!("{}_", part))
            .collect()
    }
}

/// Candidate backend settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendsConfig {
    /// Redis endpoint; the Redis candidate is skipped when unset
    pub redis_url: Option<String>,
    /// Cache directory; the file candidate is skipped when unset
    pub file_dir: Option<PathBuf>,
    /// Connection probe timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            file_dir: None,
            connect_timeout_ms: 500,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; false turns every facade into a no-op
    pub enabled: bool,
    /// Explicit key prefix (overrides the namespace prefix)
    pub prefix: Option<String>,
    /// Namespace for the default prefix
    pub namespace: NamespaceConfig,
    /// Backend reads before a key is promoted into the process-local tier
    pub hit_threshold: u32,
    /// Report decoded falsy values (`false`, `0`, `""`, `null`, empty
    /// containers) as absent
    pub falsy_is_absent: bool,
    /// Disable caching for admin/elevated callers
    pub disable_for_admins: bool,
    /// Disable caching for developer/local-operator callers
    pub disable_for_developers: bool,
    /// Backend candidates
    pub backends: BackendsConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: None,
            namespace: NamespaceConfig::default(),
            hit_threshold: DEFAULT_HIT_THRESHOLD,
            falsy_is_absent: false,
            disable_for_admins: false,
            disable_for_developers: false,
            backends: BackendsConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.backends.redis_url {
            if url.trim().is_empty() {
                return Err(Error::Config("backends.redis_url is empty".into()));
            }
        }
        if let Some(dir) = &self.backends.file_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config("backends.file_dir is empty".into()));
            }
        }
        Ok(())
    }

    /// Key prefix in effect: the explicit prefix, else the namespace prefix
    pub fn effective_prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| self.namespace.prefix())
    }
}

// =============================================================================
// Tests
// =============================================================================
