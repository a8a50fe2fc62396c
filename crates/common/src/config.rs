//! Harness configuration
//!
//! Loaded from `smokefleet.toml` when present. Every field has a default
//! so the harness runs without any config file; CLI flags override the
//! loaded values field by field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "smokefleet.toml";

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Directory holding per-service session snapshots
    pub auth_dir: PathBuf,

    /// Directory for failure screenshots and the JSON report
    pub artifacts_dir: PathBuf,

    /// Run Chromium headless
    pub headless: bool,

    /// Extra attempts per failed check
    pub retries: u32,

    /// Services checked concurrently
    pub parallelism: usize,

    /// Snapshots older than this are recaptured
    pub snapshot_max_age_hours: u64,

    /// Reachability probe window, in milliseconds
    pub probe_window_ms: u64,

    /// Navigation timeout, in milliseconds
    pub nav_timeout_ms: u64,

    /// Overall timeout for one browser check, in milliseconds
    pub check_timeout_ms: u64,

    /// Accept self-signed certificates (fleets often sit behind
    /// tailnet or internal CAs)
    pub ignore_https_errors: bool,

    /// Per-service overrides keyed by service key
    pub services: BTreeMap<String, ServiceOverride>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            auth_dir: PathBuf::from(".auth"),
            artifacts_dir: PathBuf::from("artifacts"),
            headless: true,
            retries: 0,
            parallelism: 1,
            snapshot_max_age_hours: 12,
            probe_window_ms: 10_000,
            nav_timeout_ms: 10_000,
            check_timeout_ms: 30_000,
            ignore_https_errors: true,
            services: BTreeMap::new(),
        }
    }
}

/// Per-service configuration override
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceOverride {
    /// Base URL, takes precedence over the built-in default but not
    /// over `{PREFIX}_URL`
    pub url: Option<String>,

    /// Exclude this service from full-fleet runs
    pub skip: bool,
}

impl HarnessConfig {
    /// Load configuration from a file. Fails if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load an explicitly named file, or the default file if present,
    /// or the built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn snapshot_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.snapshot_max_age_hours as i64)
    }

    pub fn probe_window(&self) -> Duration {
        Duration::from_millis(self.probe_window_ms)
    }

    pub fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.nav_timeout_ms)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    /// Config-file URL override for a service, if any
    pub fn url_override(&self, key: &str) -> Option<&str> {
        self.services.get(key).and_then(|o| o.url.as_deref())
    }

    /// Whether a service is excluded from full-fleet runs
    pub fn skipped(&self, key: &str) -> bool {
        self.services.get(key).map(|o| o.skip).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.auth_dir, PathBuf::from(".auth"));
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert!(config.headless);
        assert_eq!(config.retries, 0);
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.snapshot_max_age(), chrono::Duration::hours(12));
        assert!(config.ignore_https_errors);
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: HarnessConfig = toml::from_str(
            r#"
            retries = 2
            parallelism = 3
            headless = false

            [services.navidrome]
            url = "http://localhost:4533"

            [services.immich]
            skip = true
            "#,
        )
        .unwrap();

        assert_eq!(config.retries, 2);
        assert_eq!(config.parallelism, 3);
        assert!(!config.headless);
        // untouched fields keep their defaults
        assert_eq!(config.nav_timeout(), Duration::from_millis(10_000));

        assert_eq!(config.url_override("navidrome"), Some("http://localhost:4533"));
        assert!(!config.skipped("navidrome"));
        assert!(config.skipped("immich"));
        assert!(!config.skipped("jellyfin"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: std::result::Result<HarnessConfig, _> = toml::from_str("retrys = 2");
        assert!(result.is_err());

        let result: std::result::Result<HarnessConfig, _> =
            toml::from_str("[services.grafana]\nurll = \"http://x\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_explicit_file_fails() {
        let err = HarnessConfig::load_or_default(Some(Path::new("/nonexistent/smokefleet.toml")));
        assert!(err.is_err());
    }
}
