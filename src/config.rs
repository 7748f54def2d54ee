//! # Configuration Module
//!
//! Loads the named store configurations and runtime settings from the
//! environment (and a `.env` file, if present).
//!
//! Two ways to describe stores:
//! - `OSS_CONFIGS`: a JSON object mapping configuration name to store settings
//! - `OSS_REGION`, `OSS_ACCESS_KEY_ID`, `OSS_ACCESS_KEY_SECRET`, `OSS_BUCKET`,
//!   `OSS_ENDPOINT`: a single store registered under `OSS_CONFIG_NAME`
//!   (default `default`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Name used for the single-store environment layout and as fallback default.
pub const DEFAULT_CONFIG_NAME: &str = "default";

/// Seconds before a download is aborted.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// STORE CONFIGURATION
// =============================================================================
/// Connection settings for one bucket.
///
/// Field names follow the JSON layout callers already use
/// (`accessKeyId`, `accessKeySecret`, ...).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub region: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl StoreConfig {
    /// Endpoint as a full URL. Falls back to the Aliyun OSS endpoint for the
    /// region and assumes `https://` when no scheme is given.
    pub fn endpoint_url(&self) -> String {
        let endpoint = match self.endpoint.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() => e.trim_end_matches('/').to_string(),
            _ => format!("{}.aliyuncs.com", self.region),
        };

        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint
        } else {
            format!("https://{}", endpoint)
        }
    }

    /// Endpoint without scheme, used for public object URLs.
    pub fn endpoint_host(&self) -> String {
        let url = self.endpoint_url();
        url.split_once("://")
            .map(|(_, host)| host.to_string())
            .unwrap_or(url)
    }

    fn validate(&self, name: &str) -> Result<()> {
        let required = [
            ("region", &self.region),
            ("accessKeyId", &self.access_key_id),
            ("accessKeySecret", &self.access_key_secret),
            ("bucket", &self.bucket),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("Configuration '{}' is missing {}", name, field);
            }
        }

        Ok(())
    }
}

/// Secrets never reach the logs.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Parse the `OSS_CONFIGS` JSON layout: `{"name": {region, accessKeyId, ...}}`.
pub fn parse_store_configs(json: &str) -> Result<BTreeMap<String, StoreConfig>> {
    serde_json::from_str(json)
        .context("OSS_CONFIGS must be a JSON object mapping names to store configurations")
}

// =============================================================================
// APPLICATION CONFIGURATION
// =============================================================================
#[derive(Debug, Clone)]
pub struct Config {
    /// Named store configurations, ordered by name
    pub stores: BTreeMap<String, StoreConfig>,

    /// Configuration used when a tool call names none
    pub default_config: String,

    /// Wall-clock limit for a single download
    pub download_timeout: Duration,

    /// Log level for the application
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stores: BTreeMap::new(),
            default_config: DEFAULT_CONFIG_NAME.to_string(),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first; a missing file
    /// is not an error.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key/value source.
    ///
    /// # Rust Concept: Closures as Parameters
    ///
    /// Taking `impl Fn(&str) -> Option<String>` lets tests pass a HashMap
    /// lookup instead of mutating the real process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(json) = lookup("OSS_CONFIGS").filter(|v| !v.trim().is_empty()) {
            config.stores = parse_store_configs(&json)?;
        } else if let Some(store) = single_store_from_lookup(&lookup) {
            let name = lookup("OSS_CONFIG_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());
            config.stores.insert(name, store);
        }

        config.default_config = match lookup("DEFAULT_CONFIG").filter(|v| !v.is_empty()) {
            Some(name) => name,
            None => default_config_for(&config.stores),
        };

        if let Some(val) = lookup("DOWNLOAD_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("DOWNLOAD_TIMEOUT_SECS must be a valid positive integer")?;
            config.download_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Replace the store set (e.g. from `--configs`), re-deriving the default
    /// unless it still names one of the new stores.
    pub fn set_stores(&mut self, stores: BTreeMap<String, StoreConfig>) {
        if !stores.contains_key(&self.default_config) {
            self.default_config = default_config_for(&stores);
        }
        self.stores = stores;
    }

    /// Validate the configuration before any client is created.
    pub fn validate(&self) -> Result<()> {
        if self.download_timeout.is_zero() {
            anyhow::bail!("DOWNLOAD_TIMEOUT_SECS must be at least 1");
        }

        for (name, store) in &self.stores {
            store.validate(name)?;
        }

        if self.stores.is_empty() {
            warn!("No store configurations loaded; only local tools will work");
        } else if !self.stores.contains_key(&self.default_config) {
            warn!(
                default = %self.default_config,
                "Default configuration is not defined; calls must pass configName"
            );
        }

        Ok(())
    }
}

fn single_store_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Option<StoreConfig> {
    let region = lookup("OSS_REGION");
    let access_key_id = lookup("OSS_ACCESS_KEY_ID");
    let access_key_secret = lookup("OSS_ACCESS_KEY_SECRET");
    let bucket = lookup("OSS_BUCKET");

    if region.is_none() && access_key_id.is_none() && access_key_secret.is_none() && bucket.is_none() {
        return None;
    }

    Some(StoreConfig {
        region: region.unwrap_or_default(),
        access_key_id: access_key_id.unwrap_or_default(),
        access_key_secret: access_key_secret.unwrap_or_default(),
        bucket: bucket.unwrap_or_default(),
        endpoint: lookup("OSS_ENDPOINT").filter(|v| !v.is_empty()),
    })
}

/// The only store if there is exactly one, otherwise `default`.
fn default_config_for(stores: &BTreeMap<String, StoreConfig>) -> String {
    if stores.len() == 1 {
        if let Some(name) = stores.keys().next() {
            return name.clone();
        }
    }
    DEFAULT_CONFIG_NAME.to_string()
}
