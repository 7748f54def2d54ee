//! Object store abstraction.
//!
//! [`ObjectStore`] is the handful of calls the tools need from a bucket. The
//! S3-compatible implementation talks to the real service; an in-memory one
//! backs the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StoreError;

#[cfg(test)]
pub mod memory;
pub mod s3;

#[cfg(test)]
pub use memory::MemoryObjectStore;
pub use s3::S3StoreFactory;

/// Key separator inside a bucket.
pub const SEPARATOR: char = '/';

/// Metadata for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    pub fn new(key: &str, size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.to_string(),
            size,
            last_modified,
        }
    }
}

/// A client bound to a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Object metadata, or `None` if the key does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.head(key).await?.is_some())
    }

    /// Server-side copy within the bucket.
    async fn copy(&self, source: &str, destination: &str) -> Result<(), StoreError>;

    /// Delete a key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Objects directly under `prefix` (one level, `/`-delimited), in the
    /// store's native order.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    /// Upload the local file at `path` to `key`, streaming from disk.
    /// Returns the number of bytes stored.
    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, StoreError>;

    /// Public URL of `key`.
    fn object_url(&self, key: &str) -> String;
}

pub type DynObjectStore = Arc<dyn ObjectStore>;

/// Builds store clients from configuration.
pub trait StoreFactory: Send + Sync {
    fn connect(&self, config: &StoreConfig) -> Result<DynObjectStore, StoreError>;
}

/// Strip leading separators: keys are flat, not absolute paths.
pub fn normalize_key(key: &str) -> &str {
    key.trim_start_matches(SEPARATOR)
}

/// Turn a directory into a key prefix: `"/a/b/"` → `"a/b/"`, `""` → `""`.
pub fn directory_prefix(directory: &str) -> String {
    let trimmed = directory.trim_matches(SEPARATOR);
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}{}", trimmed, SEPARATOR)
    }
}

/// Percent-encode each segment of a key, keeping the separators.
pub fn encode_key(key: &str) -> String {
    key.split(SEPARATOR)
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
