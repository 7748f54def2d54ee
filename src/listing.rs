//! Directory listings for the store and the local disk.
//!
//! Both listings are one level deep, optionally filtered by a wildcard
//! pattern, and sorted by name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use crate::error::ListError;
use crate::pattern::compile_filter;
use crate::registry::StoreRegistry;
use crate::store::{directory_prefix, SEPARATOR};

/// A file in the store, named relative to the listed directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFileEntry {
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A local directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
}

/// List files directly under `directory` in the store.
///
/// Sub-directories (names ending in `/`) and the directory's own marker
/// object are skipped.
pub async fn list_store_files(
    registry: &Arc<StoreRegistry>,
    directory: &str,
    pattern: Option<&str>,
    config_name: &str,
) -> Result<Vec<StoreFileEntry>, ListError> {
    let filter = compile_filter(pattern)?;
    let prefix = directory_prefix(directory);
    let store = registry.client(config_name).await?;

    let mut entries: Vec<StoreFileEntry> = store
        .list(&prefix)
        .await?
        .into_iter()
        .filter_map(|object| {
            let name = object.key.strip_prefix(prefix.as_str())?;
            if name.is_empty() || name.ends_with(SEPARATOR) {
                return None;
            }
            if let Some(glob) = &filter {
                if !glob.is_match(name) {
                    return None;
                }
            }
            Some(StoreFileEntry {
                name: name.to_string(),
                size: object.size,
                last_modified: object.last_modified,
            })
        })
        .collect();

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(prefix = %prefix, count = entries.len(), "Listed store files");
    Ok(entries)
}

/// List entries of a local directory.
pub async fn list_local_files(
    directory: &str,
    pattern: Option<&str>,
) -> Result<Vec<LocalFileEntry>, ListError> {
    let filter = compile_filter(pattern)?;
    let path = Path::new(directory);

    let is_dir = fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false);
    if !is_dir {
        return Err(ListError::FileNotFound(directory.to_string()));
    }

    let mut entries = Vec::new();
    let mut dir = fs::read_dir(path).await?;

    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(glob) = &filter {
            if !glob.is_match(&name) {
                continue;
            }
        }

        let metadata = entry.metadata().await?;
        let is_directory = metadata.is_dir();
        entries.push(LocalFileEntry {
            name,
            is_directory,
            size: if is_directory { 0 } else { metadata.len() },
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(directory = %directory, count = entries.len(), "Listed local files");
    Ok(entries)
}
