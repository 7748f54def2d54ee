//! Upload a local file into the store.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::error::UploadError;
use crate::registry::StoreRegistry;
use crate::store::directory_prefix;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub url: String,
    pub key: String,
}

/// Put `file_path` at `directory/file_name` (or the file's own name) and
/// return the object's URL.
pub async fn upload_file(
    registry: &Arc<StoreRegistry>,
    file_path: &str,
    directory: Option<&str>,
    file_name: Option<&str>,
    config_name: &str,
) -> Result<UploadOutcome, UploadError> {
    let path = Path::new(file_path);

    let is_file = fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false);
    if !is_file {
        return Err(UploadError::FileNotFound(file_path.to_string()));
    }

    let name = match file_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::FileNotFound(file_path.to_string()))?,
    };

    let key = format!("{}{}", directory_prefix(directory.unwrap_or("")), name);
    let store = registry.client(config_name).await?;

    let size = store.put_file(&key, path).await?;

    let url = store.object_url(&key);
    info!(file = %file_path, key = %key, size, config = %config_name, "Uploaded file");

    Ok(UploadOutcome {
        success: true,
        url,
        key,
    })
}
