//! # Tools Module
//!
//! The operations an agent can call, each implemented as a Rig `Tool`:
//! a static name, a JSON-schema definition the agent reads, typed arguments
//! deserialized from the call, and a serializable output.
//!
//! Store tools take an optional `configName`; when it is missing the
//! registry's default configuration is used.

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::download::{DownloadOutcome, Downloader};
use crate::error::{DownloadError, ListError, UploadError};
use crate::listing::{list_local_files, list_store_files, LocalFileEntry, StoreFileEntry};
use crate::registry::StoreRegistry;
use crate::rename::{RenameOrchestrator, RenameResult, RenameRule};
use crate::upload::{upload_file, UploadOutcome};

// =============================================================================
// TOOL NAMES
// =============================================================================
pub const UPLOAD_FILE: &str = "upload_file";
pub const LIST_CONFIGS: &str = "list_configs";
pub const BATCH_RENAME: &str = "batch_rename";
pub const LIST_STORE_FILES: &str = "list_store_files";
pub const LIST_LOCAL_FILES: &str = "list_local_files";
pub const DOWNLOAD_FILE: &str = "download_file";

fn config_name_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": "Name of the storage configuration to use (see list_configs). Defaults to the server's default configuration."
    })
}

// =============================================================================
// UPLOAD
// =============================================================================
/// Input arguments for the upload tool.
///
/// # Rust Concept: Optional Fields with Serde
///
/// `Option<T>` plus `#[serde(default)]` means a missing JSON key becomes
/// `None` instead of a deserialization error. `rename_all = "camelCase"`
/// maps `file_path` to the `filePath` key the agent sends.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadArgs {
    pub file_path: String,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub config_name: Option<String>,
}

pub struct UploadFileTool {
    registry: Arc<StoreRegistry>,
}

impl UploadFileTool {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }
}

/// # Rust Concept: Associated Types and Constants
///
/// The `Tool` trait leaves `Args`, `Output` and `Error` for each
/// implementation to choose, and `NAME` is a constant on the type itself.
/// Callers stay generic over `T: Tool` while every tool keeps its own
/// concrete argument and result types.
impl Tool for UploadFileTool {
    const NAME: &'static str = UPLOAD_FILE;

    type Args = UploadArgs;
    type Output = UploadOutcome;
    type Error = UploadError;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Upload a local file to object storage and return its URL.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "filePath": {
                        "type": "string",
                        "description": "Path of the local file to upload"
                    },
                    "directory": {
                        "type": "string",
                        "description": "Target directory in the bucket (e.g. \"images/2024\"). Defaults to the bucket root."
                    },
                    "fileName": {
                        "type": "string",
                        "description": "Object name to store the file under. Defaults to the local file name."
                    },
                    "configName": config_name_schema()
                },
                "required": ["filePath"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let config_name = self.registry.resolve_name(args.config_name.as_deref());
        upload_file(
            &self.registry,
            &args.file_path,
            args.directory.as_deref(),
            args.file_name.as_deref(),
            config_name,
        )
        .await
    }
}

// =============================================================================
// LIST CONFIGS
// =============================================================================
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListConfigsArgs {}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigList {
    pub configs: Vec<String>,
    pub default: String,
}

/// Reports the configured store names.
///
/// # Rust Concept: The Never-Failing Error Type
///
/// `std::convert::Infallible` has no values, so `Result<_, Infallible>` can
/// only be `Ok`. It satisfies the trait's `Error` bound without inventing
/// an error enum for an operation that cannot fail.
pub struct ListConfigsTool {
    registry: Arc<StoreRegistry>,
}

impl ListConfigsTool {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }
}

impl Tool for ListConfigsTool {
    const NAME: &'static str = LIST_CONFIGS;

    type Args = ListConfigsArgs;
    type Output = ConfigList;
    type Error = Infallible;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List the names of the available storage configurations.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(ConfigList {
            configs: self.registry.names(),
            default: self.registry.default_name().to_string(),
        })
    }
}

// =============================================================================
// BATCH RENAME
// =============================================================================
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRenameArgs {
    pub directory: String,
    pub renames: Vec<RenameRule>,
    #[serde(default)]
    pub config_name: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

pub struct BatchRenameTool {
    registry: Arc<StoreRegistry>,
    orchestrator: RenameOrchestrator,
}

impl BatchRenameTool {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        let orchestrator = RenameOrchestrator::new(registry.clone());
        Self {
            registry,
            orchestrator,
        }
    }
}

impl Tool for BatchRenameTool {
    const NAME: &'static str = BATCH_RENAME;

    type Args = BatchRenameArgs;
    type Output = Vec<RenameResult>;
    type Error = Infallible;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Rename files inside one storage directory. Each rename is a copy followed by a delete; \
                          an existing destination is never overwritten. Every rename is attempted and reported \
                          separately. Use dryRun to preview without touching the store."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Directory in the bucket that contains the files (\"\" for the root)"
                    },
                    "renames": {
                        "type": "array",
                        "description": "Renames to apply, in order",
                        "items": {
                            "type": "object",
                            "properties": {
                                "oldName": { "type": "string", "description": "Current file name" },
                                "newName": { "type": "string", "description": "New file name" }
                            },
                            "required": ["oldName", "newName"]
                        }
                    },
                    "configName": config_name_schema(),
                    "dryRun": {
                        "type": "boolean",
                        "description": "Preview only: report what would be renamed without calling the store",
                        "default": false
                    }
                },
                "required": ["directory", "renames"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let config_name = self.registry.resolve_name(args.config_name.as_deref());
        Ok(self
            .orchestrator
            .batch_rename(&args.renames, &args.directory, config_name, args.dry_run)
            .await)
    }
}

// =============================================================================
// LIST STORE FILES
// =============================================================================
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStoreFilesArgs {
    pub directory: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub config_name: Option<String>,
}

pub struct ListStoreFilesTool {
    registry: Arc<StoreRegistry>,
}

impl ListStoreFilesTool {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }
}

impl Tool for ListStoreFilesTool {
    const NAME: &'static str = LIST_STORE_FILES;

    type Args = ListStoreFilesArgs;
    type Output = Vec<StoreFileEntry>;
    type Error = ListError;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List files directly inside a storage directory (not recursive), sorted by name."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Directory in the bucket (\"\" for the root)"
                    },
                    "pattern": {
                        "type": "string",
                        "description": "Optional wildcard filter, case-insensitive: * matches any characters, ? matches one (e.g. \"*.png\")"
                    },
                    "configName": config_name_schema()
                },
                "required": ["directory"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let config_name = self.registry.resolve_name(args.config_name.as_deref());
        list_store_files(&self.registry, &args.directory, args.pattern.as_deref(), config_name).await
    }
}

// =============================================================================
// LIST LOCAL FILES
// =============================================================================
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocalFilesArgs {
    pub directory: String,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ListLocalFilesTool;

impl Tool for ListLocalFilesTool {
    const NAME: &'static str = LIST_LOCAL_FILES;

    type Args = ListLocalFilesArgs;
    type Output = Vec<LocalFileEntry>;
    type Error = ListError;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List entries of a local directory (not recursive), sorted by name.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Local directory path"
                    },
                    "pattern": {
                        "type": "string",
                        "description": "Optional wildcard filter, case-insensitive: * matches any characters, ? matches one"
                    }
                },
                "required": ["directory"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        list_local_files(&args.directory, args.pattern.as_deref()).await
    }
}

// =============================================================================
// DOWNLOAD
// =============================================================================
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadArgs {
    pub url: String,
    pub target_directory: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

pub struct DownloadFileTool {
    downloader: Arc<Downloader>,
}

impl DownloadFileTool {
    pub fn new(downloader: Arc<Downloader>) -> Self {
        Self { downloader }
    }
}

impl Tool for DownloadFileTool {
    const NAME: &'static str = DOWNLOAD_FILE;

    type Args = DownloadArgs;
    type Output = DownloadOutcome;
    type Error = DownloadError;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: format!(
                "Download a file over HTTP(S) into a local directory. Follows one redirect and gives up after {} seconds.",
                self.downloader.timeout().as_secs()
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "http:// or https:// URL to download"
                    },
                    "targetDirectory": {
                        "type": "string",
                        "description": "Local directory to save into (created if missing)"
                    },
                    "fileName": {
                        "type": "string",
                        "description": "File name to save as. Defaults to the last segment of the URL."
                    }
                },
                "required": ["url", "targetDirectory"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.downloader
            .download(&args.url, &args.target_directory, args.file_name.as_deref())
            .await
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_support::registry_with;
    use crate::store::MemoryObjectStore;

    #[tokio::test]
    async fn test_definitions_match_names() {
        let (registry, _) = registry_with(Arc::new(MemoryObjectStore::new("assets")));

        let def = BatchRenameTool::new(registry.clone()).definition(String::new()).await;
        assert_eq!(def.name, "batch_rename");
        assert_eq!(def.parameters["required"], serde_json::json!(["directory", "renames"]));

        let def = UploadFileTool::new(registry).definition(String::new()).await;
        assert_eq!(def.name, "upload_file");
        assert_eq!(def.parameters["properties"]["configName"]["type"], "string");
    }

    #[tokio::test]
    async fn test_list_configs() {
        let (registry, _) = registry_with(Arc::new(MemoryObjectStore::new("assets")));
        let tool = ListConfigsTool::new(registry);

        let output = tool.call(ListConfigsArgs::default()).await.unwrap();

        assert_eq!(output.configs, vec!["default"]);
        assert_eq!(output.default, "default");
    }

    #[tokio::test]
    async fn test_batch_rename_defaults_config_and_dry_run() {
        let store = Arc::new(MemoryObjectStore::new("assets").with_objects(&[("docs/a.txt", "a")]).await);
        let (registry, _) = registry_with(store.clone());
        let tool = BatchRenameTool::new(registry);

        let args: BatchRenameArgs = serde_json::from_value(serde_json::json!({
            "directory": "docs",
            "renames": [{"oldName": "a.txt", "newName": "b.txt"}]
        }))
        .unwrap();
        assert!(!args.dry_run);

        let results = tool.call(args).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(store.keys().await, vec!["docs/b.txt"]);
    }

    #[test]
    fn test_args_accept_camel_case() {
        let args: DownloadArgs = serde_json::from_value(serde_json::json!({
            "url": "https://example.com/a.png",
            "targetDirectory": "/tmp/out"
        }))
        .unwrap();

        assert_eq!(args.target_directory, "/tmp/out");
        assert!(args.file_name.is_none());
    }
}
