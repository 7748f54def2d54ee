//! # Error Types
//!
//! One `thiserror` enum per layer. Lower layers convert into higher ones with
//! `#[from]`, so `?` carries the original cause all the way up to the tool
//! boundary, where every error becomes a plain message for the caller.

use thiserror::Error;

// =============================================================================
// STORE ERRORS
// =============================================================================
/// Errors raised by an [`ObjectStore`](crate::store::ObjectStore) backend.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The remote call itself failed (network, auth, service error).
    #[error("Remote operation failed: {0}")]
    Remote(String),

    /// A local file meant for upload could not be read.
    #[error("Failed to read local file {path}: {message}")]
    LocalFile { path: String, message: String },

    /// The configuration cannot be turned into a client.
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),
}

// =============================================================================
// REGISTRY ERRORS
// =============================================================================
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("Configuration not found: {0}")]
    ConfigNotFound(String),

    #[error("Failed to create client for configuration '{name}': {source}")]
    ClientConstruction {
        name: String,
        #[source]
        source: StoreError,
    },
}

// =============================================================================
// RENAME ERRORS
// =============================================================================
#[derive(Error, Debug, Clone)]
pub enum RenameError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Source file does not exist: {0}")]
    SourceNotFound(String),

    #[error("Destination file already exists: {0}")]
    DestinationExists(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Copy succeeded but the original could not be removed. Both keys exist;
    /// deleting `source` again is safe.
    #[error("Copied to {destination} but failed to delete original {source_key}: {cause}")]
    DeleteAfterCopy {
        source_key: String,
        destination: String,
        cause: StoreError,
    },
}

// =============================================================================
// LISTING ERRORS
// =============================================================================
#[derive(Error, Debug)]
pub enum ListError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Directory not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// =============================================================================
// UPLOAD ERRORS
// =============================================================================
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// DOWNLOAD ERRORS
// =============================================================================
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Download failed with HTTP status {0}")]
    HttpStatus(u16),

    #[error("Too many redirects: {0} redirected again")]
    TooManyRedirects(String),

    #[error("Download timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// TOOL CALL ERRORS
// =============================================================================
/// Errors raised while routing a tool call, before or after the tool runs.
#[derive(Error, Debug)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("{0}")]
    Failed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
