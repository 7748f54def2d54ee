//! # Tool Server
//!
//! [`ToolRouter`] dispatches a call by tool name with JSON arguments.
//! [`StdioServer`] exposes the router to an agent over newline-delimited
//! JSON-RPC 2.0 on stdin/stdout, answering `initialize`, `ping`,
//! `tools/list` and `tools/call`.

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::download::Downloader;
use crate::error::ToolCallError;
use crate::registry::StoreRegistry;
use crate::tools::{
    BatchRenameTool, DownloadFileTool, ListConfigsTool, ListLocalFilesTool, ListStoreFilesTool,
    UploadFileTool, BATCH_RENAME, DOWNLOAD_FILE, LIST_CONFIGS, LIST_LOCAL_FILES, LIST_STORE_FILES,
    UPLOAD_FILE,
};

/// Protocol revision reported in the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

// =============================================================================
// TOOL ROUTER
// =============================================================================
pub struct ToolRouter {
    upload: UploadFileTool,
    list_configs: ListConfigsTool,
    batch_rename: BatchRenameTool,
    list_store_files: ListStoreFilesTool,
    list_local_files: ListLocalFilesTool,
    download: DownloadFileTool,
}

impl ToolRouter {
    pub fn new(registry: Arc<StoreRegistry>, downloader: Arc<Downloader>) -> Self {
        Self {
            upload: UploadFileTool::new(registry.clone()),
            list_configs: ListConfigsTool::new(registry.clone()),
            batch_rename: BatchRenameTool::new(registry.clone()),
            list_store_files: ListStoreFilesTool::new(registry),
            list_local_files: ListLocalFilesTool,
            download: DownloadFileTool::new(downloader),
        }
    }

    /// Definitions of every tool, in a stable order.
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            self.upload.definition(String::new()).await,
            self.list_configs.definition(String::new()).await,
            self.batch_rename.definition(String::new()).await,
            self.list_store_files.definition(String::new()).await,
            self.list_local_files.definition(String::new()).await,
            self.download.definition(String::new()).await,
        ]
    }

    /// Run tool `name` with JSON `args` and return its serialized output.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolCallError> {
        debug!(tool = %name, "Dispatching tool call");
        match name {
            UPLOAD_FILE => invoke(&self.upload, args).await,
            LIST_CONFIGS => invoke(&self.list_configs, args).await,
            BATCH_RENAME => invoke(&self.batch_rename, args).await,
            LIST_STORE_FILES => invoke(&self.list_store_files, args).await,
            LIST_LOCAL_FILES => invoke(&self.list_local_files, args).await,
            DOWNLOAD_FILE => invoke(&self.download, args).await,
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }
}

async fn invoke<T: Tool>(tool: &T, args: Value) -> Result<Value, ToolCallError> {
    // Tools without parameters may be called with no arguments at all.
    let args = if args.is_null() { json!({}) } else { args };

    let args: T::Args = serde_json::from_value(args).map_err(|e| ToolCallError::InvalidArguments {
        tool: T::NAME.to_string(),
        message: e.to_string(),
    })?;

    let output = tool.call(args).await.map_err(|e| {
        warn!(tool = %T::NAME, error = %e, "Tool call failed");
        ToolCallError::Failed(e.to_string())
    })?;

    Ok(serde_json::to_value(output)?)
}

/// Payload reported to the caller when a tool fails.
pub fn failure_payload(error: &ToolCallError) -> Value {
    json!({
        "success": false,
        "error": error.to_string(),
    })
}

// =============================================================================
// JSON-RPC FRAMES
// =============================================================================
#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl Response {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

// =============================================================================
// STDIO SERVER
// =============================================================================
pub struct StdioServer {
    router: ToolRouter,
}

impl StdioServer {
    pub fn new(router: ToolRouter) -> Self {
        Self { router }
    }

    /// Serve stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Answer one message per line from `reader`, writing each response as a
    /// single line to `writer`. Returns at EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Tool server listening on stdio");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle a single JSON-RPC message. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => Some(Response::failure(Value::Null, PARSE_ERROR, format!("Parse error: {e}"))),
            Ok(value) => self.handle_value(value).await,
        }?;

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Failed to serialize response");
                None
            }
        }
    }

    async fn handle_value(&self, value: Value) -> Option<Response> {
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(Response::failure(
                    Value::Null,
                    INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                ))
            }
        };

        if request.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            warn!(version = ?request.jsonrpc, "Unexpected JSON-RPC version");
        }

        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        debug!(method = %request.method, "Request received");
        let response = match request.method.as_str() {
            "initialize" => Response::success(id, self.initialize_result()),
            "ping" => Response::success(id, json!({})),
            "tools/list" => Response::success(id, self.list_tools_result().await),
            "tools/call" => self.call_tool(id, request.params).await,
            other => Response::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    async fn list_tools_result(&self) -> Value {
        let tools: Vec<Value> = self
            .router
            .definitions()
            .await
            .into_iter()
            .map(|def| {
                json!({
                    "name": def.name,
                    "description": def.description,
                    "inputSchema": def.parameters,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, id: Value, params: Value) -> Response {
        let params: CallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => return Response::failure(id, INVALID_PARAMS, format!("Invalid params: {e}")),
        };

        let (payload, is_error) = match self.router.call(&params.name, params.arguments).await {
            Ok(output) => (output, false),
            Err(e @ (ToolCallError::UnknownTool(_) | ToolCallError::InvalidArguments { .. })) => {
                return Response::failure(id, INVALID_PARAMS, e.to_string());
            }
            Err(ToolCallError::Serialization(e)) => {
                return Response::failure(id, INTERNAL_ERROR, format!("Serialization error: {e}"));
            }
            Err(e) => (failure_payload(&e), true),
        };

        Response::success(
            id,
            json!({
                "content": [{ "type": "text", "text": payload.to_string() }],
                "isError": is_error,
            }),
        )
    }
}
