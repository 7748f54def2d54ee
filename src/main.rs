//! # OSS Agent Tools
//!
//! Object-storage tools for AI agents: upload, list, batch-rename and
//! download files across several named bucket configurations.
//!
//! The tools are served over JSON-RPC on stdio so an agent host can launch
//! this binary and call them; they can also be listed and called directly
//! from the command line.
//!
//! ## Quick Start
//! ```bash
//! OSS_CONFIGS='{"default":{"region":"oss-cn-hangzhou","accessKeyId":"...","accessKeySecret":"...","bucket":"my-bucket"}}' \
//!     cargo run -- call list_store_files '{"directory":"images"}'
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
mod config;

/// Error types for every layer
mod error;

/// Object store abstraction and the S3-compatible backend
mod store;

/// Named store clients, created lazily and cached
mod registry;

/// Wildcard filename patterns
mod pattern;

/// Batch rename over the store
mod rename;

/// Store and local directory listings
mod listing;

/// Local file upload
mod upload;

/// HTTP download into a local directory
mod download;

/// Agent-callable tools
mod tools;

/// Tool router and JSON-RPC stdio server
mod server;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{parse_store_configs, Config};
use crate::download::Downloader;
use crate::registry::StoreRegistry;
use crate::server::{failure_payload, StdioServer, ToolRouter};
use crate::store::S3StoreFactory;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "oss-agent-tools",
    version,
    about = "Object storage tools for AI agents, served over JSON-RPC on stdio",
    long_about = r#"
OSS Agent Tools - file operations on object storage for AI agents.

Tools: upload_file, list_configs, batch_rename, list_store_files,
list_local_files, download_file.

CONFIGURATION:
  OSS_CONFIGS          JSON object of named configurations
                       {"name": {"region", "accessKeyId", "accessKeySecret", "bucket", "endpoint"?}}
  OSS_REGION, OSS_ACCESS_KEY_ID, OSS_ACCESS_KEY_SECRET, OSS_BUCKET, OSS_ENDPOINT
                       a single configuration (named by OSS_CONFIG_NAME, default "default")
  DEFAULT_CONFIG       configuration used when a call names none
  DOWNLOAD_TIMEOUT_SECS
                       download time limit (default 60)

EXAMPLES:
  # Serve tools to an agent host on stdin/stdout
  oss-agent-tools serve

  # Print the tool definitions
  oss-agent-tools tools

  # Call a tool directly
  oss-agent-tools call batch_rename '{"directory":"img","renames":[{"oldName":"a.png","newName":"b.png"}],"dryRun":true}'
"#
)]
struct Args {
    /// Named store configurations as JSON (overrides the environment)
    #[arg(long = "configs", env = "OSS_CONFIGS", global = true, hide_env_values = true)]
    configs: Option<String>,

    /// Verbose output (debug logging)
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Enable verbose/debug logging",
        global = true,
        default_value = "false"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

/// # Rust Concept: Enums as Subcommands
///
/// Each variant is one subcommand; variant fields become its arguments.
/// `match` on the parsed value must handle every variant, so adding a
/// subcommand without wiring it up is a compile error.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Serve the tools over JSON-RPC on stdin/stdout (default)
    Serve,

    /// Print the tool definitions as JSON
    Tools,

    /// Call one tool and print its result as JSON
    Call {
        /// Tool name, e.g. list_store_files
        #[arg(value_name = "TOOL")]
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(value_name = "ARGS_JSON", default_value = "{}")]
        args: String,
    },
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
/// # Rust Concept: The #[tokio::main] Attribute
///
/// `main` cannot be async on its own. The attribute builds a Tokio runtime
/// and blocks on the async body, so everything below can `.await`.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    init_logging(args.verbose, &config.log_level)?;

    if let Some(json) = args.configs.as_deref().filter(|j| !j.trim().is_empty()) {
        config.set_stores(parse_store_configs(json)?);
    }
    config.validate()?;

    info!(
        configs = ?config.stores.keys().collect::<Vec<_>>(),
        default = %config.default_config,
        download_timeout = ?config.download_timeout,
        "Configuration loaded"
    );

    let router = build_router(&config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            StdioServer::new(router)
                .serve_stdio()
                .await
                .context("stdio server failed")?;
        }
        Command::Tools => {
            let definitions = router.definitions().await;
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        Command::Call { tool, args } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("ARGS_JSON must be valid JSON")?;

            match router.call(&tool, arguments).await {
                Ok(output) => println!("{}", serde_json::to_string_pretty(&output)?),
                Err(e) => {
                    error!(tool = %tool, error = %e, "Tool call failed");
                    println!("{}", serde_json::to_string_pretty(&failure_payload(&e))?);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

/// Wire the registry and downloader into the tool router.
///
/// # Rust Concept: Shared Ownership with Arc
///
/// Several tools hold the same registry. `Arc` is a reference-counted
/// pointer that is safe to share across tasks; `clone()` copies the pointer,
/// not the registry, so every tool sees one client cache.
fn build_router(config: &Config) -> Result<ToolRouter> {
    let registry = Arc::new(StoreRegistry::new(
        config.stores.clone(),
        config.default_config.clone(),
        Arc::new(S3StoreFactory),
    ));
    let downloader = Arc::new(Downloader::new(config.download_timeout)?);
    Ok(ToolRouter::new(registry, downloader))
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber for structured logging.
///
/// `--verbose` forces DEBUG; otherwise `RUST_LOG` (default `info`) applies.
/// Logs go to stderr; stdout is reserved for protocol frames and tool output.
fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let directives = if verbose { "debug" } else { log_level };
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
