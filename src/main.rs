//! Edithost - editor tool host speaking the Model Context Protocol over stdio

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edithost_mcp::{
    builtin_registry, Framing, McpServer, ServerConfig, ServerContext, WorkspaceBackend,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "edithost",
    about = "Edithost - editor and workspace tools for MCP clients over stdio",
    version,
    author
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "EDITHOST_CONFIG")]
    config: Option<PathBuf>,

    /// Workspace root for the editor and file tools
    #[arg(short, long, global = true, env = "EDITHOST_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Message framing (lines, content-length)
    #[arg(long, global = true)]
    framing: Option<Framing>,

    /// Verbose logging on stderr
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP requests on stdin/stdout (default)
    Serve,
    /// Print the tool catalogue as JSON
    Tools,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Stdout belongs to the protocol, so logs go to stderr
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => runtime.block_on(cmd_serve(config)),
        Commands::Tools => cmd_tools(),
    };

    // A stdin read left pending by a closed session must not hold up exit
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Config file values, overridden by command-line flags
fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load_from(path)?,
        None => ServerConfig::default(),
    };

    if let Some(workspace) = &cli.workspace {
        config.workspace = Some(workspace.clone());
    }
    if let Some(framing) = cli.framing {
        config.framing = framing;
    }

    Ok(config)
}

async fn cmd_serve(config: ServerConfig) -> Result<()> {
    let workspace = match &config.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    if !workspace.is_dir() {
        anyhow::bail!("Workspace is not a directory: {}", workspace.display());
    }

    info!(workspace = %workspace.display(), "Using workspace");

    let registry = builtin_registry().context("Failed to build tool registry")?;
    let context = Arc::new(
        ServerContext::new(registry, Arc::new(WorkspaceBackend::new(workspace)))
            .context("Failed to start server context")?,
    );

    let server = McpServer::new(context.clone(), config);
    let result = server.serve_stdio().await;

    context.shutdown();

    result.context("Session ended with an error")
}

fn cmd_tools() -> Result<()> {
    let registry = builtin_registry()?;
    let catalogue = serde_json::json!({ "tools": registry.infos() });

    println!("{}", serde_json::to_string_pretty(&catalogue)?);

    Ok(())
}
