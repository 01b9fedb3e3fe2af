mod config_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    davgate_mcp::McpServer,
    davgate_tools::{ToolContext, gateway_registry},
};

#[derive(Parser)]
#[command(name = "davgate", about = "iCloud mail, calendar and reminders as MCP tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (TOML, YAML or JSON). Defaults to ./davgate.toml, then
    /// ~/.config/davgate/.
    #[arg(long, global = true, env = "DAVGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout (default when no subcommand is provided).
    Serve,
    /// List the exposed tools.
    Tools,
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Logs go to stderr; stdout carries the protocol.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn tool_context(cli: &Cli) -> anyhow::Result<ToolContext> {
    let config = davgate_config::resolve(cli.config.as_deref())
        .context("failed to load configuration")?;
    Ok(ToolContext::connect(Arc::new(config))?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    // lettre builds its rustls config from the process-wide provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!(version = env!("CARGO_PKG_VERSION"), "davgate starting");

    match &cli.command {
        None | Some(Commands::Serve) => {
            let registry = gateway_registry(tool_context(&cli)?);
            McpServer::new(registry).serve_stdio().await?;
            Ok(())
        },
        Some(Commands::Tools) => {
            let registry = gateway_registry(tool_context(&cli)?);
            for schema in registry.list_schemas() {
                let name = schema["name"].as_str().unwrap_or_default();
                let description = schema["description"].as_str().unwrap_or_default();
                println!("  {name:<22} {description}");
            }
            Ok(())
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
    }
}
