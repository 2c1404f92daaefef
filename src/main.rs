// src/main.rs
//! Certificate Portal Entry Point
//! Runs the HTTP service or prints store statistics.
use anyhow::{Context, Result};
use cert_portal::api::PortalServer;
use cert_portal::core::caller::Caller;
use cert_portal::core::config::PortalConfig;
use cert_portal::service::CertificatePortal;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "cert_portal")]
#[command(about = "Certificate issuance and verification portal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// TOML configuration file (falls back to CONFIG_PATH, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the portal HTTP server
    Server {
        /// Port to bind the server to (overrides configuration)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the analytics summary of the configured store as JSON (read-only)
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    info!("Starting Certificate Portal v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config)?;

    match args.command {
        Some(Commands::Stats) => {
            let portal = CertificatePortal::snapshot(config)?;
            let summary = portal.analytics_summary(&Caller::admin("cli"))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some(Commands::Server { port }) => {
            let mut config = config;
            if let Some(port) = port {
                info!("Starting server on port {}", port);
                config.server.port = port;
            }
            serve(config).await?;
        }
        None => {
            info!("No command specified, starting server with configured address");
            serve(config).await?;
        }
    }

    Ok(())
}

async fn serve(config: PortalConfig) -> Result<()> {
    let portal = Arc::new(CertificatePortal::from_config(config)?);
    PortalServer::new(portal).start().await
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing::subscriber::set_global_default(build_subscriber(filter))?;
    Ok(())
}

/// The filter alone decides what is emitted; `RUST_LOG` wins when set.
fn build_subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    FmtSubscriber::builder().with_env_filter(filter).finish()
}

/// Load configuration from `--config`, `CONFIG_PATH` or defaults, then apply `PORTAL_*` overrides.
fn load_config(path: Option<PathBuf>) -> Result<PortalConfig> {
    let path = path.or_else(|| std::env::var("CONFIG_PATH").ok().map(PathBuf::from));
    let mut config = match path {
        Some(path) => PortalConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            tracing::warn!("No config file given. Using default configuration");
            PortalConfig::default()
        }
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
