use anyhow::Result;
use clap::{Parser, Subcommand};
use echobox::config::Config;
use echobox::gateway;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "echobox", version, about = "Account registration + feedback log service")]
struct AppCli {
    /// Config file path (default: ~/.echobox/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Write a commented starter config and exit
    InitConfig,
}

fn init_logging() {
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = AppCli::parse();

    match args.command {
        Some(Commands::InitConfig) => {
            let path = Config::init_at(args.config.as_deref())?;
            println!("wrote starter config to {}", path.display());
        }
        Some(Commands::Serve { host, port }) => {
            let mut config = Config::load(args.config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            gateway::run_gateway(config).await?;
        }
        None => {
            // Default: serve with the configured address
            let config = Config::load(args.config.as_deref())?;
            gateway::run_gateway(config).await?;
        }
    }

    Ok(())
}
