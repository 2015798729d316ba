use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use nightmock_proxy::config::{Config, RuntimeOverrides};
use nightmock_proxy::logging;
use nightmock_proxy::proxy::{ProxyContext, ProxyServer};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "nightmock", version, about)]
struct Args {
    /// Config file (JSON, or YAML by extension)
    #[arg(short, long, env = "NIGHTMOCK_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the configured data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    let overrides = RuntimeOverrides {
        port: args.port,
        data_dir: args.data_dir,
    };

    let log_level = logging::init(config.log_level);

    let ctx = ProxyContext::from_config(config, Some(args.config), &overrides, log_level);
    let persister = ctx.persister.clone();
    let server = ProxyServer::new(ctx);
    let listener = server.bind().await?;

    tokio::select! {
        result = server.serve(listener) => {
            if let Err(e) = result {
                error!("Proxy server failed: {:#}", e);
                persister.force_save();
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, saving recordings...");
        }
    }

    persister.force_save();
    Ok(())
}
