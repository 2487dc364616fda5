use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use zipload::{Config, Zipload};

/// Fetch remote files and serve them as zip archives over HTTP
#[derive(Debug, Parser)]
#[command(name = "zipload", version, about)]
struct Cli {
    /// Path to the JSON configuration file; defaults are used if it does not exist
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Listen address, overriding `api.bind_address`
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        tracing::info!(path = %cli.config.display(), "no config file found, using defaults");
        Config::default()
    };
    if let Some(bind) = cli.bind {
        config.api.bind_address = bind;
    }

    let service = Arc::new(Zipload::new(config)?);
    let mut server = service.spawn_api_server();

    tokio::select! {
        joined = &mut server => {
            // The server stopped on its own, e.g. the address was already in use
            joined??;
            return Ok(());
        }
        _ = zipload::run_with_shutdown(Arc::clone(&service)) => {}
    }

    server.await??;
    Ok(())
}
