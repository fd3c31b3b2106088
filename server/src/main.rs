use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::{build_state, serve};
use shared::config::load_config;

#[derive(Debug, Parser)]
#[command(name = "blog-server", about = "Blog backend with revocable cookie sessions")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    let addr = config.server.addr();

    let state = build_state(config).await?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tokio::select! {
        res = serve(listener, state) => res?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
