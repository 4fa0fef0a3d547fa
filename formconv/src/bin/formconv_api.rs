use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use formconv::{Config, Pipeline};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the form generator over HTTP", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5001")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formconv=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Arc::new(Config::from_env());
    let pipeline = Pipeline::from_config(config).context("Failed to initialise pipeline")?;
    let app = formconv::api::router(Arc::new(pipeline));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("Listening on http://{}", args.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
