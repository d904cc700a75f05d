//! Binary entry point: rebuild the dataset, then serve tiles over HTTP.
//!
//! Takes an optional path to a YAML configuration file as its only
//! argument; without one, the built-in defaults apply.

use std::env;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tile_conjurer::bootstrap;
use tile_conjurer::config::Config;
use tile_conjurer::server::{self, AppState};
use tile_conjurer::source::SpatialSource;
use tile_conjurer::store::ReadPool;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };

    // The dataset is rebuilt on every start. The write handle opens and
    // closes entirely inside this call, before any reader exists.
    let bootstrap_config = config.clone();
    let summary =
        tokio::task::spawn_blocking(move || bootstrap::initialize_dataset(&bootstrap_config))
            .await??;
    info!(features = summary.features, "dataset bootstrapped");

    let pool = ReadPool::new(config.database.clone());
    let source = Arc::new(SpatialSource::new(&config, pool));
    let app = server::router(AppState::new(source));

    let listener = TcpListener::bind(config.listen).await?;
    info!(listen = %config.listen, "serving tiles");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "could not install the shutdown signal handler");
    }
}
