mod bootstrap;
mod outbound;
mod routes;
mod ws;

use anyhow::Result;

use tably_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tably_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let state = bootstrap::build(config)?;

    let address = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(bind_address = %address, "tably-server started");

    let app = routes::router(state.clone()).merge(ws::router(state));
    axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!("tably-server stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
