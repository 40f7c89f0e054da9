use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use nbproxy_core::{UpstreamClientConfig, WreqUpstreamClient};
use nbproxy_router::{AppState, router};

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("nbproxy failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Cli::parse().into_patch().into_config()?;
    let client = WreqUpstreamClient::new(UpstreamClientConfig::from_global(&config))?;
    info!(
        event = "config_loaded",
        image_model = %config.image_model,
        fallback_models = ?config.fallback_models,
        max_concurrency = config.max_concurrency,
        retries = config.retries,
        has_openrouter_key = config.openrouter_api_key.is_some(),
        has_gemini_key = config.gemini_api_key.is_some()
    );

    let addr = config.bind_addr();
    let app = router(Arc::new(AppState::new(config, Arc::new(client))));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nbproxy=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("ctrl-c received, draining connections");
    }
}
