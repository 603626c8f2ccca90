//! GeoCam Server - HTTP verification service
//!
//! Endpoints:
//! - POST /api/verify-image - Verify the payload hidden in an image
//! - GET  /health - Health check
//! - GET  /ready - Readiness probe

use std::net::SocketAddr;

use geocam_server::{create_router_with_config, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("geocam_server=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    let addr = config.socket_addr();
    let app = create_router_with_config(&config)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        body_limit_mb = config.body_limit_mb,
        stego_t = config.stego_t,
        "GeoCam verification server listening"
    );

    // Peer addresses are needed by the rate limiter's key extractor
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
