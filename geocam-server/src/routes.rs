//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, ConfigError};
use crate::handlers::{health, ready, verify_image_handler};
use crate::state::AppState;

/// Create the application router with default config (for testing)
pub fn create_router() -> Router {
    create_router_with_state(&Config::default(), AppState::default())
}

/// Create the application router with custom configuration
pub fn create_router_with_config(config: &Config) -> Result<Router, ConfigError> {
    let state = AppState::from_config(config)?;
    let router = create_router_with_state(config, state);

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting: DISABLED");
        return Ok(router);
    }

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_sec)
        .burst_size(config.rate_limit_burst)
        .finish()
        .ok_or(ConfigError::RateLimit {
            per_sec: config.rate_limit_per_sec,
            burst: config.rate_limit_burst,
        })?;

    tracing::info!(
        "Rate limiting: {} req/s (burst: {})",
        config.rate_limit_per_sec,
        config.rate_limit_burst
    );

    Ok(router.layer(GovernorLayer::new(Arc::new(governor_conf))))
}

/// Create the application router around an existing state, without rate limiting
pub fn create_router_with_state(config: &Config, state: AppState) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit, replacing the extractor's smaller built-in default
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    Router::new()
        .route("/api/verify-image", post(verify_image_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::disable())
        .layer(body_limit)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
}
