//! GeoCam Server Library - HTTP verification service for GeoCam images
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use routes::{create_router, create_router_with_config, create_router_with_state};
pub use state::AppState;
