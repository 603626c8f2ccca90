//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use geocam_core::VerificationEngine;

use crate::config::{Config, ConfigError};

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Verification engine shared by all requests
    pub engine: Arc<VerificationEngine>,
}

impl AppState {
    /// Build the engine described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut engine = VerificationEngine::with_params(config.stego_params()?)
            .map_err(ConfigError::StegoParams)?;
        if let Some(key) = config.trusted_key()? {
            tracing::info!(fingerprint = %key.fingerprint(), "Pinned trusted device key");
            engine = engine.with_trusted_key(key);
        }
        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            engine: Arc::new(VerificationEngine::new()),
        }
    }
}
