//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;

use geocam_core::stego::DEFAULT_T;
use geocam_core::{GeoCamError, PublicKey, SignatureAlgorithm, StegoParams};
use thiserror::Error;

/// Configuration that cannot be turned into a running router
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid STEGO_T: {0}")]
    StegoParams(#[source] GeoCamError),

    #[error("invalid TRUSTED_PUBLIC_KEY: {0}")]
    TrustedKey(#[source] GeoCamError),

    #[error("invalid rate limit: {per_sec} req/s, burst {burst}")]
    RateLimit { per_sec: u64, burst: u32 },
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 5000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 20)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// Bits per alpha symbol used to decode uploads (default: 3)
    pub stego_t: u8,
    /// Pinned device public key, base64
    pub trusted_public_key: Option<String>,
    /// Algorithm of the pinned key (default: Ed25519)
    pub trusted_key_algorithm: SignatureAlgorithm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 20,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            stego_t: DEFAULT_T,
            trusted_public_key: None,
            trusted_key_algorithm: SignatureAlgorithm::Ed25519,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or([127, 0, 0, 1]);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let body_limit_mb = std::env::var("BODY_LIMIT_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        let timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let rate_limit_per_sec = std::env::var("RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let rate_limit_burst = std::env::var("RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let stego_t = std::env::var("STEGO_T")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_T);

        let trusted_public_key = std::env::var("TRUSTED_PUBLIC_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let trusted_key_algorithm = std::env::var("TRUSTED_KEY_ALGORITHM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(SignatureAlgorithm::Ed25519);

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb,
            timeout_secs,
            rate_limit_enabled,
            rate_limit_per_sec,
            rate_limit_burst,
            stego_t,
            trusted_public_key,
            trusted_key_algorithm,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn stego_params(&self) -> Result<StegoParams, ConfigError> {
        StegoParams::with_t(self.stego_t).map_err(ConfigError::StegoParams)
    }

    /// Decode the pinned device key, if one is configured.
    pub fn trusted_key(&self) -> Result<Option<PublicKey>, ConfigError> {
        self.trusted_public_key
            .as_deref()
            .map(|encoded| PublicKey::from_base64(self.trusted_key_algorithm, encoded))
            .transpose()
            .map_err(ConfigError::TrustedKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.body_limit_mb, 20);
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:5000");
        assert!(config.trusted_key().unwrap().is_none());
    }

    #[test]
    fn test_invalid_stego_t_rejected() {
        let config = Config {
            stego_t: 9,
            ..Config::default()
        };
        assert!(matches!(
            config.stego_params(),
            Err(ConfigError::StegoParams(_))
        ));
    }

    #[test]
    fn test_invalid_trusted_key_rejected() {
        let config = Config {
            trusted_public_key: Some("AAAA".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.trusted_key(),
            Err(ConfigError::TrustedKey(_))
        ));
    }
}
