use thiserror::Error;

/// Maximum accepted size of a raw payload read from any carrier (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum GeoCamError {
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("Capacity exceeded: payload needs {required} symbols, image holds {capacity}")]
    CapacityExceeded { required: usize, capacity: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Image load failure: {0}")]
    ImageLoadFailure(String),

    #[error("Image encode failure: {0}")]
    ImageEncodeFailure(String),

    #[error("No payload found")]
    PayloadNotFound,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Encode host did not respond within {timeout_ms}ms")]
    HostTimeout { timeout_ms: u64 },

    #[error("Encode host failure: {0}")]
    HostFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GeoCamError>;
