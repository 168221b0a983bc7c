use thiserror::Error;

/// Top-level error type for the Carepath system.
///
/// Subsystem crates define their own error types and implement
/// `From<CarepathError>` so that the `?` operator works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CarepathError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed backend payload: {0}")]
    MalformedPayload(String),

    #[error("Handoff error: {0}")]
    Handoff(String),
}

impl From<toml::de::Error> for CarepathError {
    fn from(err: toml::de::Error) -> Self {
        CarepathError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CarepathError {
    fn from(err: toml::ser::Error) -> Self {
        CarepathError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CarepathError {
    fn from(err: serde_json::Error) -> Self {
        CarepathError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Carepath operations.
pub type Result<T> = std::result::Result<T, CarepathError>;
