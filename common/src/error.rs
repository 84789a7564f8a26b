use std::io;
use thiserror::Error;

use crate::config::ConfigError;

/// Core error taxonomy for the gateway. Per-connection faults (framing
/// corruption, duplicate sessions, socket failures) are contained inside the
/// engine and never escape as errors; this type covers the operations that
/// do surface a `Result` to embedding code.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Errors raised while loading or validating configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to message framing, reported out-of-band
    #[error("Framing error: {0}")]
    Framing(String),

    /// Errors related to session resolution
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors from the underlying transport
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err = ConfigError::Validation("bad value".to_string());
        let gateway: GatewayError = err.into();
        assert!(matches!(gateway, GatewayError::Config(_)));
        assert!(gateway.to_string().contains("bad value"));
    }

    #[test]
    fn test_io_error_conversion() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let gateway: GatewayError = err.into();
        assert!(matches!(gateway, GatewayError::Io(_)));
    }
}
