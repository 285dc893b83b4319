//! # Relay Errors
//!
//! Error types for the relay module.

use thiserror::Error;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Relay errors
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    // ==================
    // Registration Errors
    // ==================
    /// A client with this id is already registered
    #[error("Client already registered: {0}")]
    ClientExists(String),

    // ==================
    // Delivery Errors
    // ==================
    /// The downstream consumer is gone
    #[error("Client disconnected")]
    ClientGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::ClientExists("client_1".to_string());
        assert_eq!(err.to_string(), "Client already registered: client_1");

        let err = RelayError::ClientGone;
        assert_eq!(err.to_string(), "Client disconnected");
    }
}
