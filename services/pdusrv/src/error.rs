//! Error handling for the PDU service
//!
//! Transport faults pass through unchanged. Everything else is either a
//! console protocol condition (login state), a report that did not match
//! the grammar, or a bad identifier or call order from the caller.

use thiserror::Error;

use crate::core::transport::TransportError;

/// PDU Service Error Type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PduError {
    /// Connect, read or write failure on the console stream
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The console dropped back to its login screen
    #[error("login required")]
    LoginRequired,

    /// The console rejected the credentials
    #[error("invalid password")]
    InvalidPassword,

    /// A report section did not match the grammar
    #[error("failed to decode: {0}")]
    Decode(String),

    #[error("invalid outlet ID: {0}")]
    InvalidOutletId(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// No snapshot has been fetched yet
    #[error("status has not been polled yet")]
    NotPolledYet,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for the PDU service
pub type Result<T> = std::result::Result<T, PduError>;

impl PduError {
    pub fn decode(section: impl Into<String>) -> Self {
        PduError::Decode(section.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PduError::Config(msg.into())
    }

    /// Errors a fresh login can clear
    pub fn is_auth(&self) -> bool {
        matches!(self, PduError::LoginRequired | PduError::InvalidPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_pass_through() {
        let inner = TransportError::ConnectionLost("Connection closed by peer".to_string());
        let err: PduError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
        assert_eq!(err, PduError::Transport(inner));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PduError::decode("breakers").to_string(),
            "failed to decode: breakers"
        );
        assert!(PduError::LoginRequired.is_auth());
        assert!(!PduError::NotPolledYet.is_auth());
    }
}
