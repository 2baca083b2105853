//! Error types for the x402 gate

use std::time::Duration;
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, X402Error>;

/// Errors produced by facilitator calls, configuration and payload decoding
#[derive(Debug, Error)]
pub enum X402Error {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The facilitator answered with a non-success status
    #[error("Facilitator error: {message}")]
    Facilitator {
        /// HTTP status returned by the facilitator, if any
        status: Option<u16>,
        /// Machine-readable reason code (`invalidReason`, `errorReason`, ...)
        reason: Option<String>,
        /// Human-readable message
        message: String,
    },

    /// The inbound payment header could not be decoded
    #[error("Invalid payment payload: {message}")]
    InvalidPaymentPayload { message: String },

    /// Payment requirements could not be built
    #[error("Invalid payment requirements: {message}")]
    InvalidPaymentRequirements { message: String },

    /// Network not present in the asset registry
    #[error("Network not supported: {network}")]
    NetworkNotSupported { network: String },

    /// A facilitator call did not complete in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Transport failure talking to the facilitator
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding failure
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl X402Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a facilitator error without status or reason code
    pub fn facilitator_error(message: impl Into<String>) -> Self {
        Self::Facilitator {
            status: None,
            reason: None,
            message: message.into(),
        }
    }

    /// Create a facilitator error carrying a reason code
    pub fn facilitator(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Facilitator {
            status: None,
            reason: Some(reason.into()),
            message: message.into(),
        }
    }

    /// Create an invalid payment payload error
    pub fn invalid_payment_payload(message: impl Into<String>) -> Self {
        Self::InvalidPaymentPayload {
            message: message.into(),
        }
    }

    /// Create an invalid payment requirements error
    pub fn invalid_payment_requirements(message: impl Into<String>) -> Self {
        Self::InvalidPaymentRequirements {
            message: message.into(),
        }
    }

    /// Reason code attached by the facilitator, if any
    pub fn reason_code(&self) -> Option<&str> {
        match self {
            Self::Facilitator { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}
