//! Failure classification for facilitator errors
//!
//! [`classify`] is the only place that decides what kind of failure an error
//! represents. Structured data (reason code, HTTP status, error variant) is
//! consulted first; matching on the human-readable message is a compatibility
//! shim for facilitators that only send free text.

use crate::X402Error;
use serde::Serialize;

/// What went wrong with a facilitator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The facilitator could not interpret the payload format
    InvalidPayload,
    InvalidSignature,
    InsufficientFunds,
    Unauthorized,
    Timeout,
    UnsupportedScheme,
    /// Transport failure before an answer was received
    Network,
    Other,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::InvalidPayload => "invalid_payload",
            FailureClass::InvalidSignature => "invalid_signature",
            FailureClass::InsufficientFunds => "insufficient_funds",
            FailureClass::Unauthorized => "unauthorized",
            FailureClass::Timeout => "timeout",
            FailureClass::UnsupportedScheme => "unsupported_scheme",
            FailureClass::Network => "network",
            FailureClass::Other => "other",
        }
    }

    /// Whether a verify or settle failure of this class is retried on the fallback
    pub fn retries_on_fallback(&self) -> bool {
        matches!(self, FailureClass::InvalidPayload)
    }

    /// Map a facilitator reason code such as `invalid_payload`
    pub fn from_reason_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase().replace('-', "_");

        let class = match code.as_str() {
            "invalid_payload"
            | "invalid_payment_payload"
            | "invalid_payment"
            | "malformed_payload"
            | "invalid_request"
            | "invalid_x402_version" => FailureClass::InvalidPayload,
            "insufficient_funds" => FailureClass::InsufficientFunds,
            "unsupported_scheme" | "invalid_scheme" | "invalid_network" => {
                FailureClass::UnsupportedScheme
            }
            "unauthorized" | "forbidden" | "invalid_api_key" => FailureClass::Unauthorized,
            "timeout" | "request_timeout" => FailureClass::Timeout,
            _ if code.contains("signature") => FailureClass::InvalidSignature,
            _ => return None,
        };
        Some(class)
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error returned by a facilitator client
pub fn classify(error: &X402Error) -> FailureClass {
    match error {
        X402Error::Facilitator {
            status,
            reason,
            message,
        } => reason
            .as_deref()
            .and_then(FailureClass::from_reason_code)
            .or_else(|| status.and_then(status_class))
            .or_else(|| legacy_message_class(message))
            .unwrap_or(FailureClass::Other),
        X402Error::Timeout { .. } => FailureClass::Timeout,
        X402Error::Http(e) if e.is_timeout() => FailureClass::Timeout,
        X402Error::Http(e) if e.is_decode() => FailureClass::InvalidPayload,
        X402Error::Http(_) => FailureClass::Network,
        X402Error::Json(_) | X402Error::Base64(_) | X402Error::InvalidPaymentPayload { .. } => {
            FailureClass::InvalidPayload
        }
        X402Error::NetworkNotSupported { .. } => FailureClass::UnsupportedScheme,
        X402Error::Config { .. } | X402Error::InvalidPaymentRequirements { .. } => {
            FailureClass::Other
        }
    }
}

fn status_class(status: u16) -> Option<FailureClass> {
    match status {
        401 | 403 => Some(FailureClass::Unauthorized),
        402 => Some(FailureClass::InsufficientFunds),
        408 | 504 => Some(FailureClass::Timeout),
        _ => None,
    }
}

/// Classify a free-text error message.
///
/// Specific failure kinds are checked before the payload format patterns so
/// that a message like "invalid payload signature" is never retried.
pub fn legacy_message_class(message: &str) -> Option<FailureClass> {
    let message = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|needle| message.contains(needle));

    if has(&["signature"]) {
        Some(FailureClass::InvalidSignature)
    } else if has(&["insufficient funds", "insufficient_funds", "insufficient balance"]) {
        Some(FailureClass::InsufficientFunds)
    } else if has(&["unauthorized", "forbidden", "api key"]) {
        Some(FailureClass::Unauthorized)
    } else if has(&["timeout", "timed out"]) {
        Some(FailureClass::Timeout)
    } else if has(&["unsupported scheme", "unsupported network", "unsupported_scheme"]) {
        Some(FailureClass::UnsupportedScheme)
    } else if has(&[
        "invalid payload",
        "invalid_payload",
        "invalidpayload",
        "malformed",
        "unexpected token",
        "json",
        "parse error",
        "failed to parse",
    ]) {
        Some(FailureClass::InvalidPayload)
    } else {
        None
    }
}
