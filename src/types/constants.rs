//! Common constants for schemes and headers

/// Common payment schemes
pub mod schemes {
    /// Exact payment scheme
    pub const EXACT: &str = "exact";
}

/// HTTP header names used by the protocol
pub mod headers {
    /// Inbound payment header (base64 JSON payload)
    pub const X_PAYMENT: &str = "X-PAYMENT";
    /// Outbound settlement header (base64 JSON settle response)
    pub const X_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";
}

/// Auth header factory keys, one per facilitator operation
pub mod operations {
    pub const VERIFY: &str = "verify";
    pub const SETTLE: &str = "settle";
    pub const SUPPORTED: &str = "supported";
}
