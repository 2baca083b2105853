//! Credentials for authenticated facilitators
//!
//! - [`jwt`] - Per-request JWT generation for the Coinbase CDP facilitator
//!
//! # Examples
//!
//! ```
//! use x402_gate::crypto::jwt;
//!
//! # fn example() -> x402_gate::Result<()> {
//! let auth_header = jwt::create_auth_header_with_method(
//!     "api_key_id",
//!     "api_key_secret",
//!     "POST",
//!     "api.cdp.coinbase.com",
//!     "/platform/v2/x402/verify",
//! )?;
//! assert!(auth_header.starts_with("Bearer "));
//! # Ok(())
//! # }
//! ```

pub mod jwt;

#[cfg(test)]
mod tests;

pub use jwt::{create_auth_header_with_method, generate_jwt, JwtOptions};
