//! Core types for the x402 protocol
//!
//! # Architecture
//!
//! - [`network`] - Static network asset registry (chain id to token metadata)
//! - [`payment`] - Payment requirements and payload structures
//! - [`facilitator`] - Facilitator configuration and response types
//! - [`constants`] - Protocol constants (schemes, headers, operation keys)
//!
//! # Examples
//!
//! ## Creating Payment Requirements
//!
//! ```
//! use x402_gate::types::{PaymentRequirements, Price};
//!
//! # fn example() -> x402_gate::Result<()> {
//! let requirements = PaymentRequirements::new(
//!     "0x209693Bc6afc0C5328bA36FaF03C514EF312287C", // recipient
//!     Price::money("$0.01"),                        // price
//!     "eip155:84532",                               // network
//!     "https://api.example.com/resource",           // resource URL
//! )
//! .with_description("API access payment")
//! .with_resolved_price()?;
//!
//! assert_eq!(requirements.required_amount(), Some("10000"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Decoding a Payment Header
//!
//! ```no_run
//! use x402_gate::types::{PaymentPayload, PayloadVariant};
//!
//! # fn example(header: &str) -> x402_gate::Result<()> {
//! let payload = PaymentPayload::from_base64(header)?;
//! match payload.variant() {
//!     PayloadVariant::DirectAuthorization => println!("EIP-3009"),
//!     PayloadVariant::DelegatedPermit => println!("Permit2"),
//!     PayloadVariant::Transaction | PayloadVariant::Unknown => println!("pass-through"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod facilitator;
pub mod network;
pub mod payment;

// Re-export commonly used types
pub use constants::{headers, operations, schemes};
pub use facilitator::{
    AuthHeadersFn, AuthHeadersFnArc, AuthHeadersFnBox, FacilitatorConfig, OperationHeaders,
    SettleResponse, SupportedKind, SupportedKinds, VerifyResponse,
};
pub use network::NetworkAsset;
pub use payment::{
    AcceptedRequirements, AssetAmount, DelegatedPermit, DirectAuthorization, ExactPayload,
    IntegerField, PayloadKind, PayloadVariant, PaymentPayload, PaymentRequirements,
    PaymentRequirementsResponse, PermitWitness, Price, TokenPermissions, X402_VERSION,
};
