//! # x402-gate
//!
//! A payment gate for the x402 HTTP-native micropayment protocol.
//!
//! Priced endpoints answer `402 Payment Required` until the caller attaches a
//! signed payment authorization in the `X-PAYMENT` header. The gate
//! canonicalizes the payload, asks a remote facilitator to verify it, runs the
//! handler and finally settles the payment.
//!
//! ## Features
//!
//! - **Payload normalization**: EIP-55 addresses, base-10 integers, fixed-width
//!   nonces and canonical signatures, including ERC-6492 unwrapping
//! - **EIP-3009 and Permit2**: both authorization schemes, decided once at parse time
//! - **Resilient facilitator client**: classified retry on a fallback facilitator
//! - **Diagnostics hooks**: redacted per-request summaries, never raw signatures
//! - **Axum middleware** (`axum` feature, default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use std::sync::Arc;
//! use x402_gate::{
//!     diagnostics::TracingDiagnostics,
//!     facilitator::ResilientFacilitatorClient,
//!     gate::PaymentGate,
//!     middleware::{payment_middleware, PaymentLayerState},
//!     GatewayConfig, Price,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::from_env()?;
//!     let client = ResilientFacilitatorClient::from_config(&config)?;
//!     let gate = Arc::new(PaymentGate::new(Arc::new(client), Arc::new(TracingDiagnostics)));
//!     let requirements = config.requirements(Price::money("$0.01"), "http://localhost:4021/joke")?;
//!
//!     let app = Router::new()
//!         .route("/joke", get(|| async { "Why do programmers prefer dark mode?" }))
//!         .layer(axum::middleware::from_fn_with_state(
//!             PaymentLayerState::new(gate, requirements),
//!             payment_middleware,
//!         ));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:4021").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`types`**: Wire data structures and the network asset registry
//! - **`normalize`**: Pure canonicalization of payloads and signatures
//! - **`facilitator`**: Facilitator clients, failure classification and fallback
//! - **`diagnostics`**: Observer hooks and redacted summaries
//! - **`gate`**: The per-request verify, handle, settle pipeline
//! - **`middleware`**: Axum adapter
//! - **`config`**: Gateway configuration read once at start-up
//! - **`crypto`**: Coinbase CDP JWT credentials
//! - **`error`**: Error type

pub mod config;
pub mod crypto;
pub mod diagnostics;
pub mod error;
pub mod facilitator;
pub mod gate;
pub mod normalize;
pub mod types;

#[cfg(feature = "axum")]
pub mod middleware;

// Re-exports for convenience
pub use config::GatewayConfig;
pub use diagnostics::{DiagnosticsHooks, NoopDiagnostics, TracingDiagnostics};
pub use error::{Result, X402Error};
pub use facilitator::{FacilitatorClient, HttpFacilitatorClient, ResilientFacilitatorClient};
pub use gate::{GateError, PaymentGate, VerifiedPayment};
pub use types::*;

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
