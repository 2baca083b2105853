//! Axum middleware for x402 payment protection
//!
//! The middleware is a thin adapter over [`PaymentGate`](crate::gate::PaymentGate):
//! it reads the `X-PAYMENT` header, hands the payload to the gate and maps the
//! outcome to an HTTP response.
//!
//! # Example
//!
//! ```no_run
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
//! # fn example() -> x402_gate::Result<()> {
//! let config = GatewayConfig::from_env()?;
//! let client = ResilientFacilitatorClient::from_config(&config)?;
//! let gate = Arc::new(PaymentGate::new(Arc::new(client), Arc::new(TracingDiagnostics)));
//! let requirements = config.requirements(Price::money("$0.01"), "https://api.example.com/joke")?;
//!
//! let app: Router = Router::new()
//!     .route("/joke", get(|| async { "Why do programmers prefer dark mode?" }))
//!     .layer(axum::middleware::from_fn_with_state(
//!         PaymentLayerState::new(gate, requirements),
//!         payment_middleware,
//!     ));
//! # Ok(())
//! # }
//! ```
//!
//! # Payment Flow
//!
//! 1. Request without a decodable X-PAYMENT header → 402 echoing the requirements
//! 2. Payment rejected by the facilitator → 402
//! 3. Payment valid → handler runs
//! 4. Handler answers with a non-2xx status → response returned, nothing settled
//! 5. Settlement fails → 402
//! 6. Settlement succeeds → handler response with X-PAYMENT-RESPONSE header

pub mod payment;

#[cfg(test)]
mod tests;

pub use payment::{payment_middleware, PaymentLayerState, PaymentResult};
