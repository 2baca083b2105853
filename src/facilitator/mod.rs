//! Facilitator clients for payment verification and settlement
//!
//! A facilitator is the remote service that checks a signed payment
//! authorization and later executes it on chain. This crate only talks to it.
//!
//! # Architecture
//!
//! - [`FacilitatorClient`] - The three operations every facilitator offers
//! - [`HttpFacilitatorClient`] - JSON over HTTP implementation
//! - [`resilient`] - Primary plus fallback composition with classified retry
//! - [`classify`] - Maps errors onto a structured [`FailureClass`]
//! - [`coinbase`] - Coinbase CDP facilitator credentials
//!
//! # Examples
//!
//! ```no_run
//! use x402_gate::facilitator::{FacilitatorClient, HttpFacilitatorClient, ResilientFacilitatorClient};
//! use x402_gate::types::FacilitatorConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> x402_gate::Result<()> {
//! let primary = HttpFacilitatorClient::new(FacilitatorConfig::new("https://x402.org/facilitator"))?;
//! let fallback = HttpFacilitatorClient::new(FacilitatorConfig::new("https://backup.example.com"))?;
//!
//! let client = ResilientFacilitatorClient::new(Arc::new(primary)).with_fallback(Arc::new(fallback));
//! let supported = client.supported().await?;
//! println!("Supported kinds: {:?}", supported.kinds);
//! # Ok(())
//! # }
//! ```

use crate::types::{
    operations, FacilitatorConfig, PaymentPayload, PaymentRequirements, SettleResponse,
    SupportedKinds, VerifyResponse, X402_VERSION,
};
use crate::{Result, X402Error};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;

pub mod classify;
pub mod coinbase;
pub mod resilient;


pub use classify::{classify, legacy_message_class, FailureClass};
pub use resilient::ResilientFacilitatorClient;

/// Default facilitator URL
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Body keys that may carry a machine-readable reason code, in priority order
const REASON_KEYS: [&str; 3] = ["invalidReason", "errorReason", "error"];

/// A remote verification and settlement service
#[async_trait]
pub trait FacilitatorClient: Send + Sync {
    /// Verify a payment without executing it
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse>;

    /// Settle a verified payment
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse>;

    /// Payment kinds the facilitator accepts
    async fn supported(&self) -> Result<SupportedKinds>;

    /// Base URL, used to name the endpoint in logs
    fn endpoint(&self) -> &str;
}

/// Facilitator client speaking JSON over HTTP
#[derive(Clone)]
pub struct HttpFacilitatorClient {
    /// Base URL of the facilitator service
    url: String,
    /// HTTP client
    client: Client,
    /// Configuration for authentication headers
    auth_config: Option<crate::types::AuthHeadersFnArc>,
}

impl std::fmt::Debug for HttpFacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFacilitatorClient")
            .field("url", &self.url)
            .field("auth_config", &"<function>")
            .finish()
    }
}

impl HttpFacilitatorClient {
    /// Create a new facilitator client
    pub fn new(config: FacilitatorConfig) -> Result<Self> {
        config.validate()?;

        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            client,
            auth_config: config.create_auth_headers,
        })
    }

    /// Get the base URL of this facilitator
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_payment<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<T> {
        let request_body = json!({
            "x402Version": X402_VERSION,
            "paymentPayload": payload,
            "paymentRequirements": requirements,
        });

        let request = self
            .client
            .post(format!("{}/{}", self.url, operation))
            .json(&request_body);

        self.send(operation, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let mut request = request;
        for (key, value) in self.operation_headers(operation)? {
            request = request.header(key, value);
        }

        tracing::debug!(endpoint = %self.url, operation, "Sending facilitator request");

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error = error_from_response(operation, status, &body);
            tracing::warn!(
                endpoint = %self.url,
                operation,
                status = status.as_u16(),
                reason = error.reason_code().unwrap_or("none"),
                "Facilitator request failed"
            );
            return Err(error);
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn operation_headers(&self, operation: &str) -> Result<HashMap<String, String>> {
        let Some(auth_config) = &self.auth_config else {
            return Ok(HashMap::new());
        };
        let mut headers = auth_config()?;
        Ok(headers.remove(operation).unwrap_or_default())
    }
}

#[async_trait]
impl FacilitatorClient for HttpFacilitatorClient {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse> {
        self.post_payment(operations::VERIFY, payload, requirements)
            .await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse> {
        self.post_payment(operations::SETTLE, payload, requirements)
            .await
    }

    async fn supported(&self) -> Result<SupportedKinds> {
        let request = self
            .client
            .get(format!("{}/{}", self.url, operations::SUPPORTED));
        self.send(operations::SUPPORTED, request).await
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Build the error for a non-success facilitator response.
///
/// The body is only mined for a reason code and a short message.
fn error_from_response(operation: &str, status: StatusCode, body: &str) -> X402Error {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let reason = parsed.as_ref().and_then(|value| {
        REASON_KEYS
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    });

    let detail = parsed
        .as_ref()
        .and_then(|value| value.get("message").and_then(Value::as_str))
        .or(reason.as_deref())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status"));

    let message = format!("{} failed with status {}: {}", operation, status.as_u16(), detail);

    X402Error::Facilitator {
        status: Some(status.as_u16()),
        reason,
        message,
    }
}
