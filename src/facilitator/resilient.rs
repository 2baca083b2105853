//! Primary plus fallback facilitator composition
//!
//! Verify and settle are retried once on the fallback, and only when the
//! primary rejected the payload format. Listing supported kinds falls back on
//! any primary failure. The fallback is always called after the primary
//! failed, never in parallel.

use super::classify::classify;
use super::{FacilitatorClient, HttpFacilitatorClient};
use crate::config::GatewayConfig;
use crate::types::{
    operations, PaymentPayload, PaymentRequirements, SettleResponse, SupportedKinds,
    VerifyResponse,
};
use crate::{Result, X402Error};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Facilitator client with a classified-retry fallback
#[derive(Clone)]
pub struct ResilientFacilitatorClient {
    primary: Arc<dyn FacilitatorClient>,
    fallback: Option<Arc<dyn FacilitatorClient>>,
    /// Bound on primary and fallback together
    call_timeout: Option<Duration>,
}

impl std::fmt::Debug for ResilientFacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFacilitatorClient")
            .field("primary", &self.primary.endpoint())
            .field("fallback", &self.fallback.as_ref().map(|c| c.endpoint()))
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ResilientFacilitatorClient {
    /// Wrap a primary client without fallback
    pub fn new(primary: Arc<dyn FacilitatorClient>) -> Self {
        Self {
            primary,
            fallback: None,
            call_timeout: None,
        }
    }

    /// Build HTTP clients for the configured primary and fallback facilitators
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let primary = HttpFacilitatorClient::new(config.primary.clone())?;
        let mut client = Self::new(Arc::new(primary));

        if let Some(fallback) = &config.fallback {
            client = client.with_fallback(Arc::new(HttpFacilitatorClient::new(fallback.clone())?));
        }
        if let Some(timeout) = config.call_timeout {
            client = client.with_call_timeout(timeout);
        }

        Ok(client)
    }

    /// Set the fallback client
    pub fn with_fallback(mut self, fallback: Arc<dyn FacilitatorClient>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Bound each operation, fallback included
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn primary(&self) -> &Arc<dyn FacilitatorClient> {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&Arc<dyn FacilitatorClient>> {
        self.fallback.as_ref()
    }

    /// The fallback to retry a verify or settle failure on, if the failure qualifies
    fn fallback_for(
        &self,
        operation: &'static str,
        error: &X402Error,
    ) -> Option<&Arc<dyn FacilitatorClient>> {
        let fallback = self.fallback.as_ref()?;
        let class = classify(error);

        if !class.retries_on_fallback() {
            tracing::debug!(
                operation,
                class = class.as_str(),
                "Facilitator failure not retried on fallback"
            );
            return None;
        }

        tracing::warn!(
            operation,
            primary = self.primary.endpoint(),
            fallback = fallback.endpoint(),
            class = class.as_str(),
            reason = error.reason_code().unwrap_or("none"),
            "Primary facilitator rejected payload format, retrying on fallback"
        );
        Some(fallback)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let Some(after) = self.call_timeout else {
            return call.await;
        };

        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout_ms = after.as_millis() as u64, "Facilitator call timed out");
                Err(X402Error::Timeout { operation, after })
            }
        }
    }
}

#[async_trait]
impl FacilitatorClient for ResilientFacilitatorClient {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse> {
        self.bounded(operations::VERIFY, async {
            let error = match self.primary.verify(payload, requirements).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            match self.fallback_for(operations::VERIFY, &error) {
                Some(fallback) => fallback.verify(payload, requirements).await,
                None => Err(error),
            }
        })
        .await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse> {
        self.bounded(operations::SETTLE, async {
            let error = match self.primary.settle(payload, requirements).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            match self.fallback_for(operations::SETTLE, &error) {
                Some(fallback) => fallback.settle(payload, requirements).await,
                None => Err(error),
            }
        })
        .await
    }

    async fn supported(&self) -> Result<SupportedKinds> {
        self.bounded(operations::SUPPORTED, async {
            let error = match self.primary.supported().await {
                Ok(kinds) => return Ok(kinds),
                Err(error) => error,
            };
            let Some(fallback) = &self.fallback else {
                return Err(error);
            };

            tracing::warn!(
                primary = self.primary.endpoint(),
                fallback = fallback.endpoint(),
                class = classify(&error).as_str(),
                "Listing supported kinds on fallback facilitator"
            );
            fallback.supported().await
        })
        .await
    }

    fn endpoint(&self) -> &str {
        self.primary.endpoint()
    }
}
