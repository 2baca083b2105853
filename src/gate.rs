//! Per-request payment pipeline
//!
//! [`PaymentGate`] drives one payment through
//! `Received -> Normalized -> BeforeVerify -> Verifying -> Verified`, then
//! `HandlerExecuting -> HandlerDone -> Settling -> Settled`. Verify and settle
//! failures end the pipeline with a [`GateError`] after exactly one
//! diagnostics hook call. The gate itself never retries; retries belong to the
//! facilitator client it is given.

use crate::diagnostics::{summarize_payload, DiagnosticsHooks, FailureEvent, Stage};
use crate::facilitator::{classify, legacy_message_class, FacilitatorClient, FailureClass};
use crate::normalize::{normalize_payment_payload, PayloadNormalization};
use crate::types::{PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};
use crate::X402Error;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Boxed error returned by a paid handler
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pipeline state, used for trace logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Received,
    Normalized,
    BeforeVerify,
    Verifying,
    Verified,
    VerifyFailed,
    HandlerExecuting,
    HandlerDone,
    Settling,
    Settled,
    SettleFailed,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Received => "received",
            GateState::Normalized => "normalized",
            GateState::BeforeVerify => "before_verify",
            GateState::Verifying => "verifying",
            GateState::Verified => "verified",
            GateState::VerifyFailed => "verify_failed",
            GateState::HandlerExecuting => "handler_executing",
            GateState::HandlerDone => "handler_done",
            GateState::Settling => "settling",
            GateState::Settled => "settled",
            GateState::SettleFailed => "settle_failed",
        }
    }
}

/// Pipeline failure
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Payment verification failed ({class}): {message}")]
    VerifyFailed {
        request_id: Uuid,
        class: FailureClass,
        reason: Option<String>,
        message: String,
        /// Set when the facilitator call itself failed
        #[source]
        source: Option<X402Error>,
    },

    #[error("Payment settlement failed ({class}): {message}")]
    SettleFailed {
        request_id: Uuid,
        class: FailureClass,
        reason: Option<String>,
        message: String,
        #[source]
        source: Option<X402Error>,
    },

    #[error("Handler failed: {0}")]
    Handler(#[source] BoxError),
}

impl GateError {
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            GateError::VerifyFailed { class, .. } | GateError::SettleFailed { class, .. } => {
                Some(*class)
            }
            GateError::Handler(_) => None,
        }
    }

    fn from_event(event: FailureEvent, source: Option<X402Error>) -> Self {
        let FailureEvent {
            request_id,
            stage,
            class,
            reason,
            message,
        } = event;
        match stage {
            Stage::Verify => GateError::VerifyFailed {
                request_id,
                class,
                reason,
                message,
                source,
            },
            Stage::Settle => GateError::SettleFailed {
                request_id,
                class,
                reason,
                message,
                source,
            },
        }
    }
}

/// A payment the facilitator accepted, ready to settle
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub request_id: Uuid,
    /// Normalized payload, sent as-is to settle
    pub payload: PaymentPayload,
    pub verification: VerifyResponse,
    pub normalization: PayloadNormalization,
}

/// Verify, run the handler, settle
#[derive(Clone)]
pub struct PaymentGate {
    client: Arc<dyn FacilitatorClient>,
    hooks: Arc<dyn DiagnosticsHooks>,
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGate")
            .field("facilitator", &self.client.endpoint())
            .finish()
    }
}

impl PaymentGate {
    pub fn new(client: Arc<dyn FacilitatorClient>, hooks: Arc<dyn DiagnosticsHooks>) -> Self {
        Self { client, hooks }
    }

    pub fn client(&self) -> &Arc<dyn FacilitatorClient> {
        &self.client
    }

    /// Normalize the payload in place
    pub fn prepare(&self, payload: &mut PaymentPayload) -> PayloadNormalization {
        normalize_payment_payload(payload)
    }

    /// Normalize the payload and verify it with the facilitator
    pub async fn verify(
        &self,
        mut payload: PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifiedPayment, GateError> {
        let request_id = Uuid::new_v4();
        transition(request_id, GateState::Received);

        let normalization = self.prepare(&mut payload);
        transition(request_id, GateState::Normalized);

        let summary = summarize_payload(request_id, &payload, requirements, Utc::now());
        self.hooks.before_verify(&summary);
        transition(request_id, GateState::BeforeVerify);

        transition(request_id, GateState::Verifying);
        match self.client.verify(&payload, requirements).await {
            Ok(verification) if verification.is_valid => {
                transition(request_id, GateState::Verified);
                Ok(VerifiedPayment {
                    request_id,
                    payload,
                    verification,
                    normalization,
                })
            }
            Ok(verification) => {
                let reason = verification.invalid_reason;
                let event = FailureEvent {
                    request_id,
                    stage: Stage::Verify,
                    class: rejection_class(reason.as_deref()),
                    message: reason
                        .clone()
                        .unwrap_or_else(|| "Payment verification failed".to_string()),
                    reason,
                };
                Err(self.fail(event, None))
            }
            Err(error) => Err(self.fail(error_event(request_id, Stage::Verify, &error), Some(error))),
        }
    }

    /// Settle a verified payment
    pub async fn settle(
        &self,
        verified: &VerifiedPayment,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, GateError> {
        let request_id = verified.request_id;
        transition(request_id, GateState::Settling);

        match self.client.settle(&verified.payload, requirements).await {
            Ok(settlement) if settlement.success => {
                transition(request_id, GateState::Settled);
                tracing::info!(
                    request_id = %request_id,
                    transaction = %settlement.transaction,
                    network = %settlement.network,
                    "Payment settled"
                );
                Ok(settlement)
            }
            Ok(settlement) => {
                let reason = settlement.error_reason;
                let event = FailureEvent {
                    request_id,
                    stage: Stage::Settle,
                    class: rejection_class(reason.as_deref()),
                    message: reason
                        .clone()
                        .unwrap_or_else(|| "Payment settlement failed".to_string()),
                    reason,
                };
                Err(self.fail(event, None))
            }
            Err(error) => Err(self.fail(error_event(request_id, Stage::Settle, &error), Some(error))),
        }
    }

    /// Run the whole pipeline around `handler`.
    ///
    /// The handler runs only after a successful verification; settlement runs
    /// only after the handler succeeded.
    pub async fn process<F, Fut, T, E>(
        &self,
        payload: PaymentPayload,
        requirements: &PaymentRequirements,
        handler: F,
    ) -> Result<(T, SettleResponse), GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let verified = self.verify(payload, requirements).await?;

        transition(verified.request_id, GateState::HandlerExecuting);
        let output = handler().await.map_err(|e| {
            tracing::warn!(request_id = %verified.request_id, "Handler failed, payment not settled");
            GateError::Handler(e.into())
        })?;
        transition(verified.request_id, GateState::HandlerDone);

        let settlement = self.settle(&verified, requirements).await?;
        Ok((output, settlement))
    }

    fn fail(&self, event: FailureEvent, source: Option<X402Error>) -> GateError {
        let state = match event.stage {
            Stage::Verify => {
                self.hooks.verify_failed(&event);
                GateState::VerifyFailed
            }
            Stage::Settle => {
                self.hooks.settle_failed(&event);
                GateState::SettleFailed
            }
        };
        transition(event.request_id, state);
        GateError::from_event(event, source)
    }
}

fn transition(request_id: Uuid, state: GateState) {
    tracing::trace!(request_id = %request_id, state = state.as_str(), "Payment state");
}

/// Class of a well-formed facilitator rejection
fn rejection_class(reason: Option<&str>) -> FailureClass {
    reason
        .and_then(|r| FailureClass::from_reason_code(r).or_else(|| legacy_message_class(r)))
        .unwrap_or(FailureClass::Other)
}

fn error_event(request_id: Uuid, stage: Stage, error: &X402Error) -> FailureEvent {
    FailureEvent {
        request_id,
        stage,
        class: classify(error),
        reason: error.reason_code().map(str::to_string),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::BeforeVerifyEvent;
    use crate::facilitator::tests::{
        create_test_payment_payload, create_test_payment_requirements, settled, MockFacilitator,
    };
    use crate::types::{IntegerField, PayloadKind, PayloadVariant};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHooks {
        before: Mutex<Vec<BeforeVerifyEvent>>,
        failures: Mutex<Vec<FailureEvent>>,
    }

    impl DiagnosticsHooks for RecordingHooks {
        fn before_verify(&self, event: &BeforeVerifyEvent) {
            self.before.lock().unwrap().push(event.clone());
        }

        fn verify_failed(&self, event: &FailureEvent) {
            self.failures.lock().unwrap().push(event.clone());
        }

        fn settle_failed(&self, event: &FailureEvent) {
            self.failures.lock().unwrap().push(event.clone());
        }
    }

    fn gate(facilitator: &Arc<MockFacilitator>, hooks: &Arc<RecordingHooks>) -> PaymentGate {
        PaymentGate::new(facilitator.clone(), hooks.clone())
    }

    fn rejected() -> crate::Result<VerifyResponse> {
        Ok(VerifyResponse {
            is_valid: false,
            invalid_reason: Some("insufficient_funds".to_string()),
            payer: None,
        })
    }

    #[tokio::test]
    async fn test_process_success() {
        let facilitator = Arc::new(MockFacilitator::new("primary"));
        let hooks = Arc::new(RecordingHooks::default());

        let (output, settlement) = gate(&facilitator, &hooks)
            .process(
                create_test_payment_payload(),
                &create_test_payment_requirements(),
                || async { Ok::<_, BoxError>("analysis") },
            )
            .await
            .unwrap();

        assert_eq!(output, "analysis");
        assert_eq!(settlement, settled());
        assert_eq!(facilitator.verify_count(), 1);
        assert_eq!(facilitator.settle_count(), 1);

        let before = hooks.before.lock().unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].variant, PayloadVariant::DirectAuthorization);
        assert!(hooks.failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payload_is_normalized_before_verify() {
        let facilitator = Arc::new(MockFacilitator::new("primary"));
        let hooks = Arc::new(RecordingHooks::default());

        let mut payload = create_test_payment_payload();
        if let PayloadKind::DirectAuthorization(auth) = &mut payload.payload.kind {
            auth.to = auth.to.as_ref().map(|to| to.to_lowercase());
            auth.value = Some(IntegerField::from("0x2710"));
        }

        let verified = gate(&facilitator, &hooks)
            .verify(payload, &create_test_payment_requirements())
            .await
            .unwrap();

        assert!(verified.normalization.record_changed);
        let seen = facilitator.seen.lock().unwrap();
        assert_eq!(seen[0].0, create_test_payment_payload());
        assert_eq!(verified.payload, create_test_payment_payload());
        assert_eq!(hooks.before.lock().unwrap()[0].value_matches_amount, Some(true));
    }

    #[tokio::test]
    async fn test_invalid_verification_fails_once() {
        let facilitator = Arc::new(MockFacilitator::new("primary").verifying(rejected));
        let hooks = Arc::new(RecordingHooks::default());

        let error = gate(&facilitator, &hooks)
            .process(
                create_test_payment_payload(),
                &create_test_payment_requirements(),
                || async { Ok::<_, BoxError>(()) },
            )
            .await
            .unwrap_err();

        match error {
            GateError::VerifyFailed {
                class,
                reason,
                source,
                ..
            } => {
                assert_eq!(class, FailureClass::InsufficientFunds);
                assert_eq!(reason.as_deref(), Some("insufficient_funds"));
                assert!(source.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let failures = hooks.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, Stage::Verify);
        assert_eq!(facilitator.settle_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_error_fails_once() {
        let facilitator = Arc::new(
            MockFacilitator::new("primary")
                .verifying(|| Err(X402Error::facilitator("invalid_payload", "bad body"))),
        );
        let hooks = Arc::new(RecordingHooks::default());

        let error = gate(&facilitator, &hooks)
            .verify(create_test_payment_payload(), &create_test_payment_requirements())
            .await
            .unwrap_err();

        assert_eq!(error.class(), Some(FailureClass::InvalidPayload));
        assert!(std::error::Error::source(&error).is_some());
        assert_eq!(hooks.failures.lock().unwrap().len(), 1);
        assert_eq!(facilitator.verify_count(), 1);
    }

    #[tokio::test]
    async fn test_handler_error_skips_settlement() {
        let facilitator = Arc::new(MockFacilitator::new("primary"));
        let hooks = Arc::new(RecordingHooks::default());

        let error = gate(&facilitator, &hooks)
            .process(
                create_test_payment_payload(),
                &create_test_payment_requirements(),
                || async { Err::<(), _>("model unavailable") },
            )
            .await
            .unwrap_err();

        assert!(matches!(error, GateError::Handler(_)));
        assert_eq!(facilitator.verify_count(), 1);
        assert_eq!(facilitator.settle_count(), 0);
        assert!(hooks.failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settlement_failure_fires_hook() {
        let facilitator = Arc::new(MockFacilitator::new("primary").settling(|| {
            Ok(SettleResponse {
                success: false,
                error_reason: Some("invalid_exact_evm_payload_signature".to_string()),
                ..settled()
            })
        }));
        let hooks = Arc::new(RecordingHooks::default());

        let error = gate(&facilitator, &hooks)
            .process(
                create_test_payment_payload(),
                &create_test_payment_requirements(),
                || async { Ok::<_, BoxError>(()) },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            GateError::SettleFailed {
                class: FailureClass::InvalidSignature,
                ..
            }
        ));
        let failures = hooks.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, Stage::Settle);
    }

    #[tokio::test]
    async fn test_settlement_error_is_classified() {
        let facilitator = Arc::new(
            MockFacilitator::new("primary")
                .settling(|| Err(X402Error::facilitator_error("request timed out"))),
        );
        let hooks = Arc::new(RecordingHooks::default());
        let gate = gate(&facilitator, &hooks);
        let requirements = create_test_payment_requirements();

        let verified = gate
            .verify(create_test_payment_payload(), &requirements)
            .await
            .unwrap();
        let error = gate.settle(&verified, &requirements).await.unwrap_err();

        assert_eq!(error.class(), Some(FailureClass::Timeout));
        assert_eq!(hooks.failures.lock().unwrap()[0].request_id, verified.request_id);
    }
}
