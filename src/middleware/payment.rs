//! Payment middleware implementation

use crate::gate::{GateError, PaymentGate};
use crate::types::{
    headers, PaymentPayload, PaymentRequirements, PaymentRequirementsResponse, SettleResponse,
};
use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Shared state of the payment middleware for one priced route
#[derive(Debug, Clone)]
pub struct PaymentLayerState {
    pub gate: Arc<PaymentGate>,
    pub requirements: Arc<PaymentRequirements>,
}

/// Payment processing result
#[derive(Debug)]
pub enum PaymentResult {
    /// Payment verified and settled successfully
    Success {
        response: Response,
        settlement: SettleResponse,
    },
    /// Header missing or undecodable (402 response)
    PaymentRequired { response: Response },
    /// Payment verification failed (402 response)
    VerificationFailed { response: Response },
    /// Handler answered with a non-success status; nothing was settled
    HandlerFailed { response: Response },
    /// Payment settlement failed (402 response)
    SettlementFailed { response: Response },
}

impl IntoResponse for PaymentResult {
    fn into_response(self) -> Response {
        match self {
            PaymentResult::Success { response, .. }
            | PaymentResult::PaymentRequired { response }
            | PaymentResult::VerificationFailed { response }
            | PaymentResult::HandlerFailed { response }
            | PaymentResult::SettlementFailed { response } => response,
        }
    }
}

impl PaymentLayerState {
    pub fn new(gate: Arc<PaymentGate>, requirements: PaymentRequirements) -> Self {
        Self {
            gate,
            requirements: Arc::new(requirements),
        }
    }

    /// Run the payment pipeline around the inner handler
    pub async fn process_payment(&self, request: Request, next: Next) -> PaymentResult {
        let header = request
            .headers()
            .get(headers::X_PAYMENT)
            .map(|value| value.to_str().map(str::to_string));

        let encoded = match header {
            Some(Ok(encoded)) => encoded,
            Some(Err(_)) => {
                return PaymentResult::PaymentRequired {
                    response: self.payment_required("Invalid X-PAYMENT header"),
                }
            }
            None => {
                return PaymentResult::PaymentRequired {
                    response: self.payment_required("X-PAYMENT header is required"),
                }
            }
        };

        let payload = match PaymentPayload::from_base64(&encoded) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "Undecodable payment header");
                return PaymentResult::PaymentRequired {
                    response: self.payment_required("Failed to decode payment header"),
                };
            }
        };

        let verified = match self.gate.verify(payload, &self.requirements).await {
            Ok(verified) => verified,
            Err(e) => {
                return PaymentResult::VerificationFailed {
                    response: self.payment_required(failure_message(&e)),
                }
            }
        };

        let mut response = next.run(request).await;
        if !response.status().is_success() {
            tracing::info!(
                request_id = %verified.request_id,
                status = response.status().as_u16(),
                "Handler did not succeed, payment not settled"
            );
            return PaymentResult::HandlerFailed { response };
        }

        let settlement = match self.gate.settle(&verified, &self.requirements).await {
            Ok(settlement) => settlement,
            Err(e) => {
                return PaymentResult::SettlementFailed {
                    response: self.payment_required(failure_message(&e)),
                }
            }
        };

        let header_value = settlement
            .to_base64()
            .ok()
            .and_then(|encoded| HeaderValue::from_str(&encoded).ok());
        match header_value {
            Some(value) => {
                response
                    .headers_mut()
                    .insert(headers::X_PAYMENT_RESPONSE, value);
                PaymentResult::Success {
                    response,
                    settlement,
                }
            }
            None => {
                tracing::error!(
                    request_id = %verified.request_id,
                    transaction = %settlement.transaction,
                    "Failed to encode settlement header"
                );
                PaymentResult::Success {
                    response: internal_error(),
                    settlement,
                }
            }
        }
    }

    fn payment_required(&self, error: &str) -> Response {
        let body = PaymentRequirementsResponse::new(error, vec![self.requirements.as_ref().clone()]);
        (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
    }
}

fn failure_message(error: &GateError) -> &'static str {
    match error {
        GateError::VerifyFailed { .. } => "Payment verification failed",
        GateError::SettleFailed { .. } => "Payment settlement failed",
        GateError::Handler(_) => "Handler failed",
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Internal server error" })),
    )
        .into_response()
}

/// Axum middleware function for handling x402 payments
pub async fn payment_middleware(
    State(state): State<PaymentLayerState>,
    request: Request,
    next: Next,
) -> Response {
    state.process_payment(request, next).await.into_response()
}
