//! Tests for payment middleware

use super::{payment_middleware, PaymentLayerState};
use crate::diagnostics::NoopDiagnostics;
use crate::facilitator::tests::{
    create_test_payment_payload, create_test_payment_requirements, settled, MockFacilitator,
};
use crate::gate::PaymentGate;
use crate::types::{headers, SettleResponse, VerifyResponse};
use crate::X402Error;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use std::sync::Arc;

/// Serve a router with one paid route and one failing route, return its base URL
async fn serve(facilitator: Arc<MockFacilitator>) -> String {
    let gate = Arc::new(PaymentGate::new(facilitator, Arc::new(NoopDiagnostics)));
    let state = PaymentLayerState::new(gate, create_test_payment_requirements());

    let app = Router::new()
        .route("/analyze", post(|| async { "bullish" }))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model unavailable") }),
        )
        .layer(axum::middleware::from_fn_with_state(state, payment_middleware));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn payment_header() -> String {
    create_test_payment_payload().to_base64().unwrap()
}

#[tokio::test]
async fn test_missing_header_returns_requirements() {
    let facilitator = Arc::new(MockFacilitator::new("primary"));
    let base = serve(facilitator.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 402);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["x402Version"], 2);
    assert_eq!(body["error"], "X-PAYMENT header is required");
    assert_eq!(body["accepts"][0]["payTo"], create_test_payment_requirements().pay_to);
    assert_eq!(facilitator.verify_count(), 0);
}

#[tokio::test]
async fn test_malformed_header_returns_402() {
    let facilitator = Arc::new(MockFacilitator::new("primary"));
    let base = serve(facilitator.clone()).await;

    let garbage = general_purpose::STANDARD.encode("{not json");
    let response = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .header(headers::X_PAYMENT, garbage)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 402);
    assert_eq!(facilitator.verify_count(), 0);
}

#[tokio::test]
async fn test_paid_request_is_settled() {
    let facilitator = Arc::new(MockFacilitator::new("primary"));
    let base = serve(facilitator.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .header(headers::X_PAYMENT, payment_header())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let encoded = response
        .headers()
        .get(headers::X_PAYMENT_RESPONSE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let decoded = general_purpose::STANDARD.decode(encoded).unwrap();
    let settlement: SettleResponse = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(settlement, settled());
    assert_eq!(response.text().await.unwrap(), "bullish");
    assert_eq!(facilitator.settle_count(), 1);
}

#[tokio::test]
async fn test_rejected_payment_never_reaches_handler() {
    let facilitator = Arc::new(MockFacilitator::new("primary").verifying(|| {
        Ok(VerifyResponse {
            is_valid: false,
            invalid_reason: Some("invalid_exact_evm_payload_signature".to_string()),
            payer: None,
        })
    }));
    let base = serve(facilitator.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .header(headers::X_PAYMENT, payment_header())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 402);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Payment verification failed");
    assert_eq!(facilitator.settle_count(), 0);
}

#[tokio::test]
async fn test_failed_handler_is_not_settled() {
    let facilitator = Arc::new(MockFacilitator::new("primary"));
    let base = serve(facilitator.clone()).await;

    let response = reqwest::Client::new()
        .get(format!("{}/broken", base))
        .header(headers::X_PAYMENT, payment_header())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 500);
    assert!(response.headers().get(headers::X_PAYMENT_RESPONSE).is_none());
    assert_eq!(facilitator.verify_count(), 1);
    assert_eq!(facilitator.settle_count(), 0);
}

#[tokio::test]
async fn test_settlement_failure_returns_402() {
    let facilitator = Arc::new(
        MockFacilitator::new("primary")
            .settling(|| Err(X402Error::facilitator("insufficient_funds", "balance too low"))),
    );
    let base = serve(facilitator.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .header(headers::X_PAYMENT, payment_header())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 402);
    assert!(response.headers().get(headers::X_PAYMENT_RESPONSE).is_none());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Payment settlement failed");
}
