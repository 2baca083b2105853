//! x402 payment gate demo server
//!
//! Serves one priced route behind the payment middleware and one free route
//! listing the kinds the facilitator supports.
//!
//! ## Environment
//!
//! - `PAY_TO_ADDRESS` - recipient address (required)
//! - `X402_CHAIN_ID` - 8453 (Base) or 84532 (Base Sepolia, default)
//! - `FACILITATOR_URL`, `FACILITATOR_BEARER_TOKEN` - primary facilitator
//! - `FALLBACK_FACILITATOR_URL`, `CDP_API_KEY_ID`, `CDP_API_KEY_SECRET` - fallback facilitator
//! - `FACILITATOR_CALL_TIMEOUT_SECS` - bound on one facilitator operation
//! - `BIND_ADDRESS` - server bind address (default: 0.0.0.0:4021)
//! - `RUST_LOG` - log filter (default: info)

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use x402_gate::{
    middleware::{payment_middleware, PaymentLayerState},
    FacilitatorClient, GatewayConfig, PaymentGate, Price, ResilientFacilitatorClient,
    SupportedKinds, TracingDiagnostics,
};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GatewayConfig::from_env()?;
    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:4021".to_string());

    let client: Arc<dyn FacilitatorClient> =
        Arc::new(ResilientFacilitatorClient::from_config(&config)?);
    let gate = Arc::new(PaymentGate::new(client.clone(), Arc::new(TracingDiagnostics)));
    let requirements = config
        .requirements(Price::money("$0.01"), format!("http://{}/joke", bind_address))?
        .with_description("One programming joke")
        .with_mime_type("application/json");

    let paid = Router::new()
        .route("/joke", get(joke_handler))
        .layer(axum::middleware::from_fn_with_state(
            PaymentLayerState::new(gate, requirements),
            payment_middleware,
        ));

    let app = Router::new()
        .route("/supported", get(supported_handler))
        .with_state(client)
        .merge(paid);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(
        address = %bind_address,
        network = config.network.caip2,
        facilitator = %config.primary.url,
        fallback = config.fallback.as_ref().map(|f| f.url.as_str()).unwrap_or("none"),
        "x402 gate listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn joke_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "joke": "Why do programmers prefer dark mode? Because light attracts bugs!"
    }))
}

async fn supported_handler(
    State(client): State<Arc<dyn FacilitatorClient>>,
) -> Result<Json<SupportedKinds>, (StatusCode, Json<serde_json::Value>)> {
    client.supported().await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, "Failed to list supported kinds");
        (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": "Facilitator unavailable" })),
        )
    })
}
