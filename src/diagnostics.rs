//! Diagnostics hooks for the payment pipeline
//!
//! [`DiagnosticsHooks`] is an observer: it receives typed events before every
//! verify call and whenever verify or settle fails. Events never carry raw
//! signatures or full authorization records. Addresses are masked to
//! `first6...last4` and everything else is reduced to equality checks, time
//! deltas and shape flags.

use crate::facilitator::FailureClass;
use crate::normalize::has_erc6492_suffix;
use crate::normalize::canonical::{is_hex, strip_hex_prefix};
use crate::types::{IntegerField, PayloadKind, PayloadVariant, PaymentPayload, PaymentRequirements};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Observer of payment pipeline events. All methods default to no-ops.
pub trait DiagnosticsHooks: Send + Sync {
    fn before_verify(&self, _event: &BeforeVerifyEvent) {}

    fn verify_failed(&self, _event: &FailureEvent) {}

    fn settle_failed(&self, _event: &FailureEvent) {}
}

/// Hooks that ignore every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl DiagnosticsHooks for NoopDiagnostics {}

/// Hooks that emit `tracing` records with structured fields
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsHooks for TracingDiagnostics {
    fn before_verify(&self, event: &BeforeVerifyEvent) {
        tracing::info!(
            request_id = %event.request_id,
            x402_version = event.x402_version,
            scheme = %event.scheme,
            network = %event.network,
            variant = event.variant.as_str(),
            from = event.from.as_deref().unwrap_or("-"),
            to = event.to.as_deref().unwrap_or("-"),
            pay_to = %event.pay_to,
            to_matches_pay_to = ?event.to_matches_pay_to,
            value_matches_amount = ?event.value_matches_amount,
            valid_after_delta_secs = ?event.valid_after_delta_secs,
            valid_before_delta_secs = ?event.valid_before_delta_secs,
            signature_present = event.signature.present,
            signature_len = event.signature.length,
            signature_hex = event.signature.is_hex,
            signature_wrapped = event.signature.looks_wrapped,
            "Verifying payment"
        );
    }

    fn verify_failed(&self, event: &FailureEvent) {
        log_failure(event);
    }

    fn settle_failed(&self, event: &FailureEvent) {
        log_failure(event);
    }
}

fn log_failure(event: &FailureEvent) {
    tracing::warn!(
        request_id = %event.request_id,
        stage = event.stage.as_str(),
        class = event.class.as_str(),
        reason = event.reason.as_deref().unwrap_or("none"),
        message = %event.message,
        "Payment {} failed",
        event.stage.as_str()
    );
}

/// Redacted view of a payload about to be verified
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeforeVerifyEvent {
    pub request_id: Uuid,
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub variant: PayloadVariant,
    /// Masked payer address
    pub from: Option<String>,
    /// Masked recipient address from the authorization
    pub to: Option<String>,
    /// Masked recipient address from the requirements
    pub pay_to: String,
    pub to_matches_pay_to: Option<bool>,
    pub value_matches_amount: Option<bool>,
    /// Seconds between now and the start of the validity window
    pub valid_after_delta_secs: Option<i64>,
    /// Seconds between now and the end of the validity window
    pub valid_before_delta_secs: Option<i64>,
    pub signature: SignatureShape,
}

/// Shape of a signature without its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureShape {
    pub present: bool,
    /// Hex digits after the `0x` prefix, 0 for non-string signatures
    pub length: usize,
    pub is_hex: bool,
    /// Ends with the ERC-6492 magic suffix
    pub looks_wrapped: bool,
}

/// Pipeline stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Verify,
    Settle,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Verify => "verify",
            Stage::Settle => "settle",
        }
    }
}

/// A verify or settle failure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEvent {
    pub request_id: Uuid,
    pub stage: Stage,
    pub class: FailureClass,
    /// Machine-readable reason code, if the facilitator sent one
    pub reason: Option<String>,
    pub message: String,
}

/// Mask an address to its first 6 and last 4 characters
pub fn mask_address(address: &str) -> String {
    let chars: Vec<char> = address.trim().chars().collect();
    if chars.len() <= 10 {
        return "***".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Fields of an authorization record that the summary looks at
struct RecordView<'a> {
    from: Option<&'a str>,
    to: Option<&'a str>,
    value: Option<&'a IntegerField>,
    valid_after: Option<&'a IntegerField>,
    valid_before: Option<&'a IntegerField>,
}

impl<'a> RecordView<'a> {
    fn of(kind: &'a PayloadKind) -> Option<Self> {
        match kind {
            PayloadKind::DirectAuthorization(auth) => Some(Self {
                from: auth.from.as_deref(),
                to: auth.to.as_deref(),
                value: auth.value.as_ref(),
                valid_after: auth.valid_after.as_ref(),
                valid_before: auth.valid_before.as_ref(),
            }),
            PayloadKind::DelegatedPermit(permit) => {
                let witness = permit.witness.as_ref();
                Some(Self {
                    from: permit.from.as_deref(),
                    to: witness.and_then(|w| w.to.as_deref()),
                    value: permit.permitted.as_ref().and_then(|p| p.amount.as_ref()),
                    valid_after: witness.and_then(|w| w.valid_after.as_ref()),
                    valid_before: permit.deadline.as_ref(),
                })
            }
            PayloadKind::Transaction(_) | PayloadKind::Unknown => None,
        }
    }
}

/// Build the redacted summary of a payload about to be verified
pub fn summarize_payload(
    request_id: Uuid,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
    now: DateTime<Utc>,
) -> BeforeVerifyEvent {
    let record = RecordView::of(&payload.payload.kind);
    let now = now.timestamp();

    let to_matches_pay_to = record
        .as_ref()
        .and_then(|r| r.to)
        .map(|to| to.trim().eq_ignore_ascii_case(requirements.pay_to.trim()));

    let value_matches_amount = match (
        record.as_ref().and_then(|r| r.value).and_then(integer_text),
        requirements.required_amount(),
    ) {
        (Some(value), Some(amount)) => Some(value == amount),
        _ => None,
    };

    let delta = |field: Option<&IntegerField>| {
        field
            .and_then(integer_text)
            .and_then(|text| text.parse::<i64>().ok())
            .map(|timestamp| timestamp - now)
    };

    BeforeVerifyEvent {
        request_id,
        x402_version: payload.x402_version,
        scheme: payload.accepted.scheme.clone(),
        network: payload.accepted.network.clone(),
        variant: payload.variant(),
        from: record.as_ref().and_then(|r| r.from).map(mask_address),
        to: record.as_ref().and_then(|r| r.to).map(mask_address),
        pay_to: mask_address(&requirements.pay_to),
        to_matches_pay_to,
        value_matches_amount,
        valid_after_delta_secs: delta(record.as_ref().and_then(|r| r.valid_after)),
        valid_before_delta_secs: delta(record.as_ref().and_then(|r| r.valid_before)),
        signature: signature_shape(payload.payload.signature.as_ref()),
    }
}

fn integer_text(field: &IntegerField) -> Option<String> {
    match field {
        IntegerField::Text(text) => Some(text.trim().to_string()),
        IntegerField::Number(number) => number.as_u64().map(|n| n.to_string()),
    }
}

fn signature_shape(signature: Option<&Value>) -> SignatureShape {
    match signature {
        None => SignatureShape::default(),
        Some(Value::String(s)) => {
            let body = strip_hex_prefix(s.trim());
            let is_hex = !body.is_empty() && is_hex(body);
            SignatureShape {
                present: true,
                length: body.len(),
                is_hex,
                looks_wrapped: is_hex && has_erc6492_suffix(body),
            }
        }
        Some(_) => SignatureShape {
            present: true,
            ..SignatureShape::default()
        },
    }
}
