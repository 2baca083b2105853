use super::*;
use crate::types::{IntegerField, PaymentPayload};
use serde_json::{json, Value};

const PAYER_LOWER: &str = "0x857b06519e91e3a54538791bdbb0e22373e36b66";
const PAYER: &str = "0x857b06519E91e3A54538791bDbb0E22373e36b66";
const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

fn payload(body: Value) -> PaymentPayload {
    serde_json::from_value(json!({
        "x402Version": 2,
        "accepted": { "scheme": "exact", "network": "eip155:84532" },
        "payload": body
    }))
    .unwrap()
}

fn plain_signature_hex() -> String {
    format!("{}1b", "ab".repeat(64))
}

#[test]
fn test_missing_to_is_not_synthesized() {
    let mut payment = payload(json!({
        "authorization": {
            "from": PAYER_LOWER,
            "value": "0x2710",
            "validAfter": 0,
            "validBefore": "01745323985",
            "nonce": "123"
        },
        "signature": plain_signature_hex()
    }));

    let outcome = normalize_payment_payload(&mut payment);
    assert!(outcome.changed());
    assert!(outcome.record_changed);

    let PayloadKind::DirectAuthorization(auth) = &payment.payload.kind else {
        panic!("expected a direct authorization");
    };
    assert_eq!(auth.to, None);
    assert_eq!(auth.from.as_deref(), Some(PAYER));
    assert_eq!(auth.value, Some(IntegerField::from("10000")));
    assert_eq!(auth.valid_after, Some(IntegerField::from("0")));
    assert_eq!(auth.valid_before, Some(IntegerField::from("1745323985")));
    assert_eq!(auth.nonce.as_deref().map(str::len), Some(66));

    let wire = serde_json::to_value(&payment).unwrap();
    assert!(wire["payload"]["authorization"].get("to").is_none());
    assert_eq!(
        wire["payload"]["signature"],
        json!(format!("0x{}", plain_signature_hex()))
    );
}

#[test]
fn test_permit_payload_normalized_in_place() {
    let mut payment = payload(json!({
        "permit2Authorization": {
            "from": PAYER_LOWER,
            "spender": "0x4020615294c913f045dc10f0a5cdebd86c280001",
            "nonce": "0x01",
            "deadline": "1745323985",
            "permitted": { "token": "0x036cbd53842c5426634e7929541ec2318f3dcf7e", "amount": "10000" },
            "witness": { "to": PAY_TO, "validAfter": "0", "extra": "0x" }
        },
        "signature": { "r": format!("0x{}", "11".repeat(32)), "s": format!("0x{}", "22".repeat(32)), "v": 27 }
    }));

    let outcome = normalize_payment_payload(&mut payment);
    assert_eq!(outcome.variant, PayloadVariant::DelegatedPermit);
    assert!(outcome.record_changed);
    assert!(outcome.signature.as_ref().unwrap().changed);

    let signature = payment.payload.signature.as_ref().unwrap();
    assert_eq!(
        signature,
        &json!(format!("0x{}{}1b", "11".repeat(32), "22".repeat(32)))
    );
}

#[test]
fn test_canonical_payload_reports_no_change() {
    let mut payment = payload(json!({
        "authorization": {
            "from": PAYER,
            "to": PAY_TO,
            "value": "10000",
            "validAfter": "0",
            "validBefore": "1745323985",
            "nonce": format!("0x{}", "0".repeat(64))
        },
        "signature": format!("0x{}", plain_signature_hex())
    }));
    let before = payment.clone();

    let outcome = normalize_payment_payload(&mut payment);
    assert!(!outcome.changed());
    assert_eq!(payment, before);
}

#[test]
fn test_transaction_payload_passes_through() {
    let mut payment = payload(json!({ "transaction": "AQAB", "signature": "0XABCD" }));
    let before = payment.clone();

    let outcome = normalize_payment_payload(&mut payment);
    assert_eq!(outcome.variant, PayloadVariant::Transaction);
    assert!(outcome.signature.is_none());
    assert!(!outcome.changed());
    assert_eq!(payment, before);
}

#[test]
fn test_unknown_payload_passes_through() {
    let mut payment = payload(json!({ "authorization": [1, 2, 3], "signature": "abcd" }));
    let before = payment.clone();

    let outcome = normalize_payment_payload(&mut payment);
    assert_eq!(outcome.variant, PayloadVariant::Unknown);
    assert!(!outcome.changed());
    assert_eq!(payment, before);
}
