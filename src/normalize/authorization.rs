//! Field-wise canonicalization of authorization records

use super::canonical::{
    has_hex_prefix, is_hex, normalize_address, normalize_hex_nonce, normalize_integer_number,
    normalize_integer_string, Normalized,
};
use crate::types::{DelegatedPermit, DirectAuthorization, IntegerField};
use serde_json::Value;

/// Canonicalize an EIP-3009 authorization. Absent fields stay absent.
pub fn normalize_authorization(auth: &DirectAuthorization) -> Normalized<DirectAuthorization> {
    let mut value = auth.clone();

    let changed = [
        address_field(&mut value.from),
        address_field(&mut value.to),
        integer_field(&mut value.value),
        integer_field(&mut value.valid_after),
        integer_field(&mut value.valid_before),
        nonce_field(&mut value.nonce),
    ]
    .contains(&true);

    Normalized::new(value, changed)
}

/// Canonicalize a Permit2 authorization including its nested records
pub fn normalize_permit(permit: &DelegatedPermit) -> Normalized<DelegatedPermit> {
    let mut value = permit.clone();

    let mut changed = [
        address_field(&mut value.from),
        address_field(&mut value.spender),
        integer_field(&mut value.nonce),
        integer_field(&mut value.deadline),
    ]
    .contains(&true);

    if let Some(permitted) = value.permitted.as_mut() {
        let token = address_field(&mut permitted.token);
        let amount = integer_field(&mut permitted.amount);
        changed |= token || amount;
    }

    if let Some(witness) = value.witness.as_mut() {
        let to = address_field(&mut witness.to);
        let valid_after = integer_field(&mut witness.valid_after);
        let extra = witness_extra_field(&mut witness.extra);
        changed |= to || valid_after || extra;
    }

    Normalized::new(value, changed)
}

/// Canonical text of an integer field
pub fn normalize_integer_field(field: &IntegerField) -> Normalized<IntegerField> {
    match field {
        IntegerField::Text(text) => {
            let normalized = normalize_integer_string(text);
            Normalized::new(IntegerField::Text(normalized.value), normalized.changed)
        }
        IntegerField::Number(number) => match normalize_integer_number(number) {
            Some(text) => Normalized::new(IntegerField::Text(text), true),
            None => Normalized::unchanged(field.clone()),
        },
    }
}

fn address_field(field: &mut Option<String>) -> bool {
    apply(field, |s| normalize_address(s))
}

fn nonce_field(field: &mut Option<String>) -> bool {
    apply(field, |s| normalize_hex_nonce(s))
}

fn integer_field(field: &mut Option<IntegerField>) -> bool {
    apply(field, normalize_integer_field)
}

/// Hex-looking `witness.extra` text gains a `0x` prefix
fn witness_extra_field(field: &mut Option<Value>) -> bool {
    match field {
        Some(Value::String(extra))
            if !extra.is_empty() && !has_hex_prefix(extra) && is_hex(extra) =>
        {
            *extra = format!("0x{}", extra);
            true
        }
        _ => false,
    }
}

fn apply<T, F>(field: &mut Option<T>, normalize: F) -> bool
where
    F: FnOnce(&T) -> Normalized<T>,
{
    let Some(current) = field.as_mut() else {
        return false;
    };
    let normalized = normalize(&*current);
    if normalized.changed {
        *current = normalized.value;
    }
    normalized.changed
}
