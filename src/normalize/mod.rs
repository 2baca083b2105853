//! Payment payload normalization
//!
//! Clients encode the same authorization in many ways: lowercase or
//! checksummed addresses, hex or decimal integers, short nonces, ERC-6492
//! wrapped or `{r, s, v}` signatures. Facilitators are strict, so every
//! payload is rewritten into one canonical form before it is verified.
//!
//! # Architecture
//!
//! - [`canonical`] - Addresses, integers and nonces
//! - [`signature`] - Signature strings, ERC-6492 wrappers and `{r, s, v}` objects
//! - [`authorization`] - EIP-3009 and Permit2 records, field by field
//!
//! Nothing in this module fails. Input that cannot be interpreted is left as
//! it is and reported with `changed == false`.
//!
//! # Examples
//!
//! ```
//! use x402_gate::normalize::normalize_address;
//!
//! let normalized = normalize_address("0x209693bc6afc0c5328ba36faf03c514ef312287c");
//! assert!(normalized.changed);
//! assert_eq!(normalized.value, "0x209693Bc6afc0C5328bA36FaF03C514EF312287C");
//! ```

pub mod authorization;
pub mod canonical;
pub mod signature;

#[cfg(test)]
mod tests;

pub use authorization::{normalize_authorization, normalize_integer_field, normalize_permit};
pub use canonical::{
    normalize_address, normalize_hex_nonce, normalize_integer_number, normalize_integer_string,
    Normalized, NONCE_HEX_LEN,
};
pub use signature::{
    has_erc6492_suffix, normalize_signature, normalize_signature_str, unwrap_erc6492,
    NormalizedSignature, ERC6492_MAGIC_SUFFIX, MAX_UNWRAP_DEPTH,
};

use crate::types::{PayloadKind, PayloadVariant, PaymentPayload};

/// What [`normalize_payment_payload`] did to a payload
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadNormalization {
    /// Variant decided when the payload was parsed
    pub variant: PayloadVariant,
    /// The authorization record was rewritten
    pub record_changed: bool,
    /// Signature outcome, for the variants that carry a signed record
    pub signature: Option<NormalizedSignature>,
}

impl PayloadNormalization {
    /// Whether anything in the payload was rewritten
    pub fn changed(&self) -> bool {
        self.record_changed || self.signature.as_ref().is_some_and(|s| s.changed)
    }
}

/// Normalize a payment payload in place.
///
/// `Transaction` and `Unknown` bodies are forwarded untouched.
pub fn normalize_payment_payload(payload: &mut PaymentPayload) -> PayloadNormalization {
    let variant = payload.variant();
    let body = &mut payload.payload;

    let record_changed = match &mut body.kind {
        PayloadKind::DirectAuthorization(auth) => {
            let normalized = normalize_authorization(auth);
            *auth = normalized.value;
            normalized.changed
        }
        PayloadKind::DelegatedPermit(permit) => {
            let normalized = normalize_permit(permit);
            *permit = normalized.value;
            normalized.changed
        }
        PayloadKind::Transaction(_) | PayloadKind::Unknown => false,
    };

    let signature = match variant {
        PayloadVariant::DirectAuthorization | PayloadVariant::DelegatedPermit => {
            body.signature.as_mut().map(|signature| {
                let normalized = normalize_signature(signature);
                if normalized.changed {
                    *signature = normalized.value.clone();
                }
                normalized
            })
        }
        PayloadVariant::Transaction | PayloadVariant::Unknown => None,
    };

    let outcome = PayloadNormalization {
        variant,
        record_changed,
        signature,
    };

    tracing::debug!(
        variant = variant.as_str(),
        record_changed = outcome.record_changed,
        signature_changed = outcome.signature.as_ref().is_some_and(|s| s.changed),
        signature_unwrap_depth = outcome.signature.as_ref().map_or(0, |s| s.unwrap_depth),
        "Payment payload normalized"
    );

    outcome
}
