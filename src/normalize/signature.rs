//! Signature normalization
//!
//! Accepts the signature field as a hex string, an ERC-6492 wrapped hex
//! string, a `{r, s, v | yParity}` object or a `{signature}` object, and
//! produces a single lowercase `0x` hex string.

use super::canonical::{is_hex, parse_u256, strip_hex_prefix, u256_to_word_hex};
use ethereum_types::U256;
use serde_json::{Map, Value};

/// Hard limit on successive ERC-6492 unwraps
pub const MAX_UNWRAP_DEPTH: usize = 5;

/// Hex length of a plain 65-byte ECDSA signature
pub const PLAIN_SIGNATURE_HEX_LEN: usize = 130;

/// ERC-6492 detection suffix (32 bytes of `0x6492`)
pub const ERC6492_MAGIC_SUFFIX: [u8; 32] = [
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
];

const WORD: usize = 32;

/// Result of normalizing a signature field
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSignature {
    /// Normalized signature (the input itself when nothing applied)
    pub value: Value,
    /// Whether `value` differs from the input
    pub changed: bool,
    /// At least one ERC-6492 wrapper was recognized
    pub was_wrapped: bool,
    /// At least one unwrap made the signature shorter
    pub unwrapped: bool,
    /// Number of wrappers removed
    pub unwrap_depth: usize,
}

impl NormalizedSignature {
    fn unchanged(value: &Value) -> Self {
        Self {
            value: value.clone(),
            changed: false,
            was_wrapped: false,
            unwrapped: false,
            unwrap_depth: 0,
        }
    }
}

/// Normalize a signature field of any accepted shape. Never fails.
pub fn normalize_signature(signature: &Value) -> NormalizedSignature {
    match signature {
        Value::String(s) => normalize_signature_str(s),
        Value::Object(map) => match map.get("signature") {
            Some(Value::String(inner)) if is_hex_string(inner) => NormalizedSignature {
                changed: true,
                ..normalize_signature_str(inner)
            },
            _ => match serialize_rsv(map) {
                Some(compact) => NormalizedSignature {
                    value: Value::String(compact),
                    changed: true,
                    was_wrapped: false,
                    unwrapped: false,
                    unwrap_depth: 0,
                },
                None => NormalizedSignature::unchanged(signature),
            },
        },
        _ => NormalizedSignature::unchanged(signature),
    }
}

/// Normalize a hex signature string, unwrapping up to [`MAX_UNWRAP_DEPTH`] ERC-6492 layers
pub fn normalize_signature_str(input: &str) -> NormalizedSignature {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let body = strip_hex_prefix(&cleaned);
    if body.is_empty() || !is_hex(body) {
        return NormalizedSignature::unchanged(&Value::String(input.to_string()));
    }

    let mut current = format!("0x{}", body.to_ascii_lowercase());
    let mut was_wrapped = false;
    let mut unwrapped = false;
    let mut depth = 0;

    if hex_len(&current) > PLAIN_SIGNATURE_HEX_LEN {
        while depth < MAX_UNWRAP_DEPTH {
            let Some(inner) = unwrap_erc6492(&current) else {
                break;
            };
            was_wrapped = true;

            let inner = format!("0x{}", hex::encode(inner));
            if inner == current {
                break;
            }
            if inner.len() < current.len() {
                unwrapped = true;
            }
            current = inner;
            depth += 1;

            if hex_len(&current) <= PLAIN_SIGNATURE_HEX_LEN {
                break;
            }
        }
    }

    let changed = current != input;
    NormalizedSignature {
        value: Value::String(current),
        changed,
        was_wrapped,
        unwrapped,
        unwrap_depth: depth,
    }
}

/// Whether a hex blob carries the ERC-6492 magic suffix
pub fn has_erc6492_suffix(signature: &str) -> bool {
    let body = strip_hex_prefix(signature);
    let suffix_hex = hex::encode(ERC6492_MAGIC_SUFFIX);
    body.len() >= suffix_hex.len() && body.to_ascii_lowercase().ends_with(&suffix_hex)
}

/// Inner signature of one ERC-6492 layer.
///
/// The layer is `abi.encode(address factory, bytes factoryCalldata, bytes
/// signature) ++ magic`. Returns `None` if the suffix is missing or the ABI
/// head does not describe in-bounds dynamic values.
pub fn unwrap_erc6492(signature: &str) -> Option<Vec<u8>> {
    let bytes = hex::decode(strip_hex_prefix(signature)).ok()?;
    let data = bytes.strip_suffix(&ERC6492_MAGIC_SUFFIX[..])?;

    if data.len() < 3 * WORD {
        return None;
    }
    // address word: 12 zero bytes then 20 address bytes
    if data[..12].iter().any(|b| *b != 0) {
        return None;
    }

    read_dynamic_bytes(data, WORD)?;
    read_dynamic_bytes(data, 2 * WORD).map(<[u8]>::to_vec)
}

/// Read the `bytes` value whose offset sits in the head word at `head_pos`
fn read_dynamic_bytes(data: &[u8], head_pos: usize) -> Option<&[u8]> {
    let offset = read_word_as_usize(data, head_pos)?;
    let len = read_word_as_usize(data, offset)?;
    let start = offset.checked_add(WORD)?;
    let end = start.checked_add(len)?;
    data.get(start..end)
}

fn read_word_as_usize(data: &[u8], pos: usize) -> Option<usize> {
    let word = data.get(pos..pos.checked_add(WORD)?)?;
    let value = U256::from_big_endian(word);
    if value > U256::from(data.len() as u64) {
        return None;
    }
    Some(value.as_usize())
}

/// Serialize `{r, s, v | yParity}` as `0x` + r + s + v (`1b`/`1c`)
fn serialize_rsv(map: &Map<String, Value>) -> Option<String> {
    let r = word_from_value(map.get("r")?)?;
    let s = word_from_value(map.get("s")?)?;
    let parity = y_parity(map)?;
    let v = if parity == 0 { "1b" } else { "1c" };
    Some(format!("0x{}{}{}", u256_to_word_hex(r), u256_to_word_hex(s), v))
}

fn y_parity(map: &Map<String, Value>) -> Option<u8> {
    if let Some(parity) = map.get("yParity").and_then(small_int) {
        return match parity {
            0 | 1 => Some(parity as u8),
            _ => None,
        };
    }

    match map.get("v").and_then(small_int)? {
        v @ (27 | 28) => Some(if v % 2 == 0 { 1 } else { 0 }),
        v if v >= 35 => Some(if v % 2 == 0 { 1 } else { 0 }),
        _ => None,
    }
}

fn word_from_value(value: &Value) -> Option<U256> {
    match value {
        Value::String(s) => parse_u256(s.trim()),
        Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}

fn small_int(value: &Value) -> Option<u64> {
    let word = word_from_value(value)?;
    if word > U256::from(u64::MAX) {
        return None;
    }
    Some(word.low_u64())
}

fn is_hex_string(s: &str) -> bool {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let body = strip_hex_prefix(&cleaned);
    !body.is_empty() && is_hex(body)
}

fn hex_len(prefixed: &str) -> usize {
    prefixed.len().saturating_sub(2)
}
