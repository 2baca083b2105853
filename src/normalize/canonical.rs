//! Canonical wire forms for addresses, integers and nonces
//!
//! Every function here is pure and total: input that does not parse is
//! returned unchanged with `changed == false`.

use ethereum_types::U256;
use num_bigint::BigUint;
use serde_json::Number;
use sha3::{Digest, Keccak256};

/// Length of a 32-byte value in hex digits
pub const NONCE_HEX_LEN: usize = 64;

const ADDRESS_HEX_LEN: usize = 40;

/// Result of a normalization step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T> {
    /// Normalized value (the input itself when nothing applied)
    pub value: T,
    /// Whether `value` differs from the input
    pub changed: bool,
}

impl<T> Normalized<T> {
    pub fn new(value: T, changed: bool) -> Self {
        Self { value, changed }
    }

    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            changed: false,
        }
    }
}

impl Normalized<String> {
    fn compared(original: &str, value: String) -> Self {
        let changed = value != original;
        Self { value, changed }
    }
}

/// Normalize an account address to its EIP-55 checksummed form.
///
/// Accepts any letter case, with or without `0x`. Anything that is not 40 hex
/// digits is returned as given.
pub fn normalize_address(input: &str) -> Normalized<String> {
    let body = strip_hex_prefix(input.trim());
    if body.len() != ADDRESS_HEX_LEN || !is_hex(body) {
        return Normalized::unchanged(input.to_string());
    }

    Normalized::compared(input, to_checksum_address(body))
}

/// EIP-55 checksum of 40 hex digits (no prefix)
fn to_checksum_address(hex_body: &str) -> String {
    let lower = hex_body.to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(ADDRESS_HEX_LEN + 2);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalize a base-10 or `0x`-hex integer string to base 10 without leading zeros.
///
/// Magnitude is unbounded. Negative, fractional and non-numeric strings pass
/// through.
pub fn normalize_integer_string(input: &str) -> Normalized<String> {
    match parse_unsigned(input.trim()) {
        Some(value) => Normalized::compared(input, value.to_string()),
        None => Normalized::unchanged(input.to_string()),
    }
}

/// Canonical base-10 text of a JSON number, if it is a non-negative integer
pub fn normalize_integer_number(number: &Number) -> Option<String> {
    number.as_u64().map(|n| n.to_string())
}

/// Normalize a nonce to `0x` + exactly 64 lowercase hex digits.
///
/// Prefixed input and unprefixed input containing a hex letter are read as
/// hex; unprefixed all-digit input is read as decimal and converted. Short
/// values are left-padded with zeros. Values longer than 64 digits keep only
/// their last 64 digits.
pub fn normalize_hex_nonce(input: &str) -> Normalized<String> {
    let trimmed = input.trim();
    let prefixed = has_hex_prefix(trimmed);
    let body = strip_hex_prefix(trimmed);

    if body.is_empty() || !is_hex(body) {
        return Normalized::unchanged(input.to_string());
    }

    let digits = if !prefixed && body.bytes().all(|b| b.is_ascii_digit()) {
        match BigUint::parse_bytes(body.as_bytes(), 10) {
            Some(value) => value.to_str_radix(16),
            None => return Normalized::unchanged(input.to_string()),
        }
    } else {
        body.to_ascii_lowercase()
    };

    let fixed = if digits.len() >= NONCE_HEX_LEN {
        digits[digits.len() - NONCE_HEX_LEN..].to_string()
    } else {
        format!("{:0>width$}", digits, width = NONCE_HEX_LEN)
    };

    Normalized::compared(input, format!("0x{}", fixed))
}

/// Parse `0x` hex or base-10 text into an unbounded unsigned integer
pub(crate) fn parse_unsigned(text: &str) -> Option<BigUint> {
    if has_hex_prefix(text) {
        let body = strip_hex_prefix(text);
        if body.is_empty() || !is_hex(body) {
            return None;
        }
        BigUint::parse_bytes(body.as_bytes(), 16)
    } else {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        BigUint::parse_bytes(text.as_bytes(), 10)
    }
}

/// Parse `0x` hex or base-10 text that fits a 256-bit word
pub(crate) fn parse_u256(text: &str) -> Option<U256> {
    let value = parse_unsigned(text)?;
    if value.bits() > 256 {
        return None;
    }
    Some(U256::from_big_endian(&value.to_bytes_be()))
}

/// Hex digits of a `U256`, left-padded to 64
pub(crate) fn u256_to_word_hex(value: U256) -> String {
    format!("{:0>width$}", format!("{:x}", value), width = NONCE_HEX_LEN)
}

pub(crate) fn has_hex_prefix(s: &str) -> bool {
    s.starts_with("0x") || s.starts_with("0X")
}

pub(crate) fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub(crate) fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_address_checksum_any_case_and_prefix() {
        for expected in CHECKSUMMED {
            let body = &expected[2..];
            let inputs = [
                expected.to_string(),
                expected.to_lowercase(),
                expected.to_uppercase().replacen("0X", "0x", 1),
                body.to_lowercase(),
                format!("0X{}", body.to_uppercase()),
            ];
            for input in inputs {
                let normalized = normalize_address(&input);
                assert_eq!(normalized.value, expected, "input {}", input);
                assert_eq!(normalized.changed, input != expected);
            }
        }
    }

    #[test]
    fn test_address_idempotent() {
        let once = normalize_address("0x209693bc6afc0c5328ba36faf03c514ef312287c");
        let twice = normalize_address(&once.value);
        assert!(once.changed);
        assert!(!twice.changed);
        assert_eq!(once.value, twice.value);
    }

    #[test]
    fn test_invalid_address_unchanged() {
        for input in ["", "0x", "0x1234", "not-an-address", "0xZZ9693bc6afc0c5328ba36faf03c514ef312287c"] {
            let normalized = normalize_address(input);
            assert_eq!(normalized.value, input);
            assert!(!normalized.changed);
        }
    }

    #[test]
    fn test_integer_forms_agree() {
        for input in ["123", "0x7b", "0123", "0x007B", " 123 "] {
            assert_eq!(normalize_integer_string(input).value, "123", "input {:?}", input);
        }
        assert!(!normalize_integer_string("123").changed);
        assert!(normalize_integer_string("0x7b").changed);
        assert_eq!(normalize_integer_string("0").value, "0");
        assert_eq!(normalize_integer_string("000").value, "0");
        assert_eq!(normalize_integer_string("0x0").value, "0");
    }

    #[test]
    fn test_integer_beyond_u64() {
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        let hex_max = format!("0x{}", "f".repeat(64));
        assert_eq!(normalize_integer_string(&hex_max).value, max);
        assert_eq!(normalize_integer_string(max).value, max);

        let big = "18446744073709551616";
        assert_eq!(normalize_integer_string("0x10000000000000000").value, big);
    }

    #[test]
    fn test_integer_passthrough() {
        for input in ["", "abc", "-5", "1.5", "0x", "0xfg", "1e6"] {
            let normalized = normalize_integer_string(input);
            assert_eq!(normalized.value, input);
            assert!(!normalized.changed);
        }
    }

    #[test]
    fn test_integer_wider_than_256_bits() {
        let two_pow_256 = format!("0x1{}", "0".repeat(64));
        let normalized = normalize_integer_string(&two_pow_256);
        assert_eq!(
            normalized.value,
            "115792089237316195423570985008687907853269984665640564039457584007913129639936"
        );
        assert!(normalized.changed);

        let decimal = format!("1{}", "0".repeat(80));
        let normalized = normalize_integer_string(&format!("000{}", decimal));
        assert_eq!(normalized.value, decimal);
    }

    #[test]
    fn test_parse_u256_rejects_wide_words() {
        assert_eq!(parse_u256("0x7b"), Some(U256::from(123u64)));
        assert_eq!(parse_u256(&format!("0x{}", "f".repeat(64))), Some(U256::MAX));
        assert_eq!(parse_u256(&format!("0x1{}", "0".repeat(64))), None);
    }

    #[test]
    fn test_integer_number() {
        assert_eq!(normalize_integer_number(&Number::from(42u64)), Some("42".to_string()));
        assert_eq!(normalize_integer_number(&Number::from(-1i64)), None);
    }

    #[test]
    fn test_nonce_decimal_is_padded() {
        let normalized = normalize_hex_nonce("123");
        assert_eq!(normalized.value, format!("0x{}7b", "0".repeat(62)));
        assert_eq!(normalized.value.len(), 66);
        assert!(normalized.changed);
    }

    #[test]
    fn test_nonce_hex_is_padded_and_lowercased() {
        assert_eq!(
            normalize_hex_nonce("0xABC").value,
            format!("0x{}abc", "0".repeat(61))
        );
        assert_eq!(
            normalize_hex_nonce("abc").value,
            format!("0x{}abc", "0".repeat(61))
        );
    }

    #[test]
    fn test_nonce_canonical_is_unchanged() {
        let nonce = "0xf3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480";
        let normalized = normalize_hex_nonce(nonce);
        assert_eq!(normalized.value, nonce);
        assert!(!normalized.changed);
    }

    #[test]
    fn test_nonce_over_length_keeps_trailing_64() {
        let tail = "f3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480";
        let input = format!("0xab{}", tail);
        assert_eq!(input.len(), 68);
        assert_eq!(normalize_hex_nonce(&input).value, format!("0x{}", tail));
    }

    #[test]
    fn test_decimal_nonce_wider_than_256_bits_is_truncated() {
        // 2^256 + 123: 65 hex digits, the leading 1 is dropped
        let normalized = normalize_hex_nonce(
            "115792089237316195423570985008687907853269984665640564039457584007913129640059",
        );
        assert_eq!(normalized.value, format!("0x{}7b", "0".repeat(62)));
        assert!(normalized.changed);

        // 10^80: 67 hex digits
        let normalized = normalize_hex_nonce(&format!("1{}", "0".repeat(80)));
        assert_eq!(
            normalized.value,
            "0x9dea3e1f6bdfef70cdd17b25efa418ca63a22764cec100000000000000000000"
        );
    }

    #[test]
    fn test_nonce_passthrough() {
        for input in ["", "0x", "nonce", "0xnothex"] {
            let normalized = normalize_hex_nonce(input);
            assert_eq!(normalized.value, input);
            assert!(!normalized.changed);
        }
    }
}
