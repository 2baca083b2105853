//! Tests for facilitator credentials

use super::jwt::{self, Claims, JwtOptions, TOKEN_LIFETIME_SECS};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

fn decode(token: &str, secret: &str, audience: &str) -> Claims {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .unwrap()
        .claims
}

#[test]
fn test_auth_header_is_bearer() {
    let header = jwt::create_auth_header_with_method(
        "test_key",
        "test_secret",
        "POST",
        "api.cdp.coinbase.com",
        "/platform/v2/x402/verify",
    )
    .unwrap();
    assert!(header.starts_with("Bearer "));
}

#[test]
fn test_claims_bind_single_request() {
    let options = JwtOptions::new(
        "test_key",
        "test_secret",
        "get",
        "https://api.cdp.coinbase.com/",
        "/platform/v2/x402/supported",
    );
    let token = jwt::generate_jwt(&options).unwrap();
    let claims = decode(&token, "test_secret", "api.cdp.coinbase.com");

    assert_eq!(claims.sub, "test_key");
    assert_eq!(claims.aud, "api.cdp.coinbase.com");
    assert_eq!(
        claims.uri,
        "GET api.cdp.coinbase.com/platform/v2/x402/supported"
    );
    assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_SECS);
}

#[test]
fn test_token_rejected_with_wrong_secret() {
    let options = JwtOptions::new("k", "right", "POST", "api.cdp.coinbase.com", "/settle");
    let token = jwt::generate_jwt(&options).unwrap();

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["api.cdp.coinbase.com"]);
    let result = jsonwebtoken::decode::<Claims>(
        &token,
        &DecodingKey::from_secret(b"wrong"),
        &validation,
    );
    assert!(result.is_err());
}
