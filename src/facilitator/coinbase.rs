//! Coinbase CDP facilitator integration

use crate::crypto::jwt;
use crate::types::{operations, FacilitatorConfig, OperationHeaders};
use crate::{Result, X402Error};
use std::collections::HashMap;

/// Coinbase facilitator base URL
pub const COINBASE_FACILITATOR_BASE_URL: &str = "https://api.cdp.coinbase.com";
/// Coinbase facilitator v2 route
pub const COINBASE_FACILITATOR_V2_ROUTE: &str = "/platform/v2/x402";

/// Create the per-operation CDP header factory for the facilitator at `base_url`.
///
/// Every invocation mints fresh tokens, one per operation, each bound to the
/// host of `base_url` and to the method and path of that operation.
pub fn create_auth_headers(
    base_url: &str,
    api_key_id: &str,
    api_key_secret: &str,
) -> impl Fn() -> Result<OperationHeaders> + Send + Sync {
    let base_url = base_url.to_string();
    let target = request_target(&base_url);
    let api_key_id = api_key_id.to_string();
    let api_key_secret = api_key_secret.to_string();

    move || {
        if api_key_id.is_empty() || api_key_secret.is_empty() {
            return Err(X402Error::config(
                "Missing credentials: CDP API key id and secret must both be set",
            ));
        }
        let Some((host, base_path)) = &target else {
            return Err(X402Error::config(format!(
                "Facilitator URL has no host: {}",
                base_url
            )));
        };

        let correlation_header = create_correlation_header();
        let mut headers = HashMap::new();

        for (operation, method) in [
            (operations::VERIFY, "POST"),
            (operations::SETTLE, "POST"),
            (operations::SUPPORTED, "GET"),
        ] {
            let token = jwt::create_auth_header_with_method(
                &api_key_id,
                &api_key_secret,
                method,
                host,
                &format!("{}/{}", base_path, operation),
            )?;

            let mut operation_headers = HashMap::new();
            operation_headers.insert("Authorization".to_string(), token);
            operation_headers.insert(
                "Correlation-Context".to_string(),
                correlation_header.clone(),
            );
            headers.insert(operation.to_string(), operation_headers);
        }

        Ok(headers)
    }
}

/// Create a facilitator config for Coinbase with explicit credentials
pub fn create_facilitator_config(api_key_id: &str, api_key_secret: &str) -> FacilitatorConfig {
    let url = format!("{}{}", COINBASE_FACILITATOR_BASE_URL, COINBASE_FACILITATOR_V2_ROUTE);
    let auth_headers = create_auth_headers(&url, api_key_id, api_key_secret);
    FacilitatorConfig::new(url).with_auth_headers(Box::new(auth_headers))
}

/// Host (with non-default port) and trailing-slash-free path of a base URL
fn request_target(base_url: &str) -> Option<(String, String)> {
    let url = url::Url::parse(base_url).ok()?;
    let host = url.host_str()?;
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Some((host, url.path().trim_end_matches('/').to_string()))
}

/// Create correlation header for requests
fn create_correlation_header() -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

    let data = [
        ("sdk_version", crate::VERSION),
        ("sdk_language", "rust"),
        ("source", "x402-gate"),
    ];

    let pairs: Vec<String> = data
        .iter()
        .map(|(key, value)| format!("{}={}", key, utf8_percent_encode(value, NON_ALPHANUMERIC)))
        .collect();

    pairs.join(",")
}
