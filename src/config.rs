//! Gateway configuration
//!
//! [`GatewayConfig`] is built once at start-up and handed to every component
//! that needs it. Nothing else in the crate reads the process environment.

use crate::facilitator::{coinbase, DEFAULT_FACILITATOR_URL};
use crate::normalize::normalize_address;
use crate::types::network::BASE_SEPOLIA;
use crate::types::{FacilitatorConfig, NetworkAsset, PaymentRequirements, Price};
use crate::{Result, X402Error};
use std::time::Duration;

/// Environment variable names read by [`GatewayConfig::from_env`]
pub mod env {
    pub const FACILITATOR_URL: &str = "FACILITATOR_URL";
    pub const FALLBACK_FACILITATOR_URL: &str = "FALLBACK_FACILITATOR_URL";
    pub const FACILITATOR_BEARER_TOKEN: &str = "FACILITATOR_BEARER_TOKEN";
    pub const CDP_API_KEY_ID: &str = "CDP_API_KEY_ID";
    pub const CDP_API_KEY_SECRET: &str = "CDP_API_KEY_SECRET";
    pub const X402_CHAIN_ID: &str = "X402_CHAIN_ID";
    pub const PAY_TO_ADDRESS: &str = "PAY_TO_ADDRESS";
    pub const FACILITATOR_CALL_TIMEOUT_SECS: &str = "FACILITATOR_CALL_TIMEOUT_SECS";
}

/// Immutable gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Facilitator every call goes to first
    pub primary: FacilitatorConfig,
    /// Facilitator used after a classified primary failure
    pub fallback: Option<FacilitatorConfig>,
    /// Network payments are taken on
    pub network: NetworkAsset,
    /// Checksummed recipient address
    pub pay_to: String,
    /// Bound on one facilitator operation, fallback included
    pub call_timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Configuration with the default facilitator and no fallback
    pub fn new(pay_to: impl Into<String>, network: NetworkAsset) -> Self {
        let pay_to: String = pay_to.into();
        Self {
            primary: FacilitatorConfig::default(),
            fallback: None,
            network,
            pay_to: normalize_address(&pay_to).value,
            call_timeout: None,
        }
    }

    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from a variable lookup.
    ///
    /// The primary facilitator is `FACILITATOR_URL` (default
    /// [`DEFAULT_FACILITATOR_URL`]) with an optional static bearer token. The
    /// fallback is `FALLBACK_FACILITATOR_URL`, or the Coinbase CDP facilitator
    /// when only CDP credentials are present; CDP credentials authenticate the
    /// fallback either way.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let pay_to = var(env::PAY_TO_ADDRESS)
            .ok_or_else(|| X402Error::config(format!("{} must be set", env::PAY_TO_ADDRESS)))?;

        let network = match var(env::X402_CHAIN_ID) {
            Some(raw) => {
                let chain_id: u64 = raw.parse().map_err(|_| {
                    X402Error::config(format!("{} is not a chain id: {}", env::X402_CHAIN_ID, raw))
                })?;
                NetworkAsset::from_chain_id(chain_id).ok_or(X402Error::NetworkNotSupported {
                    network: format!("eip155:{}", chain_id),
                })?
            }
            None => BASE_SEPOLIA,
        };

        let primary_url =
            var(env::FACILITATOR_URL).unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string());
        let mut primary = FacilitatorConfig::new(primary_url);
        if let Some(token) = var(env::FACILITATOR_BEARER_TOKEN) {
            primary = primary.with_bearer_token(token);
        }

        let credentials = var(env::CDP_API_KEY_ID).zip(var(env::CDP_API_KEY_SECRET));
        let fallback = match (var(env::FALLBACK_FACILITATOR_URL), credentials) {
            (Some(url), Some((id, secret))) => {
                let auth_headers = coinbase::create_auth_headers(&url, &id, &secret);
                Some(FacilitatorConfig::new(url).with_auth_headers(Box::new(auth_headers)))
            }
            (Some(url), None) => Some(FacilitatorConfig::new(url)),
            (None, Some((id, secret))) => Some(coinbase::create_facilitator_config(&id, &secret)),
            (None, None) => None,
        };

        let call_timeout = var(env::FACILITATOR_CALL_TIMEOUT_SECS)
            .map(|raw| {
                raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    X402Error::config(format!(
                        "{} must be a whole number of seconds: {}",
                        env::FACILITATOR_CALL_TIMEOUT_SECS,
                        raw
                    ))
                })
            })
            .transpose()?;

        let mut config = Self::new(pay_to, network).with_primary(primary);
        config.fallback = fallback;
        config.call_timeout = call_timeout;
        config.validate()?;
        Ok(config)
    }

    /// Set the primary facilitator
    pub fn with_primary(mut self, primary: FacilitatorConfig) -> Self {
        self.primary = primary;
        self
    }

    /// Set the fallback facilitator
    pub fn with_fallback(mut self, fallback: FacilitatorConfig) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Bound each facilitator operation
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Check that facilitator URLs parse and the recipient is an address
    pub fn validate(&self) -> Result<()> {
        self.primary.validate()?;
        if let Some(fallback) = &self.fallback {
            fallback.validate()?;
        }

        let checksummed = normalize_address(&self.pay_to);
        if checksummed.changed || !self.pay_to.starts_with("0x") || self.pay_to.len() != 42 {
            return Err(X402Error::config(format!(
                "Recipient is not a valid address: {}",
                self.pay_to
            )));
        }

        if self.call_timeout == Some(Duration::ZERO) {
            return Err(X402Error::config("Facilitator call timeout must be positive"));
        }
        Ok(())
    }

    /// Requirements for one priced resource on the configured network
    pub fn requirements(
        &self,
        price: Price,
        resource: impl Into<String>,
    ) -> Result<PaymentRequirements> {
        PaymentRequirements::new(self.pay_to.clone(), price, self.network.caip2, resource)
            .with_resolved_price()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::jwt::Claims;
    use crate::types::network::BASE_MAINNET;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation};
    use std::collections::HashMap;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn from_vars(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_minimal_environment() {
        let config = from_vars(&[(env::PAY_TO_ADDRESS, &PAY_TO.to_lowercase())]).unwrap();
        assert_eq!(config.pay_to, PAY_TO);
        assert_eq!(config.network, BASE_SEPOLIA);
        assert_eq!(config.primary.url, DEFAULT_FACILITATOR_URL);
        assert!(config.primary.create_auth_headers.is_none());
        assert!(config.fallback.is_none());
        assert!(config.call_timeout.is_none());
    }

    #[test]
    fn test_full_environment() {
        let config = from_vars(&[
            (env::PAY_TO_ADDRESS, PAY_TO),
            (env::X402_CHAIN_ID, "8453"),
            (env::FACILITATOR_URL, "https://primary.example.com"),
            (env::FACILITATOR_BEARER_TOKEN, "secret"),
            (env::FALLBACK_FACILITATOR_URL, "https://fallback.example.com"),
            (env::FACILITATOR_CALL_TIMEOUT_SECS, "15"),
        ])
        .unwrap();

        assert_eq!(config.network, BASE_MAINNET);
        assert_eq!(config.primary.url, "https://primary.example.com");
        assert!(config.primary.create_auth_headers.is_some());
        let fallback = config.fallback.unwrap();
        assert_eq!(fallback.url, "https://fallback.example.com");
        assert!(fallback.create_auth_headers.is_none());
        assert_eq!(config.call_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_cdp_credentials_select_coinbase_fallback() {
        let config = from_vars(&[
            (env::PAY_TO_ADDRESS, PAY_TO),
            (env::CDP_API_KEY_ID, "id"),
            (env::CDP_API_KEY_SECRET, "secret"),
        ])
        .unwrap();

        let fallback = config.fallback.unwrap();
        assert!(fallback.url.starts_with(coinbase::COINBASE_FACILITATOR_BASE_URL));
        assert!(fallback.create_auth_headers.is_some());
    }

    #[test]
    fn test_cdp_credentials_sign_for_custom_fallback() {
        let config = from_vars(&[
            (env::PAY_TO_ADDRESS, PAY_TO),
            (env::FALLBACK_FACILITATOR_URL, "https://fallback.example.com/x402"),
            (env::CDP_API_KEY_ID, "id"),
            (env::CDP_API_KEY_SECRET, "secret"),
        ])
        .unwrap();

        let fallback = config.fallback.unwrap();
        assert_eq!(fallback.url, "https://fallback.example.com/x402");
        let headers = (fallback.create_auth_headers.unwrap())().unwrap();
        let token = headers["verify"]["Authorization"].trim_start_matches("Bearer ");

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["fallback.example.com"]);
        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(b"secret"),
            &validation,
        )
        .unwrap()
        .claims;
        assert_eq!(claims.uri, "POST fallback.example.com/x402/verify");
    }

    #[test]
    fn test_invalid_environment() {
        assert!(matches!(from_vars(&[]), Err(X402Error::Config { .. })));
        assert!(from_vars(&[(env::PAY_TO_ADDRESS, "alice")]).is_err());
        assert!(matches!(
            from_vars(&[(env::PAY_TO_ADDRESS, PAY_TO), (env::X402_CHAIN_ID, "1")]),
            Err(X402Error::NetworkNotSupported { .. })
        ));
        assert!(from_vars(&[(env::PAY_TO_ADDRESS, PAY_TO), (env::X402_CHAIN_ID, "base")]).is_err());
        assert!(from_vars(&[
            (env::PAY_TO_ADDRESS, PAY_TO),
            (env::FACILITATOR_CALL_TIMEOUT_SECS, "soon")
        ])
        .is_err());
        assert!(from_vars(&[(env::PAY_TO_ADDRESS, PAY_TO), (env::FACILITATOR_URL, "ftp://x")]).is_err());
    }

    #[test]
    fn test_requirements_use_configured_network() {
        let config = GatewayConfig::new(PAY_TO, BASE_MAINNET);
        let requirements = config
            .requirements(Price::money("$0.05"), "https://api.example.com/review")
            .unwrap();

        assert_eq!(requirements.network, "eip155:8453");
        assert_eq!(requirements.pay_to, PAY_TO);
        assert_eq!(requirements.required_amount(), Some("50000"));
    }
}
