//! Payment-related types

use super::network::NetworkAsset;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::str::FromStr;

/// x402 protocol version
pub const X402_VERSION: u32 = 2;

/// Payment requirements for a priced resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g., "exact")
    pub scheme: String,
    /// Recipient wallet address for the payment
    pub pay_to: String,
    /// Money price or explicit asset amount
    pub price: Price,
    /// Network identifier (e.g., "eip155:84532")
    pub network: String,
    /// Maximum time allowed for payment completion in seconds
    pub max_timeout_seconds: u64,
    /// URL of the protected resource
    pub resource: String,
    /// Human-readable description of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the expected response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl PaymentRequirements {
    /// Create requirements for the "exact" scheme
    pub fn new(
        pay_to: impl Into<String>,
        price: Price,
        network: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            scheme: super::schemes::EXACT.to_string(),
            pay_to: pay_to.into(),
            price,
            network: network.into(),
            max_timeout_seconds: 60,
            resource: resource.into(),
            description: None,
            mime_type: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the maximum timeout
    pub fn with_max_timeout_seconds(mut self, max_timeout_seconds: u64) -> Self {
        self.max_timeout_seconds = max_timeout_seconds;
        self
    }

    /// Atomic amount when the price is explicit
    pub fn required_amount(&self) -> Option<&str> {
        match &self.price {
            Price::Asset(asset) => Some(&asset.amount),
            Price::Money(_) => None,
        }
    }

    /// Replace a money price with an explicit asset amount for this network
    pub fn with_resolved_price(mut self) -> crate::Result<Self> {
        let network = NetworkAsset::from_network(&self.network).ok_or_else(|| {
            crate::X402Error::NetworkNotSupported {
                network: self.network.clone(),
            }
        })?;
        self.price = Price::Asset(self.price.resolve(&network)?);
        Ok(self)
    }
}

/// Price of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    /// Fixed-point currency string such as `"$0.01"`
    Money(String),
    /// Explicit amount in atomic token units
    Asset(AssetAmount),
}

/// Explicit `{amount, asset, extra}` price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAmount {
    /// Amount in atomic token units
    pub amount: String,
    /// Token contract address
    pub asset: String,
    /// Token metadata (EIP-712 domain name and version)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl Price {
    /// Create a money price
    pub fn money(amount: impl Into<String>) -> Self {
        Price::Money(amount.into())
    }

    /// Resolve to an atomic amount of the network's registered token
    pub fn resolve(&self, network: &NetworkAsset) -> crate::Result<AssetAmount> {
        match self {
            Price::Asset(asset) => Ok(asset.clone()),
            Price::Money(money) => {
                let trimmed = money.trim().trim_start_matches('$').replace('_', "");
                let amount = Decimal::from_str(&trimmed).map_err(|_| {
                    crate::X402Error::invalid_payment_requirements(format!(
                        "Invalid money price: {}",
                        money
                    ))
                })?;
                if amount.is_sign_negative() {
                    return Err(crate::X402Error::invalid_payment_requirements(
                        "Price cannot be negative",
                    ));
                }

                let scaled = amount * Decimal::from(10u64.pow(network.decimals));
                if scaled.fract() != Decimal::ZERO {
                    return Err(crate::X402Error::invalid_payment_requirements(format!(
                        "Price {} has more precision than {} decimals",
                        money, network.decimals
                    )));
                }

                Ok(AssetAmount {
                    amount: scaled.normalize().to_string(),
                    asset: network.token_address.to_string(),
                    extra: Some(network.extra()),
                })
            }
        }
    }
}

/// Payment payload attached by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version identifier
    pub x402_version: u32,
    /// The requirements entry the client accepted
    pub accepted: AcceptedRequirements,
    /// Scheme payload (authorization record and signature)
    pub payload: ExactPayload,
    /// Keys this crate does not interpret, forwarded as-is
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl PaymentPayload {
    /// Decode a base64-encoded payment payload
    pub fn from_base64(encoded: &str) -> crate::Result<Self> {
        use base64::{engine::general_purpose, Engine as _};
        let decoded = general_purpose::STANDARD.decode(encoded.trim())?;
        let payload: PaymentPayload = serde_json::from_slice(&decoded)?;
        Ok(payload)
    }

    /// Encode the payment payload to base64
    pub fn to_base64(&self) -> crate::Result<String> {
        use base64::{engine::general_purpose, Engine as _};
        let json = serde_json::to_string(self)?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    /// Which authorization scheme the payload carries
    pub fn variant(&self) -> PayloadVariant {
        self.payload.kind.variant()
    }
}

/// The `accepted` descriptor of a payment payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedRequirements {
    pub scheme: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Body of an exact-scheme payload.
///
/// The authorization variant is decided once when the payload is parsed. On
/// the wire `authorization`, `permit2Authorization` and `transaction` are
/// mutually exclusive; if several are present the first in that order wins and
/// the others are kept verbatim in `other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawExactPayload", into = "RawExactPayload")]
pub struct ExactPayload {
    pub kind: PayloadKind,
    /// Signature as received: a hex string or a structured object
    pub signature: Option<Value>,
    pub other: Map<String, Value>,
}

impl ExactPayload {
    /// EIP-3009 body
    pub fn direct(authorization: DirectAuthorization, signature: impl Into<Value>) -> Self {
        Self {
            kind: PayloadKind::DirectAuthorization(authorization),
            signature: Some(signature.into()),
            other: Map::new(),
        }
    }

    /// Permit2 body
    pub fn permit(permit: DelegatedPermit, signature: impl Into<Value>) -> Self {
        Self {
            kind: PayloadKind::DelegatedPermit(permit),
            signature: Some(signature.into()),
            other: Map::new(),
        }
    }
}

/// Authorization record carried by the payload
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadKind {
    DirectAuthorization(DirectAuthorization),
    DelegatedPermit(DelegatedPermit),
    Transaction(Value),
    Unknown,
}

impl PayloadKind {
    pub fn variant(&self) -> PayloadVariant {
        match self {
            PayloadKind::DirectAuthorization(_) => PayloadVariant::DirectAuthorization,
            PayloadKind::DelegatedPermit(_) => PayloadVariant::DelegatedPermit,
            PayloadKind::Transaction(_) => PayloadVariant::Transaction,
            PayloadKind::Unknown => PayloadVariant::Unknown,
        }
    }
}

/// Field-less tag of [`PayloadKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadVariant {
    DirectAuthorization,
    DelegatedPermit,
    Transaction,
    Unknown,
}

impl PayloadVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadVariant::DirectAuthorization => "eip3009",
            PayloadVariant::DelegatedPermit => "permit2",
            PayloadVariant::Transaction => "transaction",
            PayloadVariant::Unknown => "unknown",
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExactPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authorization: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permit2_authorization: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<Value>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

const AUTHORIZATION_KEY: &str = "authorization";
const PERMIT2_KEY: &str = "permit2Authorization";
const TRANSACTION_KEY: &str = "transaction";

impl From<RawExactPayload> for ExactPayload {
    fn from(raw: RawExactPayload) -> Self {
        let mut other = raw.other;
        let mut kind = PayloadKind::Unknown;

        if let Some(value) = raw.authorization {
            match parse_record::<DirectAuthorization>(&value) {
                Some(auth) => kind = PayloadKind::DirectAuthorization(auth),
                None => {
                    other.insert(AUTHORIZATION_KEY.to_string(), value);
                }
            }
        }

        if let Some(value) = raw.permit2_authorization {
            match (&kind, parse_record::<DelegatedPermit>(&value)) {
                (PayloadKind::Unknown, Some(permit)) => kind = PayloadKind::DelegatedPermit(permit),
                _ => {
                    other.insert(PERMIT2_KEY.to_string(), value);
                }
            }
        }

        if let Some(value) = raw.transaction {
            if matches!(kind, PayloadKind::Unknown) {
                kind = PayloadKind::Transaction(value);
            } else {
                other.insert(TRANSACTION_KEY.to_string(), value);
            }
        }

        Self {
            kind,
            signature: raw.signature,
            other,
        }
    }
}

impl From<ExactPayload> for RawExactPayload {
    fn from(payload: ExactPayload) -> Self {
        let mut other = payload.other;
        let mut take = |key: &str| other.remove(key);
        let mut raw = RawExactPayload {
            authorization: take(AUTHORIZATION_KEY),
            permit2_authorization: take(PERMIT2_KEY),
            transaction: take(TRANSACTION_KEY),
            signature: payload.signature,
            other: Map::new(),
        };

        match payload.kind {
            PayloadKind::DirectAuthorization(auth) => {
                raw.authorization = serde_json::to_value(auth).ok();
            }
            PayloadKind::DelegatedPermit(permit) => {
                raw.permit2_authorization = serde_json::to_value(permit).ok();
            }
            PayloadKind::Transaction(tx) => raw.transaction = Some(tx),
            PayloadKind::Unknown => {}
        }

        raw.other = other;
        raw
    }
}

fn parse_record<T: serde::de::DeserializeOwned>(value: &Value) -> Option<T> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Integer field that may arrive as a JSON string or a JSON number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntegerField {
    Text(String),
    Number(Number),
}

impl From<&str> for IntegerField {
    fn from(value: &str) -> Self {
        IntegerField::Text(value.to_string())
    }
}

impl From<u64> for IntegerField {
    fn from(value: u64) -> Self {
        IntegerField::Number(value.into())
    }
}

impl IntegerField {
    /// String form, if the field is already text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            IntegerField::Text(s) => Some(s),
            IntegerField::Number(_) => None,
        }
    }
}

/// EIP-3009 `transferWithAuthorization` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectAuthorization {
    /// Payer's wallet address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient's wallet address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Payment amount in atomic units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<IntegerField>,
    /// Unix timestamp when authorization becomes valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_after: Option<IntegerField>,
    /// Unix timestamp when authorization expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_before: Option<IntegerField>,
    /// 32-byte nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl DirectAuthorization {
    /// Create a fully populated authorization
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        value: impl Into<String>,
        valid_after: impl Into<String>,
        valid_before: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
            value: Some(IntegerField::Text(value.into())),
            valid_after: Some(IntegerField::Text(valid_after.into())),
            valid_before: Some(IntegerField::Text(valid_before.into())),
            nonce: Some(nonce.into()),
        }
    }
}

/// Permit2 `permitWitnessTransferFrom` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedPermit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<IntegerField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<IntegerField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permitted: Option<TokenPermissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<PermitWitness>,
}

/// Token and amount the spender may pull
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenPermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<IntegerField>,
}

/// x402 witness bound into the permit signature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitWitness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_after: Option<IntegerField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Payment requirements response (HTTP 402 body)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsResponse {
    /// Protocol version
    pub x402_version: u32,
    /// Human-readable error message
    pub error: String,
    /// Array of acceptable payment methods
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentRequirementsResponse {
    /// Create a new payment requirements response
    pub fn new(error: impl Into<String>, accepts: Vec<PaymentRequirements>) -> Self {
        Self {
            x402_version: X402_VERSION,
            error: error.into(),
            accepts,
        }
    }
}
