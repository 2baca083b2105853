//! Network asset registry
//!
//! Static mapping from chain id to the USDC deployment used to build explicit
//! `{amount, asset, extra}` prices.

use serde_json::json;

/// Token deployment details for one EVM chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAsset {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// CAIP-2 network identifier (e.g. `eip155:8453`)
    pub caip2: &'static str,
    /// Legacy network name (e.g. `base`)
    pub name: &'static str,
    /// Token contract address (checksummed)
    pub token_address: &'static str,
    /// EIP-712 domain name of the token
    pub token_name: &'static str,
    /// EIP-712 domain version of the token
    pub token_version: &'static str,
    /// Token decimals
    pub decimals: u32,
    /// Whether this is a testnet
    pub is_testnet: bool,
}

/// Base mainnet USDC
pub const BASE_MAINNET: NetworkAsset = NetworkAsset {
    chain_id: 8453,
    caip2: "eip155:8453",
    name: "base",
    token_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
    token_name: "USD Coin",
    token_version: "2",
    decimals: 6,
    is_testnet: false,
};

/// Base Sepolia USDC
pub const BASE_SEPOLIA: NetworkAsset = NetworkAsset {
    chain_id: 84532,
    caip2: "eip155:84532",
    name: "base-sepolia",
    token_address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
    token_name: "USDC",
    token_version: "2",
    decimals: 6,
    is_testnet: true,
};

const REGISTRY: [NetworkAsset; 2] = [BASE_MAINNET, BASE_SEPOLIA];

impl NetworkAsset {
    /// Look up a deployment by chain id
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        REGISTRY.iter().copied().find(|n| n.chain_id == chain_id)
    }

    /// Look up a deployment by CAIP-2 id or legacy name
    pub fn from_network(network: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .copied()
            .find(|n| n.caip2 == network || n.name == network)
    }

    /// All registered deployments
    pub fn all() -> &'static [NetworkAsset] {
        &REGISTRY
    }

    /// EIP-712 domain metadata placed in `extra`
    pub fn extra(&self) -> serde_json::Value {
        json!({
            "name": self.token_name,
            "version": self.token_version,
        })
    }
}
