//! Core Solana chain types.
//!
//! - [`Address`] - A base58 public key with string serde
//! - [`SolanaNetwork`] - The clusters agentmart knows how to pay on
//! - [`SolanaTokenDeployment`] - A token mint deployed on one of those clusters
//!
//! Solana networks are identified in CAIP-2 by the first 32 characters of
//! their genesis hash:
//! - Mainnet: `5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp`
//! - Devnet: `EtWTRABZaYq6iMfeYKouRu166VU2xqa1`

use agentmart_pay::chain::ChainId;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use solana_pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

/// CAIP-2 namespace of every Solana cluster.
pub const SOLANA_NAMESPACE: &str = "solana";

/// A Solana public key that serializes as a base58 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(Pubkey);

impl Address {
    /// Wraps a public key.
    #[must_use]
    pub const fn new(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }

    /// Returns the wrapped public key.
    #[must_use]
    pub const fn pubkey(&self) -> &Pubkey {
        &self.0
    }
}

/// Error returned for a string that is not a base58 public key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Solana address {0:?}")]
pub struct AddressError(pub String);

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_str(s.trim())
            .map(Self)
            .map_err(|_| AddressError(s.to_owned()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<Pubkey> for Address {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl From<Address> for Pubkey {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

/// A Solana cluster a wallet can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SolanaNetwork {
    /// `mainnet-beta`.
    Mainnet,
    /// `devnet`.
    #[default]
    Devnet,
}

impl SolanaNetwork {
    /// Every known cluster.
    pub const ALL: [Self; 2] = [Self::Mainnet, Self::Devnet];

    /// Returns the cluster name used by wallets and explorers.
    #[must_use]
    pub const fn cluster_name(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet-beta",
            Self::Devnet => "devnet",
        }
    }

    /// Returns the CAIP-2 chain reference (genesis hash prefix).
    #[must_use]
    pub const fn reference(self) -> &'static str {
        match self {
            Self::Mainnet => "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
            Self::Devnet => "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        }
    }

    /// Returns the CAIP-2 chain id.
    #[must_use]
    pub fn chain_id(self) -> ChainId {
        ChainId::new(SOLANA_NAMESPACE, self.reference())
    }

    /// Returns the public RPC endpoint of the cluster.
    #[must_use]
    pub const fn default_rpc_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.mainnet-beta.solana.com",
            Self::Devnet => "https://api.devnet.solana.com",
        }
    }

    /// Finds the cluster of a CAIP-2 chain id.
    #[must_use]
    pub fn from_chain_id(chain_id: &ChainId) -> Option<Self> {
        if chain_id.namespace() != SOLANA_NAMESPACE {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|network| network.reference() == chain_id.reference())
    }
}

impl fmt::Display for SolanaNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cluster_name())
    }
}

/// Error returned for an unknown network name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown Solana network {0:?}")]
pub struct UnknownNetwork(pub String);

impl FromStr for SolanaNetwork {
    type Err = UnknownNetwork;

    /// Accepts cluster names, the `solana`/`solana-devnet` labels and CAIP-2 ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name {
            "mainnet-beta" | "mainnet" | "solana" => Ok(Self::Mainnet),
            "devnet" | "solana-devnet" => Ok(Self::Devnet),
            _ => name
                .parse::<ChainId>()
                .ok()
                .as_ref()
                .and_then(Self::from_chain_id)
                .ok_or_else(|| UnknownNetwork(name.to_owned())),
        }
    }
}

/// A token mint deployed on a Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolanaTokenDeployment {
    /// Cluster the mint lives on.
    pub network: SolanaNetwork,
    /// Ticker symbol, e.g. `USDC`.
    pub symbol: &'static str,
    /// Mint address.
    pub mint: Address,
    /// Decimal places of the mint.
    pub decimals: u8,
}

impl SolanaTokenDeployment {
    /// Creates a deployment record.
    #[must_use]
    pub const fn new(
        network: SolanaNetwork,
        symbol: &'static str,
        mint: Address,
        decimals: u8,
    ) -> Self {
        Self {
            network,
            symbol,
            mint,
            decimals,
        }
    }

    /// Converts a human-readable amount into base units of this token.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError`](agentmart_pay::amount::AmountError) if the amount
    /// is malformed or too precise for the mint.
    pub fn parse_amount(&self, amount: &str) -> Result<u64, agentmart_pay::amount::AmountError> {
        agentmart_pay::amount::parse_units(amount, self.decimals)
    }
}
