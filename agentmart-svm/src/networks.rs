//! Well-known Solana networks and token deployments.
//!
//! This is the table behind [`lookup_known_spl_token`]: given a network (by
//! cluster name, label or CAIP-2 id) and a token symbol it returns the mint.

use std::sync::LazyLock;

use agentmart_pay::networks::{NetworkInfo, NetworkRegistry};
use solana_pubkey::pubkey;

use crate::chain::{Address, SolanaNetwork, SolanaTokenDeployment};

/// Well-known Solana network names with their CAIP-2 identifiers.
///
/// The first name listed for a chain is its canonical label.
pub static SOLANA_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
    },
    NetworkInfo {
        name: "mainnet-beta",
        namespace: "solana",
        reference: "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    },
    NetworkInfo {
        name: "devnet",
        namespace: "solana",
        reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
    },
];

static REGISTRY: LazyLock<NetworkRegistry> =
    LazyLock::new(|| NetworkRegistry::from_networks(SOLANA_NETWORKS));

/// Returns a registry of [`SOLANA_NETWORKS`].
#[must_use]
pub fn solana_network_registry() -> &'static NetworkRegistry {
    &REGISTRY
}

/// Known SPL token deployments.
pub static KNOWN_SPL_TOKENS: &[SolanaTokenDeployment] = &[
    // Circle USDC, mainnet
    SolanaTokenDeployment::new(
        SolanaNetwork::Mainnet,
        "USDC",
        Address::new(pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")),
        6,
    ),
    // Circle USDC test token, devnet
    SolanaTokenDeployment::new(
        SolanaNetwork::Devnet,
        "USDC",
        Address::new(pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU")),
        6,
    ),
];

/// Resolves a token symbol on a network to its deployment.
///
/// `network` may be a cluster name (`"devnet"`), a label (`"solana-devnet"`)
/// or a CAIP-2 id. The symbol match is case-insensitive. Returns `None` for
/// an unknown network or token.
#[must_use]
pub fn lookup_known_spl_token(
    network: &str,
    symbol: &str,
) -> Option<&'static SolanaTokenDeployment> {
    let network = network.parse::<SolanaNetwork>().ok()?;
    KNOWN_SPL_TOKENS
        .iter()
        .find(|t| t.network == network && t.symbol.eq_ignore_ascii_case(symbol))
}

/// Finds a known deployment by network and mint address.
#[must_use]
pub fn known_token_by_mint(
    network: SolanaNetwork,
    mint: &Address,
) -> Option<&'static SolanaTokenDeployment> {
    KNOWN_SPL_TOKENS
        .iter()
        .find(|t| t.network == network && t.mint == *mint)
}
