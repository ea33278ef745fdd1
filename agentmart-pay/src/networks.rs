//! Network name registry.
//!
//! Older challenges (protocol version 1) name networks by a short label such
//! as `"solana-devnet"`; current ones use CAIP-2 ids. A [`NetworkRegistry`]
//! built from chain-specific tables maps between the two.

use std::collections::HashMap;

use crate::chain::ChainId;

/// A known network definition with its chain ID and human-readable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Human-readable network name (e.g. "solana-devnet").
    pub name: &'static str,
    /// CAIP-2 namespace (e.g. "solana").
    pub namespace: &'static str,
    /// Chain reference.
    pub reference: &'static str,
}

impl NetworkInfo {
    /// Creates a `ChainId` from this network info.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

/// Bidirectional map between network names and [`ChainId`] values.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    name_to_chain_id: HashMap<&'static str, ChainId>,
    chain_id_to_name: HashMap<ChainId, &'static str>,
}

impl NetworkRegistry {
    /// Creates a registry pre-populated from a network info slice.
    #[must_use]
    pub fn from_networks(networks: &[NetworkInfo]) -> Self {
        let mut registry = Self::default();
        registry.register(networks);
        registry
    }

    /// Registers additional networks. The first name registered for a chain
    /// stays its canonical name.
    pub fn register(&mut self, networks: &[NetworkInfo]) {
        for info in networks {
            let chain_id = info.chain_id();
            self.chain_id_to_name.entry(chain_id.clone()).or_insert(info.name);
            self.name_to_chain_id.insert(info.name, chain_id);
        }
    }

    /// Looks up a [`ChainId`] by network name.
    #[must_use]
    pub fn chain_id_by_name(&self, name: &str) -> Option<&ChainId> {
        self.name_to_chain_id.get(name)
    }

    /// Looks up the canonical network name of a [`ChainId`].
    #[must_use]
    pub fn name_by_chain_id(&self, chain_id: &ChainId) -> Option<&'static str> {
        self.chain_id_to_name.get(chain_id).copied()
    }

    /// Resolves either a CAIP-2 id or a registered name to a [`ChainId`].
    #[must_use]
    pub fn resolve(&self, network: &str) -> Option<ChainId> {
        if let Some(chain_id) = self.chain_id_by_name(network) {
            return Some(chain_id.clone());
        }
        network.parse().ok()
    }
}
