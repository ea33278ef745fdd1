//! Solana "exact" payment scheme.
//!
//! A payment is a single SPL Token `TransferChecked` of the exact required
//! amount, wrapped in a versioned transaction signed by the payer's wallet.
//!
//! # Transaction Structure
//!
//! - Index 0: `SetComputeUnitLimit`
//! - Index 1: `SetComputeUnitPrice`
//! - Index 2: `TransferChecked`

use agentmart_pay::scheme::SchemeId;

pub mod client;
pub use client::SolanaExactClient;

pub mod types;
pub use types::*;

use crate::chain::SOLANA_NAMESPACE;

/// Solana exact scheme identifier.
#[derive(Debug, Clone, Copy)]
pub struct SolanaExact;

impl SchemeId for SolanaExact {
    fn namespace(&self) -> &str {
        SOLANA_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}
