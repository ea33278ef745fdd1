#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana support for agentmart.
//!
//! # Architecture
//!
//! - [`chain`] - Addresses, clusters and token deployments
//! - [`wallet`] - The [`Wallet`](wallet::Wallet) capability and a keypair-backed
//!   implementation
//! - [`rpc`] - The [`LedgerRpc`](rpc::LedgerRpc) slice of JSON-RPC and its
//!   `RpcClient` implementation
//! - [`exact`] - The "exact" SPL payment scheme client
//! - [`transfer`] - Native SOL transfers
//!
//! The known network and token table lives at the crate root; see
//! [`lookup_known_spl_token`].
//!
//! # Feature Flags
//!
//! - `telemetry` - `tracing` spans on signing, submission and confirmation
//!
//! # Example
//!
//! ```ignore
//! use agentmart_svm::exact::SolanaExactClient;
//! use agentmart_svm::rpc::SolanaRpc;
//! use agentmart_svm::wallet::KeypairWallet;
//! use agentmart_svm::{lookup_known_spl_token, chain::SolanaNetwork};
//!
//! let usdc = lookup_known_spl_token("devnet", "USDC").unwrap();
//! let wallet = KeypairWallet::connected(keypair, SolanaNetwork::Devnet);
//! let rpc = SolanaRpc::new(
//!     SolanaNetwork::Devnet.default_rpc_url(),
//!     CommitmentConfig::confirmed(),
//! );
//! let handler = SolanaExactClient::new(wallet, rpc, usdc);
//! ```

pub mod chain;
pub mod exact;
pub mod rpc;
pub mod transfer;
pub mod wallet;

mod networks;
pub use networks::*;

pub use exact::{SolanaExact, SolanaExactClient};
