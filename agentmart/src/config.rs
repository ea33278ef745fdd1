//! Command-line and environment configuration.
//!
//! Every setting can come from a flag or an `AGENTMART_*` variable; `.env`
//! is loaded by the binary before parsing.
//!
//! # Environment Variables
//!
//! - `AGENTMART_NETWORK`: cluster, `devnet` (default) or `mainnet-beta`
//! - `AGENTMART_RPC_URL`: ledger endpoint (default: the cluster's public RPC)
//! - `AGENTMART_KEYPAIR`: path to a JSON keypair file; unset means no wallet
//! - `AGENTMART_COMMITMENT`: `processed`, `confirmed` (default) or `finalized`
//! - `AGENTMART_CONFIRM_TIMEOUT_SECS`: confirmation wait (default: `60`)
//! - `AGENTMART_HIRE_URL`: paid endpoint used by `hire`
//! - `AGENTMART_MAX_PAYMENT`: cap on base units a paid request may sign

use std::path::{Path, PathBuf};
use std::time::Duration;

use agentmart_svm::chain::SolanaNetwork;
use agentmart_svm::rpc::SolanaRpc;
use agentmart_svm::wallet::KeypairWallet;
use clap::{Args, Parser, Subcommand, ValueEnum};
use solana_commitment_config::CommitmentConfig;
use solana_keypair::Keypair;

use crate::catalog::{Domain, Status};
use crate::query::{AgentQuery, SortOrder};
use crate::reviews::ReviewSort;

/// Paid RPC endpoint agents are hired through.
pub const DEFAULT_HIRE_URL: &str = "https://helius.api.corbits.dev";

/// SOL sent by `fund` when no amount is given.
pub const DEFAULT_FUND_AMOUNT: &str = "0.1";

/// Errors loading the configured wallet.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The keypair file could not be read.
    #[error("failed to read keypair {path}: {source}")]
    Io {
        /// Keypair path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The keypair file is not a JSON byte array.
    #[error("keypair {path} is not a JSON byte array: {source}")]
    KeypairJson {
        /// Keypair path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// The bytes are not a valid ed25519 keypair.
    #[error("invalid keypair in {path}: {reason}")]
    Keypair {
        /// Keypair path.
        path: PathBuf,
        /// Why the bytes were refused.
        reason: String,
    },
}

/// Commitment a transfer must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Commitment {
    /// Seen by the connected node.
    Processed,
    /// Voted on by a supermajority.
    #[default]
    Confirmed,
    /// Rooted.
    Finalized,
}

impl From<Commitment> for CommitmentConfig {
    fn from(commitment: Commitment) -> Self {
        match commitment {
            Commitment::Processed => Self::processed(),
            Commitment::Confirmed => Self::confirmed(),
            Commitment::Finalized => Self::finalized(),
        }
    }
}

/// Browse the agent marketplace and fund agents from a Solana wallet.
#[derive(Debug, Parser)]
#[command(name = "agentmart", version)]
pub struct Cli {
    /// Wallet, ledger and payment settings.
    #[command(flatten)]
    pub settings: Settings,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Wallet, ledger and payment settings.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Solana cluster.
    #[arg(long, env = "AGENTMART_NETWORK", default_value = "devnet")]
    pub network: SolanaNetwork,

    /// Ledger RPC endpoint.
    #[arg(long, env = "AGENTMART_RPC_URL")]
    pub rpc_url: Option<String>,

    /// JSON keypair file of the paying wallet.
    #[arg(long, env = "AGENTMART_KEYPAIR")]
    pub keypair: Option<PathBuf>,

    /// Commitment transfers wait for.
    #[arg(long, env = "AGENTMART_COMMITMENT", value_enum, default_value_t)]
    pub commitment: Commitment,

    /// Seconds to wait for confirmation.
    #[arg(long, env = "AGENTMART_CONFIRM_TIMEOUT_SECS", default_value_t = 60)]
    pub confirm_timeout_secs: u64,

    /// Paid endpoint used to hire agents.
    #[arg(long, env = "AGENTMART_HIRE_URL", default_value = DEFAULT_HIRE_URL)]
    pub hire_url: String,

    /// Largest payment, in token base units, a paid request may sign.
    #[arg(long, env = "AGENTMART_MAX_PAYMENT")]
    pub max_payment: Option<u128>,
}

impl Settings {
    /// The configured endpoint, or the cluster's public one.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_rpc_url())
    }

    /// How long a transfer may take to confirm.
    #[must_use]
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    /// Connects the ledger client.
    #[must_use]
    pub fn ledger(&self) -> SolanaRpc {
        SolanaRpc::new(self.rpc_url(), self.commitment.into())
            .with_confirm_timeout(self.confirm_timeout())
    }

    /// Loads the wallet. Without a keypair path the wallet stays disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the keypair file is unreadable or invalid.
    pub fn wallet(&self) -> Result<KeypairWallet, ConfigError> {
        let Some(path) = &self.keypair else {
            return Ok(KeypairWallet::disconnected(self.network));
        };
        let keypair = read_keypair(path)?;
        Ok(KeypairWallet::connected(keypair, self.network))
    }
}

/// Reads a keypair stored as a JSON array of 64 bytes.
fn read_keypair(path: &Path) -> Result<Keypair, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes: Vec<u8> = serde_json::from_str(&raw).map_err(|source| ConfigError::KeypairJson {
        path: path.to_path_buf(),
        source,
    })?;
    Keypair::try_from(bytes.as_slice()).map_err(|e| ConfigError::Keypair {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List agents.
    Agents(AgentsArgs),
    /// Show one agent's profile.
    Show {
        /// Agent id.
        id: String,
    },
    /// List an agent's client reviews with a rating summary.
    Reviews {
        /// Agent id.
        id: String,
        /// Review order.
        #[arg(long, value_enum, default_value_t)]
        sort: ReviewSort,
    },
    /// Rank agents by rating.
    Leaderboard {
        /// Rank within one domain only.
        #[arg(long, value_enum)]
        domain: Option<Domain>,
    },
    /// Platform totals and per-domain statistics.
    Analytics,
    /// Send SOL to an agent's wallet.
    Fund {
        /// Agent id.
        id: String,
        /// Amount in SOL.
        #[arg(long, default_value = DEFAULT_FUND_AMOUNT)]
        amount: String,
    },
    /// Hire an agent through a paid endpoint.
    Hire {
        /// Agent id.
        id: String,
        /// Endpoint overriding `--hire-url`.
        #[arg(long)]
        url: Option<String>,
    },
}

/// Filters and order for `agents`.
#[derive(Debug, Clone, Args)]
pub struct AgentsArgs {
    /// Match name, title, description or skills.
    #[arg(long)]
    pub search: Option<String>,
    /// Only agents in this domain.
    #[arg(long, value_enum)]
    pub domain: Option<Domain>,
    /// Only agents with this status.
    #[arg(long, value_enum)]
    pub status: Option<Status>,
    /// Minimum rating, 0 to 5.
    #[arg(long)]
    pub min_rating: Option<f64>,
    /// Result order.
    #[arg(long, value_enum, default_value_t)]
    pub sort: SortOrder,
}

impl From<AgentsArgs> for AgentQuery {
    fn from(args: AgentsArgs) -> Self {
        Self {
            search: args.search,
            domain: args.domain,
            status: args.status,
            min_rating: args.min_rating,
            sort: args.sort,
        }
    }
}
