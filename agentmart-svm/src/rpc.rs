//! Ledger RPC.
//!
//! [`LedgerRpc`] is the narrow slice of the Solana JSON-RPC API the payment
//! and funding flows use. [`SolanaRpc`] implements it on top of the
//! nonblocking `RpcClient`; tests substitute in-memory fakes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

/// Default time to wait for a submitted transaction to reach the requested
/// commitment.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between signature status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Ledger failures, kept apart so callers can tell a timeout from a rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A read call failed.
    #[error("RPC error: {0}")]
    Rpc(String),
    /// The node refused the transaction.
    #[error("transaction submission failed: {0}")]
    Submission(String),
    /// The transaction did not reach the commitment in time.
    #[error("transaction {signature} not confirmed within {waited:?}")]
    ConfirmationTimeout {
        /// Signature of the pending transaction.
        signature: Signature,
        /// How long confirmation was awaited.
        waited: Duration,
    },
    /// The transaction landed but failed.
    #[error("transaction {signature} failed: {reason}")]
    TransactionFailed {
        /// Signature of the failed transaction.
        signature: Signature,
        /// Error reported by the ledger.
        reason: String,
    },
}

/// The ledger calls needed to build, submit and confirm a payment.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Fetches a recent blockhash for a new message.
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// Returns a compute-unit price for transactions writing `writable`.
    async fn priority_fee_micro_lamports(&self, writable: &[Pubkey]) -> Result<u64, LedgerError>;

    /// Submits a signed transaction.
    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, LedgerError>;

    /// Waits until `signature` reaches `commitment`.
    async fn confirm(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<(), LedgerError>;
}

#[async_trait]
impl<R: LedgerRpc + ?Sized> LedgerRpc for Arc<R> {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        (**self).latest_blockhash().await
    }

    async fn priority_fee_micro_lamports(&self, writable: &[Pubkey]) -> Result<u64, LedgerError> {
        (**self).priority_fee_micro_lamports(writable).await
    }

    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, LedgerError> {
        (**self).submit(transaction).await
    }

    async fn confirm(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<(), LedgerError> {
        (**self).confirm(signature, commitment).await
    }
}

/// [`LedgerRpc`] over a Solana JSON-RPC endpoint.
#[derive(Clone)]
pub struct SolanaRpc {
    client: Arc<RpcClient>,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaRpc")
            .field("url", &self.client.url())
            .field("confirm_timeout", &self.confirm_timeout)
            .finish_non_exhaustive()
    }
}

impl SolanaRpc {
    /// Connects to `url`, reading at `commitment`.
    #[must_use]
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self::from_client(RpcClient::new_with_commitment(url.into(), commitment))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn from_client(client: RpcClient) -> Self {
        Self {
            client: Arc::new(client),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how long [`LedgerRpc::confirm`] waits before giving up.
    #[must_use]
    pub const fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Sets the signature status poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))
    }

    async fn priority_fee_micro_lamports(&self, writable: &[Pubkey]) -> Result<u64, LedgerError> {
        let recent_fees = self
            .client
            .get_recent_prioritization_fees(writable)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        Ok(recent_fees
            .iter()
            .map(|fee| fee.prioritization_fee)
            .filter(|fee| *fee > 0)
            .min()
            .unwrap_or(1))
    }

    #[cfg_attr(feature = "telemetry", instrument(name = "agentmart.ledger.submit", skip_all, err))]
    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, LedgerError> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(|e| LedgerError::Submission(e.to_string()))
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "agentmart.ledger.confirm",
            skip(self, signature),
            fields(signature = %signature),
            err
        )
    )]
    async fn confirm(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<(), LedgerError> {
        let started = tokio::time::Instant::now();
        loop {
            let status = self
                .client
                .get_signature_status_with_commitment(signature, commitment)
                .await
                .map_err(|e| LedgerError::Rpc(e.to_string()))?;
            match status {
                Some(Ok(())) => return Ok(()),
                Some(Err(e)) => {
                    return Err(LedgerError::TransactionFailed {
                        signature: *signature,
                        reason: e.to_string(),
                    });
                }
                None => {}
            }
            let waited = started.elapsed();
            if waited >= self.confirm_timeout {
                return Err(LedgerError::ConfirmationTimeout {
                    signature: *signature,
                    waited,
                });
            }
            #[cfg(feature = "telemetry")]
            debug!(?waited, "Transaction not yet at commitment");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
