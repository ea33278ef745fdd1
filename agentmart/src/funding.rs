//! The funding action: move value from the connected wallet to an agent.
//!
//! Two strategies share one in-flight guard. A direct transfer sends native
//! SOL to the listing's address and waits for confirmation. A paid request
//! posts a JSON-RPC body through the paying client and returns the JSON
//! response. While one funding is pending, a second trigger fails with
//! [`FundingError::AlreadyPending`] and touches nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use agentmart_http::error::HttpError;
use agentmart_pay::amount::AmountError;
use agentmart_pay::scheme::ClientError;
use agentmart_svm::chain::Address;
use agentmart_svm::rpc::{LedgerError, LedgerRpc};
use agentmart_svm::transfer::{TransferError, send_native_transfer, sol_to_lamports};
use agentmart_svm::wallet::{Wallet, WalletError};
use solana_commitment_config::CommitmentConfig;
use solana_signature::Signature;
use tracing::{info, instrument, warn};

use crate::payer::{DEFAULT_PAYMENT_TOKEN, fetch_with_payer, resolve_payment_token};

/// Failures of a funding action. Validation errors come first and never
/// reach the wallet or the ledger.
#[derive(Debug, thiserror::Error)]
pub enum FundingError {
    /// No wallet account is connected.
    #[error("connect a wallet first")]
    WalletNotConnected,
    /// Another funding action is still running.
    #[error("a funding action is already pending")]
    AlreadyPending,
    /// The destination is not a Solana address.
    #[error("invalid destination address {0:?}")]
    InvalidDestination(String),
    /// The amount is malformed, zero or too precise.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// The user declined to sign.
    #[error("signing rejected: {0}")]
    SigningRejected(String),
    /// The wallet or payment handler could not sign.
    #[error("signing failed: {0}")]
    Signing(String),
    /// The payment challenge could not be answered.
    #[error("payment failed: {0}")]
    Payment(String),
    /// The node refused the transaction.
    #[error("submission failed: {0}")]
    Submission(String),
    /// The transaction did not confirm in time.
    #[error("transaction {signature} not confirmed after {waited:?}")]
    ConfirmationTimeout {
        /// Pending transaction.
        signature: Signature,
        /// Time waited.
        waited: Duration,
    },
    /// The transaction failed on chain.
    #[error("transaction {signature} failed: {reason}")]
    TransactionFailed {
        /// Failed transaction.
        signature: Signature,
        /// Ledger error.
        reason: String,
    },
    /// The request could not be sent or its response read.
    #[error("request failed: {0}")]
    Request(String),
    /// The endpoint answered with a non-success status.
    #[error("HTTP error {status}{}", display_reason(reason.as_deref()))]
    HttpStatus {
        /// Response status.
        status: u16,
        /// Reason reported in the settlement receipt, if any.
        reason: Option<String>,
    },
}

fn display_reason(reason: Option<&str>) -> String {
    reason.map(|r| format!(": {r}")).unwrap_or_default()
}

impl From<AmountError> for FundingError {
    fn from(err: AmountError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}

impl From<WalletError> for FundingError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NotConnected => Self::WalletNotConnected,
            WalletError::Rejected(reason) => Self::SigningRejected(reason),
            WalletError::Signing(reason) => Self::Signing(reason),
        }
    }
}

impl From<LedgerError> for FundingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rpc(e) | LedgerError::Submission(e) => Self::Submission(e),
            LedgerError::ConfirmationTimeout { signature, waited } => {
                Self::ConfirmationTimeout { signature, waited }
            }
            LedgerError::TransactionFailed { signature, reason } => {
                Self::TransactionFailed { signature, reason }
            }
        }
    }
}

impl From<TransferError> for FundingError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::ZeroAmount => Self::InvalidAmount(err.to_string()),
            TransferError::Build(e) => Self::Signing(e),
            TransferError::Wallet(e) => e.into(),
            TransferError::Ledger(e) => e.into(),
        }
    }
}

impl From<ClientError> for FundingError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::SigningRejected(reason) => Self::SigningRejected(reason),
            ClientError::SigningError(reason) => Self::Signing(reason),
            ClientError::RequestNotCloneable => Self::Request(err.to_string()),
            other => Self::Payment(other.to_string()),
        }
    }
}

impl From<reqwest_middleware::Error> for FundingError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Middleware(e) => {
                if let Some(HttpError::RetryFailed { status, reason }) =
                    e.downcast_ref::<HttpError>()
                {
                    return Self::HttpStatus {
                        status: *status,
                        reason: reason.clone(),
                    };
                }
                match e.downcast::<ClientError>() {
                    Ok(client_err) => client_err.into(),
                    Err(e) => Self::Request(e.to_string()),
                }
            }
            reqwest_middleware::Error::Reqwest(e) => Self::Request(e.to_string()),
        }
    }
}

/// What to fund.
#[derive(Debug, Clone)]
pub enum FundingRequest {
    /// Send native SOL to a listing's address.
    Transfer {
        /// Base58 destination address.
        destination: String,
        /// Decimal SOL amount, e.g. `"0.1"`.
        amount_sol: String,
    },
    /// POST a JSON body through the paying client.
    PaidRequest {
        /// Endpoint URL.
        url: String,
        /// JSON request body.
        body: serde_json::Value,
    },
}

impl FundingRequest {
    /// The JSON-RPC `getBlockHeight` call used to hire an agent through a
    /// paid RPC endpoint.
    #[must_use]
    pub fn hire(url: impl Into<String>) -> Self {
        Self::PaidRequest {
            url: url.into(),
            body: serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "getBlockHeight",
            }),
        }
    }
}

/// Result of a successful funding action.
#[derive(Debug, Clone, PartialEq)]
pub enum FundingOutcome {
    /// The transfer confirmed with this signature.
    Transferred(Signature),
    /// The paid endpoint answered with this body.
    Responded(serde_json::Value),
}

/// Clears the in-flight flag when the action finishes, however it finishes.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The funding control for one wallet.
#[derive(Debug)]
pub struct FundingAction<W, R> {
    wallet: W,
    rpc: R,
    http: reqwest::Client,
    commitment: CommitmentConfig,
    max_payment: Option<u128>,
    in_flight: AtomicBool,
}

impl<W, R> FundingAction<W, R>
where
    W: Wallet + Clone + 'static,
    R: LedgerRpc + Clone + 'static,
{
    /// Creates a funding action confirming at `confirmed`.
    pub fn new(wallet: W, rpc: R, http: reqwest::Client) -> Self {
        Self {
            wallet,
            rpc,
            http,
            commitment: CommitmentConfig::confirmed(),
            max_payment: None,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Sets the commitment a transfer must reach.
    #[must_use]
    pub const fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    /// Caps the base units a paid request may sign.
    #[must_use]
    pub const fn with_max_payment(mut self, max_payment: Option<u128>) -> Self {
        self.max_payment = max_payment;
        self
    }

    /// Returns `true` while an action is running.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one funding action.
    ///
    /// # Errors
    ///
    /// Returns [`FundingError::AlreadyPending`] if another action is running,
    /// a validation error before anything is signed, or the stage-specific
    /// failure of the strategy.
    #[instrument(name = "agentmart.funding.run", skip_all, err)]
    pub async fn run(&self, request: FundingRequest) -> Result<FundingOutcome, FundingError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("Funding already pending, ignoring trigger");
            return Err(FundingError::AlreadyPending);
        };
        if self.wallet.pubkey().is_none() {
            return Err(FundingError::WalletNotConnected);
        }
        match request {
            FundingRequest::Transfer {
                destination,
                amount_sol,
            } => self.transfer(&destination, &amount_sol).await,
            FundingRequest::PaidRequest { url, body } => self.paid_request(&url, &body).await,
        }
    }

    async fn transfer(
        &self,
        destination: &str,
        amount_sol: &str,
    ) -> Result<FundingOutcome, FundingError> {
        let to: Address = destination
            .parse()
            .map_err(|_| FundingError::InvalidDestination(destination.to_owned()))?;
        let lamports = sol_to_lamports(amount_sol)?;
        if lamports == 0 {
            return Err(FundingError::InvalidAmount(format!("{amount_sol} SOL is zero")));
        }
        info!(%to, lamports, "Sending native transfer");
        let signature =
            send_native_transfer(&self.wallet, &self.rpc, to.pubkey(), lamports, self.commitment)
                .await?;
        info!(%signature, "Transfer confirmed");
        Ok(FundingOutcome::Transferred(signature))
    }

    async fn paid_request(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<FundingOutcome, FundingError> {
        let token = resolve_payment_token(&self.wallet, DEFAULT_PAYMENT_TOKEN);
        let client = fetch_with_payer(
            self.http.clone(),
            self.wallet.clone(),
            self.rpc.clone(),
            token,
            self.max_payment,
        );
        let response = client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FundingError::HttpStatus {
                status: status.as_u16(),
                reason: None,
            });
        }
        let json = response
            .json()
            .await
            .map_err(|e| FundingError::Request(e.to_string()))?;
        info!(%url, "Paid request succeeded");
        Ok(FundingOutcome::Responded(json))
    }
}
