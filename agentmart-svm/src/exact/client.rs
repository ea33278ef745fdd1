//! Client-side payment signing for the Solana "exact" scheme.
//!
//! [`SolanaExactClient`] is the payment handler for one wallet, one token and
//! one ledger connection. It offers a candidate for every challenge option
//! that names its scheme, the wallet's cluster and its token mint; signing a
//! candidate builds the `TransferChecked` transaction and hands it to the
//! wallet.

use std::future::Future;
use std::pin::Pin;

use agentmart_pay::encoding::Base64Bytes;
use agentmart_pay::proto::{PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo};
use agentmart_pay::scheme::{
    ClientError, PaymentCandidate, PaymentCandidateSigner, SchemeClient, SchemeId,
};
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_message::v0::Message as MessageV0;
use solana_message::{Hash, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use crate::chain::{Address, SolanaTokenDeployment};
use crate::exact::{
    EXACT_SCHEME, ExactSolanaPayload, SolanaExact, TransactionInt, associated_token_address,
};
use crate::networks::solana_network_registry;
use crate::rpc::LedgerRpc;
use crate::wallet::{Wallet, WalletError};

/// Compute-unit limit set on every payment transaction.
///
/// A lone `TransferChecked` between existing accounts stays well below it.
pub const TRANSFER_COMPUTE_UNIT_LIMIT: u32 = 20_000;

/// Key of the optional fee payer in the requirement's `extra` object.
const FEE_PAYER_KEY: &str = "feePayer";

/// Payment handler for SPL token transfers signed by a [`Wallet`].
#[derive(Clone)]
pub struct SolanaExactClient<W, R> {
    wallet: W,
    rpc: R,
    token: &'static SolanaTokenDeployment,
}

impl<W, R> std::fmt::Debug for SolanaExactClient<W, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaExactClient")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl<W, R> SolanaExactClient<W, R> {
    /// Creates a handler paying in `token` from `wallet`.
    pub const fn new(wallet: W, rpc: R, token: &'static SolanaTokenDeployment) -> Self {
        Self { wallet, rpc, token }
    }

    /// The token this handler pays with.
    #[must_use]
    pub const fn token(&self) -> &'static SolanaTokenDeployment {
        self.token
    }
}

impl<W, R> SchemeId for SolanaExactClient<W, R> {
    fn namespace(&self) -> &str {
        SolanaExact.namespace()
    }

    fn scheme(&self) -> &str {
        SolanaExact.scheme()
    }
}

impl<W, R> SchemeClient for SolanaExactClient<W, R>
where
    W: Wallet + Clone + 'static,
    R: LedgerRpc + Clone + 'static,
{
    fn accept(&self, payment_required: &PaymentRequired) -> Vec<PaymentCandidate> {
        let Some(payer) = self.wallet.pubkey() else {
            #[cfg(feature = "telemetry")]
            debug!("Wallet not connected, offering no Solana candidates");
            return vec![];
        };
        let wallet_chain = self.wallet.network().chain_id();
        let registry = solana_network_registry();
        payment_required
            .accepts
            .iter()
            .filter_map(|requirements| {
                if requirements.scheme != EXACT_SCHEME {
                    return None;
                }
                let chain_id = requirements.chain_id(registry)?;
                if chain_id != wallet_chain {
                    return None;
                }
                let asset: Address = requirements.asset.parse().ok()?;
                if asset != self.token.mint {
                    return None;
                }
                let pay_to: Address = requirements.pay_to.parse().ok()?;
                let amount = requirements.amount_units()?;
                let base_units = u64::try_from(amount).ok()?;
                Some(PaymentCandidate {
                    chain_id,
                    asset: asset.to_string(),
                    amount,
                    scheme: self.scheme().to_owned(),
                    x402_version: payment_required.x402_version,
                    pay_to: pay_to.to_string(),
                    signer: Box::new(ExactPayloadSigner {
                        wallet: self.wallet.clone(),
                        rpc: self.rpc.clone(),
                        token: self.token,
                        payer,
                        pay_to,
                        amount: base_units,
                        x402_version: payment_required.x402_version,
                        requirements: requirements.clone(),
                        resource: payment_required.resource.clone(),
                    }),
                })
            })
            .collect()
    }
}

struct ExactPayloadSigner<W, R> {
    wallet: W,
    rpc: R,
    token: &'static SolanaTokenDeployment,
    payer: Pubkey,
    pay_to: Address,
    amount: u64,
    x402_version: u32,
    requirements: PaymentRequirements,
    resource: Option<ResourceInfo>,
}

impl<W: Wallet, R: LedgerRpc> ExactPayloadSigner<W, R> {
    fn fee_payer(&self) -> Result<Pubkey, ClientError> {
        match self.requirements.extra_str(FEE_PAYER_KEY) {
            Some(raw) => raw
                .parse::<Address>()
                .map(Pubkey::from)
                .map_err(|e| ClientError::SigningError(format!("invalid fee payer: {e}"))),
            None => Ok(self.payer),
        }
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "agentmart.solana_exact.sign",
            skip_all,
            fields(pay_to = %self.pay_to, amount = self.amount),
            err
        )
    )]
    async fn sign(&self) -> Result<String, ClientError> {
        let fee_payer = self.fee_payer()?;
        let source = associated_token_address(&self.payer, self.token.mint.pubkey());
        let destination = associated_token_address(self.pay_to.pubkey(), self.token.mint.pubkey());
        let ledger_err = |e: crate::rpc::LedgerError| ClientError::SigningError(e.to_string());

        let recent_blockhash = self.rpc.latest_blockhash().await.map_err(ledger_err)?;
        let priority_fee = self
            .rpc
            .priority_fee_micro_lamports(&[fee_payer, destination, source])
            .await
            .map_err(ledger_err)?;

        let unsigned = build_transfer_transaction(&TransferParams {
            fee_payer,
            owner: self.payer,
            pay_to: *self.pay_to.pubkey(),
            token: self.token,
            amount: self.amount,
            priority_fee_micro_lamports: priority_fee,
            recent_blockhash,
        })?;

        let signed = self
            .wallet
            .sign_transaction(unsigned)
            .await
            .map_err(|e| match e {
                WalletError::Rejected(reason) => ClientError::SigningRejected(reason),
                other => ClientError::SigningError(other.to_string()),
            })?;
        let transaction = TransactionInt::new(signed)
            .as_base64()
            .map_err(|e| ClientError::SigningError(e.to_string()))?;

        let payload = PaymentPayload {
            x402_version: self.x402_version,
            payload: serde_json::to_value(ExactSolanaPayload { transaction })?,
            accepted: self.requirements.clone(),
            resource: self.resource.clone(),
        };
        Ok(Base64Bytes::encode_json(&payload)?.to_string())
    }
}

impl<W: Wallet, R: LedgerRpc> PaymentCandidateSigner for ExactPayloadSigner<W, R> {
    fn sign_payment(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<String, ClientError>> + Send + '_>> {
        Box::pin(self.sign())
    }
}

/// Inputs of [`build_transfer_transaction`].
#[derive(Debug, Clone, Copy)]
pub struct TransferParams {
    /// Account paying the transaction fee.
    pub fee_payer: Pubkey,
    /// Token owner authorizing the transfer.
    pub owner: Pubkey,
    /// Recipient wallet; the transfer goes to its associated token account.
    pub pay_to: Pubkey,
    /// Token being transferred.
    pub token: &'static SolanaTokenDeployment,
    /// Amount in base units.
    pub amount: u64,
    /// Compute-unit price.
    pub priority_fee_micro_lamports: u64,
    /// Blockhash the message is built against.
    pub recent_blockhash: Hash,
}

/// Builds the unsigned payment transaction.
///
/// # Errors
///
/// Returns [`ClientError::SigningError`] if the transfer instruction or the
/// message cannot be built.
pub fn build_transfer_transaction(
    params: &TransferParams,
) -> Result<VersionedTransaction, ClientError> {
    let mint = params.token.mint.pubkey();
    let source = associated_token_address(&params.owner, mint);
    let destination = associated_token_address(&params.pay_to, mint);
    let transfer = spl_token::instruction::transfer_checked(
        &spl_token::id(),
        &source,
        mint,
        &destination,
        &params.owner,
        &[],
        params.amount,
        params.token.decimals,
    )
    .map_err(|e| ClientError::SigningError(e.to_string()))?;

    let instructions = [
        ComputeBudgetInstruction::set_compute_unit_limit(TRANSFER_COMPUTE_UNIT_LIMIT),
        ComputeBudgetInstruction::set_compute_unit_price(params.priority_fee_micro_lamports),
        transfer,
    ];
    let message = MessageV0::try_compile(
        &params.fee_payer,
        &instructions,
        &[],
        params.recent_blockhash,
    )
    .map_err(|e| ClientError::SigningError(format!("{e:?}")))?;
    let num_required = usize::from(message.header.num_required_signatures);
    Ok(VersionedTransaction {
        signatures: vec![Signature::default(); num_required],
        message: VersionedMessage::V0(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SolanaNetwork;
    use crate::networks::lookup_known_spl_token;
    use crate::rpc::LedgerError;
    use crate::wallet::KeypairWallet;
    use agentmart_pay::scheme::{FirstMatch, PaymentSelector};
    use async_trait::async_trait;
    use solana_commitment_config::CommitmentConfig;
    use solana_keypair::Keypair;
    use solana_signer::Signer;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct FakeLedger {
        fee_requests: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LedgerRpc for FakeLedger {
        async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
            Ok(Hash::new_from_array([7; 32]))
        }

        async fn priority_fee_micro_lamports(&self, _: &[Pubkey]) -> Result<u64, LedgerError> {
            self.fee_requests.fetch_add(1, Ordering::SeqCst);
            Ok(5_000)
        }

        async fn submit(&self, _: &VersionedTransaction) -> Result<Signature, LedgerError> {
            Err(LedgerError::Submission("payments are submitted by the server".to_owned()))
        }

        async fn confirm(&self, _: &Signature, _: CommitmentConfig) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct RejectingWallet(Pubkey);

    #[async_trait]
    impl Wallet for RejectingWallet {
        fn pubkey(&self) -> Option<Pubkey> {
            Some(self.0)
        }

        fn network(&self) -> SolanaNetwork {
            SolanaNetwork::Devnet
        }

        async fn sign_transaction(
            &self,
            _: VersionedTransaction,
        ) -> Result<VersionedTransaction, WalletError> {
            Err(WalletError::Rejected("declined".to_owned()))
        }
    }

    fn devnet_usdc() -> &'static SolanaTokenDeployment {
        lookup_known_spl_token("devnet", "USDC").unwrap()
    }

    fn challenge(network: &str, asset: &str, extra: serde_json::Value) -> PaymentRequired {
        serde_json::from_value(serde_json::json!({
            "x402Version": 2,
            "resource": { "url": "https://agents.example/rpc" },
            "accepts": [{
                "scheme": "exact",
                "network": network,
                "asset": asset,
                "amount": "250000",
                "payTo": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
                "maxTimeoutSeconds": 60,
                "extra": extra,
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_accepts_matching_option_by_name_or_caip2() {
        let wallet = KeypairWallet::connected(Keypair::new(), SolanaNetwork::Devnet);
        let client = SolanaExactClient::new(wallet, FakeLedger::default(), devnet_usdc());
        let mint = devnet_usdc().mint.to_string();

        for network in ["solana-devnet", "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1"] {
            let candidates = client.accept(&challenge(network, &mint, serde_json::json!({})));
            assert_eq!(candidates.len(), 1, "network {network}");
            assert_eq!(candidates[0].amount, 250_000);
            assert_eq!(candidates[0].chain_id, SolanaNetwork::Devnet.chain_id());
        }
    }

    #[test]
    fn test_rejects_other_cluster_token_or_scheme() {
        let wallet = KeypairWallet::connected(Keypair::new(), SolanaNetwork::Devnet);
        let client = SolanaExactClient::new(wallet, FakeLedger::default(), devnet_usdc());
        let mint = devnet_usdc().mint.to_string();

        assert!(client.accept(&challenge("solana", &mint, serde_json::json!({}))).is_empty());
        assert!(
            client
                .accept(&challenge(
                    "solana-devnet",
                    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                    serde_json::json!({})
                ))
                .is_empty()
        );
        let mut upto = challenge("solana-devnet", &mint, serde_json::json!({}));
        upto.accepts[0].scheme = "upto".to_owned();
        assert!(client.accept(&upto).is_empty());
    }

    #[test]
    fn test_disconnected_wallet_offers_nothing() {
        let wallet = KeypairWallet::disconnected(SolanaNetwork::Devnet);
        let client = SolanaExactClient::new(wallet, FakeLedger::default(), devnet_usdc());
        let mint = devnet_usdc().mint.to_string();
        assert!(client.accept(&challenge("devnet", &mint, serde_json::json!({}))).is_empty());
    }

    #[tokio::test]
    async fn test_signed_payload_carries_wallet_signed_transfer() {
        let keypair = Keypair::new();
        let owner = keypair.pubkey();
        let wallet = KeypairWallet::connected(keypair, SolanaNetwork::Devnet);
        let ledger = FakeLedger::default();
        let client = SolanaExactClient::new(wallet, ledger.clone(), devnet_usdc());
        let mint = devnet_usdc().mint.to_string();

        let candidates = client.accept(&challenge("solana-devnet", &mint, serde_json::json!({})));
        let header = FirstMatch.select(&candidates).unwrap().sign().await.unwrap();

        let payload: PaymentPayload = Base64Bytes::from(header.as_bytes()).decode_json().unwrap();
        assert_eq!(payload.x402_version, 2);
        assert_eq!(payload.accepted.amount, "250000");
        assert_eq!(payload.resource.unwrap().url, "https://agents.example/rpc");
        let exact: ExactSolanaPayload = serde_json::from_value(payload.payload).unwrap();
        let tx = TransactionInt::from_base64(&exact.transaction).unwrap();
        assert!(tx.is_fully_signed());
        assert_eq!(tx.inner().message.static_account_keys()[0], owner);
        assert_eq!(tx.inner().message.instructions().len(), 3);
        assert_eq!(ledger.fee_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fee_payer_from_extra_leads_the_message() {
        let keypair = Keypair::new();
        let wallet = KeypairWallet::connected(keypair, SolanaNetwork::Devnet);
        let client = SolanaExactClient::new(wallet, FakeLedger::default(), devnet_usdc());
        let facilitator = Keypair::new().pubkey();
        let mint = devnet_usdc().mint.to_string();

        let candidates = client.accept(&challenge(
            "solana-devnet",
            &mint,
            serde_json::json!({ "feePayer": facilitator.to_string() }),
        ));
        let header = candidates[0].sign().await.unwrap();

        let payload: PaymentPayload = Base64Bytes::from(header.as_bytes()).decode_json().unwrap();
        let exact: ExactSolanaPayload = serde_json::from_value(payload.payload).unwrap();
        let tx = TransactionInt::from_base64(&exact.transaction).unwrap();
        assert_eq!(tx.inner().message.static_account_keys()[0], facilitator);
        // The facilitator's slot stays empty until it co-signs.
        assert!(!tx.is_fully_signed());
    }

    #[tokio::test]
    async fn test_rejected_signing_is_reported_as_rejection() {
        let wallet = RejectingWallet(Keypair::new().pubkey());
        let client = SolanaExactClient::new(wallet, FakeLedger::default(), devnet_usdc());
        let mint = devnet_usdc().mint.to_string();

        let candidates = client.accept(&challenge("devnet", &mint, serde_json::json!({})));
        let err = candidates[0].sign().await.unwrap_err();
        assert!(matches!(err, ClientError::SigningRejected(reason) if reason == "declined"));
    }

    #[test]
    fn test_transfer_transaction_layout() {
        let owner = Keypair::new().pubkey();
        let tx = build_transfer_transaction(&TransferParams {
            fee_payer: owner,
            owner,
            pay_to: Keypair::new().pubkey(),
            token: devnet_usdc(),
            amount: 1,
            priority_fee_micro_lamports: 1,
            recent_blockhash: Hash::default(),
        })
        .unwrap();
        let keys = tx.message.static_account_keys();
        let programs: Vec<Pubkey> = tx
            .message
            .instructions()
            .iter()
            .map(|ix| keys[usize::from(ix.program_id_index)])
            .collect();
        assert_eq!(
            programs,
            vec![
                solana_compute_budget_interface::ID,
                solana_compute_budget_interface::ID,
                spl_token::id()
            ]
        );
        assert_eq!(tx.signatures.len(), 1);
    }
}
