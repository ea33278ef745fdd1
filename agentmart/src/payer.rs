//! Payer composition: a wallet, a token and a ledger connection turned into
//! an HTTP client that pays for `402` responses.
//!
//! The payment requirement is derived on every call from the wallet's
//! current state and is never cached. A missing identity or an unknown token
//! degrades to the plain client.

use agentmart_http::client::{PaymentClient, ReqwestWithPayments, ReqwestWithPaymentsBuild};
use agentmart_pay::scheme::MaxAmount;
use agentmart_svm::chain::SolanaTokenDeployment;
use agentmart_svm::exact::SolanaExactClient;
use agentmart_svm::lookup_known_spl_token;
use agentmart_svm::rpc::LedgerRpc;
use agentmart_svm::wallet::Wallet;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::debug;

/// Token symbol paid requests are settled in.
pub const DEFAULT_PAYMENT_TOKEN: &str = "USDC";

/// Resolves `symbol` on the wallet's declared network.
pub fn resolve_payment_token<W: Wallet + ?Sized>(
    wallet: &W,
    symbol: &str,
) -> Option<&'static SolanaTokenDeployment> {
    lookup_known_spl_token(wallet.network().cluster_name(), symbol)
}

/// Wraps `client` so that challenged requests are paid from `wallet`.
///
/// Returns `client` without middleware if the wallet is not connected or
/// `token` is `None`. With `max_payment` set, options above that many base
/// units are never signed.
pub fn fetch_with_payer<W, R>(
    client: reqwest::Client,
    wallet: W,
    rpc: R,
    token: Option<&'static SolanaTokenDeployment>,
    max_payment: Option<u128>,
) -> ClientWithMiddleware
where
    W: Wallet + Clone + 'static,
    R: LedgerRpc + Clone + 'static,
{
    let Some(identity) = wallet.pubkey() else {
        debug!("Wallet not connected, using unpaid client");
        return ClientBuilder::new(client).build();
    };
    let Some(token) = token else {
        debug!(network = %wallet.network(), "No known payment token, using unpaid client");
        return ClientBuilder::new(client).build();
    };
    debug!(%identity, token = token.symbol, mint = %token.mint, "Paying requests from wallet");

    let payments = PaymentClient::new().register(SolanaExactClient::new(wallet, rpc, token));
    match max_payment {
        Some(cap) => client.with_payments(payments.with_selector(MaxAmount(cap))).build(),
        None => client.with_payments(payments).build(),
    }
}
