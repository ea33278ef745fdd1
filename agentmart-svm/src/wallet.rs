//! Wallet capability provider.
//!
//! A [`Wallet`] exposes the three things a payer needs from a connected
//! wallet: its public key (absent until connected), the network it declares,
//! and a signing callback. [`KeypairWallet`] is the local implementation
//! backed by a keypair file.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;

use crate::chain::SolanaNetwork;
use crate::exact::TransactionInt;

/// Errors a wallet can return from a signing request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// No account is connected.
    #[error("wallet not connected")]
    NotConnected,
    /// The user declined the signing request.
    #[error("signing request rejected: {0}")]
    Rejected(String),
    /// The wallet could not produce a signature.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// A connected (or connectable) wallet.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// The connected account, or `None` before connect.
    fn pubkey(&self) -> Option<Pubkey>;

    /// The cluster the wallet is configured for.
    fn network(&self) -> SolanaNetwork;

    /// Signs `transaction` with the connected account.
    async fn sign_transaction(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<VersionedTransaction, WalletError>;
}

#[async_trait]
impl<W: Wallet + ?Sized> Wallet for Arc<W> {
    fn pubkey(&self) -> Option<Pubkey> {
        (**self).pubkey()
    }

    fn network(&self) -> SolanaNetwork {
        (**self).network()
    }

    async fn sign_transaction(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<VersionedTransaction, WalletError> {
        (**self).sign_transaction(transaction).await
    }
}

/// Wallet backed by an in-memory keypair.
#[derive(Clone)]
pub struct KeypairWallet {
    keypair: Option<Arc<Keypair>>,
    network: SolanaNetwork,
}

impl fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("pubkey", &self.pubkey())
            .field("network", &self.network)
            .finish()
    }
}

impl KeypairWallet {
    /// A wallet with no connected account.
    #[must_use]
    pub const fn disconnected(network: SolanaNetwork) -> Self {
        Self {
            keypair: None,
            network,
        }
    }

    /// A wallet connected to `keypair`.
    #[must_use]
    pub fn connected(keypair: Keypair, network: SolanaNetwork) -> Self {
        Self {
            keypair: Some(Arc::new(keypair)),
            network,
        }
    }

    /// Connects `keypair`, replacing any previous account.
    pub fn connect(&mut self, keypair: Keypair) {
        self.keypair = Some(Arc::new(keypair));
    }

    /// Drops the connected account.
    pub fn disconnect(&mut self) {
        self.keypair = None;
    }
}

#[async_trait]
impl Wallet for KeypairWallet {
    fn pubkey(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(|k| k.pubkey())
    }

    fn network(&self) -> SolanaNetwork {
        self.network
    }

    async fn sign_transaction(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<VersionedTransaction, WalletError> {
        let keypair = self.keypair.as_ref().ok_or(WalletError::NotConnected)?;
        TransactionInt::new(transaction)
            .sign_with_keypair(&**keypair)
            .map(TransactionInt::into_inner)
            .map_err(|e| WalletError::Signing(e.to_string()))
    }
}
