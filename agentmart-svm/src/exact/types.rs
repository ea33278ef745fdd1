//! Wire and transaction types for the Solana "exact" scheme.

use agentmart_pay::encoding::Base64Bytes;
use serde::{Deserialize, Serialize};
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;

/// Scheme name on the wire.
pub const EXACT_SCHEME: &str = "exact";

/// Associated Token Account program public key.
pub const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Scheme payload: the partially or fully signed transfer transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSolanaPayload {
    /// Base64-encoded bincode of the versioned transaction.
    pub transaction: String,
}

/// Derives the associated token account of `owner` for an SPL Token `mint`.
#[must_use]
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (ata, _) = Pubkey::find_program_address(
        &[owner.as_ref(), spl_token::id().as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    ata
}

/// Wrapper around a versioned transaction with signing helpers.
#[derive(Debug, Clone)]
pub struct TransactionInt {
    inner: VersionedTransaction,
}

/// Error returned when a signer cannot sign a transaction.
#[derive(Debug, thiserror::Error)]
#[error("transaction signing failed: {0}")]
pub struct TransactionSignError(pub String);

/// Error returned when a transaction cannot be encoded.
#[derive(Debug, thiserror::Error)]
#[error("transaction encoding failed: {0}")]
pub struct TransactionToB64Error(pub String);

impl TransactionInt {
    /// Wraps a transaction.
    #[must_use]
    pub const fn new(transaction: VersionedTransaction) -> Self {
        Self { inner: transaction }
    }

    /// Returns the inner transaction.
    #[must_use]
    pub const fn inner(&self) -> &VersionedTransaction {
        &self.inner
    }

    /// Unwraps the inner transaction.
    #[must_use]
    pub fn into_inner(self) -> VersionedTransaction {
        self.inner
    }

    /// Checks that every required signature slot holds a real signature.
    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        let num_required = usize::from(self.inner.message.header().num_required_signatures);
        self.inner.signatures.len() >= num_required
            && self
                .inner
                .signatures
                .iter()
                .all(|signature| *signature != Signature::default())
    }

    /// Places the signature of `signer` in its required-signer slot.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionSignError`] if signing fails or the signer is not a
    /// required signer of the message.
    pub fn sign_with_keypair<S: Signer + ?Sized>(
        self,
        signer: &S,
    ) -> Result<Self, TransactionSignError> {
        let mut tx = self.inner;
        let num_required = usize::from(tx.message.header().num_required_signatures);
        let pos = tx
            .message
            .static_account_keys()
            .iter()
            .take(num_required)
            .position(|k| *k == signer.pubkey())
            .ok_or_else(|| {
                TransactionSignError("signer not found in required signers".to_owned())
            })?;
        let signature = signer
            .try_sign_message(&tx.message.serialize())
            .map_err(|e| TransactionSignError(e.to_string()))?;
        if tx.signatures.len() < num_required {
            tx.signatures.resize(num_required, Signature::default());
        }
        tx.signatures[pos] = signature;
        Ok(Self { inner: tx })
    }

    /// Encodes the transaction as base64 bincode.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionToB64Error`] if serialization fails.
    pub fn as_base64(&self) -> Result<String, TransactionToB64Error> {
        let bytes =
            bincode::serialize(&self.inner).map_err(|e| TransactionToB64Error(e.to_string()))?;
        Ok(Base64Bytes::encode(bytes).to_string())
    }

    /// Decodes a base64 bincode transaction.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionToB64Error`] if the input is not a valid encoding.
    pub fn from_base64(encoded: &str) -> Result<Self, TransactionToB64Error> {
        let bytes = Base64Bytes::from(encoded.as_bytes())
            .decode()
            .map_err(|e| TransactionToB64Error(e.to_string()))?;
        bincode::deserialize(&bytes)
            .map(Self::new)
            .map_err(|e| TransactionToB64Error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::build_native_transfer;
    use solana_keypair::Keypair;
    use solana_message::Hash;

    fn unsigned_transfer(from: &Keypair) -> TransactionInt {
        let to = Keypair::new().pubkey();
        TransactionInt::new(build_native_transfer(&from.pubkey(), &to, 5, Hash::default()).unwrap())
    }

    #[test]
    fn test_sign_with_keypair_fills_slot() {
        let keypair = Keypair::new();
        let tx = unsigned_transfer(&keypair);
        assert!(!tx.is_fully_signed());
        let signed = tx.sign_with_keypair(&keypair).unwrap();
        assert!(signed.is_fully_signed());
    }

    #[test]
    fn test_sign_with_foreign_keypair_fails() {
        let owner = Keypair::new();
        let stranger = Keypair::new();
        let err = unsigned_transfer(&owner)
            .sign_with_keypair(&stranger)
            .unwrap_err();
        assert!(err.to_string().contains("required signers"));
    }

    #[test]
    fn test_base64_roundtrip_preserves_signatures() {
        let keypair = Keypair::new();
        let signed = unsigned_transfer(&keypair)
            .sign_with_keypair(&keypair)
            .unwrap();
        let decoded = TransactionInt::from_base64(&signed.as_base64().unwrap()).unwrap();
        assert_eq!(decoded.inner().signatures, signed.inner().signatures);
    }

    #[test]
    fn test_associated_token_address_is_deterministic() {
        let owner = Keypair::new().pubkey();
        let mint = Keypair::new().pubkey();
        assert_eq!(
            associated_token_address(&owner, &mint),
            associated_token_address(&owner, &mint)
        );
        assert_ne!(
            associated_token_address(&owner, &mint),
            associated_token_address(&mint, &owner)
        );
    }
}
