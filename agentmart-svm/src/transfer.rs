//! Native SOL transfers.
//!
//! The direct funding path: one System Program transfer from the connected
//! account to the destination, signed by the wallet, submitted, and awaited
//! at the requested commitment.

use agentmart_pay::amount::{AmountError, parse_units};
use solana_commitment_config::CommitmentConfig;
use solana_instruction::{AccountMeta, Instruction};
use solana_message::v0::Message as MessageV0;
use solana_message::{Hash, VersionedMessage};
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
#[cfg(feature = "telemetry")]
use tracing::{info, instrument};

use crate::rpc::{LedgerError, LedgerRpc};
use crate::wallet::{Wallet, WalletError};

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimal places of SOL.
pub const SOL_DECIMALS: u8 = 9;

/// System Program id.
pub const SYSTEM_PROGRAM_ID: Pubkey = pubkey!("11111111111111111111111111111111");

/// `SystemInstruction::Transfer` discriminant.
const SYSTEM_TRANSFER_TAG: u32 = 2;

/// Failures of a native transfer, by stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// A transfer of zero lamports was requested.
    #[error("transfer amount must be positive")]
    ZeroAmount,
    /// The transaction message could not be compiled.
    #[error("failed to build transfer: {0}")]
    Build(String),
    /// The wallet did not sign.
    #[error(transparent)]
    Wallet(#[from] WalletError),
    /// Submission or confirmation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Converts a decimal SOL amount into lamports, exactly.
///
/// # Errors
///
/// Returns [`AmountError`] for malformed, negative, overflowing or
/// sub-lamport amounts.
pub fn sol_to_lamports(sol: &str) -> Result<u64, AmountError> {
    parse_units(sol, SOL_DECIMALS)
}

/// Builds a System Program transfer instruction.
#[must_use]
pub fn system_transfer_instruction(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_TAG.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

/// Builds an unsigned transfer transaction paid for by `from`.
///
/// # Errors
///
/// Returns [`TransferError::Build`] if the message cannot be compiled.
pub fn build_native_transfer(
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
    recent_blockhash: Hash,
) -> Result<VersionedTransaction, TransferError> {
    let instruction = system_transfer_instruction(from, to, lamports);
    let message = MessageV0::try_compile(from, &[instruction], &[], recent_blockhash)
        .map_err(|e| TransferError::Build(e.to_string()))?;
    let num_required = usize::from(message.header.num_required_signatures);
    Ok(VersionedTransaction {
        signatures: vec![Signature::default(); num_required],
        message: VersionedMessage::V0(message),
    })
}

/// Transfers `lamports` from the wallet's account to `to` and waits for
/// `commitment`.
///
/// Nothing is submitted unless the wallet is connected and signs.
///
/// # Errors
///
/// Returns [`TransferError`] naming the stage that failed: wallet
/// (not connected, rejected), submission, confirmation timeout or on-chain
/// failure.
#[cfg_attr(
    feature = "telemetry",
    instrument(name = "agentmart.transfer.native", skip(wallet, rpc), fields(to = %to), err)
)]
pub async fn send_native_transfer<W, R>(
    wallet: &W,
    rpc: &R,
    to: &Pubkey,
    lamports: u64,
    commitment: CommitmentConfig,
) -> Result<Signature, TransferError>
where
    W: Wallet + ?Sized,
    R: LedgerRpc + ?Sized,
{
    let from = wallet.pubkey().ok_or(WalletError::NotConnected)?;
    if lamports == 0 {
        return Err(TransferError::ZeroAmount);
    }
    let blockhash = rpc.latest_blockhash().await?;
    let unsigned = build_native_transfer(&from, to, lamports, blockhash)?;
    let signed = wallet.sign_transaction(unsigned).await?;
    let signature = rpc.submit(&signed).await?;
    #[cfg(feature = "telemetry")]
    info!(%signature, lamports, "Transfer submitted, awaiting confirmation");
    rpc.confirm(&signature, commitment).await?;
    Ok(signature)
}
