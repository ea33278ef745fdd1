//! Client-side payment schemes.
//!
//! A [`SchemeClient`] looks at a 402 challenge and offers a
//! [`PaymentCandidate`] for every option it can pay. A [`PaymentSelector`]
//! picks one candidate, and only that candidate is ever signed.
//!
//! - [`FirstMatch`] takes the first candidate in registration order
//! - [`MaxAmount`] takes the first candidate at or under a spending cap

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::chain::ChainId;
use crate::proto;

/// Identifies a payment scheme by chain namespace and scheme name.
pub trait SchemeId {
    /// Returns the chain namespace (e.g. "solana").
    fn namespace(&self) -> &str;
    /// Returns the scheme name (e.g. "exact").
    fn scheme(&self) -> &str;
    /// Returns the full identifier (e.g. "solana-exact").
    fn id(&self) -> String {
        format!("{}-{}", self.namespace(), self.scheme())
    }
}

/// Produces payment candidates for the options of a challenge it can pay.
pub trait SchemeClient: SchemeId + Send + Sync {
    /// Generates payment candidates for the given challenge.
    fn accept(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate>;
}

/// Signs one payment authorization.
pub trait PaymentCandidateSigner {
    /// Produces the base64 header value carrying the signed payload.
    fn sign_payment(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<String, ClientError>> + Send + '_>>;
}

/// A payment option that can be signed and attached to a retried request.
pub struct PaymentCandidate {
    /// The chain where payment will be made.
    pub chain_id: ChainId,
    /// The token mint address.
    pub asset: String,
    /// The payment amount in base units.
    pub amount: u128,
    /// The payment scheme name.
    pub scheme: String,
    /// Protocol version of the challenge this answers.
    pub x402_version: u32,
    /// The recipient address.
    pub pay_to: String,
    /// The signer that can authorize this payment.
    pub signer: Box<dyn PaymentCandidateSigner + Send + Sync>,
}

impl Debug for PaymentCandidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentCandidate")
            .field("chain_id", &self.chain_id)
            .field("asset", &self.asset)
            .field("amount", &self.amount)
            .field("scheme", &self.scheme)
            .field("x402_version", &self.x402_version)
            .field("pay_to", &self.pay_to)
            .finish_non_exhaustive()
    }
}

impl PaymentCandidate {
    /// Signs this payment candidate, producing the header value.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing fails or is rejected.
    pub async fn sign(&self) -> Result<String, ClientError> {
        self.signer.sign_payment().await
    }
}

/// Errors that can occur during client-side payment processing.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No payment option matched the registered scheme clients.
    #[error("no matching payment option found")]
    NoMatchingPaymentOption,

    /// The HTTP request body cannot be cloned for the retry.
    #[error("request is not cloneable (streaming body?)")]
    RequestNotCloneable,

    /// The 402 challenge could not be parsed.
    #[error("failed to parse 402 response: {0}")]
    ParseError(String),

    /// The wallet declined to sign.
    #[error("payment signing rejected: {0}")]
    SigningRejected(String),

    /// Building or signing the payment failed.
    #[error("failed to sign payment: {0}")]
    SigningError(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Chooses the candidate to pay from the available options.
pub trait PaymentSelector: Send + Sync {
    /// Selects a payment candidate, or `None` if none is acceptable.
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate>;
}

/// Selector that returns the first candidate.
#[derive(Debug, Clone, Copy)]
pub struct FirstMatch;

impl PaymentSelector for FirstMatch {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        candidates.first()
    }
}

/// Selector that only accepts payments up to a maximum amount of base units.
#[derive(Debug, Clone, Copy)]
pub struct MaxAmount(pub u128);

impl PaymentSelector for MaxAmount {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        let selected = candidates.iter().find(|c| c.amount <= self.0);
        #[cfg(feature = "telemetry")]
        if selected.is_none() && !candidates.is_empty() {
            tracing::debug!(cap = %self.0, "every payment option exceeds the spending cap");
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopSigner;

    impl PaymentCandidateSigner for NoopSigner {
        fn sign_payment(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<String, ClientError>> + Send + '_>> {
            Box::pin(async { Ok("signed".to_owned()) })
        }
    }

    fn candidate(amount: u128, pay_to: &str) -> PaymentCandidate {
        PaymentCandidate {
            chain_id: ChainId::new("solana", "devnet"),
            asset: "mint".to_owned(),
            amount,
            scheme: "exact".to_owned(),
            x402_version: 2,
            pay_to: pay_to.to_owned(),
            signer: Box::new(NoopSigner),
        }
    }

    #[test]
    fn test_first_match() {
        let candidates = vec![candidate(10, "a"), candidate(5, "b")];
        assert_eq!(FirstMatch.select(&candidates).unwrap().pay_to, "a");
        assert!(FirstMatch.select(&[]).is_none());
    }

    #[test]
    fn test_max_amount_skips_expensive_options() {
        let candidates = vec![candidate(10, "a"), candidate(5, "b")];
        assert_eq!(MaxAmount(7).select(&candidates).unwrap().pay_to, "b");
        assert_eq!(MaxAmount(10).select(&candidates).unwrap().pay_to, "a");
        assert!(MaxAmount(4).select(&candidates).is_none());
    }

    #[test]
    fn test_scheme_id() {
        struct Exact;
        impl SchemeId for Exact {
            fn namespace(&self) -> &str {
                "solana"
            }
            fn scheme(&self) -> &str {
                "exact"
            }
        }
        assert_eq!(Exact.id(), "solana-exact");
    }

    #[tokio::test]
    async fn test_candidate_sign_delegates() {
        assert_eq!(candidate(1, "a").sign().await.unwrap(), "signed");
    }
}
