//! Wire format of the 402 challenge and the payment payload.
//!
//! All types serialize to JSON with camelCase field names. A challenge
//! ([`PaymentRequired`]) lists the payment options a remote endpoint accepts;
//! the client answers with a [`PaymentPayload`] for exactly one of them and may
//! receive a [`SettleResponse`] receipt on the paid response.
//!
//! Version 1 challenges name networks by label and call the amount
//! `maxAmountRequired`; both are accepted on input and normalized through
//! [`PaymentRequirements::chain_id`] and the `amount` alias.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::ChainId;
use crate::networks::NetworkRegistry;

/// Describes the resource being accessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// The URL of the resource.
    pub url: String,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional MIME type of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// One accepted way to pay for a resource.
///
/// ```json
/// {
///   "scheme": "exact",
///   "network": "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
///   "asset": "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
///   "amount": "10000",
///   "payTo": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
///   "maxTimeoutSeconds": 60,
///   "extra": { "feePayer": "..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g. "exact").
    pub scheme: String,

    /// CAIP-2 network identifier, or a network label in version 1 challenges.
    pub network: String,

    /// Token mint address.
    pub asset: String,

    /// Amount in base units, as a decimal string.
    #[serde(alias = "maxAmountRequired")]
    pub amount: String,

    /// Recipient address.
    pub pay_to: String,

    /// Maximum time in seconds for payment validity.
    #[serde(default = "default_timeout")]
    pub max_timeout_seconds: u64,

    /// Additional scheme-specific data.
    #[serde(default = "default_empty_object")]
    pub extra: Value,
}

impl PaymentRequirements {
    /// Resolves the network field against `registry`.
    #[must_use]
    pub fn chain_id(&self, registry: &NetworkRegistry) -> Option<ChainId> {
        registry.resolve(&self.network)
    }

    /// Parses the amount as base units.
    #[must_use]
    pub fn amount_units(&self) -> Option<u128> {
        self.amount.parse().ok()
    }

    /// Returns a string field of `extra`, if present.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Body of a 402 response, also carried base64-encoded in the
/// `PAYMENT-REQUIRED` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version.
    #[serde(default = "default_version")]
    pub x402_version: u32,

    /// Optional error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Optional resource information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Accepted payment options, in the server's order of preference.
    pub accepts: Vec<PaymentRequirements>,

    /// Optional extension data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// A signed payment for one of the accepted options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version, echoed from the challenge.
    pub x402_version: u32,

    /// Scheme-specific payload data.
    pub payload: Value,

    /// The payment requirements being fulfilled.
    pub accepted: PaymentRequirements,

    /// Optional resource information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
}

/// Settlement receipt returned in the `PAYMENT-RESPONSE` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether settlement succeeded.
    pub success: bool,

    /// Machine-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    /// The address that paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,

    /// Transaction signature on the ledger.
    #[serde(default)]
    pub transaction: String,

    /// Network the payment settled on.
    #[serde(default)]
    pub network: String,
}

const fn default_version() -> u32 {
    2
}

const fn default_timeout() -> u64 {
    60
}

fn default_empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::NetworkInfo;

    #[test]
    fn test_parse_v2_challenge() {
        let json = serde_json::json!({
            "x402Version": 2,
            "resource": { "url": "https://rpc.example/paid" },
            "accepts": [{
                "scheme": "exact",
                "network": "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
                "asset": "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
                "amount": "10000",
                "payTo": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
                "maxTimeoutSeconds": 30,
                "extra": { "feePayer": "2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4" }
            }]
        });
        let challenge: PaymentRequired = serde_json::from_value(json).unwrap();
        let option = &challenge.accepts[0];
        assert_eq!(option.amount_units(), Some(10_000));
        assert_eq!(
            option.extra_str("feePayer"),
            Some("2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4")
        );
        let chain_id = option.chain_id(&NetworkRegistry::default()).unwrap();
        assert_eq!(chain_id.namespace(), "solana");
    }

    #[test]
    fn test_parse_v1_challenge_fields() {
        let registry = NetworkRegistry::from_networks(&[NetworkInfo {
            name: "solana-devnet",
            namespace: "solana",
            reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        }]);
        let json = serde_json::json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact",
                "network": "solana-devnet",
                "asset": "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
                "maxAmountRequired": "2500",
                "payTo": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"
            }]
        });
        let challenge: PaymentRequired = serde_json::from_value(json).unwrap();
        assert_eq!(challenge.x402_version, 1);
        let option = &challenge.accepts[0];
        assert_eq!(option.amount, "2500");
        assert_eq!(option.max_timeout_seconds, 60);
        assert_eq!(
            option.chain_id(&registry).unwrap().reference(),
            "EtWTRABZaYq6iMfeYKouRu166VU2xqa1"
        );
    }

    #[test]
    fn test_settle_response_defaults() {
        let receipt: SettleResponse =
            serde_json::from_str(r#"{"success":false,"errorReason":"insufficient_funds"}"#)
                .unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.error_reason.as_deref(), Some("insufficient_funds"));
        assert!(receipt.transaction.is_empty());
    }
}
