//! HTTP header names used by the 402 payment exchange.

/// Header carrying the signed payment (client to server).
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// Header carrying the base64 challenge on a 402 response.
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";

/// Header carrying the settlement receipt on the paid response.
pub const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// Version 1 header for the signed payment.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Version 1 header for the settlement receipt.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Returns the request header that carries a payment for `x402_version`.
#[must_use]
pub const fn payment_header_name(x402_version: u32) -> &'static str {
    if x402_version == 1 {
        X_PAYMENT_HEADER
    } else {
        PAYMENT_SIGNATURE_HEADER
    }
}
