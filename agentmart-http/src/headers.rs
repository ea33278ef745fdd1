//! Header encoding and decoding for 402 payment messages.
//!
//! Every message travels as base64 over JSON in `PAYMENT-REQUIRED`,
//! `PAYMENT-SIGNATURE`, `PAYMENT-RESPONSE` or the version 1 `X-PAYMENT`
//! headers.

use agentmart_pay::encoding::Base64Bytes;
use agentmart_pay::proto::{PaymentPayload, PaymentRequired, SettleResponse};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::HttpError;

fn encode<T: Serialize>(value: &T) -> Result<String, HttpError> {
    Ok(Base64Bytes::encode_json(value)?.to_string())
}

fn decode<T: DeserializeOwned>(header_value: &str) -> Result<T, HttpError> {
    let bytes = Base64Bytes::from(header_value.trim().as_bytes()).decode()?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encodes a [`PaymentPayload`] for the `PAYMENT-SIGNATURE` (or `X-PAYMENT`) header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_signature(payload: &PaymentPayload) -> Result<String, HttpError> {
    encode(payload)
}

/// Decodes a `PAYMENT-SIGNATURE` or `X-PAYMENT` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on Base64 or JSON decode failure.
pub fn decode_payment_signature(header_value: &str) -> Result<PaymentPayload, HttpError> {
    decode(header_value)
}

/// Encodes a [`PaymentRequired`] challenge for the `PAYMENT-REQUIRED` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_required(required: &PaymentRequired) -> Result<String, HttpError> {
    encode(required)
}

/// Decodes a `PAYMENT-REQUIRED` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on Base64 or JSON decode failure.
pub fn decode_payment_required(header_value: &str) -> Result<PaymentRequired, HttpError> {
    decode(header_value)
}

/// Encodes a [`SettleResponse`] for the `PAYMENT-RESPONSE` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_response(response: &SettleResponse) -> Result<String, HttpError> {
    encode(response)
}

/// Decodes a `PAYMENT-RESPONSE` header value into a [`SettleResponse`].
///
/// # Errors
///
/// Returns [`HttpError`] on Base64 or JSON decode failure.
pub fn decode_payment_response(header_value: &str) -> Result<SettleResponse, HttpError> {
    decode(header_value)
}
