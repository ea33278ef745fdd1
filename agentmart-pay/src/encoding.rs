//! Base64 helpers for header-carried payloads.
//!
//! Challenges, payment payloads and settlement receipts travel in HTTP headers
//! as standard-alphabet base64 over JSON.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;

/// Bytes holding base64 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 text to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Encodes raw binary data into base64 text.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64.encode(input.as_ref()).into_bytes())
    }

    /// Serializes `value` as JSON and encodes it.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn encode_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(value).map(Self::encode)
    }

    /// Decodes the base64 text and parses the result as JSON.
    ///
    /// # Errors
    ///
    /// Returns a message describing whether the base64 or the JSON layer failed.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, String> {
        let raw = self.decode().map_err(|e| format!("base64: {e}"))?;
        serde_json::from_slice(&raw).map_err(|e| format!("json: {e}"))
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}
