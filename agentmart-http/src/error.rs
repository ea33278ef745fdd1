//! Error types for the HTTP transport layer.

/// Errors raised while encoding headers or completing a paid request.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Base64 decoding failed.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A header value is not visible ASCII.
    #[error("invalid {0} header value")]
    InvalidHeader(&'static str),

    /// The request was paid but the retried call did not succeed.
    ///
    /// Carries the status of the retried response, never the original 402.
    #[error("paid request failed with status {status}{}", reason_suffix(.reason.as_deref()))]
    RetryFailed {
        /// HTTP status of the retried response.
        status: u16,
        /// Settlement failure reason reported by the server, if any.
        reason: Option<String>,
    },
}

fn reason_suffix(reason: Option<&str>) -> String {
    reason.map(|r| format!(": {r}")).unwrap_or_default()
}
