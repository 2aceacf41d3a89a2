// src/ingest/error.rs
//! Destination failure taxonomy. These are the only failures that end a run
//! as failed; upstream problems are absorbed by the fetch stage.

/// Failure talking to the destination store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The destination answered with a non-success status.
    #[error("API Error: {message}")]
    Response { status: u16, message: String },

    /// The request went out but no response came back.
    #[error("Network Error: Unable to reach the server.")]
    Network(String),

    /// Anything else: request building, body decoding.
    #[error("Unexpected Error: {0}")]
    Unexpected(String),
}

impl StoreError {
    /// Build a `Response` error from a non-success body, picking the
    /// destination's `error` field when there is one.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Unknown error".to_string());
        StoreError::Response { status, message }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() || e.is_decode() {
            StoreError::Unexpected(e.to_string())
        } else {
            StoreError::Network(e.to_string())
        }
    }
}
