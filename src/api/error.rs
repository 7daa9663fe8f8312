use serde::Deserialize;
use thiserror::Error;

use super::transport::{ApiResponse, TransportError};

pub const NETWORK_ERROR_MESSAGE: &str = "Network error";
const TIMEOUT_MESSAGE: &str = "Request timed out";
const UNEXPECTED_RESPONSE_MESSAGE: &str = "Unexpected response from server";
const ENCODE_FAILED_MESSAGE: &str = "Failed to encode request";

/// A failed API call, carrying a message fit for showing to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    /// HTTP status, `None` when no response was received.
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl RequestError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Builds the error for a non-success response, preferring the body's `error` field.
    pub fn from_response(response: &ApiResponse) -> Self {
        let message = serde_json::from_str::<ErrorBody>(&response.body)
            .ok()
            .and_then(|body| body.error)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| NETWORK_ERROR_MESSAGE.to_owned());

        Self::new(Some(response.status), message)
    }

    pub fn unexpected_body(status: u16, source: &serde_json::Error) -> Self {
        tracing::warn!(
            code = "API_RESPONSE_DECODE_FAILED",
            status,
            error = %source,
            "api response body did not match the expected shape"
        );
        Self::new(Some(status), UNEXPECTED_RESPONSE_MESSAGE)
    }

    pub fn encode_failed(source: &serde_json::Error) -> Self {
        tracing::warn!(
            code = "API_REQUEST_ENCODE_FAILED",
            error = %source,
            "api request body could not be encoded"
        );
        Self::new(None, ENCODE_FAILED_MESSAGE)
    }

    pub fn is_timeout(&self) -> bool {
        self.status.is_none() && self.message == TIMEOUT_MESSAGE
    }
}

impl From<TransportError> for RequestError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => Self::new(None, TIMEOUT_MESSAGE),
            TransportError::Connect(_) | TransportError::Other(_) => {
                Self::new(None, NETWORK_ERROR_MESSAGE)
            }
        }
    }
}
