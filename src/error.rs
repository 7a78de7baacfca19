use crate::wav::WavError;
use serde::Serialize;
use thiserror::Error;
use wyoming_protocol::SessionError;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Synthesis failed: {0}")]
    Upstream(#[from] SessionError),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] WavError),
}

/// JSON body returned to HTTP callers on failure
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl GatewayError {
    /// True when the caller sent something unusable, as opposed to an upstream failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, GatewayError::InvalidRequest(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::Upstream(e) => e.category(),
            GatewayError::Encoding(_) => "encoding_error",
        }
    }

    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.category().to_string(),
            message: self.to_string(),
        }
    }
}
