use async_trait::async_trait;
use thiserror::Error;

/// One physical request to the generative text service
#[derive(Debug, Clone, Copy)]
pub struct ServiceRequest<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub prompt: &'a str,
    pub system_instruction: Option<&'a str>,
}

/// Classified response to a single physical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceResponse {
    /// Request succeeded; carries the first text payload (may be empty)
    Success(String),
    /// Service asked us to slow down
    RateLimited,
    /// Service refused the request permanently (e.g. invalid credential)
    Rejected(String),
    /// Any other non-success status
    Failed { status: u16, body: String },
    /// Success status, but the body could not be understood
    Malformed(String),
}

/// Connection-level failure; no response was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport failure: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}

/// The network boundary: sends one request and classifies the reply
#[async_trait]
pub trait TextService: Send + Sync {
    async fn send(&self, request: &ServiceRequest<'_>) -> Result<ServiceResponse, TransportError>;
}
