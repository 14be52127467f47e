use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a logical model call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Client configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request rejected by service: {0}")]
    Rejected(String),

    #[error("Service still failing after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed service response: {0}")]
    Malformed(String),
}

impl ClientError {
    /// True when the service refused the request outright (e.g. bad key)
    pub fn is_permanent(&self) -> bool {
        matches!(self, ClientError::Rejected(_))
    }
}

/// Which configured model variant a call should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelMode {
    /// The full model, used for generative calls
    #[default]
    Full,
    /// The cheaper, faster variant, used for numeric extraction
    Lite,
}

impl std::fmt::Display for ModelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelMode::Full => write!(f, "full"),
            ModelMode::Lite => write!(f, "lite"),
        }
    }
}

/// API key and model name for the generative text service
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub model: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Both fields must be non-empty before any network call is made
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::Config("API key is empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ClientError::Config("model name is empty".to_string()));
        }
        Ok(())
    }
}

// Keep the key out of debug output and logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Tuning for the client and its retry policy
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL of the generative language API
    pub endpoint: String,
    /// Model used for [`ModelMode::Lite`] calls
    pub lite_model: String,
    /// Physical attempts per logical call
    pub max_attempts: u32,
    /// First backoff delay; doubled after every retryable failure
    pub backoff_base: Duration,
    /// Per-request timeout applied by the HTTP transport
    pub request_timeout: Duration,
}

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_LITE_MODEL: &str = "gemini-2.5-flash-lite";

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            lite_model: DEFAULT_LITE_MODEL.to_string(),
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ClientSettings {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_lite_model(mut self, model: impl Into<String>) -> Self {
        self.lite_model = model.into();
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Delay before retrying after the given (1-indexed) failed attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

/// A single logical request/response call to a generative text model
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Human-readable name of the backing service
    fn name(&self) -> &str;

    /// Send `prompt` with an optional system instruction and return the first
    /// text payload of the response
    async fn invoke(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        mode: ModelMode,
    ) -> Result<String, ClientError>;

    /// Generative call against the full model
    async fn generate(&self, prompt: &str, system_instruction: &str) -> Result<String, ClientError> {
        self.invoke(prompt, Some(system_instruction), ModelMode::Full)
            .await
    }
}
