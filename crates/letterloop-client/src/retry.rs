use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    ClientError, ClientSettings, Credentials, GeminiService, ModelClient, ModelMode,
    ServiceRequest, ServiceResponse, TextService,
};

/// Waits between retries
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Model client with bounded retry and exponential backoff.
///
/// Rate limits and transport failures are retried up to
/// `settings.max_attempts` physical attempts. A permanent rejection or any
/// other non-success response ends the call immediately.
pub struct ResilientClient {
    service: Arc<dyn TextService>,
    sleeper: Arc<dyn Sleeper>,
    credentials: Credentials,
    settings: ClientSettings,
}

impl ResilientClient {
    pub fn new(
        service: Arc<dyn TextService>,
        credentials: Credentials,
        settings: ClientSettings,
    ) -> Self {
        Self {
            service,
            sleeper: Arc::new(TokioSleeper),
            credentials,
            settings,
        }
    }

    /// Client talking to the Gemini API
    pub fn gemini(credentials: Credentials, settings: ClientSettings) -> Result<Self, ClientError> {
        let service = GeminiService::new(&settings)?;
        Ok(Self::new(Arc::new(service), credentials, settings))
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Model used for full-mode calls
    pub fn model(&self) -> &str {
        &self.credentials.model
    }

    fn model_for(&self, mode: ModelMode) -> &str {
        match mode {
            ModelMode::Full => &self.credentials.model,
            ModelMode::Lite => &self.settings.lite_model,
        }
    }
}

#[async_trait]
impl ModelClient for ResilientClient {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn invoke(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        mode: ModelMode,
    ) -> Result<String, ClientError> {
        self.credentials.validate()?;
        if prompt.trim().is_empty() {
            return Err(ClientError::InvalidRequest("prompt is empty".to_string()));
        }

        let request = ServiceRequest {
            api_key: &self.credentials.api_key,
            model: self.model_for(mode),
            prompt,
            system_instruction,
        };

        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_failure = String::new();

        for attempt in 1..=max_attempts {
            debug!(attempt, model = request.model, %mode, "Invoking model");

            match self.service.send(&request).await {
                Ok(ServiceResponse::Success(text)) => {
                    debug!(attempt, response_len = text.len(), "Model call succeeded");
                    return Ok(text);
                }
                Ok(ServiceResponse::RateLimited) => {
                    warn!(attempt, "Rate limited by service");
                    last_failure = "rate limited".to_string();
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Transport failure");
                    last_failure = e.to_string();
                }
                Ok(ServiceResponse::Rejected(body)) => {
                    return Err(ClientError::Rejected(body));
                }
                Ok(ServiceResponse::Failed { status, body }) => {
                    warn!(attempt, status, "Service returned non-success status");
                    return Err(ClientError::Status { status, body });
                }
                Ok(ServiceResponse::Malformed(reason)) => {
                    return Err(ClientError::Malformed(reason));
                }
            }

            // No point waiting once the last attempt has failed.
            if attempt < max_attempts {
                let delay = self.settings.backoff_delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                self.sleeper.sleep(delay).await;
            }
        }

        Err(ClientError::RetriesExhausted {
            attempts: max_attempts,
            last: last_failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedService {
        replies: Mutex<VecDeque<Result<ServiceResponse, TransportError>>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(replies: Vec<Result<ServiceResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn models_requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextService for ScriptedService {
        async fn send(
            &self,
            request: &ServiceRequest<'_>,
        ) -> Result<ServiceResponse, TransportError> {
            self.requests.lock().unwrap().push(request.model.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ServiceResponse::RateLimited))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn client_with(
        replies: Vec<Result<ServiceResponse, TransportError>>,
    ) -> (ResilientClient, Arc<ScriptedService>, Arc<RecordingSleeper>) {
        let service = Arc::new(ScriptedService::new(replies));
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = ResilientClient::new(
            service.clone(),
            Credentials::new("test-key", "gemini-2.5-pro"),
            ClientSettings::default(),
        )
        .with_sleeper(sleeper.clone());
        (client, service, sleeper)
    }

    #[tokio::test]
    async fn test_succeeds_after_two_rate_limits() {
        let (client, service, sleeper) = client_with(vec![
            Ok(ServiceResponse::RateLimited),
            Ok(ServiceResponse::RateLimited),
            Ok(ServiceResponse::Success("payload".into())),
        ]);

        let text = client
            .invoke("prompt", None, ModelMode::Full)
            .await
            .unwrap();

        assert_eq!(text, "payload");
        assert_eq!(service.models_requested().len(), 3);
        assert_eq!(
            *sleeper.waits.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_rejection_aborts_immediately() {
        let (client, service, sleeper) = client_with(vec![
            Ok(ServiceResponse::Rejected("API key not valid".into())),
            Ok(ServiceResponse::Success("never".into())),
        ]);

        let err = client
            .invoke("prompt", None, ModelMode::Full)
            .await
            .unwrap_err();

        assert!(err.is_permanent());
        assert_eq!(service.models_requested().len(), 1);
        assert!(sleeper.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failures_are_retried() {
        let (client, service, sleeper) = client_with(vec![
            Err(TransportError("connection refused".into())),
            Ok(ServiceResponse::Success("ok".into())),
        ]);

        assert_eq!(
            client.invoke("prompt", None, ModelMode::Full).await.unwrap(),
            "ok"
        );
        assert_eq!(service.models_requested().len(), 2);
        assert_eq!(sleeper.waits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_after_five_attempts() {
        let (client, service, sleeper) = client_with(vec![]);

        let err = client
            .invoke("prompt", None, ModelMode::Full)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RetriesExhausted { attempts: 5, .. }));
        assert_eq!(service.models_requested().len(), 5);
        let waits: Vec<u64> = sleeper
            .waits
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(waits, vec![1, 2, 4, 8]);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let (client, service, sleeper) = client_with(vec![
            Ok(ServiceResponse::Failed {
                status: 500,
                body: "internal".into(),
            }),
            Ok(ServiceResponse::Success("never".into())),
        ]);

        let err = client
            .invoke("prompt", None, ModelMode::Full)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::Status {
                status: 500,
                body: "internal".into()
            }
        );
        assert_eq!(service.models_requested().len(), 1);
        assert!(sleeper.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_success_is_not_a_failure() {
        let (client, _, _) = client_with(vec![Ok(ServiceResponse::Success(String::new()))]);
        assert_eq!(
            client.invoke("prompt", None, ModelMode::Full).await,
            Ok(String::new())
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_network() {
        let service = Arc::new(ScriptedService::new(vec![]));
        let client = ResilientClient::new(
            service.clone(),
            Credentials::new("", "gemini-2.5-pro"),
            ClientSettings::default(),
        );

        let err = client
            .invoke("prompt", None, ModelMode::Full)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Config(_)));
        assert!(service.models_requested().is_empty());
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let (client, service, _) = client_with(vec![]);
        let err = client.invoke("   ", None, ModelMode::Full).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        assert!(service.models_requested().is_empty());
    }

    #[tokio::test]
    async fn test_lite_mode_uses_lite_model() {
        let (client, service, _) = client_with(vec![
            Ok(ServiceResponse::Success("87".into())),
            Ok(ServiceResponse::Success("draft".into())),
        ]);

        client.invoke("sum", None, ModelMode::Lite).await.unwrap();
        client.generate("write", "system").await.unwrap();

        assert_eq!(
            service.models_requested(),
            vec!["gemini-2.5-flash-lite".to_string(), "gemini-2.5-pro".to_string()]
        );
    }
}
