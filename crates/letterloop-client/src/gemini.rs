use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::output::{GenerateContentRequest, GenerateContentResponse};
use crate::{ClientError, ClientSettings, ServiceRequest, ServiceResponse, TextService, TransportError};

/// Marker the service embeds in the body when the key is unusable
const INVALID_KEY_MARKER: &str = "API key not valid";

/// Google Gemini `generateContent` transport
pub struct GeminiService {
    client: Client,
    endpoint: String,
}

impl GeminiService {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl TextService for GeminiService {
    async fn send(&self, request: &ServiceRequest<'_>) -> Result<ServiceResponse, TransportError> {
        let payload = GenerateContentRequest::new(request.prompt, request.system_instruction);

        debug!(
            model = request.model,
            prompt_len = request.prompt.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.url(request.model))
            .query(&[("key", request.api_key)])
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(classify(status, &body))
    }
}

/// Map an HTTP status and body onto a [`ServiceResponse`]
pub fn classify(status: u16, body: &str) -> ServiceResponse {
    match status {
        200..=299 => match serde_json::from_str::<GenerateContentResponse>(body) {
            Ok(parsed) => ServiceResponse::Success(parsed.first_text().to_string()),
            Err(e) => ServiceResponse::Malformed(e.to_string()),
        },
        429 => ServiceResponse::RateLimited,
        401 | 403 => ServiceResponse::Rejected(body.to_string()),
        _ if body.contains(INVALID_KEY_MARKER) => {
            warn!("Service reports the API key is not valid");
            ServiceResponse::Rejected(body.to_string())
        }
        _ => ServiceResponse::Failed {
            status,
            body: body.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"draft"}]}}]}"#;
        assert_eq!(classify(200, body), ServiceResponse::Success("draft".into()));
    }

    #[test]
    fn test_classify_empty_success() {
        assert_eq!(classify(200, r#"{"candidates":[]}"#), ServiceResponse::Success(String::new()));
    }

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(classify(429, "quota"), ServiceResponse::RateLimited);
    }

    #[test]
    fn test_classify_invalid_key() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key."}}"#;
        assert!(matches!(classify(400, body), ServiceResponse::Rejected(_)));
        assert!(matches!(classify(403, "forbidden"), ServiceResponse::Rejected(_)));
    }

    #[test]
    fn test_classify_other_failure() {
        assert_eq!(
            classify(500, "boom"),
            ServiceResponse::Failed {
                status: 500,
                body: "boom".into()
            }
        );
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(classify(200, "not json"), ServiceResponse::Malformed(_)));
    }
}
