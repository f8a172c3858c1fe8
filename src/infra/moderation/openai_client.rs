use crate::core::moderation::{ClassifierError, ClassifierResponse, SafetyClassifier};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI moderations endpoint.
///
/// Timeouts and retries are the moderation service's job, not this client's.
pub struct OpenAiModerationClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiModerationClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_OPENAI_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/moderations", self.base_url)
    }
}

/// Pull `results[0].flagged` out of a moderation response.
/// Anything else (missing results, non-bool flag) yields `flagged: None`.
pub fn parse_moderation_body(body: &Value) -> ClassifierResponse {
    ClassifierResponse {
        flagged: body["results"][0]["flagged"].as_bool(),
    }
}

#[async_trait]
impl SafetyClassifier for OpenAiModerationClient {
    async fn classify(&self, text: &str) -> Result<ClassifierResponse, ClassifierError> {
        let payload = json!({ "input": text });

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status { status, body });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        Ok(parse_moderation_body(&body))
    }
}
