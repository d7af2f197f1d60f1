//! Google Gemini `generateContent` client.
//!
//! Auth uses the `?key=` query parameter; the system prompt goes in the
//! top-level `system_instruction` field.

use crate::error::LlmError;
use crate::llm::LlmClient;
use async_trait::async_trait;
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: model.trim_start_matches("models/").to_string(),
        }
    }

    fn request_body(system_prompt: &str, user_prompt: &str) -> Value {
        let mut body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": user_prompt}],
            }],
        });
        if !system_prompt.is_empty() {
            body["system_instruction"] = serde_json::json!({
                "parts": [{"text": system_prompt}]
            });
        }
        body
    }

    /// Concatenate the text parts of the first candidate.
    fn response_text(response: &Value) -> Option<String> {
        let parts = response
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        tracing::debug!(model = %self.model, prompt_chars = user_prompt.len(), "gemini request");

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(system_prompt, user_prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "Gemini",
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        Self::response_text(&body).ok_or(LlmError::EmptyResponse)
    }
}
