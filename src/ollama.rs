use crate::error::LlmError;
use crate::llm::LlmClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
    #[allow(dead_code)]
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn with_config(base_url: String, model: String) -> Self {
        OllamaClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }

    fn chat_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> OllamaChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Message {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(Message {
            role: "user",
            content: user_prompt,
        });

        OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let request = self.chat_request(system_prompt, user_prompt);
        tracing::debug!(model = %self.model, prompt_chars = user_prompt.len(), "ollama chat request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "Ollama",
                status: status.as_u16(),
                body,
            });
        }

        let ollama_response: OllamaChatResponse = response.json().await?;
        Ok(ollama_response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shape() {
        let client = OllamaClient::with_config("http://localhost:11434/".into(), "llama3.1".into());
        let body = serde_json::to_value(client.chat_request("be terse", "hi")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "llama3.1",
                "messages": [
                    {"role": "system", "content": "be terse"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": false
            })
        );
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_empty_system_prompt_is_omitted() {
        let client = OllamaClient::with_config("http://h".into(), "m".into());
        let body = serde_json::to_value(client.chat_request("", "hi")).unwrap();
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"model":"llama3.1","created_at":"2024-01-01T00:00:00Z","message":{"role":"assistant","content":"hello"},"done":true}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.content, "hello");
    }
}
