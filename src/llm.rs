use crate::call::{CallPolicy, Interrupted};
use crate::config::{LlmConfig, Provider};
use crate::error::LlmError;
use crate::gemini::GeminiClient;
use crate::ollama::OllamaClient;
use async_trait::async_trait;
use std::sync::Arc;

/// Prompt in, text out. No structure is guaranteed in the returned text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;
}

/// Run one generation under the call policy.
pub async fn generate_with(
    llm: &dyn LlmClient,
    policy: &CallPolicy,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, LlmError> {
    tracing::debug!(model = llm.model(), prompt_chars = user_prompt.len(), "generating");
    match policy.run(llm.generate(system_prompt, user_prompt)).await {
        Ok(result) => result,
        Err(Interrupted::TimedOut(secs)) => Err(LlmError::Timeout { secs }),
        Err(Interrupted::Cancelled) => Err(LlmError::Cancelled),
    }
}

/// Build a client for `model` using the configured provider.
pub fn build_client(config: &LlmConfig, model: &str) -> Result<Arc<dyn LlmClient>, LlmError> {
    Ok(match config.provider {
        Provider::Ollama => Arc::new(OllamaClient::with_config(
            config.host.clone(),
            model.to_string(),
        )),
        Provider::Gemini => {
            let api_key = config
                .api_key
                .clone()
                .ok_or(LlmError::MissingApiKey { var: "GEMINI_API_KEY" })?;
            Arc::new(GeminiClient::new(api_key, model.to_string()))
        }
    })
}
