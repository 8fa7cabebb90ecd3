use async_trait::async_trait;
use tracing::debug;

use crate::config::LLMConfig;
use crate::types::{AppResult, LLMMessage, LLMProvider, LLMRequest, LLMResponse};

/// A text-completion backend.
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider
#[derive(Debug, Clone)]
pub struct LLMProviderConfig {
    pub provider: LLMProvider,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl From<&LLMConfig> for LLMProviderConfig {
    fn from(config: &LLMConfig) -> Self {
        Self {
            provider: config.provider,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// Sampling parameters applied to every prompt sent through an [`LLM`].
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&LLMConfig> for CompletionSettings {
    fn from(config: &LLMConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
    settings: CompletionSettings,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig, settings: CompletionSettings) -> Self {
        let adapter: Box<dyn LLMAdapter> = match provider.provider {
            LLMProvider::Ollama => Box::new(crate::llm::ollama::OllamaAdapter::new(&provider.base_url)),
            LLMProvider::OpenAI => Box::new(crate::llm::openai::OpenAIAdapter::new(
                &provider.base_url,
                provider.api_key.as_deref(),
            )),
        };

        Self {
            adapter,
            provider_name: provider.provider.to_string(),
            settings,
        }
    }

    /// Wrap an already constructed adapter.
    pub fn with_adapter(
        adapter: Box<dyn LLMAdapter>,
        provider_name: impl Into<String>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
            settings,
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    /// Send a single rendered prompt and return the raw completion text.
    pub async fn complete(&self, prompt: &str) -> AppResult<String> {
        let request = LLMRequest {
            model: self.settings.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
            system_instruction: None,
        };

        let response = self.create_chat_completion(&request).await?;
        debug!(
            provider = %self.provider_name,
            completion_tokens = response.usage.completion_tokens,
            finish_reason = %response.finish_reason,
            "Completion received"
        );
        Ok(response.content)
    }
}
