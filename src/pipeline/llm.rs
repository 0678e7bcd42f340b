//! Language-model access: the [`LlmClient`] seam and its provider-backed
//! implementation.
//!
//! The rest of the pipeline only sees [`LlmClient`], so extraction and vision
//! OCR can be exercised against an in-memory client in tests while production
//! goes through an `edgequake_llm` provider.
//!
//! ## Retry Strategy
//!
//! Model requests are not retried unless `max_retries > 0`. When enabled, the
//! wait between attempts is `retry_backoff_ms * 2^(attempt - 1)`, capped at
//! one minute.

use crate::config::FormFillConfig;
use crate::error::{FormFillError, LlmError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default model when a provider is named without one.
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// A chat-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a system + user text exchange and return the assistant's reply.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Send an image under a system instruction and return the reply.
    async fn transcribe(&self, system: &str, image: ImageData) -> Result<String, LlmError>;
}

/// [`LlmClient`] backed by an `edgequake_llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: Option<u64>,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &FormFillConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &FormFillConfig) -> Result<Self, FormFillError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let start = Instant::now();
        let mut last_err = LlmError::EmptyResponse;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Model request: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.chat_once(messages).await {
                Ok(content) => {
                    debug!("Model request succeeded in {:?}", start.elapsed());
                    return Ok(content);
                }
                Err(e) => {
                    warn!("Model request: attempt {} failed: {}", attempt + 1, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    async fn chat_once(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = self.provider.chat(messages, Some(&self.options));
        let response = match self.api_timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), request)
                .await
                .map_err(|_| LlmError::Timeout { secs })?,
            None => request.await,
        }
        .map_err(|e| LlmError::Provider(e.to_string()))?;

        debug!(
            "Model usage: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(response.content)
    }
}

#[async_trait]
impl LlmClient for ProviderClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        self.chat(&messages).await
    }

    async fn transcribe(&self, system: &str, image: ImageData) -> Result<String, LlmError> {
        // The image carries all the content; the user text stays empty.
        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user_with_images("", vec![image]),
        ];
        self.chat(&messages).await
    }
}

/// Longest wait between two attempts.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Wait before retry `attempt` (1-based): `base * 2^(attempt - 1)`, capped.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let wait = match 2u64.checked_pow(attempt.saturating_sub(1)) {
        Some(factor) => base.saturating_mul(factor),
        None if base == 0 => 0,
        None => u64::MAX,
    };
    wait.min(MAX_BACKOFF_MS)
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &FormFillConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, FormFillError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FormFillError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **Gemini key** `GEMINI_API_KEY`, model from `config.model`, then
///    `GEMINI_MODEL_ID`.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &FormFillConfig) -> Result<Arc<dyn LLMProvider>, FormFillError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config
                .model
                .clone()
                .or_else(|| std::env::var("GEMINI_MODEL_ID").ok().filter(|m| !m.is_empty()))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());
            return create_provider("gemini", &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FormFillError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1_000);
        assert_eq!(backoff_ms(500, 4), 4_000);
        assert_eq!(backoff_ms(500, 20), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(500, 64), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(u64::MAX, 3), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(0, u32::MAX), 0);
    }

    #[test]
    fn build_options_defaults() {
        let config = FormFillConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[test]
    fn build_options_follow_builder() {
        let config = FormFillConfig::builder()
            .temperature(0.4)
            .max_tokens(256)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.4));
        assert_eq!(opts.max_tokens, Some(256));
    }
}
