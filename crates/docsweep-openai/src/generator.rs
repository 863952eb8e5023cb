//! Documentation generator backed by an OpenAI-compatible chat endpoint.

use async_trait::async_trait;
use docsweep_core::{DocGenerator, DocsweepError, GeneratedText, PromptContext};
use tracing::debug;

use crate::prompts::{build_doc_prompt, DOC_SYSTEM_PROMPT};
use crate::{ChatRequest, ClientConfig, ClientError, Message, OpenAIClient};

/// Generates one markdown document per chat completion.
#[derive(Debug, Clone)]
pub struct OpenAIDocGenerator {
    client: OpenAIClient,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIDocGenerator {
    /// Create a generator from an OpenAI-compatible client.
    pub fn new(client: OpenAIClient) -> Self {
        let defaults = ClientConfig::default();
        Self {
            client,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Build the client and generator from one config
    pub fn from_config(config: ClientConfig) -> docsweep_core::Result<Self> {
        let temperature = config.temperature;
        let max_tokens = config.max_tokens;
        let client = OpenAIClient::new(config).map_err(into_docsweep_error)?;
        Ok(Self::new(client)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens))
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the response token ceiling
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl DocGenerator for OpenAIDocGenerator {
    async fn prepare(&self) -> docsweep_core::Result<()> {
        if !self.client.has_api_key() {
            return Err(DocsweepError::Transport(
                "No API key configured for the documentation provider".to_string(),
            ));
        }
        Ok(())
    }

    async fn generate(&self, context: PromptContext) -> docsweep_core::Result<GeneratedText> {
        let prompt = build_doc_prompt(&context);
        debug!(
            "Requesting docs for {} ({} prompt chars)",
            context.relative_path,
            prompt.len()
        );

        let response = self
            .client
            .chat(ChatRequest {
                model: self.client.default_model().to_string(),
                messages: vec![Message::system(DOC_SYSTEM_PROMPT), Message::user(prompt)],
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
            })
            .await
            .map_err(into_docsweep_error)?;

        let model = Some(response.model.trim().to_string()).filter(|m| !m.is_empty());

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DocsweepError::Generation("Empty response content".to_string()))?;

        Ok(GeneratedText { text, model })
    }
}

fn into_docsweep_error(err: ClientError) -> DocsweepError {
    if err.is_unavailable() {
        DocsweepError::Transport(err.to_string())
    } else {
        DocsweepError::Generation(err.to_string())
    }
}
