use crate::{
    client::transport::{CompletionTransport, HttpTransport},
    config::RewriteConfig,
    error::{Result, ThumbnailError},
    models::{ChatCompletionRequest, ChatMessage, TextGenerationRequest, TextGenerationResponse},
};
use serde_json::Value;
use std::sync::Arc;

const REWRITE_SYSTEM_PROMPT: &str =
    "You are an assistant that rewrites short creative prompts for image generation.";

/// Plain text completions, used to expand questionnaire prompts before image
/// generation. Without credentials the client is disabled and rewriting is a no-op.
#[derive(Clone)]
pub struct TextClient {
    transport: Option<Arc<dyn CompletionTransport>>,
    model: String,
    max_tokens: u32,
}

impl TextClient {
    pub fn new(config: &RewriteConfig) -> Result<Self> {
        let transport = match config.api_key.as_deref() {
            Some(api_key) => {
                let http =
                    HttpTransport::new(&config.base_url, api_key, config.request_timeout, &[])?;
                Some(Arc::new(http) as Arc<dyn CompletionTransport>)
            }
            None => None,
        };

        Ok(Self {
            transport,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn with_transport(
        transport: Option<Arc<dyn CompletionTransport>>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn generate(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            ThumbnailError::ConfigError("No API key configured for text generation".into())
        })?;
        let model = request.model_id.unwrap_or_else(|| self.model.clone());

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(request.prompt));

        let body = ChatCompletionRequest {
            model: model.clone(),
            messages,
            max_tokens: Some(request.max_tokens.unwrap_or(self.max_tokens)),
        };

        log::info!("Invoking text model: {}", model);

        let response = transport
            .complete(&body)
            .await
            .map_err(|failure| failure.into_error())?;

        let choice = response.pointer("/choices/0");
        let text = choice
            .and_then(|c| c.pointer("/message/content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ThumbnailError::NonTransientProvider {
                    status: None,
                    message: "text completion returned no content".into(),
                }
            })?;

        Ok(TextGenerationResponse {
            text: text.to_string(),
            model,
            finish_reason: choice
                .and_then(|c| c.get("finish_reason"))
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    /// Expand a questionnaire prompt. Falls back to the input on any failure.
    pub async fn rewrite_prompt(&self, prompt: &str) -> String {
        if !self.is_enabled() {
            log::debug!("Prompt rewrite disabled, using original prompt");
            return prompt.to_string();
        }

        let request = TextGenerationRequest {
            prompt: format!(
                "Rewrite and expand this prompt to be concise and detailed for image generation: {}",
                prompt
            ),
            system: Some(REWRITE_SYSTEM_PROMPT.to_string()),
            max_tokens: Some(self.max_tokens),
            model_id: None,
        };

        match self.generate(request).await {
            Ok(response) => response.text,
            Err(e) => {
                log::warn!("Prompt rewrite failed, falling back to original prompt: {}", e);
                prompt.to_string()
            }
        }
    }
}
