use crate::{
    client::{
        extract::extract_image,
        retry::{Retrier, RetryPolicy},
        transport::{CompletionTransport, HttpTransport},
    },
    config::OpenRouterConfig,
    error::{Result, ThumbnailError},
    models::{
        ChatCompletionRequest, ChatMessage, ContentBlock, GenerationRequest,
        ImageGenerationResponse,
    },
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Single-request image generation over a chat-completions endpoint, with
/// bounded retries on transient failures and tolerant payload extraction.
///
/// Stateless between calls: each `generate` owns its retry state, so one
/// client can serve any number of concurrent requests.
#[derive(Clone)]
pub struct ImageClient {
    transport: Arc<dyn CompletionTransport>,
    retrier: Retrier,
    model: String,
}

impl ImageClient {
    pub fn new(config: &OpenRouterConfig, policy: RetryPolicy) -> Result<Self> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            ThumbnailError::ConfigError("Missing OPENROUTER_API_KEY for image generation".into())
        })?;

        let transport = HttpTransport::new(
            &config.base_url,
            api_key,
            config.request_timeout,
            &[
                ("HTTP-Referer", config.http_referer.clone()),
                ("X-Title", config.app_title.clone()),
            ],
        )?;

        Ok(Self::with_transport(
            Arc::new(transport),
            config.image_model.clone(),
            Retrier::new(policy),
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn CompletionTransport>,
        model: impl Into<String>,
        retrier: Retrier,
    ) -> Self {
        Self {
            transport,
            retrier,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn build_request(&self, request: &GenerationRequest) -> Result<ChatCompletionRequest> {
        let image_url = request
            .base_image_url()
            .ok_or(ThumbnailError::MissingBaseImage)?;

        if request.prompt.trim().is_empty() {
            return Err(ThumbnailError::InvalidRequest("prompt text is empty".into()));
        }

        Ok(ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user_blocks(vec![
                ContentBlock::text(request.prompt.clone()),
                ContentBlock::image_url(image_url),
            ])],
            max_tokens: None,
        })
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<ImageGenerationResponse> {
        self.generate_with_cancel(request, &CancellationToken::new())
            .await
    }

    pub async fn generate_with_cancel(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<ImageGenerationResponse> {
        let body = self.build_request(request)?;
        let generation_id = Uuid::new_v4();

        log::info!(
            "Generating image with model: {} (size hint {}) [{}]",
            self.model,
            request.target_size,
            generation_id
        );
        log::debug!("Image prompt [{}]: {}", generation_id, request.prompt);

        let (response, attempts) = self
            .retrier
            .execute(cancel, |_| self.transport.complete(&body))
            .await
            .map_err(|e| {
                log::error!("Image generation failed [{}]: {}", generation_id, e);
                e
            })?;

        match extract_image(&response) {
            Some((shape, image_data)) => {
                log::info!(
                    "Extracted {} base64 chars via {} after {} attempt(s) [{}]",
                    image_data.len(),
                    shape.name(),
                    attempts,
                    generation_id
                );
                Ok(ImageGenerationResponse {
                    image_data,
                    model: self.model.clone(),
                    attempts,
                })
            }
            None => {
                log::warn!(
                    "Completion returned but no image data found [{}]: {}",
                    generation_id,
                    response
                        .pointer("/choices/0")
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "null".into())
                );
                Err(ThumbnailError::NoImageData)
            }
        }
    }
}
