pub mod extract;
pub mod image_client;
pub mod retry;
pub mod text_client;
pub mod transport;

use crate::{
    config::Config,
    error::{Result, ThumbnailError},
    models::{
        AspectRatio, FanOut, GenerationRequest, SlotOutcome, Thumbnail, ThumbnailBatch,
        ThumbnailRequest,
    },
    prompt::{self, VARIATION_FOCUSES},
};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

pub use image_client::ImageClient;
pub use text_client::TextClient;

#[derive(Clone)]
pub struct ThumbnailClient {
    text_client: TextClient,
    image_client: ImageClient,
}

impl ThumbnailClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            text_client: TextClient::new(&config.rewrite)?,
            image_client: ImageClient::new(&config.openrouter, config.retry.clone())?,
        })
    }

    pub fn from_parts(text_client: TextClient, image_client: ImageClient) -> Self {
        Self {
            text_client,
            image_client,
        }
    }

    pub fn text(&self) -> &TextClient {
        &self.text_client
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }

    /// Build the questionnaire prompt and expand it through the text model.
    pub async fn rewrite_prompt(&self, request: &ThumbnailRequest) -> String {
        let system_prompt =
            prompt::build_system_prompt(&request.responses, request.resolved_placement());
        log::debug!("System prompt: {}", system_prompt);
        self.text_client.rewrite_prompt(&system_prompt).await
    }

    /// Generate every variation in every aspect ratio. Slot failures are
    /// reported per slot; only caller errors and cancellation fail the batch.
    pub async fn generate_thumbnails(
        &self,
        request: &ThumbnailRequest,
        cancel: &CancellationToken,
    ) -> Result<ThumbnailBatch> {
        let base_image = request
            .base_image
            .as_deref()
            .filter(|image| !image.trim().is_empty())
            .ok_or(ThumbnailError::MissingBaseImage)?;

        let _timer = crate::logger::timer("generate_thumbnails");
        let rewritten = self.rewrite_prompt(request).await;

        let count = request.variations.clamp(1, VARIATION_FOCUSES.len());
        let variations: Vec<String> = (0..count)
            .map(|index| prompt::variation_prompt(&rewritten, index))
            .collect();

        log::info!(
            "Generating {} variation(s) x {} ratios ({:?} fan-out)",
            count,
            AspectRatio::ALL.len(),
            request.fan_out
        );

        let thumbnails = match request.fan_out {
            FanOut::Sequential => {
                let mut thumbnails = Vec::with_capacity(count);
                for (index, variation) in variations.iter().enumerate() {
                    thumbnails.push(
                        self.render_sequential(index, variation, base_image, cancel)
                            .await,
                    );
                }
                thumbnails
            }
            FanOut::Concurrent => {
                join_all(variations.iter().enumerate().map(|(index, variation)| {
                    self.render_concurrent(index, variation, base_image, cancel)
                }))
                .await
            }
        };

        if cancel.is_cancelled() {
            return Err(ThumbnailError::Cancelled);
        }

        Ok(ThumbnailBatch {
            thumbnails,
            rewritten_prompt: rewritten,
        })
    }

    async fn render_slot(
        &self,
        variation: &str,
        ratio: AspectRatio,
        base_image: &str,
        cancel: &CancellationToken,
    ) -> SlotOutcome {
        let request = GenerationRequest::new(prompt::ratio_prompt(variation, ratio))
            .with_base_image(base_image)
            .with_target_size(ratio.size());

        let result = self
            .image_client
            .generate_with_cancel(&request, cancel)
            .await;
        if let Err(e) = &result {
            log::warn!("{} slot failed: {}", ratio, e);
        }
        result.into()
    }

    async fn render_sequential(
        &self,
        index: usize,
        variation: &str,
        base_image: &str,
        cancel: &CancellationToken,
    ) -> Thumbnail {
        let horizontal = self
            .render_slot(variation, AspectRatio::Horizontal, base_image, cancel)
            .await;
        let vertical = self
            .render_slot(variation, AspectRatio::Vertical, base_image, cancel)
            .await;
        let square = self
            .render_slot(variation, AspectRatio::Square, base_image, cancel)
            .await;

        assemble(index, variation, horizontal, vertical, square)
    }

    async fn render_concurrent(
        &self,
        index: usize,
        variation: &str,
        base_image: &str,
        cancel: &CancellationToken,
    ) -> Thumbnail {
        let (horizontal, vertical, square) = tokio::join!(
            self.render_slot(variation, AspectRatio::Horizontal, base_image, cancel),
            self.render_slot(variation, AspectRatio::Vertical, base_image, cancel),
            self.render_slot(variation, AspectRatio::Square, base_image, cancel),
        );

        assemble(index, variation, horizontal, vertical, square)
    }
}

fn assemble(
    index: usize,
    variation: &str,
    horizontal: SlotOutcome,
    vertical: SlotOutcome,
    square: SlotOutcome,
) -> Thumbnail {
    let thumbnail = Thumbnail {
        id: format!("thumb_{}", index + 1),
        prompt: variation.to_string(),
        horizontal,
        vertical,
        square,
    };
    log::info!(
        "Generation results for variant {}: {}/{} ready",
        index + 1,
        thumbnail.ready_count(),
        AspectRatio::ALL.len()
    );
    thumbnail
}
