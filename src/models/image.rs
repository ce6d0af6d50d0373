use crate::error::{Result, ThumbnailError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_IMAGE_MIME: &str = "image/png";
pub const DEFAULT_TARGET_SIZE: &str = "1280x720";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Raw base64 or a `data:` URL. Required; `None` is rejected before any call.
    pub base_image: Option<String>,
    /// Advisory only, the model is free to ignore it.
    pub target_size: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            base_image: None,
            target_size: DEFAULT_TARGET_SIZE.to_string(),
        }
    }

    pub fn with_base_image(mut self, base_image: impl Into<String>) -> Self {
        self.base_image = Some(base_image.into());
        self
    }

    pub fn with_target_size(mut self, target_size: impl Into<String>) -> Self {
        self.target_size = target_size.into();
        self
    }

    /// Base image as a data URL, wrapping bare base64 with the default MIME type.
    pub fn base_image_url(&self) -> Option<String> {
        self.base_image
            .as_deref()
            .filter(|image| !image.trim().is_empty())
            .map(to_data_url)
    }
}

pub fn to_data_url(image: &str) -> String {
    let trimmed = image.trim();
    if trimmed.starts_with("data:") {
        trimmed.to_string()
    } else {
        format!("data:{};base64,{}", DEFAULT_BASE_IMAGE_MIME, trimmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageGenerationResponse {
    pub image_data: String, // Base64 encoded
    pub model: String,
    pub attempts: u32,
}

impl ImageGenerationResponse {
    /// Sniff the MIME type from the leading magic bytes, defaulting to JPEG.
    pub fn mime_type(&self) -> &'static str {
        let prefix: String = self.image_data.chars().take(16).collect();
        let head = STANDARD.decode(prefix.as_bytes()).unwrap_or_default();

        match head.as_slice() {
            [0x89, b'P', b'N', b'G', ..] => "image/png",
            [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
            [b'G', b'I', b'F', b'8', ..] => "image/gif",
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
            _ => "image/jpeg",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.image_data)
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.image_data.as_bytes())
            .map_err(|e| ThumbnailError::SerializationError(format!("invalid base64 image: {}", e)))
    }
}
