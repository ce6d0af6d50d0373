use crate::error::ThumbnailError;
use crate::models::ImageGenerationResponse;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    Horizontal,
    Vertical,
    Square,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [
        AspectRatio::Horizontal,
        AspectRatio::Vertical,
        AspectRatio::Square,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Horizontal => "horizontal",
            AspectRatio::Vertical => "vertical",
            AspectRatio::Square => "square",
        }
    }

    pub fn ratio(&self) -> &'static str {
        match self {
            AspectRatio::Horizontal => "16:9",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Square => "1:1",
        }
    }

    pub fn size(&self) -> &'static str {
        match self {
            AspectRatio::Horizontal => "1280x720",
            AspectRatio::Vertical => "720x1280",
            AspectRatio::Square => "1080x1080",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Questionnaire answers collected from the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Responses {
    pub video_type: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,
    pub audience: Option<String>,
    pub context: Option<String>,
    pub placement: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

/// How the slots of a batch are scheduled against the image endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    Sequential,
    #[default]
    Concurrent,
}

#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub responses: Responses,
    pub placement: Option<String>,
    pub base_image: Option<String>,
    pub variations: usize,
    pub fan_out: FanOut,
}

impl ThumbnailRequest {
    pub fn new(responses: Responses) -> Self {
        Self {
            responses,
            placement: None,
            base_image: None,
            variations: 3,
            fan_out: FanOut::default(),
        }
    }

    pub fn with_base_image(mut self, base_image: impl Into<String>) -> Self {
        self.base_image = Some(base_image.into());
        self
    }

    pub fn with_placement(mut self, placement: impl Into<String>) -> Self {
        self.placement = Some(placement.into());
        self
    }

    pub fn with_variations(mut self, variations: usize) -> Self {
        self.variations = variations;
        self
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Explicit placement wins over the questionnaire answer, then `center`.
    pub fn resolved_placement(&self) -> &str {
        self.placement
            .as_deref()
            .or(self.responses.placement.as_deref())
            .filter(|p| !p.trim().is_empty())
            .unwrap_or("center")
    }
}

/// Outcome of a single aspect-ratio slot. Failures are reported, never papered over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SlotOutcome {
    Ready {
        #[serde(rename = "dataUrl")]
        data_url: String,
    },
    Failed {
        code: String,
        message: String,
        #[serde(rename = "httpStatus", default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl SlotOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, SlotOutcome::Ready { .. })
    }

    pub fn data_url(&self) -> Option<&str> {
        match self {
            SlotOutcome::Ready { data_url } => Some(data_url),
            SlotOutcome::Failed { .. } => None,
        }
    }
}

impl From<Result<ImageGenerationResponse, ThumbnailError>> for SlotOutcome {
    fn from(result: Result<ImageGenerationResponse, ThumbnailError>) -> Self {
        match result {
            Ok(image) => SlotOutcome::Ready {
                data_url: image.data_url(),
            },
            Err(e) => SlotOutcome::Failed {
                code: e.code().to_string(),
                message: e.to_string(),
                status: e.status(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thumbnail {
    pub id: String,
    pub prompt: String,
    pub horizontal: SlotOutcome,
    pub vertical: SlotOutcome,
    pub square: SlotOutcome,
}

impl Thumbnail {
    pub fn slot(&self, ratio: AspectRatio) -> &SlotOutcome {
        match ratio {
            AspectRatio::Horizontal => &self.horizontal,
            AspectRatio::Vertical => &self.vertical,
            AspectRatio::Square => &self.square,
        }
    }

    pub fn ready_count(&self) -> usize {
        AspectRatio::ALL
            .iter()
            .filter(|ratio| self.slot(**ratio).is_ready())
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailBatch {
    pub thumbnails: Vec<Thumbnail>,
    pub rewritten_prompt: String,
}
