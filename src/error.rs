use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static RATE_LIMIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rate limit|429").expect("rate limit pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Base image is required for editing")]
    MissingBaseImage,

    #[error("Transient provider error{}: {message}", status_suffix(.status))]
    TransientProvider {
        status: Option<u16>,
        message: String,
    },

    #[error("Image generation failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<ThumbnailError>,
    },

    #[error("Provider error{}: {message}", status_suffix(.status))]
    NonTransientProvider {
        status: Option<u16>,
        message: String,
    },

    #[error("Completion call returned no image data")]
    NoImageData,

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl ThumbnailError {
    /// Stable machine-readable tag, surfaced to HTTP callers and slot reports.
    pub fn code(&self) -> &'static str {
        match self {
            ThumbnailError::MissingBaseImage => "MISSING_BASE_IMAGE",
            ThumbnailError::TransientProvider { .. } => "TRANSIENT",
            ThumbnailError::RetryExhausted { .. } => "RATE_LIMIT",
            ThumbnailError::NonTransientProvider { .. } => "PROVIDER_ERROR",
            ThumbnailError::NoImageData => "NO_IMAGE_DATA",
            ThumbnailError::Cancelled => "CANCELLED",
            ThumbnailError::InvalidRequest(_) => "INVALID_REQUEST",
            ThumbnailError::ConfigError(_) => "CONFIG_ERROR",
            ThumbnailError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Provider status code, if the failure came from the remote endpoint.
    pub fn status(&self) -> Option<u16> {
        match self {
            ThumbnailError::TransientProvider { status, .. }
            | ThumbnailError::NonTransientProvider { status, .. } => *status,
            ThumbnailError::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ThumbnailError::MissingBaseImage | ThumbnailError::InvalidRequest(_)
        )
    }
}

/// A failed call as seen by the transport, before retry classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        match self.status {
            Some(429) | Some(500..=599) => true,
            _ => RATE_LIMIT_PATTERN.is_match(&self.message),
        }
    }

    pub fn into_error(self) -> ThumbnailError {
        if self.is_transient() {
            ThumbnailError::TransientProvider {
                status: self.status,
                message: self.message,
            }
        } else {
            ThumbnailError::NonTransientProvider {
                status: self.status,
                message: self.message,
            }
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status={} {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<serde_json::Error> for ThumbnailError {
    fn from(e: serde_json::Error) -> Self {
        ThumbnailError::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;
