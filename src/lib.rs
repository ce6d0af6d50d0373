pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod prompt;
#[cfg(feature = "server")]
pub mod server;

pub use client::{
    retry::{Retrier, RetryPolicy, Sleeper, TokioSleeper},
    transport::{CompletionTransport, HttpTransport},
    ImageClient, TextClient, ThumbnailClient,
};
pub use config::{Config, OpenRouterConfig, RewriteConfig};
pub use error::{ProviderFailure, Result, ThumbnailError};
pub use models::*;
pub use tokio_util::sync::CancellationToken;
