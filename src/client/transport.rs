use crate::{
    error::{ProviderFailure, Result, ThumbnailError},
    models::ChatCompletionRequest,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

/// One chat-completions round trip. Implementations report failures as
/// [`ProviderFailure`] and leave retry decisions to the caller.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<Value, ProviderFailure>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        extra_headers: &[(&'static str, Option<String>)],
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| ThumbnailError::ConfigError(format!("invalid API key: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);

        for (name, value) in extra_headers {
            if let Some(value) = value {
                let invalid = |e: String| {
                    ThumbnailError::ConfigError(format!("invalid {} header: {}", name, e))
                };
                let header = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| invalid(e.to_string()))?;
                let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
                headers.insert(header, value);
            }
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ThumbnailError::ConfigError(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Message from an OpenAI-style `{"error": {...}}` envelope.
fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| error.as_str().map(str::to_string))
}

fn error_code(body: &Value) -> Option<u16> {
    let code = body.get("error")?.get("code")?;
    code.as_u64()
        .or_else(|| code.as_str().and_then(|s| s.parse().ok()))
        .and_then(|c| u16::try_from(c).ok())
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<Value, ProviderFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderFailure::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderFailure::new(Some(status.as_u16()), e.to_string()))?;

        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| truncate_text(&body, MAX_ERROR_BODY));
            return Err(ProviderFailure::new(Some(status.as_u16()), message));
        }

        let value = parsed.ok_or_else(|| {
            ProviderFailure::new(
                None,
                format!(
                    "response body is not valid JSON: {}",
                    truncate_text(&body, MAX_ERROR_BODY)
                ),
            )
        })?;

        // Some gateways report upstream failures inside a 200 body.
        if value.get("error").map_or(false, |e| !e.is_null()) {
            let message =
                error_message(&value).unwrap_or_else(|| "provider returned an error".into());
            return Err(ProviderFailure::new(error_code(&value), message));
        }

        Ok(value)
    }
}
