use crate::client::retry::RetryPolicy;
use std::env;
use std::time::Duration;

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_IMAGE_MODEL: &str = "google/gemini-2.5-flash-image-preview";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REWRITE_MODEL: &str = "gpt-4o-mini";

/// Connection settings for the image-capable chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_model: String,
    pub http_referer: Option<String>,
    pub app_title: Option<String>,
    pub request_timeout: Duration,
}

/// Settings for the optional prompt-rewrite model.
#[derive(Debug, Clone)]
pub struct RewriteConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: Option<u16>,
    pub openrouter: OpenRouterConfig,
    pub rewrite: RewriteConfig,
    pub retry: RetryPolicy,
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        OpenRouterConfig {
            api_key: None,
            base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            http_referer: None,
            app_title: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl OpenRouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let image_model = non_empty_env("OPENAI_IMAGE_MODEL")
            .or_else(|| non_empty_env("GOOGLE_IMAGE_MODEL"))
            .unwrap_or(defaults.image_model);
        let request_timeout = non_empty_env("OPENROUTER_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        OpenRouterConfig {
            api_key: non_empty_env("OPENROUTER_API_KEY"),
            base_url: non_empty_env("OPENROUTER_BASE_URL").unwrap_or(defaults.base_url),
            image_model,
            http_referer: non_empty_env("OPENROUTER_HTTP_REFERER"),
            app_title: non_empty_env("OPENROUTER_X_TITLE"),
            request_timeout,
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_app_headers(
        mut self,
        http_referer: impl Into<String>,
        app_title: impl Into<String>,
    ) -> Self {
        self.http_referer = Some(http_referer.into());
        self.app_title = Some(app_title.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        RewriteConfig {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_REWRITE_MODEL.to_string(),
            max_tokens: 300,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RewriteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        RewriteConfig {
            api_key: non_empty_env("OPENAI_API_KEY"),
            base_url: non_empty_env("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: non_empty_env("OPENAI_REWRITE_MODEL").unwrap_or(defaults.model),
            ..defaults
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: None,
            openrouter: OpenRouterConfig::default(),
            rewrite: RewriteConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());

        Config {
            port,
            openrouter: OpenRouterConfig::from_env(),
            rewrite: RewriteConfig::from_env(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_openrouter(mut self, config: OpenRouterConfig) -> Self {
        self.openrouter = config;
        self
    }

    pub fn with_rewrite(mut self, config: RewriteConfig) -> Self {
        self.rewrite = config;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.openrouter.base_url, DEFAULT_OPENROUTER_BASE_URL);
        assert_eq!(config.openrouter.image_model, DEFAULT_IMAGE_MODEL);
        assert!(config.openrouter.api_key.is_none());
        assert!(!config.rewrite.is_enabled());
        assert_eq!(config.rewrite.max_tokens, 300);
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn test_builders() {
        let config = Config::new()
            .with_port(3000)
            .with_openrouter(
                OpenRouterConfig::new()
                    .with_credentials("sk-or")
                    .with_model("openai/gpt-image-1")
                    .with_app_headers("https://thumbs.example", "Thumbgen"),
            )
            .with_rewrite(RewriteConfig::new().with_credentials("sk-oa"));

        assert_eq!(config.port, Some(3000));
        assert_eq!(config.openrouter.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.openrouter.image_model, "openai/gpt-image-1");
        assert_eq!(config.openrouter.app_title.as_deref(), Some("Thumbgen"));
        assert!(config.rewrite.is_enabled());
    }

    #[test]
    fn test_from_env() {
        env::set_var("OPENROUTER_API_KEY", "sk-or-env");
        env::set_var("GOOGLE_IMAGE_MODEL", "google/imagen-edit");
        env::set_var("OPENROUTER_TIMEOUT_SECS", "45");
        env::set_var("PORT", "8080");
        env::remove_var("OPENAI_IMAGE_MODEL");

        let config = Config::from_env();

        assert_eq!(config.port, Some(8080));
        assert_eq!(config.openrouter.api_key.as_deref(), Some("sk-or-env"));
        assert_eq!(config.openrouter.image_model, "google/imagen-edit");
        assert_eq!(config.openrouter.request_timeout, Duration::from_secs(45));

        for key in ["OPENROUTER_API_KEY", "GOOGLE_IMAGE_MODEL", "OPENROUTER_TIMEOUT_SECS", "PORT"] {
            env::remove_var(key);
        }
    }
}
