mod defaults;


use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::CourierError;
use defaults::*;

/// Environment variable that supplies or overrides the bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot API token issued by @BotFather. Required.
    #[serde(default)]
    pub token: String,
    /// API base; the token and method name are appended to it.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Optional proxy URL for every outbound request.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Timeout for ordinary API calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for downloading remote files before upload, in milliseconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_ms: u64,
    #[serde(default)]
    pub polling: Option<PollingConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

/// Long-polling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub timeout: u64,
    /// Maximum number of updates per batch.
    #[serde(default = "default_poll_limit")]
    pub limit: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout: default_poll_timeout(),
            limit: default_poll_limit(),
        }
    }
}

/// Webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Public URL registered with `setWebhook`. Its path is the one served locally.
    pub url: String,
    /// Local port to listen on. Without a port no server is started and the
    /// consumer mounts the webhook router itself.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_webhook_host")]
    pub host: String,
    /// PEM private key. TLS is used only when both key and cert exist.
    #[serde(default)]
    pub key: Option<PathBuf>,
    /// PEM certificate chain.
    #[serde(default)]
    pub cert: Option<PathBuf>,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            port: None,
            host: default_webhook_host(),
            key: None,
            cert: None,
        }
    }

    /// Key and certificate paths, when both are configured and present on disk.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (self.key.as_deref(), self.cert.as_deref()) {
            (Some(key), Some(cert)) if key.exists() && cert.exists() => Some((key, cert)),
            _ => None,
        }
    }
}

/// How inbound updates reach the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode<'a> {
    Polling(&'a PollingConfig),
    Webhook(&'a WebhookConfig),
    /// Neither source configured: outbound calls only.
    Manual,
}

impl BotConfig {
    /// Config with the given token and defaults everywhere else.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: default_api_url(),
            proxy: None,
            request_timeout_secs: default_request_timeout(),
            download_timeout_ms: default_download_timeout(),
            polling: None,
            webhook: None,
        }
    }

    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Check the invariants every bot relies on.
    pub fn validate(&self) -> Result<(), CourierError> {
        if self.token.trim().is_empty() {
            return Err(CourierError::Config(
                "bot token is required (set `token` or TELEGRAM_BOT_TOKEN)".into(),
            ));
        }
        if self.polling.is_some() && self.webhook.is_some() {
            return Err(CourierError::Config(
                "polling and webhook are mutually exclusive".into(),
            ));
        }
        if let Some(ref webhook) = self.webhook {
            if webhook.url.trim().is_empty() {
                return Err(CourierError::Config("webhook url must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Method endpoint prefix: `{api_url}{token}/`.
    pub fn base_url(&self) -> String {
        format!("{}{}/", self.api_url, self.token)
    }

    pub fn mode(&self) -> DeliveryMode<'_> {
        match (&self.polling, &self.webhook) {
            (_, Some(webhook)) => DeliveryMode::Webhook(webhook),
            (Some(polling), None) => DeliveryMode::Polling(polling),
            (None, None) => DeliveryMode::Manual,
        }
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. A non-empty
/// `TELEGRAM_BOT_TOKEN` overrides the token from the file.
pub fn load(path: &str) -> Result<BotConfig, CourierError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CourierError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse(&content)?
    } else {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        BotConfig::new(String::new())
    };

    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            config.token = token;
        }
    }

    Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse(content: &str) -> Result<BotConfig, CourierError> {
    toml::from_str(content)
        .map_err(|e| CourierError::Config(format!("failed to parse config: {}", e)))
}
