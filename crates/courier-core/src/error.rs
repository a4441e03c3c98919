use thiserror::Error;

/// Top-level error type for courier.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Invalid configuration, or a webhook that could not be registered.
    #[error("config error: {0}")]
    Config(String),

    /// The Bot API answered with `ok: false`.
    #[error("api error: {description}")]
    Api {
        error_code: Option<i64>,
        description: String,
    },

    /// Network failure or a reply that was not a JSON envelope.
    #[error("transport error: {0}")]
    Transport(String),

    /// A remote file could not be downloaded.
    #[error("download error for {url}: {reason}")]
    Download { url: String, reason: String },

    /// Malformed inbound payload or parameter value.
    #[error("parse error: {0}")]
    Parse(String),

    /// The `getMe` identity check failed.
    #[error("identity error: {0}")]
    Identity(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
