//! Default value functions used by serde for config deserialization.

pub fn default_api_url() -> String {
    "https://api.telegram.org/bot".to_string()
}

pub fn default_request_timeout() -> u64 {
    30
}

pub fn default_download_timeout() -> u64 {
    400
}

pub fn default_poll_timeout() -> u64 {
    3
}

pub fn default_poll_limit() -> u32 {
    100
}

pub fn default_webhook_host() -> String {
    "0.0.0.0".to_string()
}
