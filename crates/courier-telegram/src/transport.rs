//! Single outbound Bot API call and reply classification.

use crate::methods::{self, BASE64_FLAG};
use crate::params::{form_text, Params};
use async_trait::async_trait;
use courier_core::error::CourierError;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Extra time on top of the long-poll timeout before the HTTP call gives up.
const LONG_POLL_MARGIN: Duration = Duration::from_secs(10);

/// Binary content attached to a multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Everything a transport needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub params: Params,
    pub file: Option<FileUpload>,
}

/// Performs one call against the Bot API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve with the envelope's `result` on `ok: true`, otherwise fail.
    async fn call(&self, method: &str, request: ApiRequest) -> Result<Value, CourierError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

/// Classify a raw reply body.
pub fn parse_envelope(method: &str, body: &str) -> Result<Value, CourierError> {
    match serde_json::from_str::<Envelope>(body) {
        Ok(env) if env.ok => Ok(env.result.unwrap_or(Value::Null)),
        Ok(env) => Err(CourierError::Api {
            error_code: env.error_code,
            description: env
                .description
                .unwrap_or_else(|| format!("{method} rejected without description")),
        }),
        Err(e) => Err(CourierError::Transport(format!(
            "{method}: reply is not a JSON envelope: {e}"
        ))),
    }
}

/// Build the multipart body: the upload as a binary part, everything else as text.
pub fn build_form(request: ApiRequest) -> Form {
    let file_field = request.file.as_ref().map(|f| f.field.clone());
    let mut form = Form::new();

    for (key, value) in request.params {
        if key == BASE64_FLAG || file_field.as_deref() == Some(key.as_str()) {
            continue;
        }
        if let Some(text) = form_text(&value) {
            form = form.text(key, text);
        }
    }

    if let Some(file) = request.file {
        let part = Part::bytes(file.bytes).file_name(file.file_name);
        form = form.part(file.field, part);
    }

    form
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpTransport {
    /// `base_url` ends with the token and a slash; method names are appended.
    pub fn new(client: reqwest::Client, base_url: String, request_timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            request_timeout,
        }
    }

    fn timeout_for(&self, method: &str, params: &Params) -> Duration {
        if method != methods::GET_UPDATES {
            return self.request_timeout;
        }
        let poll = params
            .get("timeout")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0);
        Duration::from_secs(poll) + LONG_POLL_MARGIN
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, request: ApiRequest) -> Result<Value, CourierError> {
        let url = format!("{}{}", self.base_url, method);
        let builder = self
            .client
            .post(&url)
            .timeout(self.timeout_for(method, &request.params));

        let builder = if methods::is_json_body(method) {
            builder.json(&request.params)
        } else {
            builder.multipart(build_form(request))
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| CourierError::Transport(format!("{method} request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CourierError::Transport(format!("{method} read failed: {e}")))?;

        debug!("[{method}] reply {status}: {} bytes", body.len());
        parse_envelope(method, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(
            reqwest::Client::new(),
            format!("{}/botT/", server.uri()),
            Duration::from_secs(5),
        )
    }

    fn request(params: serde_json::Value) -> ApiRequest {
        ApiRequest {
            params: params.as_object().cloned().unwrap(),
            file: None,
        }
    }

    #[test]
    fn test_envelope_ok() {
        let v = parse_envelope("getMe", r#"{"ok":true,"result":{"id":1}}"#).unwrap();
        assert_eq!(v["id"], 1);
    }

    #[test]
    fn test_envelope_rejected() {
        let err = parse_envelope(
            "sendMessage",
            r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
        )
        .unwrap_err();
        match err {
            CourierError::Api {
                error_code,
                description,
            } => {
                assert_eq!(error_code, Some(400));
                assert!(description.contains("chat not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_envelope_not_json() {
        let err = parse_envelope("getMe", "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, CourierError::Transport(_)));
    }

    #[test]
    fn test_long_poll_timeout_extends_request() {
        let t = HttpTransport::new(
            reqwest::Client::new(),
            "http://x/botT/".into(),
            Duration::from_secs(30),
        );
        let params = json!({"timeout": 50}).as_object().cloned().unwrap();
        assert_eq!(
            t.timeout_for(methods::GET_UPDATES, &params),
            Duration::from_secs(60)
        );
        assert_eq!(
            t.timeout_for(methods::SEND_MESSAGE, &params),
            Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn test_json_body_for_set_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/setWebhook"))
            .and(body_json(json!({"url": "https://example.com/hook"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let result = transport(&server)
            .call("setWebhook", request(json!({"url": "https://example.com/hook"})))
            .await
            .unwrap();
        assert_eq!(result, json!(true));
    }

    #[tokio::test]
    async fn test_multipart_with_file_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendPhoto"))
            .and(header_exists("content-type"))
            .and(body_string_contains("name=\"chat_id\""))
            .and(body_string_contains("filename=\"cat.png\""))
            .and(body_string_contains("PNGDATA"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"message_id": 9}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(json!({"chat_id": 1, "photo": "ignored", "base64": true}));
        req.file = Some(FileUpload {
            field: "photo".into(),
            file_name: "cat.png".into(),
            bytes: b"PNGDATA".to_vec(),
        });
        let result = transport(&server).call("sendPhoto", req).await.unwrap();
        assert_eq!(result["message_id"], 9);
    }

    #[tokio::test]
    async fn test_api_rejection_on_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(
                json!({"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}),
            ))
            .mount(&server)
            .await;

        let err = transport(&server)
            .call("sendMessage", request(json!({"chat_id": 1, "text": "hi"})))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Api { error_code: Some(403), .. }));
    }

    #[tokio::test]
    async fn test_network_failure_is_transport_error() {
        let t = HttpTransport::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/botT/".into(),
            Duration::from_millis(500),
        );
        let err = t.call("getMe", request(json!({}))).await.unwrap_err();
        assert!(matches!(err, CourierError::Transport(_)));
    }
}
