//! Webhook update source.
//!
//! Registers the public URL with `setWebhook`, then serves the registered
//! path over HTTP or HTTPS. Every matching POST is acknowledged with `OK`
//! whatever its body holds; a parsed update is dispatched on its own task.

use crate::api::Api;
use crate::dispatcher::Dispatcher;
use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use courier_core::config::WebhookConfig;
use courier_core::error::CourierError;
use courier_core::types::Update;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Largest webhook body accepted.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Answers requests that are not webhook deliveries. Without a hook they get
/// `401` and the connection is closed.
pub type ErrorHook = Arc<dyn Fn(&Method, &Uri) -> Response + Send + Sync>;

#[derive(Clone)]
struct WebhookState {
    path: String,
    dispatcher: Arc<Dispatcher>,
    on_error: Option<ErrorHook>,
}

/// Path (plus query, if any) that inbound deliveries must hit.
pub fn webhook_path(url: &str) -> Result<String, CourierError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| CourierError::Config(format!("invalid webhook url '{url}': {e}")))?;
    Ok(match parsed.query() {
        Some(q) => format!("{}?{q}", parsed.path()),
        None => parsed.path().to_string(),
    })
}

/// Build the router that accepts deliveries on `path`.
pub fn router(path: String, dispatcher: Arc<Dispatcher>, on_error: Option<ErrorHook>) -> Router {
    Router::new().fallback(handle).with_state(WebhookState {
        path,
        dispatcher,
        on_error,
    })
}

async fn handle(State(state): State<WebhookState>, request: Request) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    if method != Method::POST || target != state.path {
        if let Some(ref hook) = state.on_error {
            return hook(&method, &uri);
        }
        debug!("skip request [{method}] {uri}");
        return (StatusCode::UNAUTHORIZED, [(header::CONNECTION, "close")]).into_response();
    }

    match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => match parse_update(&body) {
            Ok(update) => {
                let dispatcher = Arc::clone(&state.dispatcher);
                tokio::spawn(async move { dispatcher.dispatch(update) });
            }
            Err(e) => warn!("webhook payload dropped: {e}"),
        },
        Err(e) => warn!("webhook body could not be read: {e}"),
    }

    (StatusCode::OK, "OK").into_response()
}

/// An empty body counts as an empty update.
fn parse_update(body: &[u8]) -> Result<Update, CourierError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_str("{}").map_err(|e| CourierError::Parse(e.to_string()));
    }
    serde_json::from_slice(body).map_err(|e| CourierError::Parse(format!("invalid JSON body: {e}")))
}

/// Register `config.url` with the API. Anything but a confirmed success is fatal.
pub async fn register(api: &Api, config: &WebhookConfig) -> Result<(), CourierError> {
    match api.set_webhook(json!({ "url": config.url })).await {
        Ok(Value::Bool(false)) => Err(CourierError::Config(format!(
            "can't configure webhook {}: API returned false",
            config.url
        ))),
        Ok(_) => {
            info!("webhook registered at {}", config.url);
            Ok(())
        }
        Err(e) => Err(CourierError::Config(format!(
            "can't configure webhook {}: {e}",
            config.url
        ))),
    }
}

/// Bind `host:port` and serve `router` until `cancel` fires. TLS is used when
/// both key and certificate files exist.
pub async fn serve(
    config: &WebhookConfig,
    router: Router,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, CourierError> {
    let port = config
        .port
        .ok_or_else(|| CourierError::Config("webhook port not set".into()))?;
    let addr = format!("{}:{}", config.host, port);

    if let Some((key, cert)) = config.tls_paths() {
        let socket: SocketAddr = addr
            .parse()
            .map_err(|e| CourierError::Config(format!("invalid webhook address {addr}: {e}")))?;
        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(|e| CourierError::Config(format!("failed to load TLS key/cert: {e}")))?;

        let handle = axum_server::Handle::new();
        let shutdown = handle.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            shutdown.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        info!("Webhook listening on {addr} (TLS)");
        return Ok(tokio::spawn(async move {
            if let Err(e) = axum_server::bind_rustls(socket, tls)
                .handle(handle)
                .serve(router.into_make_service())
                .await
            {
                error!("webhook server error: {e}");
            }
        }));
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Config(format!("webhook failed to bind to {addr}: {e}")))?;

    info!("Webhook listening on {addr}");
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            error!("webhook server error: {e}");
        }
    }))
}
