//! The bot facade: one object that owns the outbound API, the observer
//! registry, and whichever update source the configuration selects.

use crate::api::Api;
use crate::dispatcher::Dispatcher;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::pipeline::RequestPipeline;
use crate::poller::Poller;
use crate::transport::{HttpTransport, Transport};
use crate::webhook::{self, ErrorHook};
use axum::http::{Method, Uri};
use axum::response::Response;
use axum::Router;
use courier_core::config::{BotConfig, DeliveryMode};
use courier_core::error::CourierError;
use courier_core::events::{Event, EventHub, EventKind, SubscriptionId};
use courier_core::types::{BotIdentity, Update};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Bot {
    config: BotConfig,
    api: Api,
    events: Arc<EventHub>,
    identity: Arc<OnceLock<BotIdentity>>,
    dispatcher: Arc<Dispatcher>,
    webhook_error: Option<ErrorHook>,
}

impl Bot {
    /// Build a bot that talks to the real API over HTTP.
    pub fn new(config: BotConfig) -> Result<Self, CourierError> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(ref proxy) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| CourierError::Config(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| CourierError::Config(format!("failed to build HTTP client: {e}")))?;

        let transport = HttpTransport::new(
            client.clone(),
            config.base_url(),
            Duration::from_secs(config.request_timeout_secs),
        );
        let fetcher = HttpFetcher::new(client, Duration::from_millis(config.download_timeout_ms));

        Self::with_transport(config, Arc::new(transport), Arc::new(fetcher))
    }

    /// Build a bot over caller-supplied transport and fetcher.
    pub fn with_transport(
        config: BotConfig,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CourierError> {
        config.validate()?;

        let events = Arc::new(EventHub::new());
        let identity = Arc::new(OnceLock::new());
        let pipeline = RequestPipeline::new(transport, fetcher, Arc::clone(&events));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&events), Arc::clone(&identity)));

        Ok(Self {
            config,
            api: Api::new(Arc::new(pipeline)),
            events,
            identity,
            dispatcher,
            webhook_error: None,
        })
    }

    /// Answer requests that reach the webhook server but are not deliveries.
    pub fn on_webhook_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Method, &Uri) -> Response + Send + Sync + 'static,
    {
        self.webhook_error = Some(Arc::new(hook));
        self
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.subscribe(EventKind::Message, handler)
    }

    pub fn on_inline_query<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.subscribe(EventKind::InlineQuery, handler)
    }

    pub fn on_request<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.subscribe(EventKind::Request, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// The bot's own account, once learned from `getMe`.
    pub fn identity(&self) -> Option<&BotIdentity> {
        self.identity.get()
    }

    /// Feed an update obtained elsewhere through the dispatcher.
    pub fn dispatch(&self, update: Update) {
        self.dispatcher.dispatch(update);
    }

    /// Router for the configured webhook path, for consumers that run their
    /// own server.
    pub fn webhook_router(&self) -> Result<Router, CourierError> {
        let config = self
            .config
            .webhook
            .as_ref()
            .ok_or_else(|| CourierError::Config("webhook not configured".into()))?;
        let path = webhook::webhook_path(&config.url)?;
        Ok(webhook::router(
            path,
            Arc::clone(&self.dispatcher),
            self.webhook_error.clone(),
        ))
    }

    /// Start the configured update source. Returns the background task, if one
    /// was spawned; it stops when `cancel` fires.
    pub async fn start(
        &self,
        cancel: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>, CourierError> {
        match self.config.mode() {
            DeliveryMode::Polling(polling) => {
                let poller = Poller::new(
                    self.api.clone(),
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&self.identity),
                    polling.clone(),
                );
                Ok(Some(tokio::spawn(poller.run(cancel))))
            }
            DeliveryMode::Webhook(config) => {
                webhook::register(&self.api, config).await?;
                self.learn_identity().await;

                if config.port.is_none() {
                    info!("webhook registered without a port; mount webhook_router() to receive updates");
                    return Ok(None);
                }
                let router = self.webhook_router()?;
                webhook::serve(config, router, cancel).await.map(Some)
            }
            DeliveryMode::Manual => {
                info!("no update source configured");
                Ok(None)
            }
        }
    }

    /// Single `getMe` attempt; webhook delivery works without it, only
    /// mention stripping waits for it.
    async fn learn_identity(&self) {
        match self.api.get_me().await {
            Ok(user) => match BotIdentity::from_user(&user) {
                Some(identity) => {
                    info!("Telegram bot @{} identified", identity.username);
                    let _ = self.identity.set(identity);
                }
                None => warn!("getMe returned an account without a username"),
            },
            Err(e) => warn!("getMe failed, mentions will not be stripped: {e}"),
        }
    }
}
