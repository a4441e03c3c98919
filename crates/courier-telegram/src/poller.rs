//! Long-polling update source.
//!
//! Startup repeats `getMe` (one second apart) until the bot is identified,
//! then `getUpdates` runs back to back. The long-poll timeout paces the loop,
//! so neither an empty batch nor a failed poll adds a delay.

use crate::api::{decode_update, Api, UpdatesQuery};
use crate::dispatcher::Dispatcher;
use courier_core::config::PollingConfig;
use courier_core::error::CourierError;
use courier_core::types::BotIdentity;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause between failed startup attempts.
pub const RESTART_DELAY: Duration = Duration::from_secs(1);

pub struct Poller {
    api: Api,
    dispatcher: Arc<Dispatcher>,
    identity: Arc<OnceLock<BotIdentity>>,
    config: PollingConfig,
    /// Highest update_id seen so far; 0 before the first batch.
    offset: i64,
}

impl Poller {
    pub fn new(
        api: Api,
        dispatcher: Arc<Dispatcher>,
        identity: Arc<OnceLock<BotIdentity>>,
        config: PollingConfig,
    ) -> Self {
        Self {
            api,
            dispatcher,
            identity,
            config,
            offset: 0,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.clear_webhook().await;

        let identity = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Telegram polling cancelled before startup");
                return;
            }
            identity = self.start() => identity,
        };
        info!(
            "Telegram polling as @{} (timeout={}s, limit={})",
            identity.username, self.config.timeout, self.config.limit
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poll_once() => {
                    match result {
                        Ok(count) => debug!("[getUpdates] {count} updates, offset={}", self.offset),
                        Err(e) => warn!("[getUpdates] failed: {e}"),
                    }
                }
            }
        }

        info!("Telegram polling stopped at offset {}", self.offset);
    }

    /// Identify the bot, retrying every [`RESTART_DELAY`] until it succeeds.
    pub async fn start(&mut self) -> BotIdentity {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.identify().await {
                Ok(identity) => return identity,
                Err(e) => {
                    warn!("{e} (attempt {attempt}), check your token; retrying in 1s");
                    tokio::time::sleep(RESTART_DELAY).await;
                }
            }
        }
    }

    async fn identify(&self) -> Result<BotIdentity, CourierError> {
        let user = self
            .api
            .get_me()
            .await
            .map_err(|e| CourierError::Identity(format!("getMe failed: {e}")))?;
        let identity = BotIdentity::from_user(&user).ok_or_else(|| {
            CourierError::Identity(format!("getMe returned user {} without username", user.id))
        })?;
        // Already set on a restart: the first identity stays.
        let _ = self.identity.set(identity.clone());
        Ok(identity)
    }

    /// Fetch one batch, advance the offset, and dispatch it in order.
    pub async fn poll_once(&mut self) -> Result<usize, CourierError> {
        let batch = self
            .api
            .get_updates_raw(UpdatesQuery {
                offset: Some(self.offset + 1),
                limit: Some(self.config.limit),
                timeout: Some(self.config.timeout),
            })
            .await?;

        // Read ids from the raw entries so a malformed update is still acknowledged.
        let max_id = batch
            .iter()
            .filter_map(|raw| raw.get("update_id").and_then(Value::as_i64))
            .max();
        if let Some(max_id) = max_id {
            self.offset = self.offset.max(max_id);
        }

        let count = batch.len();
        for update in batch.into_iter().filter_map(decode_update) {
            self.dispatcher.dispatch(update);
        }
        Ok(count)
    }

    /// Polling and webhooks exclude each other on the API side.
    async fn clear_webhook(&self) {
        if let Err(e) = self.api.set_webhook(json!({"url": ""})).await {
            warn!("failed to clear webhook before polling: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{rejected, MockFetcher, MockTransport};
    use crate::pipeline::RequestPipeline;
    use courier_core::events::EventHub;
    use std::sync::Mutex;

    struct Harness {
        transport: Arc<MockTransport>,
        events: Arc<EventHub>,
        poller: Poller,
    }

    fn harness<F>(responder: F) -> Harness
    where
        F: Fn(&str, &crate::transport::ApiRequest, usize) -> Result<Value, CourierError>
            + Send
            + Sync
            + 'static,
    {
        let transport = Arc::new(MockTransport::new(responder));
        let events = Arc::new(EventHub::new());
        let identity = Arc::new(OnceLock::new());
        let api = Api::new(Arc::new(RequestPipeline::new(
            transport.clone(),
            Arc::new(MockFetcher::default()),
            Arc::clone(&events),
        )));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&events), Arc::clone(&identity)));
        let poller = Poller::new(
            api,
            dispatcher,
            identity,
            PollingConfig {
                timeout: 3,
                limit: 100,
            },
        );
        Harness {
            transport,
            events,
            poller,
        }
    }

    fn me() -> Value {
        json!({"id": 1, "is_bot": true, "first_name": "Bot", "username": "mybot"})
    }

    fn text_update(id: i64, text: &str) -> Value {
        json!({"update_id": id, "message": {"message_id": id, "chat": {"id": 1}, "text": text}})
    }

    #[tokio::test]
    async fn test_offset_advances_to_last_id_and_next_request_asks_for_next() {
        let mut h = harness(|method, _, index| match (method, index) {
            ("getUpdates", 0) => Ok(json!([
                text_update(5, "a"),
                text_update(7, "b"),
                text_update(9, "c")
            ])),
            ("getUpdates", _) => Ok(json!([])),
            _ => Ok(me()),
        });

        assert_eq!(h.poller.poll_once().await.unwrap(), 3);
        assert_eq!(h.poller.offset(), 9);

        h.poller.poll_once().await.unwrap();
        let calls = h.transport.calls_to("getUpdates");
        assert_eq!(calls[0].params["offset"], 1);
        assert_eq!(calls[1].params["offset"], 10);
        assert_eq!(calls[1].params["limit"], 100);
        assert_eq!(calls[1].params["timeout"], 3);
    }

    #[tokio::test]
    async fn test_empty_batch_and_failures_keep_offset() {
        let mut h = harness(|method, _, index| match (method, index) {
            ("getUpdates", 0) => Ok(json!([text_update(4, "x")])),
            ("getUpdates", 1) => Ok(json!([])),
            ("getUpdates", _) => Err(rejected(502, "Bad Gateway")),
            _ => Ok(me()),
        });

        h.poller.poll_once().await.unwrap();
        h.poller.poll_once().await.unwrap();
        assert!(h.poller.poll_once().await.is_err());
        assert_eq!(h.poller.offset(), 4);
        assert_eq!(h.transport.calls_to("getUpdates")[2].params["offset"], 5);
    }

    #[tokio::test]
    async fn test_offset_never_rewinds() {
        let mut h = harness(|method, _, index| match (method, index) {
            ("getUpdates", 0) => Ok(json!([text_update(20, "x")])),
            ("getUpdates", _) => Ok(json!([text_update(3, "stale")])),
            _ => Ok(me()),
        });
        h.poller.poll_once().await.unwrap();
        h.poller.poll_once().await.unwrap();
        assert_eq!(h.poller.offset(), 20);
    }

    #[tokio::test]
    async fn test_batch_dispatched_in_arrival_order() {
        let mut h = harness(|method, _, _| match method {
            "getUpdates" => Ok(json!([
                text_update(1, "first"),
                {"update_id": 2},
                text_update(3, "third")
            ])),
            _ => Ok(me()),
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        h.events
            .on_message(move |m| s.lock().unwrap().push(m.text.clone().unwrap_or_default()));

        h.poller.poll_once().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "third"]);
    }

    #[tokio::test]
    async fn test_malformed_update_skipped_without_stalling_offset() {
        let mut h = harness(|method, _, index| match (method, index) {
            ("getUpdates", 0) => Ok(json!([
                text_update(5, "ok"),
                {"update_id": 6, "message": {"message_id": "x", "chat": {"id": 1}}}
            ])),
            ("getUpdates", _) => Ok(json!([text_update(7, "later")])),
            _ => Ok(me()),
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        h.events
            .on_message(move |m| s.lock().unwrap().push(m.text.clone().unwrap_or_default()));

        assert_eq!(h.poller.poll_once().await.unwrap(), 2);
        assert_eq!(h.poller.offset(), 6);
        h.poller.poll_once().await.unwrap();

        let calls = h.transport.calls_to("getUpdates");
        assert_eq!(calls[1].params["offset"], 7);
        assert_eq!(h.poller.offset(), 7);
        assert_eq!(*seen.lock().unwrap(), vec!["ok", "later"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_retries_identity_one_second_apart() {
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&stamps);
        let mut h = harness(move |method, _, index| {
            if method == "getMe" {
                s.lock().unwrap().push(tokio::time::Instant::now());
                if index < 2 {
                    return Err(rejected(401, "Unauthorized"));
                }
                return Ok(me());
            }
            Ok(json!([]))
        });

        let identity = h.poller.start().await;
        assert_eq!(identity.username, "mybot");
        assert_eq!(h.poller.identity.get(), Some(&identity));

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 3);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= RESTART_DELAY);
        }
        assert!(h.transport.calls_to("getUpdates").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_clears_webhook_identifies_then_polls_until_cancelled() {
        let cancel = CancellationToken::new();
        let c = cancel.clone();
        let h = harness(move |method, _, index| match method {
            "getUpdates" => {
                if index == 2 {
                    c.cancel();
                }
                Ok(json!([text_update(index as i64 + 1, "m")]))
            }
            "setWebhook" => Err(rejected(500, "unavailable")),
            _ => Ok(me()),
        });
        let transport = h.transport.clone();
        let received = Arc::new(Mutex::new(0));
        let r = Arc::clone(&received);
        h.events.on_message(move |_| *r.lock().unwrap() += 1);

        h.poller.run(cancel).await;

        let methods: Vec<String> = transport.calls().into_iter().map(|(m, _)| m).collect();
        assert_eq!(methods[0], "setWebhook");
        assert_eq!(methods[1], "getMe");
        assert_eq!(transport.calls_to("getUpdates").len(), 3);
        assert_eq!(transport.calls_to("setWebhook")[0].params["url"], "");
        assert_eq!(*received.lock().unwrap(), 3);
    }
}
