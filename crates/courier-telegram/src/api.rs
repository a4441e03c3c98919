//! Bot API method catalogue on top of the request pipeline.
//!
//! Each method is a name plus the caller's parameters; parameter shapes are
//! not validated here. Anything object-shaped serializes into parameters.

use crate::methods;
use crate::params::to_params;
use crate::pipeline::{Callbacks, RequestPipeline};
use courier_core::error::CourierError;
use courier_core::types::{Update, User};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Optional `getUpdates` arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdatesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Clone)]
pub struct Api {
    pipeline: Arc<RequestPipeline>,
}

impl Api {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Call any method by name.
    pub async fn call<P: Serialize>(&self, method: &str, params: P) -> Result<Value, CourierError> {
        self.pipeline.execute(method, to_params(params)?).await
    }

    /// Call any method and settle `callbacks` with the outcome.
    pub async fn call_with<P: Serialize>(
        &self,
        method: &str,
        params: P,
        callbacks: Callbacks,
    ) -> Result<Value, CourierError> {
        let params = match to_params(params) {
            Ok(p) => p,
            Err(e) => {
                let outcome = Err(e);
                callbacks.settle(&outcome);
                return outcome;
            }
        };
        self.pipeline.execute_with(method, params, callbacks).await
    }

    pub async fn get_me(&self) -> Result<User, CourierError> {
        let value = self.call(methods::GET_ME, ()).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Typed batch. Entries that do not fit [`Update`] are logged and skipped.
    pub async fn get_updates(&self, query: UpdatesQuery) -> Result<Vec<Update>, CourierError> {
        let raw = self.get_updates_raw(query).await?;
        Ok(raw.into_iter().filter_map(decode_update).collect())
    }

    /// Batch as returned by the API, one JSON value per update.
    pub async fn get_updates_raw(&self, query: UpdatesQuery) -> Result<Vec<Value>, CourierError> {
        let value = self.call(methods::GET_UPDATES, query).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn set_webhook<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SET_WEBHOOK, params).await
    }

    pub async fn send_message<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SEND_MESSAGE, params).await
    }

    pub async fn forward_message<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::FORWARD_MESSAGE, params).await
    }

    /// `photo` may be a local path, base64 (with `base64: true`), a URL, or
    /// a list of candidate URLs.
    pub async fn send_photo<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SEND_PHOTO, params).await
    }

    pub async fn send_audio<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SEND_AUDIO, params).await
    }

    pub async fn send_document<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SEND_DOCUMENT, params).await
    }

    pub async fn send_sticker<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SEND_STICKER, params).await
    }

    pub async fn send_video<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SEND_VIDEO, params).await
    }

    pub async fn send_location<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SEND_LOCATION, params).await
    }

    /// `action`: typing, upload_photo, record_video, upload_video,
    /// record_audio, upload_audio, upload_document, or find_location.
    pub async fn send_chat_action<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::SEND_CHAT_ACTION, params).await
    }

    pub async fn get_file<P: Serialize>(&self, params: P) -> Result<Value, CourierError> {
        self.call(methods::GET_FILE, params).await
    }

    pub async fn get_user_profile_photos<P: Serialize>(
        &self,
        params: P,
    ) -> Result<Value, CourierError> {
        self.call(methods::GET_USER_PROFILE_PHOTOS, params).await
    }

    pub async fn answer_inline_query<P: Serialize>(
        &self,
        params: P,
    ) -> Result<Value, CourierError> {
        self.call(methods::ANSWER_INLINE_QUERY, params).await
    }
}

/// Decode one raw update, or log why it was skipped.
pub(crate) fn decode_update(value: Value) -> Option<Update> {
    let id = value.get("update_id").and_then(Value::as_i64);
    match serde_json::from_value(value) {
        Ok(update) => Some(update),
        Err(e) => {
            warn!("skipping malformed update {id:?}: {e}");
            None
        }
    }
}
