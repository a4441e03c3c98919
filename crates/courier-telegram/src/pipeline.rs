//! Outbound request pipeline.
//!
//! One logical API call: resolve the method's file field, download remote
//! candidates when needed, and hand the result to the transport. When the
//! file field lists several candidate URLs, a failed download *and* a
//! rejected upload both advance to the next candidate; the first success
//! wins. Once candidates run out the call fails with the last error and no
//! upload without a file is attempted.

use crate::fetcher::Fetcher;
use crate::methods;
use crate::params::Params;
use crate::resolver::{self, FileSource};
use crate::transport::{ApiRequest, FileUpload, Transport};
use courier_core::error::CourierError;
use courier_core::events::{Event, EventHub, RequestEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

type SuccessFn = Box<dyn FnOnce(&Value) + Send>;
type ErrorFn = Box<dyn FnOnce(&CourierError) + Send>;

/// Optional continuations run once with the terminal outcome of a call.
#[derive(Default)]
pub struct Callbacks {
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Value) + Send + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&CourierError) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn settle(self, outcome: &Result<Value, CourierError>) {
        match outcome {
            Ok(value) => {
                if let Some(f) = self.on_success {
                    f(value);
                }
            }
            Err(err) => {
                if let Some(f) = self.on_error {
                    f(err);
                }
            }
        }
    }
}

pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    fetcher: Arc<dyn Fetcher>,
    events: Arc<EventHub>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn Fetcher>,
        events: Arc<EventHub>,
    ) -> Self {
        Self {
            transport,
            fetcher,
            events,
        }
    }

    pub async fn execute(&self, method: &str, params: Params) -> Result<Value, CourierError> {
        self.execute_with(method, params, Callbacks::default()).await
    }

    pub async fn execute_with(
        &self,
        method: &str,
        params: Params,
        callbacks: Callbacks,
    ) -> Result<Value, CourierError> {
        let outcome = self.run(method, params).await;
        if let Err(ref e) = outcome {
            debug!("[{method}] failed: {e}");
        }
        callbacks.settle(&outcome);
        outcome
    }

    async fn run(&self, method: &str, params: Params) -> Result<Value, CourierError> {
        let Some(field) = methods::file_field(method) else {
            return self.send(method, params, None).await;
        };

        match resolver::resolve(field, &params).await? {
            None => self.send(method, params, None).await,
            Some(FileSource::Local { path, bytes }) => {
                let upload = FileUpload {
                    field: field.to_string(),
                    file_name: resolver::upload_name(&path.to_string_lossy(), field),
                    bytes,
                };
                self.send(method, params, Some(upload)).await
            }
            Some(FileSource::Base64(bytes)) => {
                let upload = FileUpload {
                    field: field.to_string(),
                    file_name: format!("{field}.bin"),
                    bytes,
                };
                self.send(method, params, Some(upload)).await
            }
            Some(FileSource::Urls(candidates)) => {
                self.send_from_candidates(method, field, params, &candidates)
                    .await
            }
        }
    }

    async fn send_from_candidates(
        &self,
        method: &str,
        field: &str,
        params: Params,
        candidates: &[String],
    ) -> Result<Value, CourierError> {
        let mut last_error = None;

        for (index, url) in candidates.iter().enumerate() {
            let remaining = candidates.len() - index - 1;

            let bytes = match self.fetcher.fetch(url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("[{method}] download failed ({remaining} candidates left): {e}");
                    last_error = Some(e);
                    continue;
                }
            };

            let upload = FileUpload {
                field: field.to_string(),
                file_name: resolver::upload_name(url, field),
                bytes,
            };

            match self.send(method, params.clone(), Some(upload)).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("[{method}] upload of {url} rejected ({remaining} candidates left): {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CourierError::Parse(format!("[{method}] `{field}` has no candidate URLs"))
        }))
    }

    async fn send(
        &self,
        method: &str,
        params: Params,
        file: Option<FileUpload>,
    ) -> Result<Value, CourierError> {
        self.events.emit(&Event::Request(RequestEvent {
            method: method.to_string(),
            params: params.clone(),
        }));
        self.transport
            .call(method, ApiRequest { params, file })
            .await
    }
}
