//! In-memory transport and fetcher for tests.

use crate::fetcher::Fetcher;
use crate::transport::{ApiRequest, Transport};
use async_trait::async_trait;
use courier_core::error::CourierError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&str, &ApiRequest, usize) -> Result<Value, CourierError> + Send + Sync>;

/// Records every call and answers through a closure that also receives the
/// zero-based index of the call for that method.
pub(crate) struct MockTransport {
    responder: Responder,
    calls: Mutex<Vec<(String, ApiRequest)>>,
}

impl MockTransport {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &ApiRequest, usize) -> Result<Value, CourierError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, ApiRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, method: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, r)| r)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, method: &str, request: ApiRequest) -> Result<Value, CourierError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.iter().filter(|(m, _)| m == method).count();
            calls.push((method.to_string(), request.clone()));
            index
        };
        (self.responder)(method, &request, index)
    }
}

/// Serves canned bytes per URL; unknown URLs fail like a network error.
#[derive(Default)]
pub(crate) struct MockFetcher {
    files: HashMap<String, Vec<u8>>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub(crate) fn with(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CourierError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| CourierError::Download {
                url: url.to_string(),
                reason: "connection refused".into(),
            })
    }
}

/// `{"ok": false}` style rejection.
pub(crate) fn rejected(code: i64, description: &str) -> CourierError {
    CourierError::Api {
        error_code: Some(code),
        description: description.to_string(),
    }
}
