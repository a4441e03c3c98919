//! Observer registry for consumer-facing events.
//!
//! Handlers subscribe to one [`EventKind`] and are invoked synchronously, in
//! subscription order, every time an event of that kind is emitted. A handler
//! that panics is logged and skipped; the remaining handlers still run.

use crate::types::{InlineQuery, Message};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    InlineQuery,
    Request,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::InlineQuery => "inline_query",
            Self::Request => "request",
        }
    }
}

/// Fired before every outbound API call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEvent {
    pub method: String,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message(Message),
    InlineQuery(InlineQuery),
    Request(RequestEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::InlineQuery(_) => EventKind::InlineQuery,
            Self::Request(_) => EventKind::Request,
        }
    }
}

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque handle returned by [`EventHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Subscribe to `message` events with a typed callback.
    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Message, move |event| {
            if let Event::Message(msg) = event {
                handler(msg);
            }
        })
    }

    /// Subscribe to `inline_query` events with a typed callback.
    pub fn on_inline_query<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&InlineQuery) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::InlineQuery, move |event| {
            if let Event::InlineQuery(query) = event {
                handler(query);
            }
        })
    }

    /// Subscribe to `request` events with a typed callback.
    pub fn on_request<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Request, move |event| {
            if let Event::Request(req) = event {
                handler(req);
            }
        })
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every handler for the event's kind. Returns how many completed
    /// without panicking.
    pub fn emit(&self, event: &Event) -> usize {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let snapshot: Vec<Handler> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            match handlers.get(&event.kind()) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return 0,
            }
        };

        let mut completed = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(_) => error!("{} handler panicked; continuing", event.kind().as_str()),
            }
        }
        completed
    }
}
