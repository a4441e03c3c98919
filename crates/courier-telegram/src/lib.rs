//! # courier-telegram
//!
//! Telegram Bot API client: the outbound request pipeline (file resolution,
//! remote fetch, multi-candidate failover) and the two update sources
//! (long polling and webhook) that feed a shared dispatcher.
//! Docs: <https://core.telegram.org/bots/api>

pub mod api;
pub mod bot;
pub mod dispatcher;
pub mod fetcher;
pub mod methods;
pub mod params;
pub mod pipeline;
pub mod poller;
pub mod resolver;
pub mod transport;
pub mod webhook;

#[cfg(test)]
pub(crate) mod mock;

pub use api::{Api, UpdatesQuery};
pub use bot::Bot;
pub use params::Params;
pub use pipeline::Callbacks;
