//! Turns inbound updates into consumer events.

use courier_core::events::{Event, EventHub};
use courier_core::types::{BotIdentity, Message, Update};
use regex::{Regex, RegexBuilder};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

pub struct Dispatcher {
    events: Arc<EventHub>,
    identity: Arc<OnceLock<BotIdentity>>,
    /// Built from the identity the first time it is needed.
    mention: OnceLock<Option<Regex>>,
}

impl Dispatcher {
    pub fn new(events: Arc<EventHub>, identity: Arc<OnceLock<BotIdentity>>) -> Self {
        Self {
            events,
            identity,
            mention: OnceLock::new(),
        }
    }

    /// Emit `message` and/or `inline_query` for one update. Updates carrying
    /// neither are dropped.
    pub fn dispatch(&self, update: Update) {
        let Update {
            update_id,
            message,
            inline_query,
            ..
        } = update;

        if message.is_none() && inline_query.is_none() {
            debug!("dropping update {update_id:?} with no message or inline query");
            return;
        }

        if let Some(mut message) = message {
            self.strip_mentions(&mut message);
            self.events.emit(&Event::Message(message));
        }

        if let Some(query) = inline_query {
            debug!("inline query {} from {}", query.id, query.from.id);
            self.events.emit(&Event::InlineQuery(query));
        }
    }

    fn strip_mentions(&self, message: &mut Message) {
        let Some(re) = self.mention_regex() else {
            return;
        };
        if let Some(ref text) = message.text {
            message.text = Some(re.replace_all(text, "").trim().to_string());
        }
    }

    fn mention_regex(&self) -> Option<&Regex> {
        if let Some(built) = self.mention.get() {
            return built.as_ref();
        }
        let identity = self.identity.get()?;
        self.mention
            .get_or_init(|| {
                let pattern = format!(r"\s*@{}", regex::escape(&identity.username));
                match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("cannot build mention pattern for @{}: {e}", identity.username);
                        None
                    }
                }
            })
            .as_ref()
    }
}
