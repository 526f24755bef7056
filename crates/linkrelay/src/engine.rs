//! The conversation state machine.
//!
//! ```text
//!                 text with URL                 picker choice
//!  AWAITING_URL ─────────────────▶ AWAITING_SERVICE ───────────▶ AWAITING_TAGS
//!       ▲  │        (dual only; single goes straight to tags)         │
//!       │  └─ no URL: parse error, stay                               │ tags or /skip
//!       │                                                             ▼
//!       └──────────────── session cleared ◀─────────────────── submit, reply
//! ```
//!
//! `/cancel` clears the session from any state. Events are routed strictly by
//! the current state: a URL sent while tags are expected is read as tags.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::bookmark::{BookmarkError, Destination, SubmitOutcome, Submitter};
use crate::gate::AccessPolicy;
use crate::gateway::{
    BotCommand, Button, EventHandler, GatewayCommand, InboundEvent, Keyboard, Origin, Outbox,
    Payload, send_reply,
};
pub use crate::session::ConversationState;
use crate::session::{Session, SessionStore};

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"));

const TAGS_PROMPT: &str = "📩 Send tags (comma-separated) or /skip to save without tags.";
const PARSE_ERROR: &str = "❌ Error parsing the message. Please send a valid URL.";
const CANCELLED: &str = "Operation cancelled.";
const PICK_SERVICE: &str = "Please choose a service using the buttons below.";

/// Which states the conversation passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// URL, then tags. Everything goes to Linkding.
    Single,
    /// URL, then a destination picker, then tags.
    Dual,
}

impl Topology {
    pub fn access_policy(self) -> AccessPolicy {
        match self {
            Topology::Single => AccessPolicy::ChatOrUser,
            Topology::Dual => AccessPolicy::ChatAndThread,
        }
    }

    fn greeting(self) -> &'static str {
        match self {
            Topology::Single => "Welcome! Send me a URL to save it to Linkding.",
            Topology::Dual => "Welcome! Send me a URL to save it.",
        }
    }

    /// Destination fixed at capture time, if there is nothing to pick.
    fn preset_destination(self) -> Option<Destination> {
        match self {
            Topology::Single => Some(Destination::Linkding),
            Topology::Dual => None,
        }
    }
}

/// First `http(s)://` run of non-whitespace in `text`.
pub fn extract_url(text: &str) -> Option<&str> {
    URL_PATTERN.find(text).map(|m| m.as_str())
}

/// Split on commas and trim each piece. Order, duplicates and empty pieces are kept.
pub fn parse_tags(text: &str) -> Vec<String> {
    text.split(',').map(|t| t.trim().to_string()).collect()
}

fn service_picker() -> Keyboard {
    Keyboard::column(
        Destination::ALL
            .into_iter()
            .map(|d| Button::new(d.button_label(), d.callback_data())),
    )
}

/// Drives one conversation per originator.
pub struct ConversationEngine {
    topology: Topology,
    sessions: SessionStore,
    submitter: Submitter,
}

impl ConversationEngine {
    pub fn new(topology: Topology, submitter: Submitter) -> Self {
        Self {
            topology,
            sessions: SessionStore::new(),
            submitter,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn state(&self, origin: &Origin) -> ConversationState {
        self.sessions.state(origin)
    }

    async fn step(&self, event: &InboundEvent, outbox: &dyn Outbox) {
        let origin = &event.origin;
        let state = self.sessions.state(origin);

        match (&event.payload, state) {
            (Payload::Command { command }, _) => match command {
                BotCommand::Start => {
                    send_reply(outbox, GatewayCommand::reply(origin, self.topology.greeting()))
                        .await;
                }
                BotCommand::Cancel => self.cancel(origin, outbox).await,
                BotCommand::Skip if state == ConversationState::AwaitingTags => {
                    self.submit(origin, None, outbox).await
                }
                BotCommand::Skip | BotCommand::Other(_) => {
                    debug!(?command, ?state, "Ignoring command");
                }
            },
            (Payload::Text { text }, ConversationState::AwaitingUrl) => {
                self.capture_url(origin, text, outbox).await
            }
            (Payload::Text { .. }, ConversationState::AwaitingService) => {
                send_reply(
                    outbox,
                    GatewayCommand::reply_with_keyboard(origin, PICK_SERVICE, service_picker()),
                )
                .await;
            }
            (Payload::Text { text }, ConversationState::AwaitingTags) => {
                self.submit(origin, Some(text), outbox).await
            }
            (Payload::Callback { data, message_id }, ConversationState::AwaitingService) => {
                self.choose_destination(origin, data, *message_id, outbox)
                    .await
            }
            (Payload::Callback { data, .. }, _) => {
                debug!(data = %data, ?state, "Ignoring stale callback");
            }
        }
    }

    async fn capture_url(&self, origin: &Origin, text: &str, outbox: &dyn Outbox) {
        let Some(url) = extract_url(text) else {
            send_reply(outbox, GatewayCommand::reply(origin, PARSE_ERROR)).await;
            return;
        };

        let session = Session::capture(url, self.topology.preset_destination());
        let reply = match session.state() {
            ConversationState::AwaitingService => GatewayCommand::reply_with_keyboard(
                origin,
                format!("✅ URL received: {url}\nSelect a service to use:"),
                service_picker(),
            ),
            _ => GatewayCommand::reply(origin, format!("✅ URL received: {url}.\n{TAGS_PROMPT}")),
        };
        debug!(url, "Captured URL");
        self.sessions.put(*origin, session);

        send_reply(outbox, reply).await;
    }

    async fn choose_destination(
        &self,
        origin: &Origin,
        data: &str,
        message_id: Option<i32>,
        outbox: &dyn Outbox,
    ) {
        let Some(destination) = Destination::from_callback_data(data) else {
            debug!(data, "Ignoring unknown destination");
            return;
        };
        let Some(mut session) = self.sessions.get(origin) else {
            return;
        };

        session.destination = Some(destination);
        self.sessions.put(*origin, session);
        debug!(%destination, "Destination chosen");

        let prompt = match message_id {
            Some(message_id) => GatewayCommand::EditMessage {
                chat_id: origin.chat_id,
                message_id,
                text: TAGS_PROMPT.to_string(),
            },
            None => GatewayCommand::reply(origin, TAGS_PROMPT),
        };
        send_reply(outbox, prompt).await;
    }

    /// `tags_text` is `None` for `/skip`.
    async fn submit(&self, origin: &Origin, tags_text: Option<&str>, outbox: &dyn Outbox) {
        // Taking the session out first makes clearing unconditional.
        let outcome = match self.sessions.take(origin) {
            Some(mut session) => {
                session.tags = tags_text.map(parse_tags).unwrap_or_default();
                match session.into_request() {
                    Ok(request) => self.submitter.submit(&request).await,
                    Err(e) => SubmitOutcome::unexpected(&e),
                }
            }
            None => SubmitOutcome::unexpected(&BookmarkError::IncompleteCapture("session")),
        };

        send_reply(outbox, GatewayCommand::reply(origin, outcome.message())).await;
    }

    async fn cancel(&self, origin: &Origin, outbox: &dyn Outbox) {
        if self.sessions.take(origin).is_some() {
            debug!("Conversation cancelled");
        }
        send_reply(outbox, GatewayCommand::reply(origin, CANCELLED)).await;
    }
}

#[async_trait]
impl EventHandler for ConversationEngine {
    async fn handle(&self, event: &InboundEvent, outbox: &dyn Outbox) {
        let key = event.origin;
        let turn = self.sessions.lock(&key).await;
        self.step(event, outbox).await;
        drop(turn);

        if self.sessions.state(&key) == ConversationState::AwaitingUrl {
            self.sessions.release_lock(&key);
        }
    }
}
