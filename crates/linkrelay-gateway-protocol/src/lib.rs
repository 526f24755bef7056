//! Gateway protocol types for linkrelay.
//!
//! A gateway bridges a chat platform and the relay core:
//!
//! - [`GatewayEvent`]: messages from the gateway to the core (a user wrote something)
//! - [`GatewayCommand`]: messages from the core to the gateway (send or edit a message)
//!
//! Built-in gateways exchange these over tokio channels. Everything is
//! serializable so an external gateway could speak the same protocol as JSON.

use serde::{Deserialize, Serialize};

// ============================================================================
// Events (gateway -> core)
// ============================================================================

/// Event emitted by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// An inbound message or button press.
    MessageReceived(InboundEvent),
    /// The gateway stopped and will not emit further events.
    Shutdown { reason: Option<String> },
}

/// A single inbound interaction, reduced to what the relay needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub origin: Origin,
    pub payload: Payload,
}

impl InboundEvent {
    pub fn new(origin: Origin, payload: Payload) -> Self {
        Self { origin, payload }
    }

    /// Build an event from raw message text, detecting commands.
    pub fn from_text(origin: Origin, text: &str) -> Self {
        Self::new(origin, Payload::from_text(text))
    }

    /// Whether the payload is a slash command.
    pub fn is_command(&self) -> bool {
        matches!(self.payload, Payload::Command { .. })
    }
}

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub chat_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Forum topic / sub-thread, if the platform has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i32>,
}

impl Origin {
    pub fn new(chat_id: i64, user_id: Option<i64>, thread_id: Option<i32>) -> Self {
        Self {
            chat_id,
            user_id,
            thread_id,
        }
    }
}

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Text { text: String },
    Command { command: BotCommand },
    /// Inline keyboard selection. `message_id` is the message carrying the keyboard.
    Callback {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<i32>,
    },
}

impl Payload {
    pub fn from_text(text: &str) -> Self {
        match BotCommand::parse(text) {
            Some(command) => Payload::Command { command },
            None => Payload::Text {
                text: text.to_string(),
            },
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Slash commands understood by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotCommand {
    Start,
    Skip,
    Cancel,
    Other(String),
}

impl BotCommand {
    /// Parse `/name`, `/NAME` or `/name@bot_username args`. Returns `None`
    /// for text that does not start with a slash.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim_start().strip_prefix('/')?;
        let word = rest.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or("").to_lowercase();

        Some(match name.as_str() {
            "start" => BotCommand::Start,
            "skip" => BotCommand::Skip,
            "cancel" => BotCommand::Cancel,
            _ => BotCommand::Other(name),
        })
    }
}

// ============================================================================
// Commands (core -> gateway)
// ============================================================================

/// Command sent from the core to a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    SendMessage {
        chat_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<i32>,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyboard: Option<Keyboard>,
    },
    /// Replace the text of an earlier message, dropping its keyboard.
    EditMessage {
        chat_id: i64,
        message_id: i32,
        text: String,
    },
}

impl GatewayCommand {
    /// Plain reply to the chat (and thread) an event came from.
    pub fn reply(origin: &Origin, text: impl Into<String>) -> Self {
        GatewayCommand::SendMessage {
            chat_id: origin.chat_id,
            thread_id: origin.thread_id,
            text: text.into(),
            keyboard: None,
        }
    }

    /// Reply carrying an inline keyboard.
    pub fn reply_with_keyboard(origin: &Origin, text: impl Into<String>, keyboard: Keyboard) -> Self {
        GatewayCommand::SendMessage {
            chat_id: origin.chat_id,
            thread_id: origin.thread_id,
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// The text this command will put on screen.
    pub fn text(&self) -> &str {
        match self {
            GatewayCommand::SendMessage { text, .. } | GatewayCommand::EditMessage { text, .. } => {
                text
            }
        }
    }
}

/// Inline keyboard: rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// One button per row.
    pub fn column(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    /// Opaque payload returned in [`Payload::Callback`].
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}
