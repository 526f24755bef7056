//! Telegram gateway for linkrelay.
//!
//! Long-polls the Bot API with teloxide, turns messages and inline keyboard
//! presses into [`GatewayEvent`]s, and executes [`GatewayCommand`]s sent back
//! by the core.

use std::sync::Arc;
use std::time::Duration;

use linkrelay_gateway_protocol::{
    GatewayCommand, GatewayEvent, InboundEvent, Keyboard, Origin, Payload,
};
use serde::Deserialize;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ThreadId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long shutdown waits for queued replies.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(35);

/// Telegram gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

/// Built-in Telegram gateway.
pub struct TelegramGateway {
    bot: Bot,
}

struct Forwarder {
    events: mpsc::Sender<GatewayEvent>,
}

impl Forwarder {
    async fn forward(&self, event: InboundEvent) {
        if self
            .events
            .send(GatewayEvent::MessageReceived(event))
            .await
            .is_err()
        {
            warn!("Event receiver dropped, discarding Telegram update");
        }
    }
}

impl TelegramGateway {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            bot: Bot::new(config.bot_token),
        }
    }

    /// Run until Ctrl-C. Inbound updates go to `events`; `commands` are
    /// executed against the Bot API as they arrive.
    pub async fn run(
        self,
        events: mpsc::Sender<GatewayEvent>,
        commands: mpsc::Receiver<GatewayCommand>,
    ) {
        let executor = tokio::spawn(execute_commands(self.bot.clone(), commands));

        let forwarder = Arc::new(Forwarder {
            events: events.clone(),
        });

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_callback_query().endpoint(on_callback));

        info!("Telegram gateway polling for updates");

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![forwarder])
            .default_handler(|upd| async move {
                debug!(update_id = upd.id.0, "Unhandled Telegram update");
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram gateway stopped");
        let _ = events
            .send(GatewayEvent::Shutdown {
                reason: Some("dispatcher stopped".to_string()),
            })
            .await;
        drop(events);

        // The core drops its command senders once in-flight turns finish,
        // which ends the executor after the last queued reply is sent.
        drain(executor, SHUTDOWN_GRACE).await;
    }
}

/// Wait for `executor` to finish, aborting it after `grace`.
async fn drain(mut executor: JoinHandle<()>, grace: Duration) {
    match tokio::time::timeout(grace, &mut executor).await {
        Ok(_) => debug!("Pending replies delivered"),
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "Replies still pending at shutdown, dropping them");
            executor.abort();
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

async fn on_message(msg: Message, forwarder: Arc<Forwarder>) -> ResponseResult<()> {
    match message_event(&msg) {
        Some(event) => forwarder.forward(event).await,
        None => debug!(chat_id = msg.chat.id.0, "Ignoring non-text message"),
    }
    Ok(())
}

async fn on_callback(
    bot: Bot,
    query: CallbackQuery,
    forwarder: Arc<Forwarder>,
) -> ResponseResult<()> {
    // Stop the client-side spinner regardless of what the core does with it.
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    match callback_event(&query) {
        Some(event) => forwarder.forward(event).await,
        None => debug!(user_id = query.from.id.0, "Ignoring callback without data"),
    }
    Ok(())
}

fn message_event(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    let origin = Origin::new(
        msg.chat.id.0,
        msg.from.as_ref().map(|u| u.id.0 as i64),
        msg.thread_id.map(|t| t.0.0),
    );
    Some(InboundEvent::from_text(origin, text))
}

fn callback_event(query: &CallbackQuery) -> Option<InboundEvent> {
    let data = query.data.clone()?;
    let message = query.message.as_ref();

    let chat_id = match message {
        Some(m) => m.chat().id.0,
        // Inline-mode callbacks carry no chat; fall back to the private chat.
        None => query.from.id.0 as i64,
    };
    let thread_id = message
        .and_then(|m| m.regular_message())
        .and_then(|m| m.thread_id)
        .map(|t| t.0.0);

    let origin = Origin::new(chat_id, Some(query.from.id.0 as i64), thread_id);
    Some(InboundEvent::new(
        origin,
        Payload::Callback {
            data,
            message_id: message.map(|m| m.id().0),
        },
    ))
}

// ============================================================================
// Outbound
// ============================================================================

async fn execute_commands(bot: Bot, mut commands: mpsc::Receiver<GatewayCommand>) {
    while let Some(command) = commands.recv().await {
        if let Err(e) = execute(&bot, command).await {
            warn!(error = %e, "Failed to deliver Telegram message");
        }
    }
    debug!("Command channel closed");
}

async fn execute(bot: &Bot, command: GatewayCommand) -> ResponseResult<()> {
    match command {
        GatewayCommand::SendMessage {
            chat_id,
            thread_id,
            text,
            keyboard,
        } => {
            let mut request = bot.send_message(ChatId(chat_id), text);
            if let Some(thread_id) = thread_id {
                request = request.message_thread_id(ThreadId(MessageId(thread_id)));
            }
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(to_markup(&keyboard));
            }
            request.await?;
        }
        GatewayCommand::EditMessage {
            chat_id,
            message_id,
            text,
        } => {
            bot.edit_message_text(ChatId(chat_id), MessageId(message_id), text)
                .await?;
        }
    }
    Ok(())
}

fn to_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkrelay_gateway_protocol::{BotCommand, Button};
    use teloxide::types::InlineKeyboardButtonKind;

    fn parse_message(value: serde_json::Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn private_text_message_becomes_text_event() {
        let msg = parse_message(serde_json::json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": { "id": 42, "type": "private", "first_name": "Ada" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ada" },
            "text": "read https://example.com later"
        }));

        let event = message_event(&msg).unwrap();
        assert_eq!(event.origin, Origin::new(42, Some(42), None));
        assert_eq!(
            event.payload.text(),
            Some("read https://example.com later")
        );
    }

    #[test]
    fn command_message_becomes_command_event() {
        let msg = parse_message(serde_json::json!({
            "message_id": 11,
            "date": 1_700_000_000,
            "chat": { "id": 42, "type": "private", "first_name": "Ada" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ada" },
            "text": "/skip"
        }));

        let event = message_event(&msg).unwrap();
        assert_eq!(
            event.payload,
            Payload::Command {
                command: BotCommand::Skip
            }
        );
    }

    #[tokio::test]
    async fn drain_waits_for_pending_work() {
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = done.clone();
        let executor = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        drain(executor, Duration::from_secs(2)).await;
        assert!(done.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drain_gives_up_after_grace() {
        let executor = tokio::spawn(std::future::pending::<()>());
        tokio::time::timeout(
            Duration::from_secs(2),
            drain(executor, Duration::from_millis(50)),
        )
        .await
        .unwrap();
    }

    #[test]
    fn keyboard_maps_to_callback_buttons() {
        let keyboard = Keyboard::column([
            Button::new("📌 Linkding", "linkding"),
            Button::new("📖 Readeck", "readeck"),
        ]);

        let markup = to_markup(&keyboard);
        assert_eq!(markup.inline_keyboard.len(), 2);

        let button = &markup.inline_keyboard[1][0];
        assert_eq!(button.text, "📖 Readeck");
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "readeck"),
            other => panic!("unexpected button kind: {other:?}"),
        }
    }
}
