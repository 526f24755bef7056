//! Glue between a chat gateway and the relay core.
//!
//! Built-in gateways talk to the core over two tokio channels carrying the
//! protocol types: [`GatewayEvent`]s in, [`GatewayCommand`]s out.
//! [`route_events`] drains the event channel and runs every event through an
//! [`EventHandler`] on its own task, so a slow bookmark call for one
//! conversation never holds up the rest of the stream.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use linkrelay_gateway_protocol::{
    BotCommand, Button, GatewayCommand, GatewayEvent, InboundEvent, Keyboard, Origin, Payload,
};

/// Capacity of the gateway channels.
pub const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("gateway command channel closed")]
    ChannelClosed,
}

/// Where replies go.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn deliver(&self, command: GatewayCommand) -> Result<(), SendError>;
}

/// Deliver `command`, logging instead of failing. A lost reply must not
/// abort the turn that produced it.
pub async fn send_reply(outbox: &dyn Outbox, command: GatewayCommand) {
    if let Err(e) = outbox.deliver(command).await {
        warn!(error = %e, "Failed to queue reply");
    }
}

/// Something that consumes inbound events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &InboundEvent, outbox: &dyn Outbox);
}

/// Outbox backed by a built-in gateway's command channel.
#[derive(Clone)]
pub struct GatewaySender {
    tx: mpsc::Sender<GatewayCommand>,
}

impl GatewaySender {
    pub fn new(tx: mpsc::Sender<GatewayCommand>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Outbox for GatewaySender {
    async fn deliver(&self, command: GatewayCommand) -> Result<(), SendError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }
}

/// Dispatch events until the gateway shuts down or the channel closes.
///
/// Each event runs on its own task. Tasks for the same origin are chained:
/// a task starts handling only after the previous one for that origin has
/// finished, so one originator's events are handled in arrival order while
/// other originators proceed in parallel.
pub async fn route_events(
    mut events: mpsc::Receiver<GatewayEvent>,
    handler: Arc<dyn EventHandler>,
    outbox: GatewaySender,
) {
    let mut tails: HashMap<Origin, JoinHandle<()>> = HashMap::new();

    while let Some(event) = events.recv().await {
        match event {
            GatewayEvent::MessageReceived(inbound) => {
                debug!(
                    chat_id = inbound.origin.chat_id,
                    is_command = inbound.is_command(),
                    "Dispatching inbound event"
                );
                tails.retain(|_, tail| !tail.is_finished());

                let origin = inbound.origin;
                let previous = tails.remove(&origin);
                let handler = handler.clone();
                let outbox = outbox.clone();
                let tail = tokio::spawn(async move {
                    if let Some(previous) = previous {
                        // A panicked predecessor must not stall the origin.
                        let _ = previous.await;
                    }
                    handler.handle(&inbound, &outbox).await;
                });
                tails.insert(origin, tail);
            }
            GatewayEvent::Shutdown { reason } => {
                info!(reason = reason.as_deref().unwrap_or("none"), "Gateway shut down");
                break;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl EventHandler for Echo {
        async fn handle(&self, event: &InboundEvent, outbox: &dyn Outbox) {
            let text = event.payload.text().unwrap_or("?").to_string();
            send_reply(outbox, GatewayCommand::reply(&event.origin, text)).await;
        }
    }

    #[tokio::test]
    async fn routes_events_until_shutdown() {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (cmd_tx, mut cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let router = tokio::spawn(route_events(
            event_rx,
            Arc::new(Echo),
            GatewaySender::new(cmd_tx),
        ));

        let origin = Origin::new(1, Some(1), None);
        event_tx
            .send(GatewayEvent::MessageReceived(InboundEvent::from_text(
                origin, "ping",
            )))
            .await
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(1), cmd_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.text(), "ping");

        event_tx
            .send(GatewayEvent::Shutdown { reason: None })
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), router)
            .await
            .unwrap()
            .unwrap();
    }

    /// Records the order events are handled in; "slow" text takes a while.
    #[derive(Default)]
    struct Ordered {
        seen: tokio::sync::Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl EventHandler for Ordered {
        async fn handle(&self, event: &InboundEvent, _outbox: &dyn Outbox) {
            let text = event.payload.text().unwrap_or("?").to_string();
            if text == "slow" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.seen.lock().await.push((event.origin.chat_id, text));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_origin_is_handled_in_arrival_order() {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (cmd_tx, _cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handler = Arc::new(Ordered::default());

        let router = tokio::spawn(route_events(
            event_rx,
            handler.clone(),
            GatewaySender::new(cmd_tx),
        ));

        let first = Origin::new(1, Some(1), None);
        let second = Origin::new(2, Some(2), None);
        for (origin, text) in [(first, "slow"), (first, "fast"), (second, "other")] {
            event_tx
                .send(GatewayEvent::MessageReceived(InboundEvent::from_text(
                    origin, text,
                )))
                .await
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while handler.seen.lock().await.len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let seen = handler.seen.lock().await.clone();
        assert_eq!(
            seen,
            vec![
                (2, "other".to_string()),
                (1, "slow".to_string()),
                (1, "fast".to_string()),
            ]
        );

        event_tx
            .send(GatewayEvent::Shutdown { reason: None })
            .await
            .unwrap();
        router.await.unwrap();
    }

    #[tokio::test]
    async fn closed_channel_is_reported() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        drop(cmd_rx);
        let sender = GatewaySender::new(cmd_tx);
        let err = sender
            .deliver(GatewayCommand::reply(&Origin::new(1, None, None), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::ChannelClosed));
    }
}
