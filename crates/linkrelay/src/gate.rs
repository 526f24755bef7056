//! Access control in front of every handler.
//!
//! The bot serves exactly one owner. [`AccessGate::wrap`] composes the check
//! with any [`EventHandler`]: the inner handler only runs when the event's
//! origin passes, and a rejected event never reaches session state.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::gateway::{EventHandler, GatewayCommand, InboundEvent, Origin, Outbox, send_reply};

/// The configured owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub chat_id: i64,
    /// Only honoured by [`AccessPolicy::ChatAndThread`].
    pub thread_id: Option<i32>,
}

impl Principal {
    pub fn new(chat_id: i64, thread_id: Option<i32>) -> Self {
        Self { chat_id, thread_id }
    }
}

/// How an origin is matched against the principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Chat id or user id equals the principal id.
    ChatOrUser,
    /// Chat id equals the principal chat, and the thread matches when one is configured.
    ChatAndThread,
}

/// Why an event was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    UnknownPrincipal,
    UnauthorizedThread,
}

impl Denial {
    pub fn notice(self) -> &'static str {
        match self {
            Denial::UnknownPrincipal => "Sorry, I only respond to my owner.",
            Denial::UnauthorizedThread => "❌ This topic is not authorized.",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessGate {
    principal: Principal,
    policy: AccessPolicy,
}

impl AccessGate {
    pub fn new(principal: Principal, policy: AccessPolicy) -> Self {
        Self { principal, policy }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    pub fn check(&self, origin: &Origin) -> Result<(), Denial> {
        match self.policy {
            AccessPolicy::ChatOrUser => {
                let id = self.principal.chat_id;
                if origin.chat_id == id || origin.user_id == Some(id) {
                    Ok(())
                } else {
                    Err(Denial::UnknownPrincipal)
                }
            }
            AccessPolicy::ChatAndThread => {
                if origin.chat_id != self.principal.chat_id {
                    return Err(Denial::UnknownPrincipal);
                }
                match self.principal.thread_id {
                    Some(thread) if origin.thread_id != Some(thread) => {
                        Err(Denial::UnauthorizedThread)
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    /// Put this gate in front of `inner`.
    pub fn wrap<H: EventHandler>(self, inner: H) -> Guarded<H> {
        Guarded { gate: self, inner }
    }
}

/// An [`EventHandler`] that only runs for authorized origins.
pub struct Guarded<H> {
    gate: AccessGate,
    inner: H,
}

impl<H> Guarded<H> {
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for Guarded<H> {
    async fn handle(&self, event: &InboundEvent, outbox: &dyn Outbox) {
        let origin = &event.origin;
        if let Err(denial) = self.gate.check(origin) {
            warn!(
                chat_id = origin.chat_id,
                user_id = ?origin.user_id,
                thread_id = ?origin.thread_id,
                ?denial,
                "Unauthorized access attempt"
            );
            send_reply(outbox, GatewayCommand::reply(origin, denial.notice())).await;
            return;
        }

        info!(
            chat_id = origin.chat_id,
            thread_id = ?origin.thread_id,
            "Received event"
        );
        self.inner.handle(event, outbox).await;
    }
}
