//! In-memory capture sessions, one per originator.

use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;

use crate::bookmark::{BookmarkError, BookmarkRequest, Destination};
use crate::gateway::Origin;
use crate::sync::KeyedLocks;

/// Sessions are scoped to the full (chat, user, thread) origin.
pub type SessionKey = Origin;

/// Where a conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// No session: the next plain text is a URL capture.
    AwaitingUrl,
    AwaitingService,
    AwaitingTags,
}

/// A bookmark capture in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub url: Option<String>,
    pub destination: Option<Destination>,
    pub tags: Vec<String>,
}

impl Session {
    /// Start a capture. `destination` is preset when there is nothing to choose.
    pub fn capture(url: impl Into<String>, destination: Option<Destination>) -> Self {
        Self {
            url: Some(url.into()),
            destination,
            tags: Vec::new(),
        }
    }

    pub fn state(&self) -> ConversationState {
        match self.destination {
            None => ConversationState::AwaitingService,
            Some(_) => ConversationState::AwaitingTags,
        }
    }

    pub fn into_request(self) -> Result<BookmarkRequest, BookmarkError> {
        let url = self.url.ok_or(BookmarkError::IncompleteCapture("url"))?;
        let destination = self
            .destination
            .ok_or(BookmarkError::IncompleteCapture("destination"))?;
        Ok(BookmarkRequest {
            url,
            tags: self.tags,
            destination,
        })
    }
}

/// Sessions keyed by originator, with a per-originator turn lock.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionKey, Session>,
    locks: KeyedLocks<SessionKey>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize turns for `key`. Hold the guard for the whole turn.
    pub async fn lock(&self, key: &SessionKey) -> OwnedMutexGuard<()> {
        self.locks.lock(key).await
    }

    /// Forget the turn lock for `key` once nobody is using it.
    pub fn release_lock(&self, key: &SessionKey) {
        self.locks.release_idle(key);
    }

    pub fn state(&self, key: &SessionKey) -> ConversationState {
        self.sessions
            .get(key)
            .map(|s| s.state())
            .unwrap_or(ConversationState::AwaitingUrl)
    }

    pub fn get(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.get(key).map(|s| s.clone())
    }

    pub fn put(&self, key: SessionKey, session: Session) {
        self.sessions.insert(key, session);
    }

    /// Remove and return the session for `key`.
    pub fn take(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.remove(key).map(|(_, s)| s)
    }

    /// Turn locks still tracked, held or idle.
    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
