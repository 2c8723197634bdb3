//! Conversation state for the admin chat: the broadcast draft state machine
//! and the cached statistics pages, keyed by chat.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use teloxide::types::{ChatId, FileId, MessageId};

/// Broadcast conversation states. The draft travels inside the state value,
/// so clearing the state destroys the draft with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum BroadcastState {
    #[default]
    Idle,
    /// Waiting for the admin to send the broadcast body
    CollectingText { control: MessageId },
    /// Body collected, waiting for an optional picture
    CollectingMedia { control: MessageId, body: String },
    /// Full draft assembled, waiting for confirm/cancel
    Confirming {
        control: MessageId,
        body: String,
        media: Option<FileId>,
    },
}

#[derive(Clone, Debug, Default)]
struct Session {
    broadcast: BroadcastState,
    stat_pages: Option<Arc<Vec<String>>>,
}

/// Per-chat conversation state. Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<ChatId, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current broadcast state for a chat (`Idle` when none exists).
    pub fn broadcast_state(&self, chat: ChatId) -> BroadcastState {
        let sessions = self.inner.lock().unwrap();
        sessions
            .get(&chat)
            .map(|s| s.broadcast.clone())
            .unwrap_or_default()
    }

    /// Transition a chat's broadcast state.
    pub fn set_broadcast_state(&self, chat: ChatId, state: BroadcastState) {
        let mut sessions = self.inner.lock().unwrap();
        sessions.entry(chat).or_default().broadcast = state;
    }

    /// Abandon any in-progress draft. The stats cache survives.
    pub fn clear_broadcast(&self, chat: ChatId) {
        let mut sessions = self.inner.lock().unwrap();
        if let Some(session) = sessions.get_mut(&chat) {
            session.broadcast = BroadcastState::Idle;
        }
    }

    /// Replace the cached statistics pages for a chat.
    pub fn cache_stat_pages(&self, chat: ChatId, pages: Arc<Vec<String>>) {
        let mut sessions = self.inner.lock().unwrap();
        sessions.entry(chat).or_default().stat_pages = Some(pages);
    }

    pub fn stat_pages(&self, chat: ChatId) -> Option<Arc<Vec<String>>> {
        let sessions = self.inner.lock().unwrap();
        sessions.get(&chat).and_then(|s| s.stat_pages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        let store = SessionStore::new();
        assert_eq!(store.broadcast_state(ChatId(1)), BroadcastState::Idle);
    }

    #[test]
    fn test_transitions_are_per_chat() {
        let store = SessionStore::new();
        store.set_broadcast_state(
            ChatId(1),
            BroadcastState::CollectingText {
                control: MessageId(10),
            },
        );

        assert_eq!(
            store.broadcast_state(ChatId(1)),
            BroadcastState::CollectingText {
                control: MessageId(10)
            }
        );
        assert_eq!(store.broadcast_state(ChatId(2)), BroadcastState::Idle);
    }

    #[test]
    fn test_clear_keeps_stat_cache() {
        let store = SessionStore::new();
        let pages = Arc::new(vec!["page one".to_string()]);
        store.cache_stat_pages(ChatId(1), pages.clone());
        store.set_broadcast_state(
            ChatId(1),
            BroadcastState::CollectingMedia {
                control: MessageId(10),
                body: "hello".to_string(),
            },
        );

        store.clear_broadcast(ChatId(1));

        assert_eq!(store.broadcast_state(ChatId(1)), BroadcastState::Idle);
        assert_eq!(store.stat_pages(ChatId(1)), Some(pages));
    }
}
