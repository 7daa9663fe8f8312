use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ConversationId, UserId};

/// Someone is typing in a conversation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingState {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TypingEntry {
    state: TypingState,
    last_seen: DateTime<Utc>,
}

/// Remote typing indicators, each expiring after `window` without a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingRoster {
    window: TimeDelta,
    entries: Vec<TypingEntry>,
}

impl TypingRoster {
    pub fn new(window: Duration) -> Self {
        Self {
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            entries: Vec::new(),
        }
    }

    /// Registers or refreshes a typing indicator.
    pub fn start(&mut self, state: TypingState, now: DateTime<Utc>) {
        match self.entries.iter_mut().find(|entry| {
            entry.state.conversation_id == state.conversation_id
                && entry.state.user_id == state.user_id
        }) {
            Some(entry) => {
                entry.state.user_name = state.user_name;
                entry.last_seen = now;
            }
            None => self.entries.push(TypingEntry {
                state,
                last_seen: now,
            }),
        }
    }

    pub fn stop(&mut self, conversation_id: &ConversationId, user_id: &UserId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            !(&entry.state.conversation_id == conversation_id && &entry.state.user_id == user_id)
        });
        self.entries.len() != before
    }

    /// Drops entries idle for at least the window. Returns `true` if any were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.entries.len();
        let window = self.window;
        self.entries
            .retain(|entry| now.signed_duration_since(entry.last_seen) < window);
        self.entries.len() != before
    }

    pub fn typing_in(&self, conversation_id: &ConversationId) -> Vec<&TypingState> {
        self.entries
            .iter()
            .filter(|entry| &entry.state.conversation_id == conversation_id)
            .map(|entry| &entry.state)
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
