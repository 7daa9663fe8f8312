use std::collections::{HashMap, HashSet};

use super::{
    conversation::Conversation,
    ids::{ConversationId, MessageId, UserId},
    message::Message,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationListUiState {
    Loading,
    Ready,
    Empty,
    Error,
}

/// Conversation list ordered by `updated_at`, most recent first.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationListState {
    ui_state: ConversationListUiState,
    conversations: Vec<Conversation>,
    selected_id: Option<ConversationId>,
    /// Message ids already counted into `unread_count`, per conversation.
    counted_unread: HashMap<ConversationId, HashSet<MessageId>>,
}

impl Default for ConversationListState {
    fn default() -> Self {
        Self {
            ui_state: ConversationListUiState::Loading,
            conversations: Vec::new(),
            selected_id: None,
            counted_unread: HashMap::new(),
        }
    }
}

impl ConversationListState {
    pub fn ui_state(&self) -> ConversationListUiState {
        self.ui_state.clone()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|conv| &conv.id == id)
    }

    pub fn selected_id(&self) -> Option<&ConversationId> {
        self.selected_id.as_ref()
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations
            .iter()
            .map(|conv| conv.unread_count)
            .fold(0, u32::saturating_add)
    }

    pub fn set_loading(&mut self) {
        self.ui_state = ConversationListUiState::Loading;
    }

    /// Replaces the list with a fresh server snapshot, keeping the selection by id.
    pub fn set_ready(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
        self.sort();
        self.refresh_ui_state();
    }

    pub fn set_error(&mut self) {
        self.ui_state = ConversationListUiState::Error;
    }

    /// Selects a conversation by id. Selection of an unknown id is still recorded so a
    /// conversation materialized later (e.g. right after creation) shows as selected.
    pub fn select(&mut self, id: ConversationId) {
        self.selected_id = Some(id);
    }

    pub fn clear_selection(&mut self) {
        self.selected_id = None;
    }

    /// Inserts a new conversation or merges into the existing one with the same id.
    pub fn upsert(&mut self, conversation: Conversation) {
        match self.get_mut(&conversation.id) {
            Some(existing) => existing.merge_remote(conversation),
            None => self.conversations.push(conversation),
        }
        self.sort();
        self.refresh_ui_state();
    }

    pub fn remove(&mut self, id: &ConversationId) -> Option<Conversation> {
        let index = self.conversations.iter().position(|conv| &conv.id == id)?;
        let removed = self.conversations.remove(index);
        self.counted_unread.remove(id);
        if self.selected_id.as_ref() == Some(id) {
            self.selected_id = None;
        }
        self.refresh_ui_state();
        Some(removed)
    }

    /// Applies a message to its conversation's `last_message`/`updated_at`.
    ///
    /// Messages from other users bump `unread_count` unless the conversation is
    /// `active`. A message is counted at most once, and never when it is older than
    /// the current latest one, so redelivered pushes leave the count unchanged.
    /// Returns `false` when the conversation is not in the list.
    pub fn apply_message(&mut self, message: &Message, current_user: &UserId, active: bool) -> bool {
        let Some(conv) = self
            .conversations
            .iter_mut()
            .find(|conv| conv.id == message.conversation_id)
        else {
            return false;
        };

        let is_new = conv
            .last_message
            .as_ref()
            .map_or(true, |last| last.id != message.id && last.sent_at <= message.sent_at);
        conv.touch_last_message(message);
        if !active
            && is_new
            && &message.sender_id != current_user
            && self
                .counted_unread
                .entry(conv.id.clone())
                .or_default()
                .insert(message.id.clone())
        {
            conv.unread_count = conv.unread_count.saturating_add(1);
        }

        self.sort();
        true
    }

    /// Replaces the `last_message` snapshot when it refers to `message`.
    pub fn refresh_last_message(&mut self, message: &Message) {
        if let Some(conv) = self.get_mut(&message.conversation_id) {
            if conv
                .last_message
                .as_ref()
                .is_some_and(|last| last.id == message.id)
            {
                conv.last_message = Some(message.clone());
            }
        }
    }

    pub fn mark_read(&mut self, id: &ConversationId) {
        if let Some(conv) = self.get_mut(id) {
            conv.unread_count = 0;
        }
        self.counted_unread.remove(id);
    }

    pub fn get_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|conv| &conv.id == id)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn sort(&mut self) {
        self.conversations
            .sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    }

    fn refresh_ui_state(&mut self) {
        self.ui_state = if self.conversations.is_empty() {
            ConversationListUiState::Empty
        } else {
            ConversationListUiState::Ready
        };
    }
}
