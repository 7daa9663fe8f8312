use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{
    ids::{ConversationId, MessageId, UserId},
    message::{DeliveryState, Message},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenConversationUiState {
    Empty,
    Loading,
    Ready,
    Error,
}

/// A message in the open conversation together with its local delivery status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub message: Message,
    pub delivery: DeliveryState,
}

impl MessageEntry {
    pub fn confirmed(message: Message) -> Self {
        Self {
            message,
            delivery: DeliveryState::Confirmed,
        }
    }

    fn has_client_id(&self, client_id: &str) -> bool {
        self.message.client_id.as_deref() == Some(client_id)
    }
}

/// A page of messages as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<String>,
}

/// Messages of the currently selected conversation, ordered by `sent_at`.
///
/// Pending and failed entries of conversations that are not open are parked and
/// come back when that conversation is opened again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConversationState {
    conversation_id: Option<ConversationId>,
    entries: Vec<MessageEntry>,
    ui_state: OpenConversationUiState,
    next_cursor: Option<String>,
    parked: HashMap<ConversationId, Vec<MessageEntry>>,
}

impl Default for OpenConversationState {
    fn default() -> Self {
        Self {
            conversation_id: None,
            entries: Vec::new(),
            ui_state: OpenConversationUiState::Empty,
            next_cursor: None,
            parked: HashMap::new(),
        }
    }
}

impl OpenConversationState {
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.conversation_id.is_some()
    }

    pub fn is_showing(&self, conversation_id: &ConversationId) -> bool {
        self.conversation_id.as_ref() == Some(conversation_id)
    }

    pub fn entries(&self) -> &[MessageEntry] {
        &self.entries
    }

    pub fn ui_state(&self) -> OpenConversationUiState {
        self.ui_state.clone()
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn find(&self, message_id: &MessageId) -> Option<&MessageEntry> {
        self.entries
            .iter()
            .find(|entry| &entry.message.id == message_id)
    }

    pub fn find_by_client_id(&self, client_id: &str) -> Option<&MessageEntry> {
        self.entries.iter().find(|entry| entry.has_client_id(client_id))
    }

    /// Every pending or failed entry, in the open conversation and parked ones.
    pub fn local_entries(&self) -> impl Iterator<Item = &MessageEntry> {
        self.entries
            .iter()
            .chain(self.parked.values().flatten())
            .filter(|entry| entry.delivery != DeliveryState::Confirmed)
    }

    /// Opens `conversation_id`. Local entries of the previous conversation are parked,
    /// and those parked for the new one are restored ahead of the first page.
    pub fn set_loading(&mut self, conversation_id: ConversationId) {
        self.park_current();
        self.entries = self.parked.remove(&conversation_id).unwrap_or_default();
        self.conversation_id = Some(conversation_id);
        self.next_cursor = None;
        self.ui_state = OpenConversationUiState::Loading;
    }

    /// Installs the first page, keeping optimistic entries that the page does not cover.
    pub fn set_ready(&mut self, page: MessagePage) {
        let local_only: Vec<MessageEntry> = self
            .entries
            .drain(..)
            .filter(|entry| entry.delivery != DeliveryState::Confirmed)
            .collect();

        self.entries = page
            .messages
            .into_iter()
            .filter(|message| !message.is_deleted)
            .map(MessageEntry::confirmed)
            .collect();
        self.entries
            .sort_by(|left, right| left.message.sent_at.cmp(&right.message.sent_at));

        for entry in local_only {
            let covered = entry
                .message
                .client_id
                .as_deref()
                .is_some_and(|client_id| self.find_by_client_id(client_id).is_some());
            if !covered {
                self.entries.push(entry);
            }
        }

        self.next_cursor = page.next_cursor;
        self.ui_state = OpenConversationUiState::Ready;
    }

    /// Prepends an older page fetched with the stored cursor.
    pub fn prepend_older(&mut self, page: MessagePage) {
        let mut older: Vec<MessageEntry> = page
            .messages
            .into_iter()
            .filter(|message| !message.is_deleted && self.find(&message.id).is_none())
            .map(MessageEntry::confirmed)
            .collect();
        older.sort_by(|left, right| left.message.sent_at.cmp(&right.message.sent_at));

        older.append(&mut self.entries);
        self.entries = older;
        self.next_cursor = page.next_cursor;
    }

    pub fn set_error(&mut self) {
        self.ui_state = OpenConversationUiState::Error;
    }

    /// Drops everything a conversation holds locally, e.g. when it was deleted.
    pub fn forget(&mut self, conversation_id: &ConversationId) {
        self.parked.remove(conversation_id);
        if self.is_showing(conversation_id) {
            let parked = std::mem::take(&mut self.parked);
            *self = Self {
                parked,
                ..Self::default()
            };
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Appends an optimistic message. Its `client_id` must be set.
    pub fn push_pending(&mut self, message: Message) {
        self.entries.push(MessageEntry {
            message,
            delivery: DeliveryState::Pending,
        });
    }

    /// Replaces the optimistic entry for `client_id` with the canonical message.
    ///
    /// When the canonical message is already present (a push raced ahead of the
    /// response) the optimistic entry is dropped instead. A parked entry is dropped
    /// too; the next fetch of its conversation brings the canonical copy. Returns
    /// `false` when neither entry exists.
    pub fn confirm(&mut self, client_id: &str, canonical: Message) -> bool {
        if !self.is_showing(&canonical.conversation_id) {
            return self
                .parked
                .get_mut(&canonical.conversation_id)
                .and_then(|entries| {
                    let index = entries
                        .iter()
                        .position(|entry| entry.has_client_id(client_id))?;
                    Some(entries.remove(index))
                })
                .is_some();
        }

        let pending_index = self
            .entries
            .iter()
            .position(|entry| entry.has_client_id(client_id) && entry.message.id.is_temporary());
        let canonical_present = self.find(&canonical.id).is_some();

        match (pending_index, canonical_present) {
            (Some(index), true) => {
                self.entries.remove(index);
                true
            }
            (Some(index), false) => {
                self.entries[index] = MessageEntry::confirmed(canonical);
                true
            }
            (None, true) => true,
            (None, false) => false,
        }
    }

    /// Updates the delivery state of a local entry, open or parked.
    pub fn set_delivery(&mut self, client_id: &str, delivery: DeliveryState) -> bool {
        match self
            .entries
            .iter_mut()
            .chain(self.parked.values_mut().flatten())
            .find(|entry| entry.has_client_id(client_id) && entry.message.id.is_temporary())
        {
            Some(entry) => {
                entry.delivery = delivery;
                true
            }
            None => false,
        }
    }

    /// Removes a not-yet-confirmed entry. Confirmed messages are never discarded here.
    pub fn discard_local(&mut self, client_id: &str) -> Option<Message> {
        let index = self.entries.iter().position(|entry| {
            entry.has_client_id(client_id) && entry.delivery != DeliveryState::Confirmed
        })?;
        Some(self.entries.remove(index).message)
    }

    /// Inserts a confirmed message by `sent_at`, ignoring ids already present.
    pub fn insert_remote(&mut self, message: Message) -> bool {
        if message.is_deleted || self.find(&message.id).is_some() {
            return false;
        }

        let position = self
            .entries
            .iter()
            .position(|entry| {
                entry.delivery != DeliveryState::Confirmed
                    || entry.message.sent_at > message.sent_at
            })
            .unwrap_or(self.entries.len());

        self.entries
            .insert(position, MessageEntry::confirmed(message));
        true
    }

    /// Applies an update row. A soft-deleted row removes the message.
    pub fn update_remote(&mut self, message: Message) -> bool {
        if message.is_deleted {
            return self.remove(&message.id).is_some();
        }

        match self
            .entries
            .iter_mut()
            .find(|entry| entry.message.id == message.id)
        {
            Some(entry) => {
                let read_by = std::mem::take(&mut entry.message.read_by);
                entry.message = message;
                for receipt in read_by {
                    entry.message.record_read(&receipt.user_id, receipt.read_at);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, message_id: &MessageId) -> Option<Message> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.message.id == message_id)?;
        Some(self.entries.remove(index).message)
    }

    pub fn set_pinned(&mut self, message_id: &MessageId, pinned: bool) -> bool {
        match self.find_mut(message_id) {
            Some(entry) => {
                entry.message.is_pinned = pinned;
                true
            }
            None => false,
        }
    }

    pub fn record_read(
        &mut self,
        message_id: &MessageId,
        user_id: &UserId,
        read_at: DateTime<Utc>,
    ) -> bool {
        self.find_mut(message_id)
            .is_some_and(|entry| entry.message.record_read(user_id, read_at))
    }

    pub fn pinned(&self) -> impl Iterator<Item = &Message> {
        self.entries
            .iter()
            .map(|entry| &entry.message)
            .filter(|message| message.is_pinned)
    }

    fn park_current(&mut self) {
        let Some(previous) = self.conversation_id.take() else {
            return;
        };
        let local: Vec<MessageEntry> = self
            .entries
            .drain(..)
            .filter(|entry| entry.delivery != DeliveryState::Confirmed)
            .collect();
        if !local.is_empty() {
            self.parked.insert(previous, local);
        }
    }

    fn find_mut(&mut self, message_id: &MessageId) -> Option<&mut MessageEntry> {
        self.entries
            .iter_mut()
            .find(|entry| &entry.message.id == message_id)
    }
}
