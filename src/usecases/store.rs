//! Local view of conversations and the open message sequence.
//!
//! Every mutation goes through one transition method per event type. Network work
//! happens outside; results come back through the `apply_*` methods, which re-check
//! relevance so late responses are dropped silently.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    api::RequestError,
    domain::{
        conversation::{Conversation, Participant},
        conversation_list_state::ConversationListState,
        events::{ReadReceiptEvent, RealtimeEvent},
        ids::{ConversationId, MessageId, UserId},
        message::{DeliveryState, Message, MessageType},
        notice::{NoticeBoard, RetryAction},
        open_conversation_state::{MessagePage, OpenConversationState},
        typing::{TypingRoster, TypingState},
    },
};

const STORE_STALE_RESPONSE_DROPPED: &str = "STORE_STALE_RESPONSE_DROPPED";

/// Issued when a message fetch starts; the fetch result is applied only while the
/// same conversation is still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectTicket {
    conversation_id: ConversationId,
}

impl SelectTicket {
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeOutcome {
    Applied,
    Ignored,
    /// The event refers to a conversation not in the local list yet.
    MissingConversation(ConversationId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessagingStore {
    current_user: UserId,
    conversations: ConversationListState,
    open: OpenConversationState,
    typing: TypingRoster,
    notices: NoticeBoard,
}

impl MessagingStore {
    pub fn new(current_user: UserId, typing_expiry: Duration) -> Self {
        Self {
            current_user,
            conversations: ConversationListState::default(),
            open: OpenConversationState::default(),
            typing: TypingRoster::new(typing_expiry),
            notices: NoticeBoard::default(),
        }
    }

    pub fn current_user(&self) -> &UserId {
        &self.current_user
    }

    pub fn conversations(&self) -> &ConversationListState {
        &self.conversations
    }

    pub fn open(&self) -> &OpenConversationState {
        &self.open
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn typing_in(&self, conversation_id: &ConversationId) -> Vec<&TypingState> {
        self.typing.typing_in(conversation_id)
    }

    pub fn begin_load_conversations(&mut self) {
        self.conversations.set_loading();
    }

    pub fn apply_conversations_loaded(&mut self, conversations: Vec<Conversation>) {
        self.conversations.set_ready(conversations);

        // A snapshot may predate sends still in flight or failed.
        let local: Vec<Message> = self
            .open
            .local_entries()
            .map(|entry| entry.message.clone())
            .collect();
        for message in &local {
            self.conversations
                .apply_message(message, &self.current_user, true);
        }

        if let Some(open_id) = self.open.conversation_id().cloned() {
            self.conversations.mark_read(&open_id);
        }
    }

    pub fn apply_conversations_failed(&mut self, error: &RequestError) {
        self.conversations.set_error();
        self.notices
            .push(error.message.clone(), Some(RetryAction::LoadConversations));
    }

    /// Opens a conversation: selection moves, its unread count is cleared and the
    /// message sequence starts loading. Pending and failed sends of the conversation
    /// being left are kept and shown again when it is reopened.
    pub fn begin_select(&mut self, conversation_id: ConversationId) -> SelectTicket {
        self.conversations.select(conversation_id.clone());
        self.conversations.mark_read(&conversation_id);
        self.open.set_loading(conversation_id.clone());
        SelectTicket { conversation_id }
    }

    /// Re-fetch of the open conversation without resetting what is shown.
    pub fn begin_reload(&self) -> Option<SelectTicket> {
        self.open.conversation_id().map(|id| SelectTicket {
            conversation_id: id.clone(),
        })
    }

    pub fn apply_messages_loaded(&mut self, ticket: &SelectTicket, page: MessagePage) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.open.set_ready(page);
        true
    }

    pub fn apply_messages_failed(&mut self, ticket: &SelectTicket, error: &RequestError) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.open.set_error();
        self.notices.push(
            error.message.clone(),
            Some(RetryAction::LoadMessages {
                conversation_id: ticket.conversation_id.clone(),
            }),
        );
        true
    }

    /// Returns the ticket and cursor for the next older page, if there is one.
    pub fn begin_load_older(&self) -> Option<(SelectTicket, String)> {
        let conversation_id = self.open.conversation_id()?.clone();
        let cursor = self.open.next_cursor()?.to_owned();
        Some((SelectTicket { conversation_id }, cursor))
    }

    pub fn apply_older_messages(&mut self, ticket: &SelectTicket, page: MessagePage) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.open.prepend_older(page);
        true
    }

    /// Optimistic insert: the pending message shows up in the sequence and as the
    /// conversation's latest message before the send call resolves.
    pub fn begin_send(
        &mut self,
        conversation_id: &ConversationId,
        content: &str,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Message {
        let pending = Message {
            id: MessageId::temporary(client_id),
            conversation_id: conversation_id.clone(),
            sender_id: self.current_user.clone(),
            content: content.to_owned(),
            message_type: MessageType::Text,
            sent_at: now,
            is_pinned: false,
            is_deleted: false,
            read_by: Vec::new(),
            attachments: Vec::new(),
            client_id: Some(client_id.to_owned()),
        };

        if self.open.is_showing(conversation_id) {
            self.open.push_pending(pending.clone());
        }
        self.conversations
            .apply_message(&pending, &self.current_user, true);
        pending
    }

    /// Swaps the pending entry for the canonical message returned by the server.
    pub fn confirm_send(&mut self, client_id: &str, canonical: Message) {
        self.open.confirm(client_id, canonical.clone());

        if let Some(conversation) = self.conversations.get_mut(&canonical.conversation_id) {
            let replaces_pending = conversation.last_message.as_ref().is_some_and(|last| {
                last.id.is_temporary() && last.client_id.as_deref() == Some(client_id)
            });
            if replaces_pending {
                conversation.last_message = Some(canonical.clone());
            }
        }
        self.conversations
            .apply_message(&canonical, &self.current_user, true);
    }

    /// Marks the pending entry failed. It stays visible until retried or discarded.
    pub fn fail_send(&mut self, client_id: &str, error: &RequestError) {
        self.open.set_delivery(
            client_id,
            DeliveryState::Failed {
                reason: error.message.clone(),
            },
        );
        self.notices.push(error.message.clone(), None);
    }

    /// Moves a failed entry back to pending and returns it for re-sending.
    pub fn begin_retry(&mut self, client_id: &str) -> Option<Message> {
        let entry = self.open.find_by_client_id(client_id)?;
        if !matches!(entry.delivery, DeliveryState::Failed { .. }) {
            return None;
        }
        let message = entry.message.clone();
        self.open.set_delivery(client_id, DeliveryState::Pending);
        Some(message)
    }

    /// Retracts a failed send. The conversation's latest message falls back to the
    /// newest confirmed one still shown.
    pub fn discard_failed(&mut self, client_id: &str) -> Option<Message> {
        let entry = self.open.find_by_client_id(client_id)?;
        if !matches!(entry.delivery, DeliveryState::Failed { .. }) {
            return None;
        }
        let discarded = self.open.discard_local(client_id)?;

        let fallback = self
            .open
            .entries()
            .iter()
            .rev()
            .map(|entry| &entry.message)
            .find(|message| !message.id.is_temporary())
            .cloned();
        if let Some(conversation) = self.conversations.get_mut(&discarded.conversation_id) {
            if conversation
                .last_message
                .as_ref()
                .is_some_and(|last| last.id == discarded.id)
            {
                conversation.last_message = fallback;
            }
        }
        Some(discarded)
    }

    /// Inserts or merges a conversation returned by the API.
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        self.conversations.upsert(conversation);
    }

    pub fn remove_conversation(&mut self, conversation_id: &ConversationId) {
        self.conversations.remove(conversation_id);
        self.open.forget(conversation_id);
    }

    pub fn apply_participants(&mut self, conversation_id: &ConversationId, participants: Vec<Participant>) {
        if let Some(conversation) = self.conversations.get_mut(conversation_id) {
            conversation.participants = participants;
        }
    }

    pub fn apply_participant_removed(&mut self, conversation_id: &ConversationId, user_id: &UserId) {
        if user_id == &self.current_user {
            self.remove_conversation(conversation_id);
            return;
        }
        if let Some(conversation) = self.conversations.get_mut(conversation_id) {
            conversation.remove_participant(user_id);
        }
    }

    /// Applies an edited or pinned message returned by the API.
    pub fn apply_message_changed(&mut self, message: Message) {
        self.conversations.refresh_last_message(&message);
        if self.open.is_showing(&message.conversation_id) {
            self.open.update_remote(message);
        }
    }

    pub fn apply_message_removed(&mut self, conversation_id: &ConversationId, message_id: &MessageId) {
        if self.open.is_showing(conversation_id) {
            self.open.remove(message_id);
        }
        self.mark_last_message_deleted(Some(conversation_id), message_id);
    }

    pub fn apply_realtime(&mut self, event: RealtimeEvent, now: DateTime<Utc>) -> RealtimeOutcome {
        match event {
            RealtimeEvent::MessageInserted(message) => self.apply_pushed_message(message),
            RealtimeEvent::MessageUpdated(message) => {
                if message.is_deleted {
                    let conversation_id = message.conversation_id.clone();
                    self.apply_message_removed(&conversation_id, &message.id);
                } else {
                    self.apply_message_changed(message);
                }
                RealtimeOutcome::Applied
            }
            RealtimeEvent::MessageDeleted {
                message_id,
                conversation_id,
            } => {
                self.open.remove(&message_id);
                self.mark_last_message_deleted(conversation_id.as_ref(), &message_id);
                RealtimeOutcome::Applied
            }
            RealtimeEvent::ConversationChanged(conversation) => {
                let removed_me = !conversation.participants.is_empty()
                    && !conversation.has_participant(&self.current_user);
                if removed_me {
                    self.remove_conversation(&conversation.id);
                } else {
                    self.conversations.upsert(conversation);
                }
                RealtimeOutcome::Applied
            }
            RealtimeEvent::ConversationDeleted { conversation_id } => {
                self.remove_conversation(&conversation_id);
                RealtimeOutcome::Applied
            }
            RealtimeEvent::TypingStarted(state) => {
                if state.user_id == self.current_user {
                    return RealtimeOutcome::Ignored;
                }
                self.typing.start(state, now);
                RealtimeOutcome::Applied
            }
            RealtimeEvent::TypingStopped {
                conversation_id,
                user_id,
            } => {
                if self.typing.stop(&conversation_id, &user_id) {
                    RealtimeOutcome::Applied
                } else {
                    RealtimeOutcome::Ignored
                }
            }
            RealtimeEvent::ReadReceipt(receipt) => self.apply_read_receipt(&receipt),
        }
    }

    /// Drops remote typing indicators that were not refreshed in time.
    pub fn prune_typing(&mut self, now: DateTime<Utc>) -> bool {
        self.typing.prune_expired(now)
    }

    pub fn push_notice(&mut self, text: impl Into<String>, retry: Option<RetryAction>) -> u64 {
        self.notices.push(text, retry)
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id).is_some()
    }

    /// Forgets everything, e.g. on logout.
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.open.clear();
        self.typing.clear();
        self.notices = NoticeBoard::default();
    }

    fn is_current(&self, ticket: &SelectTicket) -> bool {
        let current = self.open.is_showing(&ticket.conversation_id);
        if !current {
            tracing::debug!(
                code = STORE_STALE_RESPONSE_DROPPED,
                conversation_id = %ticket.conversation_id,
                "response for a conversation that is no longer open was dropped"
            );
        }
        current
    }

    fn apply_pushed_message(&mut self, message: Message) -> RealtimeOutcome {
        if message.is_deleted {
            return RealtimeOutcome::Ignored;
        }
        let conversation_id = message.conversation_id.clone();
        let active = self.open.is_showing(&conversation_id);

        if !self
            .conversations
            .apply_message(&message, &self.current_user, active)
        {
            return RealtimeOutcome::MissingConversation(conversation_id);
        }

        self.typing.stop(&conversation_id, &message.sender_id);
        if active {
            self.open.insert_remote(message);
        }
        RealtimeOutcome::Applied
    }

    fn apply_read_receipt(&mut self, receipt: &ReadReceiptEvent) -> RealtimeOutcome {
        let in_sequence =
            self.open
                .record_read(&receipt.message_id, &receipt.user_id, receipt.read_at);

        let owner = self
            .conversations
            .conversations()
            .iter()
            .find(|conversation| {
                conversation
                    .last_message
                    .as_ref()
                    .is_some_and(|last| last.id == receipt.message_id)
            })
            .map(|conversation| conversation.id.clone());
        let in_list = owner
            .and_then(|id| self.conversations.get_mut(&id))
            .and_then(|conversation| conversation.last_message.as_mut())
            .is_some_and(|last| last.record_read(&receipt.user_id, receipt.read_at));

        if in_sequence || in_list {
            RealtimeOutcome::Applied
        } else {
            RealtimeOutcome::Ignored
        }
    }

    fn mark_last_message_deleted(
        &mut self,
        conversation_id: Option<&ConversationId>,
        message_id: &MessageId,
    ) {
        let owner = match conversation_id {
            Some(id) => Some(id.clone()),
            None => self
                .conversations
                .conversations()
                .iter()
                .find(|conversation| {
                    conversation
                        .last_message
                        .as_ref()
                        .is_some_and(|last| &last.id == message_id)
                })
                .map(|conversation| conversation.id.clone()),
        };

        if let Some(last) = owner
            .and_then(|id| self.conversations.get_mut(&id))
            .and_then(|conversation| conversation.last_message.as_mut())
            .filter(|last| &last.id == message_id)
        {
            last.is_deleted = true;
        }
    }
}
