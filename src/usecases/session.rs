use std::sync::{mpsc::Receiver, Arc};

use uuid::Uuid;

use super::{
    dedup::can_create_direct,
    store::{MessagingStore, RealtimeOutcome, SelectTicket},
};
use crate::{
    api::{
        payloads::{CreateConversationRequest, SendMessageRequest, UpdateConversationRequest},
        ApiClient, ApiTransport, RequestError,
    },
    domain::{
        conversation::ConversationType,
        conversation_list_state::ConversationListUiState,
        events::RealtimeEvent,
        ids::{ConversationId, MessageId, UserId},
        message::{Message, MessageType},
        notice::RetryAction,
        user::User,
    },
    infra::clock::Clock,
    realtime::TypingNotifier,
};

const SESSION_MARK_READ_FAILED: &str = "SESSION_MARK_READ_FAILED";
const SESSION_TYPING_PUBLISH_FAILED: &str = "SESSION_TYPING_PUBLISH_FAILED";
const SESSION_DIRECT_REDIRECTED: &str = "SESSION_DIRECT_REDIRECTED";
const SESSION_CONVERSATION_FETCH_FAILED: &str = "SESSION_CONVERSATION_FETCH_FAILED";

/// Result of asking for a direct conversation with someone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectConversation {
    /// One already existed; it is now selected.
    Existing(ConversationId),
    Created(ConversationId),
    /// Conversations with oneself are not allowed.
    Refused,
}

/// One signed-in user's messaging session: the API client with its cache, the
/// store, and the outgoing typing notifier.
///
/// All store mutations happen through `&mut self`, so the session is the single
/// writer; realtime callbacks reach it through [`MessagingSession::drain_realtime`].
///
/// API calls block the caller until they resolve, so nothing interleaves with a
/// fetch inside one method. Callers that issue fetches concurrently drive
/// [`MessagingStore`] directly: `begin_select` hands out a ticket and
/// `apply_messages_loaded` drops the result once another conversation is open.
pub struct MessagingSession<T: ApiTransport> {
    api: ApiClient<T>,
    store: MessagingStore,
    clock: Arc<dyn Clock>,
    typing: Option<TypingNotifier>,
}

impl<T: ApiTransport> MessagingSession<T> {
    pub fn new(api: ApiClient<T>, store: MessagingStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            store,
            clock,
            typing: None,
        }
    }

    pub fn with_typing_notifier(mut self, notifier: TypingNotifier) -> Self {
        self.typing = Some(notifier);
        self
    }

    pub fn store(&self) -> &MessagingStore {
        &self.store
    }

    pub fn current_user(&self) -> &UserId {
        self.store.current_user()
    }

    pub fn load_conversations(&mut self, use_cache: bool) -> Result<(), RequestError> {
        self.store.begin_load_conversations();
        match self.api.list_conversations(use_cache) {
            Ok(conversations) => {
                self.store.apply_conversations_loaded(conversations);
                Ok(())
            }
            Err(error) => {
                self.store.apply_conversations_failed(&error);
                Err(error)
            }
        }
    }

    /// Opens a conversation: loads its first page (cache-aside) and marks it read
    /// without waiting on or surfacing the outcome of the latter.
    pub fn select_conversation(&mut self, conversation_id: &ConversationId) -> Result<(), RequestError> {
        let ticket = self.store.begin_select(conversation_id.clone());
        let loaded = self.fetch_first_page(&ticket, true);

        if let Err(error) = self.api.mark_as_read(conversation_id) {
            tracing::warn!(
                code = SESSION_MARK_READ_FAILED,
                conversation_id = %conversation_id,
                error = %error,
                "mark as read failed"
            );
        }

        loaded
    }

    /// Fetches the next older page. Returns `false` when there is none.
    pub fn load_older(&mut self) -> Result<bool, RequestError> {
        let Some((ticket, cursor)) = self.store.begin_load_older() else {
            return Ok(false);
        };

        match self
            .api
            .list_messages(ticket.conversation_id(), Some(&cursor), false)
        {
            Ok(page) => Ok(self.store.apply_older_messages(&ticket, page)),
            Err(error) => {
                self.store.push_notice(error.message.clone(), None);
                Err(error)
            }
        }
    }

    /// Sends a text message with a fresh idempotency key. The pending copy is in the
    /// store before the call is issued.
    pub fn send_message(
        &mut self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message, RequestError> {
        let client_id = Uuid::new_v4().to_string();
        let pending = self
            .store
            .begin_send(conversation_id, content, &client_id, self.clock.now());

        if let Some(notifier) = self
            .typing
            .as_ref()
            .filter(|notifier| notifier.is_typing(conversation_id))
        {
            if let Err(error) = notifier.send_typing_stop(conversation_id) {
                tracing::debug!(
                    code = SESSION_TYPING_PUBLISH_FAILED,
                    error = %error,
                    "typing-stop before send was not published"
                );
            }
        }

        self.deliver(&client_id, &pending)
    }

    /// Re-sends a failed message under its original idempotency key.
    pub fn retry_send(&mut self, client_id: &str) -> Result<Option<Message>, RequestError> {
        let Some(pending) = self.store.begin_retry(client_id) else {
            return Ok(None);
        };
        self.deliver(client_id, &pending).map(Some)
    }

    pub fn discard_failed(&mut self, client_id: &str) -> bool {
        self.store.discard_failed(client_id).is_some()
    }

    /// Publishes typing activity for the conversation; debounced by the notifier.
    pub fn notify_typing(&self, conversation_id: &ConversationId) {
        if let Some(notifier) = &self.typing {
            if let Err(error) = notifier.send_typing_start(conversation_id) {
                tracing::debug!(
                    code = SESSION_TYPING_PUBLISH_FAILED,
                    error = %error,
                    "typing-start was not published"
                );
            }
        }
    }

    /// Opens the direct conversation with `target`, creating it only when none exists.
    pub fn start_direct_conversation(
        &mut self,
        target: &UserId,
    ) -> Result<DirectConversation, RequestError> {
        if self.store.conversations().ui_state() != ConversationListUiState::Ready
            && self.store.conversations().ui_state() != ConversationListUiState::Empty
        {
            self.load_conversations(true)?;
        }

        let check = can_create_direct(
            self.store.conversations().conversations(),
            self.store.current_user(),
            target,
        );

        if let Some(existing) = check.existing {
            tracing::info!(
                code = SESSION_DIRECT_REDIRECTED,
                conversation_id = %existing.id,
                "direct conversation already exists; redirecting"
            );
            self.select_conversation(&existing.id)?;
            return Ok(DirectConversation::Existing(existing.id));
        }
        if !check.can_create {
            return Ok(DirectConversation::Refused);
        }

        let created = self.create(&CreateConversationRequest {
            kind: ConversationType::Direct,
            title: None,
            participant_ids: vec![target.clone()],
        })?;
        self.select_conversation(&created)?;
        Ok(DirectConversation::Created(created))
    }

    pub fn create_group(
        &mut self,
        title: &str,
        participant_ids: Vec<UserId>,
    ) -> Result<ConversationId, RequestError> {
        let created = self.create(&CreateConversationRequest {
            kind: ConversationType::Group,
            title: Some(title.to_owned()),
            participant_ids,
        })?;
        self.select_conversation(&created)?;
        Ok(created)
    }

    pub fn rename_conversation(
        &mut self,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), RequestError> {
        let request = UpdateConversationRequest {
            title: Some(title.to_owned()),
        };
        let updated = self
            .api
            .update_conversation(conversation_id, &request)
            .map_err(|error| self.notify(error))?;
        self.store.upsert_conversation(updated);
        Ok(())
    }

    pub fn add_participants(
        &mut self,
        conversation_id: &ConversationId,
        user_ids: &[UserId],
    ) -> Result<(), RequestError> {
        let participants = self
            .api
            .add_participants(conversation_id, user_ids)
            .map_err(|error| self.notify(error))?;
        self.store.apply_participants(conversation_id, participants);
        Ok(())
    }

    pub fn remove_participant(
        &mut self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<(), RequestError> {
        self.api
            .remove_participant(conversation_id, user_id)
            .map_err(|error| self.notify(error))?;
        self.store.apply_participant_removed(conversation_id, user_id);
        Ok(())
    }

    pub fn delete_conversation(&mut self, conversation_id: &ConversationId) -> Result<(), RequestError> {
        self.api
            .delete_conversation(conversation_id)
            .map_err(|error| self.notify(error))?;
        self.store.remove_conversation(conversation_id);
        Ok(())
    }

    pub fn edit_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        content: &str,
    ) -> Result<(), RequestError> {
        let edited = self
            .api
            .edit_message(conversation_id, message_id, content)
            .map_err(|error| self.notify(error))?;
        self.store.apply_message_changed(edited);
        Ok(())
    }

    pub fn pin_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        pinned: bool,
    ) -> Result<(), RequestError> {
        let updated = self
            .api
            .pin_message(conversation_id, message_id, pinned)
            .map_err(|error| self.notify(error))?;
        self.store.apply_message_changed(updated);
        Ok(())
    }

    pub fn delete_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<(), RequestError> {
        self.api
            .delete_message(conversation_id, message_id)
            .map_err(|error| self.notify(error))?;
        self.store.apply_message_removed(conversation_id, message_id);
        Ok(())
    }

    /// Searches the user directory, never listing the current user.
    pub fn search_users(&mut self, query: Option<&str>) -> Result<Vec<User>, RequestError> {
        self.load_users(query, true, true)
    }

    /// Applies every queued realtime event, then expires stale typing indicators.
    /// Returns the number of events applied.
    pub fn drain_realtime(&mut self, events: &Receiver<RealtimeEvent>) -> usize {
        let mut applied = 0;
        for event in events.try_iter() {
            if self.apply_realtime(event) {
                applied += 1;
            }
        }
        self.store.prune_typing(self.clock.now());
        applied
    }

    /// Re-runs the fetch behind a failure notice.
    pub fn retry(&mut self, action: &RetryAction) -> Result<(), RequestError> {
        match action {
            RetryAction::LoadConversations => self.load_conversations(false),
            RetryAction::LoadMessages { conversation_id } => {
                match self.store.begin_reload() {
                    Some(ticket) if ticket.conversation_id() == conversation_id => {
                        self.fetch_first_page(&ticket, false)
                    }
                    _ => self.select_conversation(conversation_id),
                }
            }
            RetryAction::LoadUsers {
                query,
                exclude_current,
            } => self
                .load_users(query.as_deref(), *exclude_current, false)
                .map(|_| ()),
        }
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.store.dismiss_notice(id)
    }

    /// Drops cached responses and local state; pending typing timers are cancelled.
    pub fn logout(&mut self) {
        self.api.clear_cache();
        self.store.clear();
        if let Some(notifier) = self.typing.take() {
            notifier.shutdown();
        }
    }

    fn apply_realtime(&mut self, event: RealtimeEvent) -> bool {
        match self.store.apply_realtime(event.clone(), self.clock.now()) {
            RealtimeOutcome::Applied => true,
            RealtimeOutcome::Ignored => false,
            RealtimeOutcome::MissingConversation(conversation_id) => {
                match self.api.get_conversation(&conversation_id, false) {
                    Ok(conversation) => {
                        self.store.upsert_conversation(conversation);
                        self.store.apply_realtime(event, self.clock.now()) == RealtimeOutcome::Applied
                    }
                    Err(error) => {
                        tracing::warn!(
                            code = SESSION_CONVERSATION_FETCH_FAILED,
                            conversation_id = %conversation_id,
                            error = %error,
                            "conversation for pushed message could not be fetched"
                        );
                        false
                    }
                }
            }
        }
    }

    fn load_users(
        &mut self,
        query: Option<&str>,
        exclude_current: bool,
        use_cache: bool,
    ) -> Result<Vec<User>, RequestError> {
        self.api
            .list_users(query, exclude_current, use_cache)
            .map_err(|error| {
                self.store.push_notice(
                    error.message.clone(),
                    Some(RetryAction::LoadUsers {
                        query: query.map(str::to_owned),
                        exclude_current,
                    }),
                );
                error
            })
    }

    fn fetch_first_page(&mut self, ticket: &SelectTicket, use_cache: bool) -> Result<(), RequestError> {
        match self
            .api
            .list_messages(ticket.conversation_id(), None, use_cache)
        {
            Ok(page) => {
                self.store.apply_messages_loaded(ticket, page);
                Ok(())
            }
            Err(error) => {
                self.store.apply_messages_failed(ticket, &error);
                Err(error)
            }
        }
    }

    fn deliver(&mut self, client_id: &str, pending: &Message) -> Result<Message, RequestError> {
        let request = SendMessageRequest {
            conversation_id: pending.conversation_id.clone(),
            content: pending.content.clone(),
            message_type: MessageType::Text,
            attachments: pending.attachments.clone(),
            client_id: client_id.to_owned(),
        };

        match self.api.send_message(&request) {
            Ok(canonical) => {
                self.store.confirm_send(client_id, canonical.clone());
                Ok(canonical)
            }
            Err(error) => {
                self.store.fail_send(client_id, &error);
                Err(error)
            }
        }
    }

    fn create(&mut self, request: &CreateConversationRequest) -> Result<ConversationId, RequestError> {
        let created = self
            .api
            .create_conversation(request)
            .map_err(|error| self.notify(error))?;
        let id = created.id.clone();
        self.store.upsert_conversation(created);
        Ok(id)
    }

    fn notify(&mut self, error: RequestError) -> RequestError {
        self.store.push_notice(error.message.clone(), None);
        error
    }
}
