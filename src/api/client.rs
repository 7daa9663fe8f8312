//! Typed wrapper over the backend API.
//!
//! Reads marked `use_cache` are cache-aside: a fresh cache hit returns without a network
//! call, a miss calls through and stores the result with the key class' default TTL.
//! Every successful write invalidates exactly the keys whose cached payload it changes.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::{
    cache_keys,
    error::RequestError,
    payloads::{
        AddParticipantsRequest, ConversationEnvelope, ConversationsEnvelope,
        CreateConversationRequest, EditMessageRequest, MessageEnvelope, MessagesEnvelope,
        ParticipantsEnvelope, PinMessageRequest, SendMessageRequest, UpdateConversationRequest,
        UsersEnvelope,
    },
    transport::{ApiRequest, ApiResponse, ApiTransport},
};
use crate::{
    domain::{
        conversation::{Conversation, Participant},
        ids::{ConversationId, MessageId, UserId},
        message::Message,
        open_conversation_state::MessagePage,
        user::User,
    },
    infra::{cache::TtlCache, clock::Clock, config::CacheConfig},
};

/// Values the API client keeps in its cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPayload {
    Conversations(Vec<Conversation>),
    Conversation(Conversation),
    Messages(MessagePage),
    Users(Vec<User>),
}

pub struct ApiClient<T: ApiTransport> {
    transport: T,
    cache: TtlCache<CachedPayload>,
    ttls: CacheConfig,
}

impl<T: ApiTransport> ApiClient<T> {
    pub fn new(transport: T, ttls: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            cache: TtlCache::new(clock),
            ttls,
        }
    }

    /// Drops every cached response, e.g. on logout or session switch.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_mut(&mut self) -> &mut TtlCache<CachedPayload> {
        &mut self.cache
    }

    pub fn list_conversations(&mut self, use_cache: bool) -> Result<Vec<Conversation>, RequestError> {
        if use_cache {
            if let Some(CachedPayload::Conversations(conversations)) =
                self.cache.get(cache_keys::CONVERSATIONS)
            {
                return Ok(conversations);
            }
        }

        let envelope: ConversationsEnvelope = self.call(ApiRequest::get("/api/conversations"))?;
        self.cache.set(
            cache_keys::CONVERSATIONS,
            CachedPayload::Conversations(envelope.conversations.clone()),
            self.ttls.conversations_ttl(),
        );
        Ok(envelope.conversations)
    }

    pub fn get_conversation(
        &mut self,
        id: &ConversationId,
        use_cache: bool,
    ) -> Result<Conversation, RequestError> {
        let key = cache_keys::conversation(id);
        if use_cache {
            if let Some(CachedPayload::Conversation(conversation)) = self.cache.get(&key) {
                return Ok(conversation);
            }
        }

        let envelope: ConversationEnvelope =
            self.call(ApiRequest::get(format!("/api/conversations/{id}")))?;
        self.cache.set(
            key,
            CachedPayload::Conversation(envelope.conversation.clone()),
            self.ttls.conversation_ttl(),
        );
        Ok(envelope.conversation)
    }

    pub fn create_conversation(
        &mut self,
        request: &CreateConversationRequest,
    ) -> Result<Conversation, RequestError> {
        let request = ApiRequest::post("/api/conversations")
            .with_json(request)
            .map_err(|source| RequestError::encode_failed(&source))?;
        let envelope: ConversationEnvelope = self.call(request)?;

        self.cache.delete(cache_keys::CONVERSATIONS);
        Ok(envelope.conversation)
    }

    pub fn update_conversation(
        &mut self,
        id: &ConversationId,
        request: &UpdateConversationRequest,
    ) -> Result<Conversation, RequestError> {
        let request = ApiRequest::patch(format!("/api/conversations/{id}"))
            .with_json(request)
            .map_err(|source| RequestError::encode_failed(&source))?;
        let envelope: ConversationEnvelope = self.call(request)?;

        self.cache.delete(cache_keys::CONVERSATIONS);
        self.cache.delete(&cache_keys::conversation(id));
        Ok(envelope.conversation)
    }

    pub fn delete_conversation(&mut self, id: &ConversationId) -> Result<(), RequestError> {
        self.call_unit(ApiRequest::delete(format!("/api/conversations/{id}")))?;

        self.cache.delete(cache_keys::CONVERSATIONS);
        self.cache.delete(&cache_keys::conversation(id));
        self.cache.delete(&cache_keys::messages(id));
        Ok(())
    }

    /// Lists messages. Only the first page (no `cursor`) is ever served from or stored in
    /// the cache.
    pub fn list_messages(
        &mut self,
        conversation_id: &ConversationId,
        cursor: Option<&str>,
        use_cache: bool,
    ) -> Result<MessagePage, RequestError> {
        let key = cache_keys::messages(conversation_id);
        let cacheable = cursor.is_none();
        if use_cache && cacheable {
            if let Some(CachedPayload::Messages(page)) = self.cache.get(&key) {
                return Ok(page);
            }
        }

        let mut request = ApiRequest::get(format!("/api/conversations/{conversation_id}/messages"));
        if let Some(cursor) = cursor {
            request = request.with_query("cursor", cursor);
        }
        let envelope: MessagesEnvelope = self.call(request)?;
        let page = MessagePage {
            messages: envelope.messages,
            next_cursor: envelope.next_cursor,
        };

        if cacheable {
            self.cache.set(
                key,
                CachedPayload::Messages(page.clone()),
                self.ttls.messages_ttl(),
            );
        }
        Ok(page)
    }

    /// Sends a message. Conversation rows are invalidated too since they carry the
    /// `last_message` snapshot and the unread count.
    pub fn send_message(&mut self, request: &SendMessageRequest) -> Result<Message, RequestError> {
        let conversation_id = request.conversation_id.clone();
        let request = ApiRequest::post("/api/messages")
            .with_json(request)
            .map_err(|source| RequestError::encode_failed(&source))?;
        let envelope: MessageEnvelope = self.call(request)?;

        self.invalidate_messages(&conversation_id);
        Ok(envelope.message)
    }

    pub fn get_message(&mut self, message_id: &MessageId) -> Result<Message, RequestError> {
        let envelope: MessageEnvelope =
            self.call(ApiRequest::get(format!("/api/messages/{message_id}")))?;
        Ok(envelope.message)
    }

    pub fn edit_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        content: &str,
    ) -> Result<Message, RequestError> {
        let request = ApiRequest::patch(format!("/api/messages/{message_id}"))
            .with_json(&EditMessageRequest { content })
            .map_err(|source| RequestError::encode_failed(&source))?;
        let envelope: MessageEnvelope = self.call(request)?;

        self.invalidate_messages(conversation_id);
        Ok(envelope.message)
    }

    pub fn pin_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        pinned: bool,
    ) -> Result<Message, RequestError> {
        let request = ApiRequest::patch(format!("/api/messages/{message_id}/pin"))
            .with_json(&PinMessageRequest { is_pinned: pinned })
            .map_err(|source| RequestError::encode_failed(&source))?;
        let envelope: MessageEnvelope = self.call(request)?;

        self.invalidate_messages(conversation_id);
        Ok(envelope.message)
    }

    pub fn delete_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<(), RequestError> {
        self.call_unit(ApiRequest::delete(format!("/api/messages/{message_id}")))?;

        self.invalidate_messages(conversation_id);
        Ok(())
    }

    pub fn mark_as_read(&mut self, conversation_id: &ConversationId) -> Result<(), RequestError> {
        self.call_unit(ApiRequest::post(format!(
            "/api/conversations/{conversation_id}/read"
        )))?;

        self.invalidate_conversation(conversation_id);
        Ok(())
    }

    pub fn list_participants(
        &mut self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Participant>, RequestError> {
        let envelope: ParticipantsEnvelope = self.call(ApiRequest::get(format!(
            "/api/conversations/{conversation_id}/participants"
        )))?;
        Ok(envelope.participants)
    }

    pub fn add_participants(
        &mut self,
        conversation_id: &ConversationId,
        user_ids: &[UserId],
    ) -> Result<Vec<Participant>, RequestError> {
        let request =
            ApiRequest::post(format!("/api/conversations/{conversation_id}/participants"))
                .with_json(&AddParticipantsRequest { user_ids })
                .map_err(|source| RequestError::encode_failed(&source))?;
        let envelope: ParticipantsEnvelope = self.call(request)?;

        self.invalidate_conversation(conversation_id);
        Ok(envelope.participants)
    }

    pub fn remove_participant(
        &mut self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<(), RequestError> {
        self.call_unit(ApiRequest::delete(format!(
            "/api/conversations/{conversation_id}/participants/{user_id}"
        )))?;

        self.invalidate_conversation(conversation_id);
        Ok(())
    }

    pub fn list_users(
        &mut self,
        query: Option<&str>,
        exclude_current: bool,
        use_cache: bool,
    ) -> Result<Vec<User>, RequestError> {
        let key = cache_keys::users(query, exclude_current);
        if use_cache {
            if let Some(CachedPayload::Users(users)) = self.cache.get(&key) {
                return Ok(users);
            }
        }

        let mut request = ApiRequest::get("/api/users");
        if let Some(query) = query.map(str::trim).filter(|query| !query.is_empty()) {
            request = request.with_query("search", query);
        }
        if exclude_current {
            request = request.with_query("exclude_current", "true");
        }
        let envelope: UsersEnvelope = self.call(request)?;

        self.cache.set(
            key,
            CachedPayload::Users(envelope.users.clone()),
            self.ttls.users_ttl(),
        );
        Ok(envelope.users)
    }

    /// A message write changes the first page and the conversation rows that embed
    /// its latest message.
    fn invalidate_messages(&mut self, conversation_id: &ConversationId) {
        self.cache.delete(&cache_keys::messages(conversation_id));
        self.invalidate_conversation(conversation_id);
    }

    fn invalidate_conversation(&mut self, conversation_id: &ConversationId) {
        self.cache.delete(cache_keys::CONVERSATIONS);
        self.cache.delete(&cache_keys::conversation(conversation_id));
    }

    fn call<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, RequestError> {
        let response = self.send(&request)?;
        serde_json::from_str(&response.body)
            .map_err(|source| RequestError::unexpected_body(response.status, &source))
    }

    fn call_unit(&self, request: ApiRequest) -> Result<(), RequestError> {
        self.send(&request).map(|_| ())
    }

    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, RequestError> {
        tracing::debug!(
            method = request.method.as_str(),
            path = %request.path,
            "api request"
        );

        let response = self.transport.execute(request).map_err(|error| {
            tracing::warn!(
                code = "API_TRANSPORT_FAILED",
                method = request.method.as_str(),
                path = %request.path,
                error = %error,
                "api request did not complete"
            );
            RequestError::from(error)
        })?;

        if !response.is_success() {
            let error = RequestError::from_response(&response);
            tracing::warn!(
                code = "API_REQUEST_REJECTED",
                method = request.method.as_str(),
                path = %request.path,
                status = response.status,
                message = %error.message,
                "api request failed"
            );
            return Err(error);
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        api::transport::{Method, TransportError},
        domain::message::MessageType,
        test_support::{json_ok, ManualClock, StubTransport},
    };

    fn conversation_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": "direct",
            "participants": [{"user_id": "u1"}, {"user_id": "u2"}],
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    fn message_json(id: &str, conversation_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "conversation_id": conversation_id,
            "sender_id": "u1",
            "content": "hello",
            "sent_at": "2024-01-01T00:00:05Z",
            "client_id": "k1"
        })
    }

    fn backend() -> StubTransport {
        StubTransport::new(|request| match (request.method, request.path.as_str()) {
            (Method::Get, "/api/conversations") => {
                json_ok(json!({"conversations": [conversation_json("c1")]}))
            }
            (Method::Get, "/api/conversations/c1") => {
                json_ok(json!({"conversation": conversation_json("c1")}))
            }
            (Method::Post, "/api/conversations") => {
                json_ok(json!({"conversation": conversation_json("c2")}))
            }
            (Method::Delete, _) => Ok(ApiResponse::new(204, "")),
            (Method::Get, "/api/conversations/c1/messages") => json_ok(json!({
                "messages": [message_json("m1", "c1")],
                "next_cursor": "cur-1"
            })),
            (Method::Post, "/api/messages") => json_ok(json!({"message": message_json("m2", "c1")})),
            (Method::Get, "/api/messages/m1") | (Method::Patch, "/api/messages/m1/pin") => {
                json_ok(json!({"message": message_json("m1", "c1")}))
            }
            (Method::Post, "/api/conversations/c1/read") => Ok(ApiResponse::new(204, "")),
            (Method::Get, "/api/conversations/c1/participants") => json_ok(json!({
                "participants": [{"user_id": "u1"}, {"user_id": "u2", "name": "Bob"}]
            })),
            (Method::Get, "/api/users") => json_ok(json!({"users": [
                {"id": "u2", "name": "Bob"}
            ]})),
            _ => Ok(ApiResponse::new(404, r#"{"error":"Not found"}"#)),
        })
    }

    fn client<'a>(transport: &'a StubTransport, clock: &ManualClock) -> ApiClient<&'a StubTransport> {
        ApiClient::new(transport, CacheConfig::default(), Arc::new(clock.clone()))
    }

    fn send_request() -> SendMessageRequest {
        SendMessageRequest {
            conversation_id: ConversationId::from("c1"),
            content: "hello".to_owned(),
            message_type: MessageType::Text,
            attachments: vec![],
            client_id: "k1".to_owned(),
        }
    }

    #[test]
    fn cached_conversation_list_skips_network_until_ttl() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);

        api.list_conversations(true).expect("first list");
        api.list_conversations(true).expect("cached list");
        assert_eq!(transport.count(Method::Get, "/api/conversations"), 1);

        clock.advance(Duration::from_secs(120));
        api.list_conversations(true).expect("refetch after ttl");
        assert_eq!(transport.count(Method::Get, "/api/conversations"), 2);
    }

    #[test]
    fn bypassing_cache_always_calls_through_and_refreshes_entry() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);

        api.list_conversations(false).expect("list");
        api.list_conversations(true).expect("served from refreshed cache");

        assert_eq!(transport.count(Method::Get, "/api/conversations"), 1);
    }

    #[test]
    fn only_first_message_page_is_cached() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        let id = ConversationId::from("c1");

        let page = api.list_messages(&id, None, true).expect("first page");
        assert_eq!(page.next_cursor.as_deref(), Some("cur-1"));
        api.list_messages(&id, None, true).expect("cached first page");
        api.list_messages(&id, Some("cur-1"), true).expect("second page");
        api.list_messages(&id, Some("cur-1"), true).expect("second page again");

        let requests = transport.requests();
        let cursors: Vec<Option<&str>> = requests
            .iter()
            .map(|request| request.query_value("cursor"))
            .collect();
        assert_eq!(cursors, vec![None, Some("cur-1"), Some("cur-1")]);
        assert!(!api.cache_mut().has("messages:c1:cur-1"));
    }

    #[test]
    fn send_message_invalidates_message_page_and_conversation_rows() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        let id = ConversationId::from("c1");
        api.list_conversations(true).expect("list");
        api.get_conversation(&id, true).expect("get");
        api.list_messages(&id, None, true).expect("page");

        let sent = api.send_message(&send_request()).expect("send");

        assert_eq!(sent.id, MessageId::from("m2"));
        assert!(!api.cache_mut().has("messages:c1"));
        assert!(!api.cache_mut().has("conversations"));
        assert!(!api.cache_mut().has("conversation:c1"));

        api.get_conversation(&id, true).expect("get after send");
        assert_eq!(transport.count(Method::Get, "/api/conversations/c1"), 2);
    }

    #[test]
    fn delete_message_invalidates_conversation_snapshot() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        let id = ConversationId::from("c1");
        api.get_conversation(&id, true).expect("get");
        api.list_users(None, true, true).expect("users");

        api.delete_message(&id, &MessageId::from("m1")).expect("delete");

        assert!(!api.cache_mut().has("conversation:c1"));
        assert!(api.cache_mut().has("users:all:true"));
    }

    #[test]
    fn send_body_carries_idempotency_key() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);

        api.send_message(&send_request()).expect("send");

        let requests = transport.requests();
        let body = requests[0].body.as_ref().expect("send has a body");
        assert_eq!(body["client_id"], "k1");
        assert_eq!(body["message_type"], "text");
        assert_eq!(body["conversation_id"], "c1");
    }

    #[test]
    fn pin_invalidates_message_page_and_conversation_rows() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        let id = ConversationId::from("c1");
        api.list_conversations(true).expect("list");
        api.get_conversation(&id, true).expect("get");
        api.list_messages(&id, None, true).expect("page");

        api.pin_message(&id, &MessageId::from("m1"), true)
            .expect("pin");

        assert!(!api.cache_mut().has("messages:c1"));
        assert!(!api.cache_mut().has("conversations"));
        assert!(!api.cache_mut().has("conversation:c1"));
    }

    #[test]
    fn delete_conversation_invalidates_all_of_its_keys() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        let id = ConversationId::from("c1");
        api.list_conversations(true).expect("list");
        api.get_conversation(&id, true).expect("get");
        api.list_messages(&id, None, true).expect("page");
        api.list_users(None, true, true).expect("users");

        api.delete_conversation(&id).expect("delete");

        assert!(!api.cache_mut().has("conversations"));
        assert!(!api.cache_mut().has("conversation:c1"));
        assert!(!api.cache_mut().has("messages:c1"));
        assert!(api.cache_mut().has("users:all:true"));
    }

    #[test]
    fn create_conversation_invalidates_list() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        api.list_conversations(true).expect("list");

        let created = api
            .create_conversation(&CreateConversationRequest {
                kind: crate::domain::conversation::ConversationType::Direct,
                title: None,
                participant_ids: vec![UserId::from("u1"), UserId::from("u3")],
            })
            .expect("create");

        assert_eq!(created.id, ConversationId::from("c2"));
        assert!(!api.cache_mut().has("conversations"));
    }

    #[test]
    fn mark_as_read_invalidates_rows_for_unread_counts() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        let id = ConversationId::from("c1");
        api.list_conversations(true).expect("list");
        api.get_conversation(&id, true).expect("get");
        api.list_messages(&id, None, true).expect("page");

        api.mark_as_read(&id).expect("read");

        assert!(!api.cache_mut().has("conversations"));
        assert!(!api.cache_mut().has("conversation:c1"));
        assert!(api.cache_mut().has("messages:c1"));
    }

    #[test]
    fn participants_are_listed_without_caching() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        let id = ConversationId::from("c1");

        let participants = api.list_participants(&id).expect("participants");
        api.list_participants(&id).expect("participants again");

        let ids: Vec<&str> = participants
            .iter()
            .map(|participant| participant.user_id.as_str())
            .collect();
        assert_eq!(ids, vec!["u1", "u2"]);
        assert_eq!(
            transport.count(Method::Get, "/api/conversations/c1/participants"),
            2
        );
    }

    #[test]
    fn user_directory_is_cached_per_query_and_flag() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);

        api.list_users(Some("bob"), true, true).expect("users");
        api.list_users(Some("bob"), true, true).expect("cached");
        api.list_users(None, true, true).expect("different key");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].query_value("search"), Some("bob"));
        assert_eq!(requests[0].query_value("exclude_current"), Some("true"));
        assert_eq!(requests[1].query_value("search"), None);
    }

    #[test]
    fn failed_write_leaves_cache_untouched() {
        let transport = StubTransport::new(|request| match request.method {
            Method::Get => json_ok(json!({"conversations": []})),
            _ => Ok(ApiResponse::new(500, r#"{"error":"Database unavailable"}"#)),
        });
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        api.list_conversations(true).expect("list");

        let err = api
            .delete_conversation(&ConversationId::from("c1"))
            .expect_err("must fail");

        assert_eq!(err.status, Some(500));
        assert_eq!(err.message, "Database unavailable");
        assert!(api.cache_mut().has("conversations"));
    }

    #[test]
    fn transport_failure_maps_to_network_error() {
        let transport =
            StubTransport::new(|_| Err(TransportError::Connect("refused".to_owned())));
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);

        let err = api.list_conversations(true).expect_err("must fail");

        assert_eq!(err.status, None);
        assert_eq!(err.message, "Network error");
    }

    #[test]
    fn malformed_success_body_is_reported() {
        let transport = StubTransport::new(|_| Ok(ApiResponse::new(200, "{\"nope\":1}")));
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);

        let err = api.list_conversations(true).expect_err("must fail");

        assert_eq!(err.status, Some(200));
        assert!(api.cache_mut().is_empty());
    }

    #[test]
    fn clear_cache_forces_refetch() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        api.list_conversations(true).expect("list");

        api.clear_cache();
        api.list_conversations(true).expect("list again");

        assert_eq!(transport.count(Method::Get, "/api/conversations"), 2);
    }

    #[test]
    fn get_message_is_never_cached() {
        let transport = backend();
        let clock = ManualClock::starting_at(0);
        let mut api = client(&transport, &clock);
        let id = MessageId::from("m1");

        let first = api.get_message(&id).expect("first get");
        api.get_message(&id).expect("second get");

        assert_eq!(first.content, "hello");
        assert_eq!(transport.count(Method::Get, "/api/messages/m1"), 2);
        assert!(api.cache_mut().is_empty());
    }
}
