use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::{json, Value};

use crate::{
    api::transport::{ApiRequest, ApiResponse, ApiTransport, Method, TransportError},
    domain::{
        conversation::{Conversation, ConversationType, Participant},
        ids::{ConversationId, MessageId, UserId},
        message::{Message, MessageType},
        user::User,
    },
    infra::clock::Clock,
};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .expect("timestamp should be representable")
}

pub fn conversation(id: &str, kind: ConversationType, participants: &[&str]) -> Conversation {
    Conversation {
        id: ConversationId::from(id),
        kind,
        title: None,
        participants: participants.iter().map(|id| Participant::new(*id)).collect(),
        last_message: None,
        updated_at: at(0),
        unread_count: 0,
    }
}

pub fn message(id: &str, conversation_id: &str, sender: &str, content: &str, secs: i64) -> Message {
    Message {
        id: MessageId::from(id),
        conversation_id: ConversationId::from(conversation_id),
        sender_id: UserId::from(sender),
        content: content.to_owned(),
        message_type: MessageType::Text,
        sent_at: at(secs),
        is_pinned: false,
        is_deleted: false,
        read_by: Vec::new(),
        attachments: Vec::new(),
        client_id: None,
    }
}

pub fn pending_message(
    client_id: &str,
    conversation_id: &str,
    sender: &str,
    content: &str,
    secs: i64,
) -> Message {
    let mut msg = message("", conversation_id, sender, content, secs);
    msg.id = MessageId::temporary(client_id);
    msg.client_id = Some(client_id.to_owned());
    msg
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: UserId::from(id),
        name: name.to_owned(),
        email: None,
        avatar_url: None,
    }
}

/// Clock the test moves by hand. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn starting_at(secs: i64) -> Self {
        Self {
            now: Arc::new(Mutex::new(at(secs))),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = TimeDelta::from_std(by).expect("duration should fit");
        *self.now.lock().expect("clock lock") += by;
    }

    pub fn set(&self, secs: i64) {
        *self.now.lock().expect("clock lock") = at(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub fn json_ok(body: Value) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(200, body.to_string()))
}

type Responder = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Transport answering from a closure and recording every request.
pub struct StubTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl StubTransport {
    pub fn new(
        responder: impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }
}

impl ApiTransport for StubTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        (self.responder)(request)
    }
}

#[derive(Debug, Clone)]
enum Failure {
    Status(u16, String),
    Transport(TransportError),
}

#[derive(Debug)]
struct FailRule {
    method: Method,
    path: String,
    failure: Failure,
}

#[derive(Debug, Default)]
struct BackendState {
    current_user: UserId,
    users: Vec<User>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    reads: Vec<ConversationId>,
    requests: Vec<ApiRequest>,
    fail_next: Vec<FailRule>,
    page_size: usize,
    next_id: u64,
    clock: i64,
}

/// In-memory backend speaking the REST contract, for session-level tests.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn new(current_user: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                current_user: UserId::from(current_user),
                page_size: 50,
                clock: 1_000,
                ..BackendState::default()
            })),
        }
    }

    pub fn with_user(self, id: &str, name: &str) -> Self {
        self.state.lock().expect("backend lock").users.push(user(id, name));
        self
    }

    pub fn with_conversation(self, conversation: Conversation) -> Self {
        self.state
            .lock()
            .expect("backend lock")
            .conversations
            .push(conversation);
        self
    }

    pub fn with_message(self, message: Message) -> Self {
        self.state.lock().expect("backend lock").messages.push(message);
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().expect("backend lock").page_size = page_size;
        self
    }

    /// The next matching request fails with `status` and an `{"error": message}` body.
    pub fn fail_next(&self, method: Method, path: &str, status: u16, message: &str) {
        self.push_rule(method, path, Failure::Status(status, message.to_owned()));
    }

    pub fn drop_next(&self, method: Method, path: &str, error: TransportError) {
        self.push_rule(method, path, Failure::Transport(error));
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .expect("backend lock")
            .requests
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().expect("backend lock").requests.clone()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().expect("backend lock").conversations.clone()
    }

    pub fn messages_in(&self, conversation_id: &str) -> Vec<Message> {
        self.state
            .lock()
            .expect("backend lock")
            .messages
            .iter()
            .filter(|message| message.conversation_id.as_str() == conversation_id)
            .cloned()
            .collect()
    }

    pub fn read_marks(&self) -> Vec<ConversationId> {
        self.state.lock().expect("backend lock").reads.clone()
    }

    fn push_rule(&self, method: Method, path: &str, failure: Failure) {
        self.state
            .lock()
            .expect("backend lock")
            .fail_next
            .push(FailRule {
                method,
                path: path.to_owned(),
                failure,
            });
    }
}

impl ApiTransport for FakeBackend {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock().expect("backend lock");
        state.requests.push(request.clone());

        if let Some(index) = state
            .fail_next
            .iter()
            .position(|rule| rule.method == request.method && rule.path == request.path)
        {
            return match state.fail_next.remove(index).failure {
                Failure::Status(status, message) => Ok(ApiResponse::new(
                    status,
                    json!({ "error": message }).to_string(),
                )),
                Failure::Transport(error) => Err(error),
            };
        }

        Ok(state.route(request))
    }
}

fn ok(body: Value) -> ApiResponse {
    ApiResponse::new(200, body.to_string())
}

fn not_found(what: &str) -> ApiResponse {
    ApiResponse::new(404, json!({ "error": format!("{what} not found") }).to_string())
}

fn body_str<'a>(request: &'a ApiRequest, field: &str) -> Option<&'a str> {
    request
        .body
        .as_ref()
        .and_then(|body| body.get(field))
        .and_then(Value::as_str)
}

impl BackendState {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        at(self.clock)
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn route(&mut self, request: &ApiRequest) -> ApiResponse {
        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        match (request.method, segments.as_slice()) {
            (Method::Get, ["api", "conversations"]) => {
                let mut visible: Vec<&Conversation> = self
                    .conversations
                    .iter()
                    .filter(|conv| conv.has_participant(&self.current_user))
                    .collect();
                visible.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                ok(json!({ "conversations": visible }))
            }
            (Method::Post, ["api", "conversations"]) => self.create_conversation(request),
            (Method::Get, ["api", "conversations", id]) => match self.conversation(id) {
                Some(conv) => ok(json!({ "conversation": conv })),
                None => not_found("conversation"),
            },
            (Method::Patch, ["api", "conversations", id]) => {
                let title = body_str(request, "title").map(str::to_owned);
                let now = self.tick();
                match self.conversation_mut(id) {
                    Some(conv) => {
                        conv.title = title;
                        conv.updated_at = now;
                        let conv = conv.clone();
                        ok(json!({ "conversation": conv }))
                    }
                    None => not_found("conversation"),
                }
            }
            (Method::Delete, ["api", "conversations", id]) => {
                let before = self.conversations.len();
                self.conversations.retain(|conv| conv.id.as_str() != *id);
                self.messages.retain(|msg| msg.conversation_id.as_str() != *id);
                if before == self.conversations.len() {
                    not_found("conversation")
                } else {
                    ok(json!({ "success": true }))
                }
            }
            (Method::Get, ["api", "conversations", id, "messages"]) => {
                self.list_messages(id, request.query_value("cursor"))
            }
            (Method::Post, ["api", "conversations", id, "read"]) => {
                let id = ConversationId::from(*id);
                let me = self.current_user.clone();
                let now = self.tick();
                for msg in self
                    .messages
                    .iter_mut()
                    .filter(|msg| msg.conversation_id == id && msg.sender_id != me)
                {
                    msg.record_read(&me, now);
                }
                if let Some(conv) = self.conversation_mut(id.as_str()) {
                    conv.unread_count = 0;
                }
                self.reads.push(id);
                ok(json!({ "success": true }))
            }
            (Method::Get, ["api", "conversations", id, "participants"]) => {
                match self.conversation(id) {
                    Some(conv) => ok(json!({ "participants": conv.participants })),
                    None => not_found("conversation"),
                }
            }
            (Method::Post, ["api", "conversations", id, "participants"]) => {
                let user_ids: Vec<String> = request
                    .body
                    .as_ref()
                    .and_then(|body| body.get("user_ids"))
                    .and_then(|ids| serde_json::from_value(ids.clone()).ok())
                    .unwrap_or_default();
                match self.conversation_mut(id) {
                    Some(conv) => {
                        conv.add_participants(user_ids.into_iter().map(Participant::new));
                        let participants = conv.participants.clone();
                        ok(json!({ "participants": participants }))
                    }
                    None => not_found("conversation"),
                }
            }
            (Method::Delete, ["api", "conversations", id, "participants", user_id]) => {
                match self.conversation_mut(id) {
                    Some(conv) => {
                        conv.remove_participant(&UserId::from(*user_id));
                        ok(json!({ "success": true }))
                    }
                    None => not_found("conversation"),
                }
            }
            (Method::Post, ["api", "messages"]) => self.send_message(request),
            (Method::Patch, ["api", "messages", id]) => {
                let content = body_str(request, "content").unwrap_or_default().to_owned();
                self.update_message(id, |msg| msg.content = content)
            }
            (Method::Patch, ["api", "messages", id, "pin"]) => {
                let pinned = request
                    .body
                    .as_ref()
                    .and_then(|body| body.get("is_pinned"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                self.update_message(id, |msg| msg.is_pinned = pinned)
            }
            (Method::Delete, ["api", "messages", id]) => {
                match self.messages.iter_mut().find(|msg| msg.id.as_str() == *id) {
                    Some(msg) => {
                        msg.is_deleted = true;
                        ok(json!({ "success": true }))
                    }
                    None => not_found("message"),
                }
            }
            (Method::Get, ["api", "users"]) => {
                let search = request
                    .query_value("search")
                    .map(str::to_lowercase)
                    .unwrap_or_default();
                let exclude_current = request.query_value("exclude_current") == Some("true");
                let users: Vec<&User> = self
                    .users
                    .iter()
                    .filter(|user| !exclude_current || user.id != self.current_user)
                    .filter(|user| user.name.to_lowercase().contains(&search))
                    .collect();
                ok(json!({ "users": users }))
            }
            _ => not_found("route"),
        }
    }

    fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|conv| conv.id.as_str() == id)
    }

    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|conv| conv.id.as_str() == id)
    }

    fn create_conversation(&mut self, request: &ApiRequest) -> ApiResponse {
        let kind = match body_str(request, "type") {
            Some("group") => ConversationType::Group,
            _ => ConversationType::Direct,
        };
        let mut participant_ids: Vec<String> = request
            .body
            .as_ref()
            .and_then(|body| body.get("participant_ids"))
            .and_then(|ids| serde_json::from_value(ids.clone()).ok())
            .unwrap_or_default();
        if !participant_ids.iter().any(|id| id == self.current_user.as_str()) {
            participant_ids.insert(0, self.current_user.to_string());
        }

        let id = self.fresh_id("c");
        let now = self.tick();
        let conv = Conversation {
            id: ConversationId::from(id),
            kind,
            title: body_str(request, "title").map(str::to_owned),
            participants: participant_ids.into_iter().map(Participant::new).collect(),
            last_message: None,
            updated_at: now,
            unread_count: 0,
        };
        self.conversations.push(conv.clone());
        ok(json!({ "conversation": conv }))
    }

    fn list_messages(&self, conversation_id: &str, cursor: Option<&str>) -> ApiResponse {
        let mut all: Vec<&Message> = self
            .messages
            .iter()
            .filter(|msg| msg.conversation_id.as_str() == conversation_id && !msg.is_deleted)
            .collect();
        all.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));

        let end = cursor
            .and_then(|cursor| cursor.parse::<usize>().ok())
            .unwrap_or(all.len())
            .min(all.len());
        let start = end.saturating_sub(self.page_size);
        let next_cursor = (start > 0).then(|| start.to_string());
        ok(json!({ "messages": &all[start..end], "next_cursor": next_cursor }))
    }

    fn send_message(&mut self, request: &ApiRequest) -> ApiResponse {
        let client_id = body_str(request, "client_id").map(str::to_owned);
        if let Some(existing) = self
            .messages
            .iter()
            .find(|msg| client_id.is_some() && msg.client_id == client_id)
        {
            return ok(json!({ "message": existing }));
        }

        let Some(conversation_id) = body_str(request, "conversation_id").map(str::to_owned) else {
            return ApiResponse::new(400, json!({ "error": "conversation_id required" }).to_string());
        };
        if self.conversation(&conversation_id).is_none() {
            return not_found("conversation");
        }

        let id = self.fresh_id("m");
        let now = self.tick();
        let msg = Message {
            id: MessageId::from(id),
            conversation_id: ConversationId::from(conversation_id.as_str()),
            sender_id: self.current_user.clone(),
            content: body_str(request, "content").unwrap_or_default().to_owned(),
            message_type: MessageType::Text,
            sent_at: now,
            is_pinned: false,
            is_deleted: false,
            read_by: Vec::new(),
            attachments: Vec::new(),
            client_id,
        };
        self.messages.push(msg.clone());
        if let Some(conv) = self.conversation_mut(&conversation_id) {
            conv.touch_last_message(&msg);
        }
        ok(json!({ "message": msg }))
    }

    fn update_message(&mut self, id: &str, change: impl FnOnce(&mut Message)) -> ApiResponse {
        match self.messages.iter_mut().find(|msg| msg.id.as_str() == id) {
            Some(msg) => {
                change(msg);
                let msg = msg.clone();
                ok(json!({ "message": msg }))
            }
            None => not_found("message"),
        }
    }
}
