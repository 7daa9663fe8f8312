//! JSON bodies exchanged with the backend.

use serde::{Deserialize, Serialize};

use crate::domain::{
    conversation::{Conversation, ConversationType, Participant},
    ids::{ConversationId, UserId},
    message::{Attachment, Message, MessageType},
    user::User,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateConversationRequest {
    #[serde(rename = "type")]
    pub kind: ConversationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub participant_ids: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessageRequest {
    pub conversation_id: ConversationId,
    pub content: String,
    pub message_type: MessageType,
    pub attachments: Vec<Attachment>,
    /// Idempotency key; echoed back on the stored message.
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(super) struct EditMessageRequest<'a> {
    pub content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(super) struct PinMessageRequest {
    pub is_pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(super) struct AddParticipantsRequest<'a> {
    pub user_ids: &'a [UserId],
}

#[derive(Debug, Deserialize)]
pub(super) struct ConversationsEnvelope {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ConversationEnvelope {
    pub conversation: Conversation,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessagesEnvelope {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessageEnvelope {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub(super) struct UsersEnvelope {
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ParticipantsEnvelope {
    pub participants: Vec<Participant>,
}
