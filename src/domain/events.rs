use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    conversation::Conversation,
    ids::{ConversationId, MessageId, UserId},
    message::Message,
    typing::TypingState,
};

/// A read receipt row pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptEvent {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub read_at: DateTime<Utc>,
}

/// Push events, already decoded and filtered by the realtime subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    MessageInserted(Message),
    MessageUpdated(Message),
    MessageDeleted {
        message_id: MessageId,
        conversation_id: Option<ConversationId>,
    },
    ConversationChanged(Conversation),
    ConversationDeleted {
        conversation_id: ConversationId,
    },
    TypingStarted(TypingState),
    TypingStopped {
        conversation_id: ConversationId,
        user_id: UserId,
    },
    ReadReceipt(ReadReceiptEvent),
}

impl RealtimeEvent {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageInserted(_) => "message_inserted",
            Self::MessageUpdated(_) => "message_updated",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::ConversationChanged(_) => "conversation_changed",
            Self::ConversationDeleted { .. } => "conversation_deleted",
            Self::TypingStarted(_) => "typing_started",
            Self::TypingStopped { .. } => "typing_stopped",
            Self::ReadReceipt(_) => "read_receipt",
        }
    }
}
