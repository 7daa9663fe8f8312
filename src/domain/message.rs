use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ConversationId, MessageId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    File,
}

/// Coarse attachment category derived from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Document,
}

impl AttachmentKind {
    pub fn display_label(self) -> &'static str {
        match self {
            AttachmentKind::Image => "[Image]",
            AttachmentKind::Video => "[Video]",
            AttachmentKind::Audio => "[Audio]",
            AttachmentKind::Document => "[File]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    pub url: String,
}

impl Attachment {
    pub fn kind(&self) -> AttachmentKind {
        let top_level = self
            .content_type
            .split('/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match top_level.as_str() {
            "image" => AttachmentKind::Image,
            "video" => AttachmentKind::Video,
            "audio" => AttachmentKind::Audio,
            _ => AttachmentKind::Document,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: UserId,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub read_by: Vec<ReadReceipt>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Idempotency key echoed back by the server for messages sent from this client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Message {
    /// Records a read receipt. Returns `true` when the stored receipts changed.
    ///
    /// At most one receipt is kept per user and `read_at` only moves forward, so
    /// duplicate or out-of-order deliveries are harmless.
    pub fn record_read(&mut self, user_id: &UserId, read_at: DateTime<Utc>) -> bool {
        match self
            .read_by
            .iter_mut()
            .find(|receipt| &receipt.user_id == user_id)
        {
            Some(receipt) if receipt.read_at < read_at => {
                receipt.read_at = read_at;
                true
            }
            Some(_) => false,
            None => {
                self.read_by.push(ReadReceipt {
                    user_id: user_id.clone(),
                    read_at,
                });
                true
            }
        }
    }

    /// Returns the display content: attachment label + text, or just text.
    pub fn display_content(&self) -> String {
        let label = self
            .attachments
            .first()
            .map(|attachment| attachment.kind().display_label());

        match (label, self.content.is_empty()) {
            (Some(label), true) => label.to_owned(),
            (Some(label), false) => format!("{} {}", label, self.content),
            (None, _) => self.content.clone(),
        }
    }
}

/// Local delivery status of a message in the open conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeliveryState {
    /// Inserted optimistically; the send call has not resolved.
    Pending,
    /// Canonical server record.
    #[default]
    Confirmed,
    /// The send call failed; the entry stays visible until retried or discarded.
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, message};

    fn attachment(content_type: &str) -> Attachment {
        Attachment {
            filename: "file".to_owned(),
            content_type: content_type.to_owned(),
            size_bytes: 10,
            url: "https://files.example/file".to_owned(),
        }
    }

    #[test]
    fn record_read_appends_new_reader() {
        let mut msg = message("m1", "c1", "u1", "hi", 10);

        assert!(msg.record_read(&UserId::from("u2"), at(20)));

        assert_eq!(msg.read_by[0].user_id, UserId::from("u2"));
        assert_eq!(msg.read_by.len(), 1);
    }

    #[test]
    fn record_read_is_idempotent_for_duplicate_receipt() {
        let mut msg = message("m1", "c1", "u1", "hi", 10);
        msg.record_read(&UserId::from("u2"), at(20));

        assert!(!msg.record_read(&UserId::from("u2"), at(20)));

        assert_eq!(msg.read_by.len(), 1);
    }

    #[test]
    fn record_read_never_regresses_read_at() {
        let mut msg = message("m1", "c1", "u1", "hi", 10);
        msg.record_read(&UserId::from("u2"), at(30));

        assert!(!msg.record_read(&UserId::from("u2"), at(25)));
        assert_eq!(msg.read_by[0].read_at, at(30));

        assert!(msg.record_read(&UserId::from("u2"), at(40)));
        assert_eq!(msg.read_by[0].read_at, at(40));
        assert_eq!(msg.read_by.len(), 1);
    }

    #[test]
    fn attachment_kind_follows_mime_top_level() {
        assert_eq!(attachment("image/png").kind(), AttachmentKind::Image);
        assert_eq!(attachment("VIDEO/mp4").kind(), AttachmentKind::Video);
        assert_eq!(attachment("audio/ogg").kind(), AttachmentKind::Audio);
        assert_eq!(
            attachment("application/pdf").kind(),
            AttachmentKind::Document
        );
        assert_eq!(attachment("").kind(), AttachmentKind::Document);
    }

    #[test]
    fn display_content_combines_attachment_label_and_text() {
        let mut msg = message("m1", "c1", "u1", "", 10);
        msg.attachments.push(attachment("image/jpeg"));
        assert_eq!(msg.display_content(), "[Image]");

        msg.content = "look".to_owned();
        assert_eq!(msg.display_content(), "[Image] look");
    }

    #[test]
    fn decodes_minimal_row_with_defaults() {
        let raw = r#"{
            "id": "m1",
            "conversation_id": "c1",
            "sender_id": "u1",
            "content": "hello",
            "sent_at": "2024-01-01T00:00:00Z"
        }"#;

        let msg: Message = serde_json::from_str(raw).expect("row should decode");

        assert_eq!(msg.message_type, MessageType::Text);
        assert!(!msg.is_pinned);
        assert!(msg.read_by.is_empty());
        assert!(msg.client_id.is_none());
    }
}
