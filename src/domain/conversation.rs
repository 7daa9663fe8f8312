use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    ids::{ConversationId, UserId},
    message::Message,
};

/// Kind of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    /// Exactly two participants, unique per unordered pair.
    #[default]
    Direct,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    #[serde(default)]
    pub name: Option<String>,
}

impl Participant {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(rename = "type")]
    pub kind: ConversationType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub last_message: Option<Message>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    pub fn is_direct(&self) -> bool {
        self.kind == ConversationType::Direct
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = &UserId> {
        self.participants.iter().map(|participant| &participant.user_id)
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participant_ids().any(|id| id == user_id)
    }

    /// Adds participants not already present, keeping insertion order.
    pub fn add_participants(&mut self, participants: impl IntoIterator<Item = Participant>) {
        for participant in participants {
            if !self.has_participant(&participant.user_id) {
                self.participants.push(participant);
            }
        }
    }

    pub fn remove_participant(&mut self, user_id: &UserId) {
        self.participants
            .retain(|participant| &participant.user_id != user_id);
    }

    /// Records `message` as the latest one. `updated_at` never moves backwards.
    pub fn touch_last_message(&mut self, message: &Message) {
        let is_newer = self
            .last_message
            .as_ref()
            .map_or(true, |current| {
                current.sent_at <= message.sent_at || current.id == message.id
            });
        if is_newer {
            self.last_message = Some(message.clone());
        }
        self.advance_updated_at(message.sent_at);
    }

    pub fn advance_updated_at(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }

    /// Merges a pushed conversation row into the local copy.
    ///
    /// Only the fields owned by the conversation row are taken. `last_message` and
    /// `unread_count` are driven by message events so the two channels commute.
    pub fn merge_remote(&mut self, remote: Conversation) {
        self.kind = remote.kind;
        self.title = remote.title;
        if !remote.participants.is_empty() {
            self.participants = remote.participants;
        }
        self.advance_updated_at(remote.updated_at);
        if self.last_message.is_none() {
            self.last_message = remote.last_message;
        }
    }

    /// Title for list display: the explicit title, else the other participants' names.
    pub fn display_title(&self, current_user: &UserId) -> String {
        if let Some(title) = self.title.as_deref().filter(|title| !title.trim().is_empty()) {
            return title.to_owned();
        }

        let names: Vec<&str> = self
            .participants
            .iter()
            .filter(|participant| &participant.user_id != current_user)
            .map(|participant| {
                participant
                    .name
                    .as_deref()
                    .unwrap_or(participant.user_id.as_str())
            })
            .collect();

        if names.is_empty() {
            self.id.to_string()
        } else {
            names.join(", ")
        }
    }
}
