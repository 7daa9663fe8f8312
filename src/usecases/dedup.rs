//! Guards against creating a second direct conversation for the same pair of users.

use crate::domain::{conversation::Conversation, ids::UserId};

#[derive(Debug, Clone, PartialEq)]
pub struct DirectConversationCheck {
    pub can_create: bool,
    /// Set when a direct conversation for the pair already exists; callers redirect to it.
    pub existing: Option<Conversation>,
}

/// A direct conversation matches when its participant set is exactly `{user_a, user_b}`.
pub fn find_existing_direct<'a>(
    conversations: &'a [Conversation],
    user_a: &UserId,
    user_b: &UserId,
) -> Option<&'a Conversation> {
    conversations
        .iter()
        .find(|conversation| conversation.is_direct() && is_exact_pair(conversation, user_a, user_b))
}

pub fn can_create_direct(
    conversations: &[Conversation],
    current_user: &UserId,
    target_user: &UserId,
) -> DirectConversationCheck {
    if current_user == target_user {
        return DirectConversationCheck {
            can_create: false,
            existing: None,
        };
    }

    match find_existing_direct(conversations, current_user, target_user) {
        Some(existing) => DirectConversationCheck {
            can_create: false,
            existing: Some(existing.clone()),
        },
        None => DirectConversationCheck {
            can_create: true,
            existing: None,
        },
    }
}

fn is_exact_pair(conversation: &Conversation, user_a: &UserId, user_b: &UserId) -> bool {
    let mut ids: Vec<&UserId> = conversation.participant_ids().collect();
    ids.sort();
    ids.dedup();

    let mut pair = vec![user_a, user_b];
    pair.sort();
    pair.dedup();

    ids == pair
}
