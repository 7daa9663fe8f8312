//! Cache key schema shared by reads and invalidations.

use crate::domain::ids::ConversationId;

pub const CONVERSATIONS: &str = "conversations";

pub fn conversation(id: &ConversationId) -> String {
    format!("conversation:{id}")
}

/// First page of a conversation's messages. Later pages are never cached.
pub fn messages(id: &ConversationId) -> String {
    format!("messages:{id}")
}

pub fn users(query: Option<&str>, exclude_current: bool) -> String {
    let query = query
        .map(str::trim)
        .filter(|query| !query.is_empty())
        .unwrap_or("all");
    format!("users:{query}:{exclude_current}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_documented_schema() {
        let id = ConversationId::from("c1");

        assert_eq!(conversation(&id), "conversation:c1");
        assert_eq!(messages(&id), "messages:c1");
        assert_eq!(users(None, true), "users:all:true");
        assert_eq!(users(Some("  "), false), "users:all:false");
        assert_eq!(users(Some("bob"), false), "users:bob:false");
    }
}
