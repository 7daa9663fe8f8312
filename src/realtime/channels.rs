//! Channel, table and event names shared with the backend.

pub const MESSAGES_CHANNEL: &str = "messages-changes";
pub const MESSAGES_TABLE: &str = "messages";

pub const CONVERSATIONS_CHANNEL: &str = "conversations-changes";
pub const CONVERSATIONS_TABLE: &str = "conversations";

pub const TYPING_CHANNEL: &str = "typing-indicators";
pub const TYPING_START_EVENT: &str = "typing-start";
pub const TYPING_STOP_EVENT: &str = "typing-stop";

pub const READ_RECEIPTS_CHANNEL: &str = "read-receipts";
pub const READ_RECEIPTS_TABLE: &str = "message_reads";

pub const SENDER_COLUMN: &str = "sender_id";
