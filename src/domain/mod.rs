//! Domain layer: core entities and local view state.

pub mod conversation;
pub mod conversation_list_state;
pub mod events;
pub mod ids;
pub mod message;
pub mod notice;
pub mod open_conversation_state;
pub mod typing;
pub mod user;
