//! Client-side sync core for a realtime messaging app: TTL cache, typed API client,
//! duplicate-conversation guard, realtime subscriber and the conversation store.

pub mod api;
pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod realtime;
#[cfg(test)]
mod test_support;
pub mod usecases;
