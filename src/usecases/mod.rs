//! Use case layer: application workflows and orchestration.

pub mod bootstrap;
pub mod context;
pub mod dedup;
pub mod session;
pub mod store;
