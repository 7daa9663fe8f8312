//! Infrastructure layer: clock, cache, config, logging and storage paths.

pub mod cache;
pub mod clock;
pub mod config;
pub mod contracts;
pub mod error;
pub mod logging;
pub mod storage_layout;
