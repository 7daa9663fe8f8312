//! API client: typed calls over the backend, with cache-aside reads.

pub mod cache_keys;
pub mod client;
pub mod error;
pub mod http;
pub mod payloads;
pub mod transport;

pub use client::{ApiClient, CachedPayload};
pub use error::RequestError;
pub use transport::{ApiRequest, ApiResponse, ApiTransport, Method, TransportError};
