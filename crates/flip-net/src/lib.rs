//! Flip Networking
//!
//! Blocking resource transport and response cache backing the engine's
//! fetch pipeline.

mod backend;
mod cache;
mod client;

pub use backend::HttpBackend;
pub use cache::{CacheEntry, ResponseCache};
pub use client::{Client, ClientConfig};
pub use url::Url;

/// HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// Check if the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network error
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Client error: {0}")]
    Client(String),
}
