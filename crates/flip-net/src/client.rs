//! HTTP Client
//!
//! Thin blocking client over reqwest with rustls. Page content and
//! templates are text, so bodies come back as strings.

use std::time::Duration;

use url::Url;

use crate::{NetError, Response};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("flip-net/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Blocking HTTP client.
pub struct Client {
    inner: reqwest::blocking::Client,
}

impl Client {
    pub fn new() -> Result<Self, NetError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, NetError> {
        let inner = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetError::Client(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Fetch a URL as text. Non-2xx statuses are errors.
    pub fn get(&self, url: &str) -> Result<Response, NetError> {
        let parsed = Url::parse(url).map_err(|e| NetError::InvalidUrl(e.to_string()))?;
        log::debug!("GET {parsed}");

        let response = self
            .inner
            .get(parsed)
            .send()
            .map_err(|e| NetError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(NetError::Http { status });
        }

        let body = response
            .text()
            .map_err(|e| NetError::Network(e.to_string()))?;
        Ok(Response { status, body })
    }
}
