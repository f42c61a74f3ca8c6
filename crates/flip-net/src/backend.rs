//! Engine Fetch Backend
//!
//! Implements the engine's `FetchBackend` over the blocking client.
//! Submitted requests queue up; `poll` executes them, serving cacheable
//! targets from the response cache first. Non-cacheable fetches get a
//! uniquifying query parameter so intermediaries cannot serve them
//! stale.

use std::time::{SystemTime, UNIX_EPOCH};

use flip_engine::{FetchBackend, FetchCompletion, FetchRequest, LoadError};

use crate::{Client, NetError, ResponseCache};

/// Fetch backend over HTTP.
pub struct HttpBackend {
    client: Client,
    cache: ResponseCache,
    queue: Vec<FetchRequest>,
}

impl HttpBackend {
    pub fn new() -> Result<Self, NetError> {
        Ok(Self::with_client(Client::new()?, ResponseCache::default()))
    }

    pub fn with_client(client: Client, cache: ResponseCache) -> Self {
        Self {
            client,
            cache,
            queue: Vec::new(),
        }
    }

    pub fn cache_mut(&mut self) -> &mut ResponseCache {
        &mut self.cache
    }

    /// Requests waiting for the next poll.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl FetchBackend for HttpBackend {
    fn submit(&mut self, request: FetchRequest) {
        self.queue.push(request);
    }

    fn poll(&mut self) -> Vec<FetchCompletion> {
        let queue = std::mem::take(&mut self.queue);
        let mut done = Vec::with_capacity(queue.len());

        for request in queue {
            if request.cacheable {
                if let Some(entry) = self.cache.get(&request.target) {
                    log::debug!("cache hit: {}", request.target);
                    done.push(FetchCompletion {
                        ticket: request.ticket,
                        result: Ok(entry.body.clone()),
                    });
                    continue;
                }
            }

            let target = if request.cacheable {
                request.target.clone()
            } else {
                cache_bust(&request.target)
            };
            let result = self
                .client
                .get(&target)
                .map(|response| response.body)
                .map_err(|error| LoadError::Fetch(error.to_string()));

            if let Ok(body) = &result {
                if request.cacheable {
                    self.cache.put(&request.target, body.clone());
                }
            }
            done.push(FetchCompletion {
                ticket: request.ticket,
                result,
            });
        }
        done
    }
}

/// Append a uniquifying query parameter.
fn cache_bust(url: &str) -> String {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}_={stamp}")
}
