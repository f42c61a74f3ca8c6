//! Load Pipeline Types
//!
//! Resource fetching behind [`FetchBackend`], script modules behind
//! [`ModuleRegistry`]. The container counts outstanding sources per page
//! and mounts when the count reaches zero.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::container::Container;
use crate::page::PageId;

/// Fetch ticket id type
pub type TicketId = u64;

/// Which declared source a fetch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Content,
    Template,
    /// Periodic refresh re-fetch; bypasses the mount gate
    Refresh,
}

/// Resource load error
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("load timed out: {0}")]
    Timeout(String),
}

/// A submitted fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub ticket: TicketId,
    pub target: String,
    pub cacheable: bool,
}

/// A finished fetch.
#[derive(Debug, Clone)]
pub struct FetchCompletion {
    pub ticket: TicketId,
    pub result: Result<String, LoadError>,
}

/// Transport for network-resolved sources.
///
/// `submit` queues a request; `poll` returns whatever has finished since
/// the last poll. The host decides when polling happens (the container
/// calls it from `pump`), which keeps the engine single-threaded and
/// cooperative.
pub trait FetchBackend {
    fn submit(&mut self, request: FetchRequest);
    fn poll(&mut self) -> Vec<FetchCompletion>;
}

/// A script module: runs against the container with the loading page as
/// context, typically to set data or mount the page itself.
pub type ModuleFn = Rc<dyn Fn(&mut Container, PageId)>;

/// Named script modules resolvable through the `mod:` scheme.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleFn>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, module: impl Fn(&mut Container, PageId) + 'static) {
        self.modules.insert(name.to_string(), Rc::new(module));
    }

    pub fn get(&self, name: &str) -> Option<ModuleFn> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }
}

/// Parse a fetched content body: JSON when it parses, literal text
/// otherwise.
pub fn parse_body(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

#[derive(Debug, Default)]
struct MockInner {
    pending: Vec<FetchRequest>,
    ready: Vec<FetchCompletion>,
}

/// Backend for tests and hosts without networking: requests sit until
/// the test resolves or fails them by target. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockFetch {
    inner: Rc<RefCell<MockInner>>,
}

impl MockFetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets of requests not yet resolved.
    pub fn pending(&self) -> Vec<String> {
        self.inner
            .borrow()
            .pending
            .iter()
            .map(|r| r.target.clone())
            .collect()
    }

    /// Whether any submitted request asked for cache bypass.
    pub fn saw_uncacheable(&self) -> bool {
        self.inner.borrow().pending.iter().any(|r| !r.cacheable)
    }

    /// Resolve the oldest pending request for a target with a body.
    pub fn resolve(&self, target: &str, body: &str) -> bool {
        self.finish(target, Ok(body.to_string()))
    }

    /// Fail the oldest pending request for a target.
    pub fn fail(&self, target: &str, error: &str) -> bool {
        self.finish(target, Err(LoadError::Fetch(error.to_string())))
    }

    fn finish(&self, target: &str, result: Result<String, LoadError>) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.pending.iter().position(|r| r.target == target) {
            Some(idx) => {
                let request = inner.pending.remove(idx);
                inner.ready.push(FetchCompletion {
                    ticket: request.ticket,
                    result,
                });
                true
            }
            None => false,
        }
    }
}

impl FetchBackend for MockFetch {
    fn submit(&mut self, request: FetchRequest) {
        self.inner.borrow_mut().pending.push(request);
    }

    fn poll(&mut self) -> Vec<FetchCompletion> {
        std::mem::take(&mut self.inner.borrow_mut().ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body("{\"a\": 1}".into()), json!({"a": 1}));
        assert_eq!(parse_body("<p>hi</p>".into()), json!("<p>hi</p>"));
    }

    #[test]
    fn test_mock_resolve_order() {
        let mock = MockFetch::new();
        let mut backend: Box<dyn FetchBackend> = Box::new(mock.clone());
        backend.submit(FetchRequest {
            ticket: 1,
            target: "a.json".into(),
            cacheable: true,
        });
        backend.submit(FetchRequest {
            ticket: 2,
            target: "b.html".into(),
            cacheable: true,
        });

        assert_eq!(mock.pending(), vec!["a.json", "b.html"]);
        assert!(mock.resolve("b.html", "<b/>"));
        assert!(!mock.resolve("c.css", ""));

        let done = backend.poll();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ticket, 2);
        assert!(backend.poll().is_empty());
    }

    #[test]
    fn test_mock_failure() {
        let mock = MockFetch::new();
        let mut backend: Box<dyn FetchBackend> = Box::new(mock.clone());
        backend.submit(FetchRequest {
            ticket: 7,
            target: "x.json".into(),
            cacheable: false,
        });
        assert!(mock.saw_uncacheable());
        assert!(mock.fail("x.json", "boom"));
        let done = backend.poll();
        assert!(done[0].result.is_err());
    }

    #[test]
    fn test_module_registry() {
        let mut modules = ModuleRegistry::new();
        modules.register("intro", |_c, _p| {});
        assert!(modules.contains("intro"));
        assert!(modules.get("intro").is_some());
        assert!(modules.get("other").is_none());
    }
}
