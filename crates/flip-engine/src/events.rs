//! Namespaced Event Bus
//!
//! Per-instance publish/subscribe with hierarchical topic matching.
//! A handler registered under `load` fires for `load` and `load.call`,
//! but not for `loadx`.

use serde_json::Value;

use crate::page::PageId;

/// Handler subscription id, used to unsubscribe a single handler.
pub type HandlerId = u64;

/// Event payload.
///
/// Navigation events reference pages by id; `text` carries markers and
/// error messages, `data` carries arbitrary JSON.
#[derive(Debug, Clone, Default)]
pub struct EventArgs {
    /// Primary page the event is about
    pub page: Option<PageId>,
    /// Secondary page (e.g. the page being left on `flip`)
    pub other: Option<PageId>,
    /// Marker or error text
    pub text: Option<String>,
    /// Arbitrary payload
    pub data: Option<Value>,
}

/// A dispatched event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Dotted topic, e.g. `load` or `init.call`
    pub topic: String,
    pub args: EventArgs,
}

impl Event {
    pub fn new(topic: &str, args: EventArgs) -> Self {
        Self {
            topic: topic.to_string(),
            args,
        }
    }

    /// Root segment of the topic (`load` for `load.call`).
    pub fn root(&self) -> &str {
        topic_root(&self.topic)
    }
}

/// Root segment of a dotted topic.
pub fn topic_root(topic: &str) -> &str {
    topic.split('.').next().unwrap_or(topic)
}

/// Hierarchical topic match: `registered` plus a trailing separator must
/// be a prefix of `fired` plus the same separator.
pub fn topic_matches(registered: &str, fired: &str) -> bool {
    if !fired.starts_with(registered) {
        return false;
    }
    fired.len() == registered.len() || fired.as_bytes()[registered.len()] == b'.'
}

type Callback = Box<dyn FnMut(&Event)>;

struct Handler {
    id: HandlerId,
    topic: String,
    once: bool,
    dead: bool,
    callback: Callback,
}

/// Namespaced publish/subscribe bus.
///
/// One bus per container and per page. Handlers fire in registration
/// order; `once` handlers are dropped after their first dispatch.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Handler>,
    next_id: HandlerId,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic. Returns an id usable with [`EventBus::off_handler`].
    pub fn on(&mut self, topic: &str, callback: impl FnMut(&Event) + 'static) -> HandlerId {
        self.subscribe(topic, false, Box::new(callback))
    }

    /// Subscribe for a single dispatch.
    pub fn once(&mut self, topic: &str, callback: impl FnMut(&Event) + 'static) -> HandlerId {
        self.subscribe(topic, true, Box::new(callback))
    }

    fn subscribe(&mut self, topic: &str, once: bool, callback: Callback) -> HandlerId {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.push(Handler {
            id,
            topic: topic.to_string(),
            once,
            dead: false,
            callback,
        });
        id
    }

    /// Remove every handler registered under exactly this topic.
    pub fn off(&mut self, topic: &str) {
        self.handlers.retain(|h| h.topic != topic);
    }

    /// Remove a single handler by subscription id.
    pub fn off_handler(&mut self, id: HandlerId) {
        self.handlers.retain(|h| h.id != id);
    }

    /// Dispatch an event to every matching handler, in registration order.
    pub fn trigger(&mut self, event: &Event) {
        let mut fired_once = false;
        let mut i = 0;
        while i < self.handlers.len() {
            let matches = !self.handlers[i].dead
                && topic_matches(&self.handlers[i].topic, &event.topic);
            if matches {
                let once = self.handlers[i].once;
                (self.handlers[i].callback)(event);
                if once {
                    self.handlers[i].dead = true;
                    fired_once = true;
                }
            }
            i += 1;
        }
        if fired_once {
            self.handlers.retain(|h| !h.dead);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
