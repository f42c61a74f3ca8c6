//! Component Composition
//!
//! Capability registry attaching pluggable extensions to every container
//! or page instance. Components observe the state machine through events;
//! no subclassing is involved.

use std::any::Any;
use std::rc::Rc;

use crate::container::Container;
use crate::events::Event;
use crate::page::PageId;

/// Extension attached to a container instance.
///
/// `init` runs exactly once, after the owner's first `init` event.
pub trait ContainerComponent {
    fn init(&mut self, _owner: &mut Container) {}

    fn on_event(&mut self, _owner: &mut Container, _event: &Event) {}

    /// Component-specific API as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Extension attached to a page instance.
pub trait PageComponent {
    fn init(&mut self, _owner: &mut Container, _page: PageId) {}

    fn on_event(&mut self, _owner: &mut Container, _page: PageId, _event: &Event) {}

    /// Component-specific API as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

type Factory<C> = Rc<dyn Fn() -> Box<C>>;

/// Ordered list of component factories for one owning type.
///
/// Every registered factory runs once per owned instance; the produced
/// component is stored on the instance under the registered name.
pub struct ComponentRegistry<C: ?Sized> {
    factories: Vec<(String, Factory<C>)>,
}

impl<C: ?Sized> ComponentRegistry<C> {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Register a component factory under a name.
    pub fn register(&mut self, name: &str, factory: impl Fn() -> Box<C> + 'static) {
        self.factories.push((name.to_string(), Rc::new(factory)));
    }

    /// Instantiate every registered component, in registration order.
    pub(crate) fn instantiate(&self) -> Vec<(String, Box<C>)> {
        self.factories
            .iter()
            .map(|(name, factory)| (name.clone(), factory()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<C: ?Sized> Default for ComponentRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> Clone for ComponentRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            factories: self.factories.clone(),
        }
    }
}
