//! Navigation Menu Component
//!
//! Container component keeping an item per indexed page and tracking the
//! active one. Rebuilds on `update`, follows `flip`.

use std::any::Any;

use crate::component::ContainerComponent;
use crate::container::Container;
use crate::events::Event;
use crate::page::PageId;

/// Active-item navigation menu.
#[derive(Debug, Default)]
pub struct NavigationMenu {
    items: Vec<PageId>,
    active: Option<PageId>,
}

impl NavigationMenu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Menu items, one per indexed page, in navigation order.
    pub fn items(&self) -> &[PageId] {
        &self.items
    }

    /// Item highlighted as active.
    pub fn active(&self) -> Option<PageId> {
        self.active
    }

    fn rebuild(&mut self, owner: &Container) {
        self.items = owner.pages().iter().map(|p| p.id).collect();
    }

    fn follow(&mut self, owner: &mut Container, page: Option<PageId>) -> bool {
        let id = match page.or_else(|| owner.active_page()) {
            Some(id) => id,
            None => return false,
        };
        if owner.locked() || !self.items.contains(&id) || self.active == Some(id) {
            return false;
        }
        if owner.active_page() != Some(id) {
            let now = owner.now();
            if !owner.show(id, now) {
                return false;
            }
        }
        self.active = Some(id);
        true
    }
}

impl ContainerComponent for NavigationMenu {
    fn init(&mut self, owner: &mut Container) {
        self.rebuild(owner);
    }

    fn on_event(&mut self, owner: &mut Container, event: &Event) {
        match event.root() {
            "update" => self.rebuild(owner),
            "flip" => {
                self.follow(owner, event.args.page);
            }
            _ => {}
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
