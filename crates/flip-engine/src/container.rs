//! Container
//!
//! Owns the ordered page list, the current-position pointer and the
//! transition lock, and drives the navigation state machine. All timing
//! is host-driven: input handlers take the current time, `tick` fires
//! timers and transition completions, `pump` drains fetch completions.

use std::collections::HashMap;

use serde_json::Value;

use crate::component::{ComponentRegistry, ContainerComponent, PageComponent};
use crate::config::{build_page, FunctionRegistry, PageDef};
use crate::events::{Event, EventArgs, EventBus, HandlerId};
use crate::input::{key_action, Direction, InputState, Key};
use crate::loader::{
    parse_body, FetchBackend, FetchRequest, LoadError, MockFetch, ModuleRegistry, SourceKind,
    TicketId,
};
use crate::page::{Page, PageId, SlideAxis, Trigger};
use crate::router::{normalize_fragment, FragmentStore, MemoryFragment};
use crate::surface::{HeadlessSurface, RegionId, RenderSurface};
use crate::template::{Passthrough, TemplateEngine};
use crate::timer::{TimerKind, Timers};

/// Slide duration for page steps.
const STEP_SLIDE_MS: u64 = 400;

/// Slide duration for call-overlay entrance and exit.
const CALL_SLIDE_MS: u64 = 600;

/// Transition target: a position or a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Index(usize),
    Page(PageId),
}

impl From<usize> for Target {
    fn from(n: usize) -> Self {
        Self::Index(n)
    }
}

impl From<PageId> for Target {
    fn from(id: PageId) -> Self {
        Self::Page(id)
    }
}

/// Where a navigation call came from. Step delegation only happens for
/// user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Script,
}

/// Direction a call overlay enters from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFrom {
    Top,
    Bottom,
    Left,
    Right,
}

impl CallFrom {
    fn axis(self) -> SlideAxis {
        match self {
            Self::Top | Self::Bottom => SlideAxis::Vertical,
            Self::Left | Self::Right => SlideAxis::Horizontal,
        }
    }
}

#[derive(Debug, Clone)]
struct Ticket {
    page: PageId,
    kind: SourceKind,
    target: String,
    issued_at: f64,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    ends_at: f64,
    next: PageId,
    prev: Option<PageId>,
}

#[derive(Debug, Clone)]
struct PendingCall {
    source: PageId,
    overlay: PageId,
    from: Vec<CallFrom>,
}

#[derive(Debug, Clone, Copy)]
struct OverlayExit {
    id: PageId,
    ends_at: f64,
}

/// Builder for [`Container`]. Defaults: singly mode, 700 ms transition
/// delay, headless surface, passthrough templates, in-memory fragment
/// store and a [`MockFetch`] backend.
pub struct ContainerBuilder {
    singly: bool,
    start: usize,
    transition_delay_ms: u64,
    load_timeout_ms: Option<u64>,
    shared_data: HashMap<String, Value>,
    surface: Box<dyn RenderSurface>,
    template: Box<dyn TemplateEngine>,
    fragment: Box<dyn FragmentStore>,
    backend: Box<dyn FetchBackend>,
    modules: ModuleRegistry,
    functions: FunctionRegistry,
    components: ComponentRegistry<dyn ContainerComponent>,
    page_components: ComponentRegistry<dyn PageComponent>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            singly: true,
            start: 0,
            transition_delay_ms: 700,
            load_timeout_ms: None,
            shared_data: HashMap::new(),
            surface: Box::new(HeadlessSurface::default()),
            template: Box::new(Passthrough),
            fragment: Box::new(MemoryFragment::new()),
            backend: Box::new(MockFetch::new()),
            modules: ModuleRegistry::new(),
            functions: FunctionRegistry::new(),
            components: ComponentRegistry::new(),
            page_components: ComponentRegistry::new(),
        }
    }

    /// One page at a time (slide) vs continuous scroll.
    pub fn singly(mut self, singly: bool) -> Self {
        self.singly = singly;
        self
    }

    /// Fallback start position when no marker or start flag resolves.
    pub fn start(mut self, position: usize) -> Self {
        self.start = position;
        self
    }

    /// Slide duration and input-debounce window.
    pub fn transition_delay(mut self, ms: u64) -> Self {
        self.transition_delay_ms = ms;
        self
    }

    /// Fail fetch tickets older than this at pump time.
    pub fn load_timeout(mut self, ms: u64) -> Self {
        self.load_timeout_ms = Some(ms);
        self
    }

    /// Seed data handed to a page of this name when it is added.
    pub fn shared_data(mut self, name: &str, data: Value) -> Self {
        self.shared_data.insert(name.to_string(), data);
        self
    }

    pub fn surface(mut self, surface: impl RenderSurface + 'static) -> Self {
        self.surface = Box::new(surface);
        self
    }

    pub fn template_engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.template = Box::new(engine);
        self
    }

    pub fn fragment_store(mut self, store: impl FragmentStore + 'static) -> Self {
        self.fragment = Box::new(store);
        self
    }

    pub fn backend(mut self, backend: impl FetchBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    /// Register a script module reachable through the `mod:` scheme.
    pub fn module(
        mut self,
        name: &str,
        module: impl Fn(&mut Container, PageId) + 'static,
    ) -> Self {
        self.modules.register(name, module);
        self
    }

    /// Register a named callback for declarative hook attributes.
    pub fn function(
        mut self,
        name: &str,
        hook: impl Fn(&mut Container, PageId) + 'static,
    ) -> Self {
        self.functions.register(name, hook);
        self
    }

    /// Register a container component factory.
    pub fn component(
        mut self,
        name: &str,
        factory: impl Fn() -> Box<dyn ContainerComponent> + 'static,
    ) -> Self {
        self.components.register(name, factory);
        self
    }

    /// Register a page component factory, run for every added page.
    pub fn page_component(
        mut self,
        name: &str,
        factory: impl Fn() -> Box<dyn PageComponent> + 'static,
    ) -> Self {
        self.page_components.register(name, factory);
        self
    }

    pub fn build(self) -> Container {
        let components = self.components.instantiate();
        Container {
            singly: self.singly,
            width: 0.0,
            height: 0.0,
            transition_delay_ms: self.transition_delay_ms,
            load_timeout_ms: self.load_timeout_ms,
            start: self.start,
            locked: false,
            pages: Vec::new(),
            side_pages: Vec::new(),
            overlays: Vec::new(),
            current: None,
            active: None,
            context: None,
            flips: 0,
            next_id: 1,
            shared_data: self.shared_data,
            bus: EventBus::new(),
            components,
            components_initialized: false,
            page_components: self.page_components,
            functions: self.functions,
            surface: self.surface,
            template: self.template,
            fragment: self.fragment,
            backend: self.backend,
            modules: self.modules,
            timers: Timers::new(),
            tickets: HashMap::new(),
            next_ticket: 1,
            transition: None,
            pending_calls: Vec::new(),
            overlay_exits: Vec::new(),
            input: InputState::new(),
            clock_ms: 0.0,
        }
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The navigation state machine.
pub struct Container {
    /// One page visible at a time (slide) vs continuous scroll
    pub singly: bool,
    /// Last-measured viewport width
    pub width: f32,
    /// Last-measured viewport height
    pub height: f32,
    /// Slide duration and input-debounce window
    pub transition_delay_ms: u64,
    /// Fetch-ticket timeout, applied at pump time
    pub load_timeout_ms: Option<u64>,
    start: usize,
    locked: bool,

    pages: Vec<Page>,
    side_pages: Vec<Page>,
    overlays: Vec<Page>,
    current: Option<usize>,
    active: Option<PageId>,
    /// Page currently loading or most recently activated; save/restored
    /// around module invocation
    context: Option<PageId>,
    flips: u64,
    next_id: PageId,
    shared_data: HashMap<String, Value>,

    bus: EventBus,
    components: Vec<(String, Box<dyn ContainerComponent>)>,
    components_initialized: bool,
    page_components: ComponentRegistry<dyn PageComponent>,
    functions: FunctionRegistry,

    surface: Box<dyn RenderSurface>,
    template: Box<dyn TemplateEngine>,
    fragment: Box<dyn FragmentStore>,
    backend: Box<dyn FetchBackend>,
    modules: ModuleRegistry,

    timers: Timers,
    tickets: HashMap<TicketId, Ticket>,
    next_ticket: TicketId,
    transition: Option<Transition>,
    pending_calls: Vec<PendingCall>,
    overlay_exits: Vec<OverlayExit>,
    input: InputState,
    clock_ms: f64,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    // ------------------------------------------------------------------
    // Accessors

    /// Current position, if any page is active.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Id of the active page.
    pub fn active_page(&self) -> Option<PageId> {
        self.active
    }

    /// The active page.
    pub fn active(&self) -> Option<&Page> {
        self.active.and_then(|id| self.page(id))
    }

    /// Page currently loading or most recently activated.
    pub fn context_page(&self) -> Option<PageId> {
        self.context
    }

    /// Completed-transition counter.
    pub fn flips(&self) -> u64 {
        self.flips
    }

    /// Engine time, as last reported by the host.
    pub fn now(&self) -> f64 {
        self.clock_ms
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Indexed pages, in navigation order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Pages excluded from positional navigation.
    pub fn side_pages(&self) -> &[Page] {
        &self.side_pages
    }

    /// Live call overlays.
    pub fn overlays(&self) -> &[Page] {
        &self.overlays
    }

    /// Look up a registered page by id.
    pub fn get(&self, id: PageId) -> Option<&Page> {
        self.pages
            .iter()
            .chain(self.side_pages.iter())
            .find(|p| p.id == id)
    }

    /// Look up a registered page by name.
    pub fn get_by_name(&self, name: &str) -> Option<&Page> {
        self.pages
            .iter()
            .chain(self.side_pages.iter())
            .find(|p| p.name == name)
    }

    pub fn page_at(&self, position: usize) -> Option<&Page> {
        self.pages.get(position)
    }

    /// Position of an indexed page, by identity.
    pub fn position(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    pub fn has_index(&self, position: usize) -> bool {
        position < self.pages.len()
    }

    pub fn has_prev(&self) -> bool {
        matches!(self.current, Some(n) if n > 0)
    }

    pub fn has_next(&self) -> bool {
        match self.current {
            Some(n) => n + 1 < self.pages.len(),
            None => !self.pages.is_empty(),
        }
    }

    /// A live overlay by id.
    pub fn overlay(&self, id: PageId) -> Option<&Page> {
        self.overlays.iter().find(|p| p.id == id)
    }

    pub fn set_shared_data(&mut self, name: &str, data: Value) {
        self.shared_data.insert(name.to_string(), data);
    }

    /// Replace a page's data, e.g. from a script module.
    pub fn set_page_data(&mut self, id: PageId, data: Value) -> bool {
        match self.page_mut(id) {
            Some(page) => {
                page.data = data;
                true
            }
            None => false,
        }
    }

    /// Replace a page's inline template.
    pub fn set_page_template(&mut self, id: PageId, template: &str) -> bool {
        match self.page_mut(id) {
            Some(page) => {
                page.template = Some(template.to_string());
                true
            }
            None => false,
        }
    }

    /// A container component by registered name.
    pub fn component(&self, name: &str) -> Option<&dyn ContainerComponent> {
        self.components
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_ref())
    }

    /// A page component by registered name.
    pub fn page_component(&self, id: PageId, name: &str) -> Option<&dyn PageComponent> {
        self.page(id)?
            .components
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_ref())
    }

    fn page(&self, id: PageId) -> Option<&Page> {
        self.pages
            .iter()
            .chain(self.side_pages.iter())
            .chain(self.overlays.iter())
            .find(|p| p.id == id)
    }

    fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages
            .iter_mut()
            .chain(self.side_pages.iter_mut())
            .chain(self.overlays.iter_mut())
            .find(|p| p.id == id)
    }

    // ------------------------------------------------------------------
    // Registration

    /// Register a page: assigns its id, seeds shared data by name,
    /// creates its render region, attaches page components and emits
    /// `update`. Auto-load pages start their load pipeline immediately.
    pub fn add(&mut self, mut page: Page, now: f64) -> PageId {
        let id = self.next_id;
        self.next_id += 1;
        page.id = id;

        if let Some(shared) = self.shared_data.get(&page.name) {
            page.data = shared.clone();
        }
        if page.region.is_none() {
            page.region = Some(self.surface.create_region(self.height));
        }
        if !page.indexed {
            if let Some(region) = page.region {
                self.surface.set_visible(region, false);
            }
        }
        page.components = self.page_components.instantiate();

        let auto = page.auto_load;
        if page.indexed {
            self.pages.push(page);
        } else {
            self.side_pages.push(page);
        }
        if auto {
            self.init_page(id, now);
        }
        self.emit_container(
            "update",
            EventArgs {
                page: Some(id),
                ..Default::default()
            },
        );
        id
    }

    /// Unregister a page. The active page cannot be removed.
    pub fn remove(&mut self, id: PageId) -> bool {
        if self.active == Some(id) {
            return false;
        }
        let page = if let Some(i) = self.pages.iter().position(|p| p.id == id) {
            if let Some(current) = self.current {
                if i < current {
                    self.current = Some(current - 1);
                }
            }
            self.pages.remove(i)
        } else if let Some(i) = self.side_pages.iter().position(|p| p.id == id) {
            self.side_pages.remove(i)
        } else {
            return false;
        };
        if let Some(timer) = page.refresh_timer {
            self.timers.cancel(timer);
        }
        if let Some(region) = page.region {
            self.surface.remove_region(region);
        }
        self.emit_container(
            "update",
            EventArgs {
                page: Some(id),
                ..Default::default()
            },
        );
        true
    }

    /// Scan declarative definitions, resolve the start page (fragment
    /// match, then start flag, then the configured position) and enter
    /// it directly.
    pub fn bootstrap(&mut self, defs: &[PageDef], now: f64) -> bool {
        self.clock_ms = now;
        let (width, height) = self.surface.measure();
        self.width = width;
        self.height = height;

        let functions = self.functions.clone();
        for def in defs {
            let page = build_page(def, &functions);
            self.add(page, now);
        }

        let mut start = Target::Index(self.start);
        let mut matched = false;
        if let Some(marker) = self.marker() {
            for i in 0..self.pages.len() {
                if self.pages[i].match_marker(&marker) {
                    start = Target::Index(i);
                    matched = true;
                    break;
                }
            }
        }
        if !matched {
            if let Some(i) = self.pages.iter().position(|p| p.start_page) {
                start = Target::Index(i);
            }
        }

        self.emit_container("init", EventArgs::default());
        self.goto(start, true, Origin::Script, now)
    }

    // ------------------------------------------------------------------
    // Transitions

    /// Transition to an indexed page.
    ///
    /// Returns false without side effects when the target does not
    /// resolve or is already active. When the active page consumes the
    /// gesture as an internal step, returns true without moving. A
    /// container locked at the `beforeleave` checkpoint aborts the
    /// transition; this is the only path where `beforeleave` fires
    /// without a completed transition.
    pub fn goto(&mut self, target: Target, direct: bool, origin: Origin, now: f64) -> bool {
        self.clock_ms = now;
        let n = match self.resolve(target) {
            Some(n) => n,
            None => return false,
        };
        if Some(n) == self.current {
            return false;
        }

        let prev_id = self.active;
        let next_id = self.pages[n].id;

        if let Some(prev) = prev_id {
            if origin == Origin::User {
                let steps = self.page(prev).map(|p| p.steps).unwrap_or(0);
                if steps > 0 {
                    let position = self.position(prev).unwrap_or(0);
                    let walk = if n > position { 1 } else { -1 };
                    if self.step_by(prev, walk, now) {
                        return true;
                    }
                }
            }
            self.exit_page(prev);
            self.emit_page(prev, "beforeleave", EventArgs::default());
            if self.locked {
                return false;
            }
        }

        self.current = Some(n);
        self.active = Some(next_id);
        self.flips += 1;

        self.init_page(next_id, now);

        let (load_prev, load_next) = self
            .pages
            .get(n)
            .map(|p| (p.load_prev, p.load_next))
            .unwrap_or((false, false));
        if load_prev && n > 0 {
            let neighbor = self.pages[n - 1].id;
            self.init_page(neighbor, now);
        }
        if load_next && n + 1 < self.pages.len() {
            let neighbor = self.pages[n + 1].id;
            self.init_page(neighbor, now);
        }

        self.emit_page(next_id, "beforeenter", EventArgs::default());
        self.mark(None);

        let duration = if direct {
            0
        } else {
            self.page(next_id)
                .map(|p| p.slide_duration_ms)
                .unwrap_or(0)
        };
        self.begin_transition(n, next_id, prev_id, duration, now);
        true
    }

    pub fn prev(&mut self, direct: bool, origin: Origin, now: f64) -> bool {
        match self.current {
            Some(n) if n > 0 => self.goto(Target::Index(n - 1), direct, origin, now),
            _ => false,
        }
    }

    pub fn next(&mut self, direct: bool, origin: Origin, now: f64) -> bool {
        let n = self.current.map(|c| c + 1).unwrap_or(0);
        self.goto(Target::Index(n), direct, origin, now)
    }

    /// Navigate to a page by id.
    pub fn show(&mut self, id: PageId, now: f64) -> bool {
        self.goto(Target::Page(id), false, Origin::Script, now)
    }

    fn resolve(&self, target: Target) -> Option<usize> {
        match target {
            Target::Index(n) => (n < self.pages.len()).then_some(n),
            Target::Page(id) => self.position(id),
        }
    }

    fn begin_transition(
        &mut self,
        n: usize,
        next: PageId,
        prev: Option<PageId>,
        duration_ms: u64,
        now: f64,
    ) {
        if let Some(transition) = self.transition.take() {
            // a new transition flushes the previous one
            self.finish_transition(transition);
        }
        if self.singly {
            self.surface
                .slide_container(SlideAxis::Vertical, -(n as f32) * self.height, duration_ms);
        } else {
            let top = self
                .pages
                .get(n)
                .and_then(|p| p.region)
                .map(|r| self.surface.region_top(r))
                .unwrap_or(0.0);
            self.surface.scroll_viewport(top, duration_ms);
        }
        let transition = Transition {
            ends_at: now + duration_ms as f64,
            next,
            prev,
        };
        if duration_ms == 0 {
            self.finish_transition(transition);
        } else {
            self.transition = Some(transition);
        }
    }

    fn finish_transition(&mut self, transition: Transition) {
        self.context = Some(transition.next);
        self.emit_container(
            "flip",
            EventArgs {
                page: Some(transition.next),
                other: transition.prev,
                ..Default::default()
            },
        );
        if let Some(prev) = transition.prev {
            self.emit_page(prev, "leave", EventArgs::default());
        }
        self.emit_page(transition.next, "enter", EventArgs::default());
    }

    fn exit_page(&mut self, id: PageId) {
        let timer = match self.page(id) {
            Some(p) if p.refresh_every_ms > 0 && !p.refresh_hidden => p.refresh_timer,
            _ => None,
        };
        if let Some(timer) = timer {
            self.timers.cancel(timer);
            if let Some(p) = self.page_mut(id) {
                p.refresh_timer = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Routing

    /// Set the fragment to an explicit marker, the active page's mask,
    /// or its pattern's canonical form, and emit `mark`.
    pub fn mark(&mut self, marker: Option<&str>) -> Option<String> {
        let resolved = match marker {
            Some(m) => m.to_string(),
            None => {
                let active = self.active?;
                let page = self.page(active)?;
                page.marker_mask
                    .clone()
                    .or_else(|| page.marker.as_ref().map(|m| m.canonical()))
                    .unwrap_or_default()
            }
        };
        self.fragment.set(&resolved);
        self.emit_container(
            "mark",
            EventArgs {
                text: Some(resolved.clone()),
                ..Default::default()
            },
        );
        Some(resolved)
    }

    /// Current normalized fragment, if any.
    pub fn marker(&self) -> Option<String> {
        normalize_fragment(&self.fragment.get())
    }

    // ------------------------------------------------------------------
    // Load pipeline

    /// Start a page's load pipeline. Idempotent: a loaded page only
    /// re-emits `init`; a page with fetches in flight is left alone.
    pub fn init_page(&mut self, id: PageId, now: f64) {
        let (refresh, has_timer, loaded, pending, content_url, template_url) =
            match self.page(id) {
                Some(p) => (
                    p.refresh_every_ms,
                    p.refresh_timer.is_some(),
                    p.loaded,
                    p.pending,
                    p.content_url.clone(),
                    p.template_url.clone(),
                ),
                None => return,
            };

        if refresh > 0 && !has_timer {
            let timer = self.timers.every(now, refresh, TimerKind::Refresh(id));
            if let Some(p) = self.page_mut(id) {
                p.refresh_timer = Some(timer);
            }
        }

        if loaded {
            self.emit_page(id, "init", EventArgs::default());
            return;
        }
        if pending > 0 {
            return;
        }

        if content_url.is_some() || template_url.is_some() {
            let count = content_url.is_some() as u32 + template_url.is_some() as u32;
            if let Some(p) = self.page_mut(id) {
                p.pending += count;
            }
            if let Some(target) = template_url {
                self.fetch_source(id, SourceKind::Template, &target, now);
            }
            if let Some(target) = content_url {
                self.fetch_source(id, SourceKind::Content, &target, now);
            }
        } else {
            self.mount(id, None, None);
        }
    }

    /// Render and display a page's content.
    ///
    /// Fails while resources are pending or the page is failed. Marks
    /// the page loaded unless it waits for an explicit mount; the
    /// explicit signal is [`Container::complete_mount`].
    pub fn mount(&mut self, id: PageId, data: Option<Value>, template: Option<String>) -> bool {
        {
            let Some(page) = self.page_mut(id) else {
                return false;
            };
            if let Some(d) = data {
                page.data = d;
            }
            if let Some(t) = template {
                page.template = Some(t);
            }
            if page.pending > 0 || page.failed {
                return false;
            }
        }
        self.render_content(id);
        if let Some(page) = self.page_mut(id) {
            if !page.wait_for_mount {
                page.loaded = true;
            }
        }
        self.rebind(id);
        self.emit_page(id, "load", EventArgs::default());
        self.emit_page(id, "init", EventArgs::default());
        self.service_pending_calls(id);
        true
    }

    /// Explicit readiness signal for `wait_for_mount` pages.
    pub fn complete_mount(&mut self, id: PageId) -> bool {
        match self.page_mut(id) {
            Some(p) if p.pending == 0 && !p.failed => {
                p.loaded = true;
                true
            }
            _ => false,
        }
    }

    /// Clear a failed page and re-submit its failed sources.
    pub fn retry(&mut self, id: PageId, now: f64) -> bool {
        let sources = match self.page_mut(id) {
            Some(p) if p.failed => {
                p.failed = false;
                std::mem::take(&mut p.failed_sources)
            }
            _ => return false,
        };
        if sources.is_empty() {
            return false;
        }
        if let Some(p) = self.page_mut(id) {
            p.pending += sources.len() as u32;
        }
        for (kind, target) in sources {
            self.fetch_source(id, kind, &target, now);
        }
        true
    }

    /// Drain fetch completions and expire timed-out tickets.
    pub fn pump(&mut self, now: f64) {
        self.clock_ms = now;
        for completion in self.backend.poll() {
            let Some(ticket) = self.tickets.remove(&completion.ticket) else {
                continue;
            };
            self.apply_completion(ticket, completion.result);
        }
        if let Some(timeout) = self.load_timeout_ms {
            let expired: Vec<(TicketId, Ticket)> = self
                .tickets
                .iter()
                .filter(|(_, t)| now - t.issued_at >= timeout as f64)
                .map(|(id, t)| (*id, t.clone()))
                .collect();
            for (ticket_id, ticket) in expired {
                self.tickets.remove(&ticket_id);
                let target = ticket.target.clone();
                self.apply_completion(ticket, Err(LoadError::Timeout(target)));
            }
        }
    }

    /// Advance engine time: transition completions, overlay exits,
    /// refresh timers, then fetch completions.
    pub fn tick(&mut self, now: f64) {
        self.clock_ms = now;
        if let Some(transition) = self.transition.take() {
            if now >= transition.ends_at {
                self.finish_transition(transition);
            } else {
                self.transition = Some(transition);
            }
        }
        let exits = std::mem::take(&mut self.overlay_exits);
        let (done, rest): (Vec<_>, Vec<_>) = exits.into_iter().partition(|e| now >= e.ends_at);
        self.overlay_exits = rest;
        for exit in done {
            self.finalize_overlay(exit.id);
        }
        for kind in self.timers.fire_due(now) {
            match kind {
                TimerKind::Refresh(id) => self.refresh_page(id, now),
            }
        }
        self.pump(now);
    }

    fn fetch_source(&mut self, id: PageId, kind: SourceKind, target: &str, now: f64) {
        if let Some(name) = target.strip_prefix("mod:") {
            self.load_module(id, kind, name, target);
        } else {
            let cacheable = self.page(id).map(|p| p.cacheable).unwrap_or(true);
            self.submit_fetch(id, kind, target, now, cacheable);
        }
    }

    fn submit_fetch(&mut self, page: PageId, kind: SourceKind, target: &str, now: f64, cacheable: bool) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.tickets.insert(
            ticket,
            Ticket {
                page,
                kind,
                target: target.to_string(),
                issued_at: now,
            },
        );
        self.backend.submit(FetchRequest {
            ticket,
            target: target.to_string(),
            cacheable,
        });
    }

    /// Invoke a script module with the loading page as context. The
    /// context is restored afterward when the loaded page is not
    /// indexed.
    fn load_module(&mut self, id: PageId, kind: SourceKind, name: &str, target: &str) {
        let module = self.modules.get(name);
        let saved = self.context;
        self.context = Some(id);
        let found = match module {
            Some(module) => {
                (*module)(self, id);
                true
            }
            None => false,
        };
        let indexed = self.page(id).map(|p| p.indexed).unwrap_or(true);
        if !indexed {
            self.context = saved;
        }
        if found {
            self.finish_source(id);
        } else {
            self.fail_source(id, kind, target, LoadError::UnknownModule(name.to_string()));
        }
    }

    fn apply_completion(&mut self, ticket: Ticket, result: Result<String, LoadError>) {
        match (ticket.kind, result) {
            (SourceKind::Refresh, Ok(body)) => self.apply_refresh(ticket.page, body),
            (SourceKind::Refresh, Err(error)) => {
                log::warn!("page {}: refresh fetch failed: {error}", ticket.page);
            }
            (kind, Ok(body)) => {
                if let Some(page) = self.page_mut(ticket.page) {
                    match kind {
                        SourceKind::Content => page.data = parse_body(body),
                        SourceKind::Template => page.template = Some(body),
                        SourceKind::Refresh => {}
                    }
                }
                self.finish_source(ticket.page);
            }
            (kind, Err(error)) => self.fail_source(ticket.page, kind, &ticket.target, error),
        }
    }

    fn finish_source(&mut self, id: PageId) {
        if let Some(page) = self.page_mut(id) {
            page.pending = page.pending.saturating_sub(1);
        }
        let ready = match self.page(id) {
            Some(p) => p.pending == 0 && !p.failed && !p.loaded && !p.wait_for_mount,
            None => false,
        };
        if ready {
            self.mount(id, None, None);
        }
    }

    fn fail_source(&mut self, id: PageId, kind: SourceKind, target: &str, error: LoadError) {
        let message = error.to_string();
        if let Some(page) = self.page_mut(id) {
            page.pending = page.pending.saturating_sub(1);
            page.failed = true;
            page.failed_sources.push((kind, target.to_string()));
        }
        log::warn!("page {id}: {message}");
        self.emit_page(
            id,
            "loadfail",
            EventArgs {
                text: Some(message),
                ..Default::default()
            },
        );
    }

    fn refresh_page(&mut self, id: PageId, now: f64) {
        self.emit_page(id, "refresh", EventArgs::default());
        let url = self.page(id).and_then(|p| p.content_url.clone());
        if let Some(target) = url {
            // refresh always bypasses the cache
            self.submit_fetch(id, SourceKind::Refresh, &target, now, false);
        }
    }

    fn apply_refresh(&mut self, id: PageId, body: String) {
        if let Some(page) = self.page_mut(id) {
            page.data = parse_body(body);
        }
        self.render_content(id);
    }

    fn render_content(&mut self, id: PageId) -> bool {
        let (template, data, region) = match self.page(id) {
            Some(p) => (p.template.clone(), p.data.clone(), p.region),
            None => return false,
        };
        let output = match template {
            Some(tpl) => Some(self.template.render(&tpl, &data)),
            None => literal_content(&data),
        };
        match output {
            Some(markup) => {
                if let Some(region) = region {
                    self.surface.set_content(region, &markup);
                }
                if let Some(page) = self.page_mut(id) {
                    page.content = Some(markup);
                }
                true
            }
            None => false,
        }
    }

    fn rebind(&mut self, id: PageId) {
        let region = self.page(id).and_then(|p| p.region);
        if let Some(region) = region {
            if self.height > 0.0 {
                self.surface.set_region_height(region, self.height);
            }
        }
    }

    // ------------------------------------------------------------------
    // Steps

    /// Jump to a page step.
    pub fn step_to(&mut self, id: PageId, step: u32, now: f64) -> bool {
        match self.page(id) {
            Some(p) if step < p.steps => self.apply_step(id, step, now),
            _ => false,
        }
    }

    /// Walk the active page's steps; false at either boundary.
    pub(crate) fn step_by(&mut self, id: PageId, walk: i32, now: f64) -> bool {
        let Some(page) = self.page(id) else {
            return false;
        };
        let target = page.current_step as i64 + walk as i64;
        if target < 0 || target >= page.steps as i64 {
            return false;
        }
        self.apply_step(id, target as u32, now)
    }

    fn apply_step(&mut self, id: PageId, step: u32, _now: f64) -> bool {
        let (region, axis) = match self.page_mut(id) {
            Some(page) => {
                page.current_step = step;
                (page.region, page.slide_axis)
            }
            None => return false,
        };
        if let Some(region) = region {
            let offset = -(step as f32) * self.height;
            self.surface.slide_region(region, axis, offset, STEP_SLIDE_MS);
        }
        true
    }

    // ------------------------------------------------------------------
    // Input

    /// Keyboard navigation, debounced and filtered by the active page's
    /// accepted triggers. Only meaningful in singly mode.
    pub fn key_up(&mut self, key: Key, now: f64) -> bool {
        self.clock_ms = now;
        if !self.singly || !self.input.try_acquire(now, self.transition_delay_ms) {
            return false;
        }
        let (trigger, direction) = key_action(key);
        if !self.active_accepts(trigger) {
            return false;
        }
        self.navigate(direction, now)
    }

    /// Wheel navigation: negative delta scrolls up (previous page).
    pub fn wheel(&mut self, delta_y: f32, now: f64) -> bool {
        self.clock_ms = now;
        if !self.singly || !self.input.try_acquire(now, self.transition_delay_ms) {
            return false;
        }
        if !self.active_accepts(Trigger::Wheel) {
            return false;
        }
        let direction = if delta_y < 0.0 {
            Direction::Prev
        } else {
            Direction::Next
        };
        self.navigate(direction, now)
    }

    pub fn touch_begin(&mut self, y: f32) {
        self.input.touch_start(y);
    }

    /// Touch-swipe navigation; ignores moves below the swipe threshold.
    pub fn touch_move(&mut self, y: f32, now: f64) -> bool {
        self.clock_ms = now;
        if !self.singly || !self.input.try_acquire(now, self.transition_delay_ms) {
            return false;
        }
        match self.input.touch_direction(y) {
            Some(direction) => self.navigate(direction, now),
            None => false,
        }
    }

    /// Scroll-mode activation: select the page whose region top sits at
    /// or above the viewport midpoint.
    pub fn on_scroll(&mut self, viewport_mid: f32, now: f64) -> bool {
        if self.singly {
            return false;
        }
        for i in (0..self.pages.len()).rev() {
            let top = match self.pages[i].region {
                Some(region) => self.surface.region_top(region),
                None => continue,
            };
            if viewport_mid >= top {
                if Some(i) == self.current {
                    return false;
                }
                return self.goto(Target::Index(i), true, Origin::Script, now);
            }
        }
        false
    }

    /// Re-measure the viewport, re-apply page heights and re-align the
    /// active page.
    pub fn resize(&mut self, now: f64) {
        self.clock_ms = now;
        let (width, height) = self.surface.measure();
        self.width = width;
        self.height = height;
        if !self.singly {
            return;
        }
        let regions: Vec<RegionId> = self.pages.iter().filter_map(|p| p.region).collect();
        for region in regions {
            self.surface.set_region_height(region, height);
        }
        if let (Some(n), Some(id)) = (self.current, self.active) {
            self.surface
                .slide_container(SlideAxis::Vertical, -(n as f32) * height, 0);
            self.emit_page(id, "resize", EventArgs::default());
        }
    }

    fn navigate(&mut self, direction: Direction, now: f64) -> bool {
        match direction {
            Direction::Prev => self.prev(false, Origin::User, now),
            Direction::Next => self.next(false, Origin::User, now),
        }
    }

    fn active_accepts(&self, trigger: Trigger) -> bool {
        self.active()
            .map(|p| p.accepts(trigger))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Call overlays

    /// Invoke a page as a disposable overlay: a non-indexed copy of the
    /// target's configuration with its own region, slid in from the
    /// given direction(s) once the target's content is ready. Emits
    /// `call` on the caller.
    pub fn call(
        &mut self,
        caller: PageId,
        target: PageId,
        from: &[CallFrom],
        now: f64,
    ) -> Option<PageId> {
        let (overlay, source_loaded) = {
            let source = self.page(target)?;
            (source.to_overlay(), source.loaded)
        };

        let id = self.next_id;
        self.next_id += 1;
        let mut overlay = overlay;
        overlay.id = id;
        overlay.region = Some(self.surface.create_region(self.height));
        if let Some(region) = overlay.region {
            self.surface.set_visible(region, false);
        }
        overlay.components = self.page_components.instantiate();
        self.overlays.push(overlay);

        let from = if from.is_empty() {
            vec![CallFrom::Left]
        } else {
            from.to_vec()
        };

        self.emit_page(
            caller,
            "call",
            EventArgs {
                page: Some(id),
                ..Default::default()
            },
        );

        if source_loaded {
            self.complete_call(id, target, &from);
        } else {
            self.pending_calls.push(PendingCall {
                source: target,
                overlay: id,
                from,
            });
            self.init_page(target, now);
        }
        Some(id)
    }

    /// Play an overlay's exit slide; the overlay is dropped when the
    /// slide completes at tick time.
    pub fn drop_overlay(&mut self, id: PageId, now: f64) -> bool {
        if !self.overlays.iter().any(|p| p.id == id) {
            return false;
        }
        self.emit_page(id, "beforeleave", EventArgs::default());
        let (region, axis) = match self.page(id) {
            Some(p) => (p.region, p.slide_axis),
            None => return false,
        };
        if let Some(region) = region {
            let offset = match axis {
                SlideAxis::Vertical => self.height,
                SlideAxis::Horizontal => self.width,
            };
            self.surface.slide_region(region, axis, offset, CALL_SLIDE_MS);
        }
        self.overlay_exits.push(OverlayExit {
            id,
            ends_at: now + CALL_SLIDE_MS as f64,
        });
        true
    }

    fn complete_call(&mut self, overlay: PageId, source: PageId, from: &[CallFrom]) {
        let (data, template) = match self.page(source) {
            Some(p) => (p.data.clone(), p.template.clone()),
            None => return,
        };
        self.mount(overlay, Some(data), template);
        let region = self.page(overlay).and_then(|p| p.region);
        if let Some(region) = region {
            self.surface.set_visible(region, true);
            for direction in from {
                self.surface
                    .slide_region(region, direction.axis(), 0.0, CALL_SLIDE_MS);
            }
        }
    }

    fn service_pending_calls(&mut self, source: PageId) {
        let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_calls)
            .into_iter()
            .partition(|c| c.source == source);
        self.pending_calls = rest;
        for call in due {
            self.complete_call(call.overlay, call.source, &call.from);
        }
    }

    fn finalize_overlay(&mut self, id: PageId) {
        self.emit_page(id, "leave", EventArgs::default());
        self.emit_page(id, "drop", EventArgs::default());
        let region = self.overlays.iter().find(|p| p.id == id).and_then(|p| p.region);
        if let Some(region) = region {
            self.surface.remove_region(region);
        }
        self.overlays.retain(|p| p.id != id);
        self.pending_calls.retain(|c| c.overlay != id);
    }

    // ------------------------------------------------------------------
    // Events

    /// Subscribe to container events.
    pub fn on(&mut self, topic: &str, callback: impl FnMut(&Event) + 'static) -> HandlerId {
        self.bus.on(topic, callback)
    }

    /// Subscribe to a single container event.
    pub fn once(&mut self, topic: &str, callback: impl FnMut(&Event) + 'static) -> HandlerId {
        self.bus.once(topic, callback)
    }

    pub fn off(&mut self, topic: &str) {
        self.bus.off(topic);
    }

    pub fn off_handler(&mut self, id: HandlerId) {
        self.bus.off_handler(id);
    }

    /// Emit a container event.
    pub fn trigger(&mut self, topic: &str, args: EventArgs) {
        self.emit_container(topic, args);
    }

    /// Subscribe to a page's events.
    pub fn page_on(
        &mut self,
        id: PageId,
        topic: &str,
        callback: impl FnMut(&Event) + 'static,
    ) -> Option<HandlerId> {
        self.page_mut(id).map(|p| p.bus.on(topic, callback))
    }

    /// Subscribe to a single page event.
    pub fn page_once(
        &mut self,
        id: PageId,
        topic: &str,
        callback: impl FnMut(&Event) + 'static,
    ) -> Option<HandlerId> {
        self.page_mut(id).map(|p| p.bus.once(topic, callback))
    }

    pub fn page_off(&mut self, id: PageId, topic: &str) {
        if let Some(page) = self.page_mut(id) {
            page.bus.off(topic);
        }
    }

    /// Emit a page event.
    pub fn page_trigger(&mut self, id: PageId, topic: &str, args: EventArgs) {
        self.emit_page(id, topic, args);
    }

    fn emit_container(&mut self, topic: &str, args: EventArgs) {
        let event = Event::new(topic, args);
        self.bus.trigger(&event);

        let first_init = event.root() == "init" && !self.components_initialized;
        if first_init {
            self.components_initialized = true;
        }
        let mut components = std::mem::take(&mut self.components);
        if first_init {
            for (_, component) in components.iter_mut() {
                component.init(self);
            }
        }
        for (_, component) in components.iter_mut() {
            component.on_event(self, &event);
        }
        let added = std::mem::take(&mut self.components);
        self.components = components;
        self.components.extend(added);
    }

    fn emit_page(&mut self, id: PageId, topic: &str, mut args: EventArgs) {
        if args.page.is_none() {
            args.page = Some(id);
        }
        let event = Event::new(topic, args);
        match self.page_mut(id) {
            Some(page) => page.bus.trigger(&event),
            None => return,
        }

        let hook = self.page(id).and_then(|p| p.hooks.for_topic(event.root()));
        if let Some(hook) = hook {
            (*hook)(self, id);
        }

        let (mut components, first_init) = match self.page_mut(id) {
            Some(page) => {
                let first = event.root() == "init" && !page.components_initialized;
                if first {
                    page.components_initialized = true;
                }
                (std::mem::take(&mut page.components), first)
            }
            None => return,
        };
        if first_init {
            for (_, component) in components.iter_mut() {
                component.init(self, id);
            }
        }
        for (_, component) in components.iter_mut() {
            component.on_event(self, id, &event);
        }
        if let Some(page) = self.page_mut(id) {
            let added = std::mem::take(&mut page.components);
            page.components = components;
            page.components.extend(added);
        }
    }
}

fn literal_content(data: &Value) -> Option<String> {
    match data {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map.get("content").map(|v| match v {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }),
        other => Some(other.to_string()),
    }
}
