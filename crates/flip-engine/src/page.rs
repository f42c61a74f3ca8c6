//! Page
//!
//! A content unit inside a container: identity, load configuration,
//! lifecycle state and sub-step navigation.

use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;

use crate::component::PageComponent;
use crate::container::Container;
use crate::events::EventBus;
use crate::loader::SourceKind;
use crate::router::Marker;
use crate::surface::RegionId;
use crate::timer::TimerId;

/// Page id type
pub type PageId = u32;

/// Axis a page slides along during steps and overlay transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideAxis {
    #[default]
    Vertical,
    Horizontal,
}

/// Input source a page accepts for slide navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Wheel,
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
}

impl Trigger {
    /// Parse a trigger name from a declarative definition.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mousewheel" | "wheel" => Some(Self::Wheel),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "enter" => Some(Self::Enter),
            "esc" | "escape" => Some(Self::Esc),
            _ => None,
        }
    }
}

/// Default accepted triggers: wheel and arrow keys, but not enter/esc.
pub fn default_triggers() -> HashSet<Trigger> {
    [
        Trigger::Wheel,
        Trigger::Up,
        Trigger::Down,
        Trigger::Left,
        Trigger::Right,
    ]
    .into_iter()
    .collect()
}

/// A lifecycle hook. Hooks receive the owning container and the page id
/// so they can navigate or mutate state.
pub type Hook = Rc<dyn Fn(&mut Container, PageId)>;

/// Optional lifecycle hooks, all no-ops by default.
#[derive(Clone, Default)]
pub struct PageHooks {
    pub load: Option<Hook>,
    pub enter: Option<Hook>,
    pub leave: Option<Hook>,
    pub before_enter: Option<Hook>,
    pub before_leave: Option<Hook>,
    pub resize: Option<Hook>,
    pub refresh: Option<Hook>,
    pub call: Option<Hook>,
    pub drop: Option<Hook>,
}

impl PageHooks {
    /// Hook matching the root topic of an event, if any.
    pub fn for_topic(&self, root: &str) -> Option<Hook> {
        match root {
            "load" => self.load.clone(),
            "enter" => self.enter.clone(),
            "leave" => self.leave.clone(),
            "beforeenter" => self.before_enter.clone(),
            "beforeleave" => self.before_leave.clone(),
            "resize" => self.resize.clone(),
            "refresh" => self.refresh.clone(),
            "call" => self.call.clone(),
            "drop" => self.drop.clone(),
            _ => None,
        }
    }

    /// Assign a hook by its declarative attribute name (`onload`, ...).
    pub fn set(&mut self, attr: &str, hook: Hook) -> bool {
        let slot = match attr {
            "onload" => &mut self.load,
            "onenter" => &mut self.enter,
            "onleave" => &mut self.leave,
            "onbeforeenter" => &mut self.before_enter,
            "onbeforeleave" => &mut self.before_leave,
            "onresize" => &mut self.resize,
            "onrefresh" => &mut self.refresh,
            "oncall" => &mut self.call,
            "ondrop" => &mut self.drop,
            _ => return false,
        };
        *slot = Some(hook);
        true
    }
}

/// A content unit.
///
/// Pages are registered on a [`Container`] via `add`, which assigns the
/// id and seeds shared data. Position inside the container is computed
/// by identity lookup, never stored here.
pub struct Page {
    /// Unique id, assigned at add time
    pub id: PageId,
    /// Author-supplied name, used for lookup and shared-data keying
    pub name: String,

    // Load configuration
    pub content_url: Option<String>,
    pub template_url: Option<String>,
    /// Load as soon as the page is added
    pub auto_load: bool,
    /// Prefetch the previous page on enter
    pub load_prev: bool,
    /// Prefetch the next page on enter
    pub load_next: bool,
    pub cacheable: bool,
    /// Defer automatic mounting to an explicit caller
    pub wait_for_mount: bool,

    // Lifecycle state
    pub loaded: bool,
    pub failed: bool,
    pub(crate) pending: u32,
    pub(crate) failed_sources: Vec<(SourceKind, String)>,
    pub refresh_every_ms: u64,
    /// Keep refreshing while the page is hidden
    pub refresh_hidden: bool,
    pub(crate) refresh_timer: Option<TimerId>,

    // Routing
    pub marker: Option<Marker>,
    /// Literal marker override
    pub marker_mask: Option<String>,
    /// Captured groups from the last marker match
    pub last_match: Vec<String>,

    // Sub-navigation
    pub steps: u32,
    pub current_step: u32,

    // Transition configuration
    pub slide_axis: SlideAxis,
    pub slide_triggers: HashSet<Trigger>,
    pub slide_duration_ms: u64,

    /// Participates in positional navigation
    pub indexed: bool,
    /// Candidate for initial position when no marker resolves
    pub start_page: bool,
    /// Disposable call overlay
    pub overlay: bool,

    // Content
    pub data: Value,
    pub template: Option<String>,
    /// Last mounted output
    pub content: Option<String>,

    pub hooks: PageHooks,
    pub(crate) bus: EventBus,
    pub(crate) components: Vec<(String, Box<dyn PageComponent>)>,
    pub(crate) components_initialized: bool,
    pub(crate) region: Option<RegionId>,
}

impl Page {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            content_url: None,
            template_url: None,
            auto_load: false,
            load_prev: false,
            load_next: false,
            cacheable: true,
            wait_for_mount: false,
            loaded: false,
            failed: false,
            pending: 0,
            failed_sources: Vec::new(),
            refresh_every_ms: 0,
            refresh_hidden: false,
            refresh_timer: None,
            marker: None,
            marker_mask: None,
            last_match: Vec::new(),
            steps: 0,
            current_step: 0,
            slide_axis: SlideAxis::Vertical,
            slide_triggers: default_triggers(),
            slide_duration_ms: 400,
            indexed: true,
            start_page: false,
            overlay: false,
            data: Value::Null,
            template: None,
            content: None,
            hooks: PageHooks::default(),
            bus: EventBus::new(),
            components: Vec::new(),
            components_initialized: false,
            region: None,
        }
    }

    /// Compile and set the routing pattern.
    pub fn set_marker(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.marker = Some(Marker::compile(pattern)?);
        Ok(())
    }

    /// Outstanding resource fetches gating mount.
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Whether this page accepts a navigation trigger.
    pub fn accepts(&self, trigger: Trigger) -> bool {
        self.slide_triggers.contains(&trigger)
    }

    /// Match a marker against this page's pattern, capturing groups.
    pub fn match_marker(&mut self, marker: &str) -> bool {
        match &self.marker {
            Some(m) => match m.matches(marker) {
                Some(groups) => {
                    self.last_match = groups;
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Region this page renders into, once added.
    pub fn region(&self) -> Option<RegionId> {
        self.region
    }

    /// Build a disposable overlay sharing this page's configuration and
    /// current content, but owning its own region and lifecycle.
    pub(crate) fn to_overlay(&self) -> Self {
        let mut overlay = Self::new(&self.name);
        overlay.content_url = self.content_url.clone();
        overlay.template_url = self.template_url.clone();
        overlay.cacheable = self.cacheable;
        overlay.slide_axis = self.slide_axis;
        overlay.slide_duration_ms = self.slide_duration_ms;
        overlay.data = self.data.clone();
        overlay.template = self.template.clone();
        overlay.content = self.content.clone();
        overlay.loaded = self.loaded;
        overlay.hooks = self.hooks.clone();
        overlay.indexed = false;
        overlay.overlay = true;
        overlay
    }
}
