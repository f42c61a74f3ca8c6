//! Flip Engine
//!
//! A client-side content-navigation engine: ordered pages inside a
//! container, slide or scroll transitions between them, URL-fragment
//! routing and on-demand content loading.
//!
//! # Design
//! - Single-threaded and host-driven: input handlers take the current
//!   time, `tick` fires timers and transition completions, `pump`
//!   drains fetch completions.
//! - Rendering, templating, fragment storage and transport sit behind
//!   narrow traits; headless defaults make the engine fully testable.
//! - Containers and pages are extended through component registries,
//!   never subclassed.
//!
//! # Example
//! ```rust
//! use flip_engine::{Container, PageDef};
//!
//! let mut container = Container::builder().build();
//! let defs = [
//!     PageDef::new("home").attr("start", "true").attr("marker", "home"),
//!     PageDef::new("news").attr("marker", "news"),
//! ];
//! container.bootstrap(&defs, 0.0);
//! assert_eq!(container.current(), Some(0));
//!
//! container.next(true, flip_engine::Origin::Script, 1.0);
//! assert_eq!(container.marker().as_deref(), Some("news"));
//! ```

pub mod component;
pub mod config;
pub mod container;
pub mod events;
pub mod input;
pub mod loader;
pub mod menu;
pub mod page;
pub mod router;
pub mod surface;
pub mod template;
pub mod timer;

pub use component::{ComponentRegistry, ContainerComponent, PageComponent};
pub use config::{build_page, defs_from_json, FunctionRegistry, PageDef};
pub use container::{CallFrom, Container, ContainerBuilder, Origin, Target};
pub use events::{topic_matches, Event, EventArgs, EventBus, HandlerId};
pub use input::{Direction, InputState, Key};
pub use loader::{
    FetchBackend, FetchCompletion, FetchRequest, LoadError, MockFetch, ModuleRegistry, SourceKind,
    TicketId,
};
pub use menu::NavigationMenu;
pub use page::{Hook, Page, PageHooks, PageId, SlideAxis, Trigger};
pub use router::{normalize_fragment, FragmentStore, Marker, MemoryFragment};
pub use surface::{HeadlessSurface, RegionId, RenderSurface, SurfaceOp};
pub use template::{Passthrough, TemplateEngine};
pub use timer::{TimerId, TimerKind, Timers};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
