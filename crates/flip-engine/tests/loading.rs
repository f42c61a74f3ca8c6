//! Load pipeline integration tests
//!
//! Resource counting, modules, refresh, overlays and components.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use flip_engine::{
    CallFrom, Container, ContainerComponent, Event, MockFetch, Origin, Page, PageComponent,
    PageDef, PageId, Target,
};

type Log = Rc<RefCell<Vec<String>>>;

fn recorder() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn record(log: &Log, tag: &str) -> impl FnMut(&Event) + 'static {
    let log = Rc::clone(log);
    let tag = tag.to_string();
    move |_| log.borrow_mut().push(tag.clone())
}

fn article_container(mock: &MockFetch) -> (Container, PageId) {
    let mut container = Container::builder().backend(mock.clone()).build();
    let defs = [
        PageDef::new("home").attr("start", "true"),
        PageDef::new("article")
            .attr("url", "data.json")
            .attr("tpl", "page.tpl"),
    ];
    container.bootstrap(&defs, 0.0);
    let article = container.page_at(1).unwrap().id;
    (container, article)
}

// ============================================================================
// PENDING-RESOURCE COUNTING
// ============================================================================

#[test]
fn test_mount_waits_for_both_sources_content_first() {
    let mock = MockFetch::new();
    let (mut container, article) = article_container(&mock);

    container.goto(Target::Page(article), true, Origin::Script, 1.0);
    assert_eq!(mock.pending(), vec!["page.tpl", "data.json"]);
    assert_eq!(container.get(article).unwrap().pending(), 2);

    mock.resolve("data.json", r#"{"title": "hello"}"#);
    container.pump(2.0);
    assert!(!container.get(article).unwrap().loaded);

    mock.resolve("page.tpl", "<h1>tpl</h1>");
    container.pump(3.0);
    let page = container.get(article).unwrap();
    assert!(page.loaded);
    assert_eq!(page.pending(), 0);
    assert_eq!(page.content.as_deref(), Some("<h1>tpl</h1>"));
    assert_eq!(page.data["title"], "hello");
}

#[test]
fn test_mount_waits_for_both_sources_template_first() {
    let mock = MockFetch::new();
    let (mut container, article) = article_container(&mock);

    container.goto(Target::Page(article), true, Origin::Script, 1.0);
    mock.resolve("page.tpl", "<h1>tpl</h1>");
    container.pump(2.0);
    assert!(!container.get(article).unwrap().loaded);

    mock.resolve("data.json", r#"{"title": "hello"}"#);
    container.pump(3.0);
    assert!(container.get(article).unwrap().loaded);
}

#[test]
fn test_mount_refuses_while_pending() {
    let mock = MockFetch::new();
    let (mut container, article) = article_container(&mock);
    container.goto(Target::Page(article), true, Origin::Script, 1.0);

    assert!(!container.mount(article, None, None));
    assert!(container.get(article).unwrap().content.is_none());
}

#[test]
fn test_init_is_idempotent_per_page() {
    let mock = MockFetch::new();
    let (mut container, article) = article_container(&mock);

    container.goto(Target::Page(article), true, Origin::Script, 1.0);
    // leaving and re-entering while the fetches are in flight does not
    // submit duplicates
    container.goto(Target::Index(0), true, Origin::Script, 2.0);
    container.goto(Target::Page(article), true, Origin::Script, 3.0);
    assert_eq!(mock.pending().len(), 2);

    mock.resolve("page.tpl", "t");
    mock.resolve("data.json", "d");
    container.pump(4.0);
    assert!(container.get(article).unwrap().loaded);

    // loaded page re-emits init only
    let log = recorder();
    container.page_on(article, "init", record(&log, "init"));
    container.init_page(article, 5.0);
    assert_eq!(*log.borrow(), vec!["init"]);
    assert!(mock.pending().is_empty());
}

#[test]
fn test_background_load_mounts_after_leaving() {
    let mock = MockFetch::new();
    let (mut container, article) = article_container(&mock);

    container.goto(Target::Page(article), true, Origin::Script, 1.0);
    container.goto(Target::Index(0), true, Origin::Script, 2.0);

    // no cancellation: the page keeps loading in the background
    mock.resolve("page.tpl", "t");
    mock.resolve("data.json", "d");
    container.pump(3.0);
    assert!(container.get(article).unwrap().loaded);
    assert_eq!(container.current(), Some(0));
}

#[test]
fn test_prefetch_neighbors() {
    let mock = MockFetch::new();
    let mut container = Container::builder().backend(mock.clone()).build();
    let defs = [
        PageDef::new("a").attr("url", "a.json"),
        PageDef::new("hub").attr("load_prev", "true").attr("load_next", "true"),
        PageDef::new("c").attr("url", "c.json"),
    ];
    container.bootstrap(&defs, 0.0);

    container.goto(Target::Index(1), true, Origin::Script, 1.0);
    let mut pending = mock.pending();
    pending.sort();
    assert_eq!(pending, vec!["a.json", "c.json"]);
}

// ============================================================================
// FAILURE PATH
// ============================================================================

#[test]
fn test_failed_fetch_blocks_mount_until_retry() {
    let mock = MockFetch::new();
    let mut container = Container::builder().backend(mock.clone()).build();
    let defs = [
        PageDef::new("home").attr("start", "true"),
        PageDef::new("feed").attr("url", "feed.json"),
    ];
    container.bootstrap(&defs, 0.0);
    let feed = container.page_at(1).unwrap().id;

    let log = recorder();
    container.page_on(feed, "loadfail", record(&log, "loadfail"));

    container.goto(Target::Page(feed), true, Origin::Script, 1.0);
    mock.fail("feed.json", "connection refused");
    container.pump(2.0);

    let page = container.get(feed).unwrap();
    assert!(page.failed);
    assert!(!page.loaded);
    assert_eq!(*log.borrow(), vec!["loadfail"]);
    assert!(!container.mount(feed, None, None));

    assert!(container.retry(feed, 3.0));
    mock.resolve("feed.json", "recovered");
    container.pump(4.0);
    let page = container.get(feed).unwrap();
    assert!(page.loaded);
    assert!(!page.failed);
    assert_eq!(page.content.as_deref(), Some("recovered"));
}

#[test]
fn test_load_timeout_fails_ticket() {
    let mock = MockFetch::new();
    let mut container = Container::builder()
        .backend(mock.clone())
        .load_timeout(1000)
        .build();
    let defs = [PageDef::new("slow").attr("url", "slow.json")];
    container.bootstrap(&defs, 0.0);
    let slow = container.page_at(0).unwrap().id;

    let failures: Rc<RefCell<Vec<String>>> = recorder();
    let sink = Rc::clone(&failures);
    container.page_on(slow, "loadfail", move |event| {
        sink.borrow_mut()
            .push(event.args.text.clone().unwrap_or_default());
    });

    container.pump(500.0);
    assert!(!container.get(slow).unwrap().failed);
    container.pump(1500.0);
    assert!(container.get(slow).unwrap().failed);
    assert!(failures.borrow()[0].contains("timed out"));
}

// ============================================================================
// SCRIPT MODULES
// ============================================================================

#[test]
fn test_module_load_sets_context_and_mounts() {
    let seen: Rc<RefCell<Option<PageId>>> = Rc::new(RefCell::new(None));
    let seen_in_module = Rc::clone(&seen);
    let mut container = Container::builder()
        .module("welcome", move |container, page| {
            *seen_in_module.borrow_mut() = container.context_page();
            container.set_page_data(page, json!({"content": "<b>welcome</b>"}));
        })
        .build();
    let defs = [PageDef::new("intro").attr("url", "mod:welcome")];
    container.bootstrap(&defs, 0.0);

    let intro = container.page_at(0).unwrap().id;
    let page = container.get(intro).unwrap();
    assert!(page.loaded);
    assert_eq!(page.content.as_deref(), Some("<b>welcome</b>"));
    assert_eq!(*seen.borrow(), Some(intro));
}

#[test]
fn test_module_context_restored_for_side_page() {
    let mut container = Container::builder()
        .module("aside", |container, page| {
            container.set_page_data(page, json!("aside body"));
        })
        .build();
    container.bootstrap(&[PageDef::new("home")], 0.0);
    let home = container.active_page().unwrap();
    assert_eq!(container.context_page(), Some(home));

    let mut side = Page::new("aside");
    side.indexed = false;
    side.content_url = Some("mod:aside".into());
    side.auto_load = true;
    let side_id = container.add(side, 1.0);

    // the loading context was restored after the non-indexed load
    assert_eq!(container.context_page(), Some(home));
    assert!(container.get(side_id).unwrap().loaded);
}

#[test]
fn test_unknown_module_fails_page() {
    let mut container = Container::builder().build();
    let defs = [PageDef::new("broken").attr("url", "mod:missing")];
    container.bootstrap(&defs, 0.0);
    let broken = container.page_at(0).unwrap().id;
    assert!(container.get(broken).unwrap().failed);
}

// ============================================================================
// EXPLICIT MOUNT
// ============================================================================

#[test]
fn test_wait_for_mount_defers_to_caller() {
    let mock = MockFetch::new();
    let mut container = Container::builder().backend(mock.clone()).build();
    let defs = [PageDef::new("wizard")
        .attr("wait", "true")
        .attr("url", "wizard.json")];
    container.bootstrap(&defs, 0.0);
    let wizard = container.page_at(0).unwrap().id;

    mock.resolve("wizard.json", "step data");
    container.pump(1.0);

    // resources are in but the page waits for its caller
    let page = container.get(wizard).unwrap();
    assert_eq!(page.pending(), 0);
    assert!(!page.loaded);
    assert!(page.content.is_none());

    assert!(container.mount(wizard, None, Some("<step>1</step>".into())));
    let page = container.get(wizard).unwrap();
    assert_eq!(page.content.as_deref(), Some("<step>1</step>"));
    assert!(!page.loaded);

    assert!(container.complete_mount(wizard));
    assert!(container.get(wizard).unwrap().loaded);
}

// ============================================================================
// REFRESH
// ============================================================================

#[test]
fn test_refresh_refetches_without_navigation() {
    let mock = MockFetch::new();
    let mut container = Container::builder().backend(mock.clone()).build();
    let defs = [PageDef::new("live")
        .attr("url", "live.json")
        .attr("refresh", "100")];
    container.bootstrap(&defs, 0.0);
    let live = container.page_at(0).unwrap().id;

    mock.resolve("live.json", "first");
    container.pump(1.0);
    assert_eq!(container.get(live).unwrap().content.as_deref(), Some("first"));

    let log = recorder();
    container.page_on(live, "refresh", record(&log, "refresh"));
    let flips = container.flips();

    container.tick(150.0);
    assert_eq!(*log.borrow(), vec!["refresh"]);
    assert!(mock.saw_uncacheable());

    mock.resolve("live.json", "second");
    container.tick(160.0);
    let page = container.get(live).unwrap();
    assert_eq!(page.content.as_deref(), Some("second"));
    assert!(page.loaded);
    assert_eq!(container.flips(), flips);
}

#[test]
fn test_leaving_clears_refresh_timer() {
    let mock = MockFetch::new();
    let mut container = Container::builder().backend(mock.clone()).build();
    let defs = [
        PageDef::new("live")
            .attr("url", "live.json")
            .attr("refresh", "100"),
        PageDef::new("other"),
    ];
    container.bootstrap(&defs, 0.0);

    mock.resolve("live.json", "body");
    container.pump(1.0);

    container.goto(Target::Index(1), true, Origin::Script, 2.0);
    container.tick(500.0);
    assert!(mock.pending().is_empty());
}

#[test]
fn test_hidden_refresh_keeps_running() {
    let mock = MockFetch::new();
    let mut container = Container::builder().backend(mock.clone()).build();
    let defs = [
        PageDef::new("ticker")
            .attr("url", "ticker.json")
            .attr("refresh", "100")
            .attr("refresh_hidden", "true"),
        PageDef::new("other"),
    ];
    container.bootstrap(&defs, 0.0);
    mock.resolve("ticker.json", "body");
    container.pump(1.0);

    container.goto(Target::Index(1), true, Origin::Script, 2.0);
    container.tick(500.0);
    assert_eq!(mock.pending(), vec!["ticker.json"]);
}

// ============================================================================
// SHARED DATA AND LITERAL CONTENT
// ============================================================================

#[test]
fn test_shared_data_renders_as_literal_content() {
    let mut container = Container::builder()
        .shared_data("about", json!({"content": "<p>about us</p>"}))
        .build();
    container.bootstrap(&[PageDef::new("about")], 0.0);
    let about = container.page_at(0).unwrap().id;
    assert_eq!(
        container.get(about).unwrap().content.as_deref(),
        Some("<p>about us</p>")
    );
}

// ============================================================================
// CALL OVERLAYS
// ============================================================================

#[test]
fn test_call_overlay_lifecycle() {
    let mut container = Container::builder().build();
    let defs = [
        PageDef::new("home").attr("start", "true"),
        PageDef::new("promo"),
    ];
    container.bootstrap(&defs, 0.0);
    let home = container.active_page().unwrap();
    let promo = container.page_at(1).unwrap().id;
    container.set_page_template(promo, "<p>promo</p>");

    let log = recorder();
    container.page_on(home, "call", record(&log, "call"));

    let overlay = container
        .call(home, promo, &[CallFrom::Right], 1.0)
        .unwrap();
    assert_eq!(*log.borrow(), vec!["call"]);

    let page = container.overlay(overlay).unwrap();
    assert!(page.overlay);
    assert!(!page.indexed);
    assert!(page.loaded);
    assert_eq!(page.content.as_deref(), Some("<p>promo</p>"));
    // the source page itself is untouched by the overlay mount
    assert!(container.get(promo).unwrap().indexed);

    container.page_on(overlay, "drop", record(&log, "drop"));
    assert!(container.drop_overlay(overlay, 2.0));
    assert!(container.overlay(overlay).is_some());
    container.tick(700.0);
    assert!(container.overlay(overlay).is_none());
    assert_eq!(*log.borrow(), vec!["call", "drop"]);
}

#[test]
fn test_call_waits_for_source_load() {
    let mock = MockFetch::new();
    let mut container = Container::builder().backend(mock.clone()).build();
    let defs = [
        PageDef::new("home").attr("start", "true"),
        PageDef::new("deep").attr("url", "deep.json"),
    ];
    container.bootstrap(&defs, 0.0);
    let home = container.active_page().unwrap();
    let deep = container.page_at(1).unwrap().id;

    let overlay = container.call(home, deep, &[], 1.0).unwrap();
    assert!(!container.overlay(overlay).unwrap().loaded);

    mock.resolve("deep.json", "deep body");
    container.pump(2.0);
    let page = container.overlay(overlay).unwrap();
    assert!(page.loaded);
    assert_eq!(page.content.as_deref(), Some("deep body"));
}

// ============================================================================
// COMPONENTS
// ============================================================================

struct InitCounter {
    inits: Rc<RefCell<u32>>,
    events: Log,
}

impl ContainerComponent for InitCounter {
    fn init(&mut self, _owner: &mut Container) {
        *self.inits.borrow_mut() += 1;
    }

    fn on_event(&mut self, _owner: &mut Container, event: &Event) {
        self.events.borrow_mut().push(event.topic.clone());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct PageInitCounter {
    inits: Rc<RefCell<u32>>,
}

impl PageComponent for PageInitCounter {
    fn init(&mut self, _owner: &mut Container, _page: PageId) {
        *self.inits.borrow_mut() += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_container_component_inits_once() {
    let inits = Rc::new(RefCell::new(0));
    let events = recorder();
    let factory_inits = Rc::clone(&inits);
    let factory_events = Rc::clone(&events);
    let mut container = Container::builder()
        .component("counter", move || {
            Box::new(InitCounter {
                inits: Rc::clone(&factory_inits),
                events: Rc::clone(&factory_events),
            })
        })
        .build();
    container.bootstrap(&[PageDef::new("a"), PageDef::new("b")], 0.0);
    assert_eq!(*inits.borrow(), 1);

    container.trigger("init", flip_engine::EventArgs::default());
    assert_eq!(*inits.borrow(), 1);

    // components observed the whole bootstrap
    assert!(events.borrow().iter().any(|t| t == "update"));
    assert!(events.borrow().iter().any(|t| t == "flip"));
    assert!(container.component("counter").is_some());
}

#[test]
fn test_page_components_attach_to_every_page() {
    let inits = Rc::new(RefCell::new(0));
    let factory_inits = Rc::clone(&inits);
    let mut container = Container::builder()
        .page_component("tracker", move || {
            Box::new(PageInitCounter {
                inits: Rc::clone(&factory_inits),
            })
        })
        .build();
    container.bootstrap(&[PageDef::new("a"), PageDef::new("b")], 0.0);

    // only the entered page has seen its init event so far
    assert_eq!(*inits.borrow(), 1);
    container.next(true, Origin::Script, 1.0);
    assert_eq!(*inits.borrow(), 2);
    // re-entering does not re-init
    container.prev(true, Origin::Script, 2.0);
    assert_eq!(*inits.borrow(), 2);

    let a = container.page_at(0).unwrap().id;
    assert!(container.page_component(a, "tracker").is_some());
}

// ============================================================================
// REGISTRY EVENTS
// ============================================================================

#[test]
fn test_update_fires_on_add_and_remove() {
    let mut container = Container::builder().build();
    container.bootstrap(&[PageDef::new("a")], 0.0);

    let log = recorder();
    container.on("update", record(&log, "update"));
    let id = container.add(Page::new("b"), 1.0);
    assert_eq!(*log.borrow(), vec!["update"]);
    assert!(container.remove(id));
    assert_eq!(*log.borrow(), vec!["update", "update"]);
}
