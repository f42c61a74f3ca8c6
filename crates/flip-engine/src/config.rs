//! Declarative Page Configuration
//!
//! Page definitions arrive as already-extracted attribute lists; this
//! module coerces them into typed [`Page`] fields. Callback attributes
//! resolve against an explicit [`FunctionRegistry`] instead of a global
//! namespace.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::page::{Hook, Page, PageId, SlideAxis, Trigger};

/// A scanned page definition: the author name plus raw attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDef {
    pub name: String,
    #[serde(default)]
    pub attrs: Vec<(String, String)>,
}

impl PageDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.push((key.to_string(), value.to_string()));
        self
    }
}

/// Parse a list of definitions from JSON.
pub fn defs_from_json(json: &str) -> Result<Vec<PageDef>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Named lifecycle callbacks referenced by declarative definitions.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Hook>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, hook: impl Fn(&mut Container, PageId) + 'static) {
        self.functions.insert(name.to_string(), Rc::new(hook));
    }

    pub fn get(&self, name: &str) -> Option<Hook> {
        self.functions.get(name).cloned()
    }
}

/// Boolean coercion: "true" and "1" are true, anything else is false.
pub fn parse_bool(value: &str) -> bool {
    value == "true" || value == "1"
}

/// Duration coercion: keywords slow/normal/fast, else integer
/// milliseconds, else 0.
pub fn parse_duration_ms(value: &str) -> u64 {
    match value {
        "slow" => 600,
        "normal" => 400,
        "fast" => 200,
        other => other.trim().parse().unwrap_or(0),
    }
}

fn parse_triggers(value: &str) -> std::collections::HashSet<Trigger> {
    value
        .split('|')
        .filter(|s| !s.is_empty())
        .filter_map(Trigger::parse)
        .collect()
}

/// Build a typed page from a definition.
///
/// Unrecognized attributes and unknown callback names are logged and
/// skipped; a malformed marker pattern leaves the page unroutable.
pub fn build_page(def: &PageDef, functions: &FunctionRegistry) -> Page {
    let mut page = Page::new(&def.name);

    for (key, value) in &def.attrs {
        match key.as_str() {
            "name" => page.name = value.clone(),
            "index" | "indexed" => page.indexed = parse_bool(value),
            "start" => page.start_page = parse_bool(value),
            "cache" | "cacheable" => page.cacheable = parse_bool(value),
            "load" | "autoload" => page.auto_load = parse_bool(value),
            "load_prev" => page.load_prev = parse_bool(value),
            "load_next" => page.load_next = parse_bool(value),
            "wait" => page.wait_for_mount = parse_bool(value),
            "refresh" => page.refresh_every_ms = parse_duration_ms(value),
            "refresh_hidden" => page.refresh_hidden = parse_bool(value),
            "url" => page.content_url = Some(value.clone()),
            "tpl" => page.template_url = Some(value.clone()),
            "mask" => page.marker_mask = Some(value.clone()),
            "steps" => page.steps = value.trim().parse().unwrap_or(0),
            "slide" => {
                page.slide_axis = match value.as_str() {
                    "horizontal" => SlideAxis::Horizontal,
                    _ => SlideAxis::Vertical,
                }
            }
            "slide_duration" => page.slide_duration_ms = parse_duration_ms(value),
            "slide_trigger" | "slide_triggers" => page.slide_triggers = parse_triggers(value),
            "marker" => {
                if let Err(err) = page.set_marker(value) {
                    log::warn!("page {}: bad marker pattern {value:?}: {err}", def.name);
                }
            }
            attr if attr.starts_with("on") => match functions.get(value) {
                Some(hook) => {
                    if !page.hooks.set(attr, hook) {
                        log::warn!("page {}: unknown hook attribute {attr:?}", def.name);
                    }
                }
                None => {
                    log::warn!("page {}: unknown callback {value:?} for {attr:?}", def.name)
                }
            },
            other => log::warn!("page {}: unrecognized attribute {other:?}", def.name),
        }
    }

    page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_coercion() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("yes"));
    }

    #[test]
    fn test_duration_keywords() {
        assert_eq!(parse_duration_ms("slow"), 600);
        assert_eq!(parse_duration_ms("normal"), 400);
        assert_eq!(parse_duration_ms("fast"), 200);
        assert_eq!(parse_duration_ms("250"), 250);
        assert_eq!(parse_duration_ms("junk"), 0);
    }

    #[test]
    fn test_build_page_flags() {
        let def = PageDef::new("news")
            .attr("start", "true")
            .attr("load", "1")
            .attr("cache", "false")
            .attr("slide_duration", "fast")
            .attr("slide", "horizontal")
            .attr("url", "news.json")
            .attr("tpl", "news.tpl")
            .attr("marker", "news/(\\d+)")
            .attr("steps", "3");
        let page = build_page(&def, &FunctionRegistry::new());

        assert_eq!(page.name, "news");
        assert!(page.start_page);
        assert!(page.auto_load);
        assert!(!page.cacheable);
        assert_eq!(page.slide_duration_ms, 200);
        assert_eq!(page.slide_axis, SlideAxis::Horizontal);
        assert_eq!(page.content_url.as_deref(), Some("news.json"));
        assert_eq!(page.template_url.as_deref(), Some("news.tpl"));
        assert_eq!(page.steps, 3);
        assert!(page.marker.is_some());
    }

    #[test]
    fn test_trigger_list() {
        let def = PageDef::new("p").attr("slide_trigger", "mousewheel|up|enter");
        let page = build_page(&def, &FunctionRegistry::new());
        assert!(page.accepts(Trigger::Wheel));
        assert!(page.accepts(Trigger::Up));
        assert!(page.accepts(Trigger::Enter));
        assert!(!page.accepts(Trigger::Down));
    }

    #[test]
    fn test_callback_resolution() {
        let mut functions = FunctionRegistry::new();
        functions.register("noop", |_c, _p| {});
        let def = PageDef::new("p")
            .attr("onload", "noop")
            .attr("onenter", "missing");
        let page = build_page(&def, &functions);
        assert!(page.hooks.load.is_some());
        assert!(page.hooks.enter.is_none());
    }

    #[test]
    fn test_defs_from_json() {
        let defs = defs_from_json(
            r#"[{"name": "home", "attrs": [["start", "true"], ["marker", "home"]]}]"#,
        )
        .unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "home");
        assert_eq!(defs[0].attrs.len(), 2);
    }
}
