//! Router
//!
//! Bidirectional mapping between the active page and a URL-fragment
//! marker. Fragment state lives behind [`FragmentStore`] so the engine
//! never touches process-wide state directly.

use regex::Regex;

/// Storage for the URL fragment.
pub trait FragmentStore {
    fn get(&self) -> String;
    fn set(&mut self, fragment: &str);
}

/// In-memory fragment store, the default collaborator.
#[derive(Debug, Default)]
pub struct MemoryFragment {
    fragment: String,
}

impl MemoryFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragment(fragment: &str) -> Self {
        Self {
            fragment: fragment.to_string(),
        }
    }
}

impl FragmentStore for MemoryFragment {
    fn get(&self) -> String {
        self.fragment.clone()
    }

    fn set(&mut self, fragment: &str) {
        self.fragment = fragment.to_string();
    }
}

/// A compiled routing pattern.
///
/// The author pattern is anchored at both ends; its canonical string form
/// is the source with escapes stripped, used when marking a page that has
/// no literal mask.
#[derive(Debug, Clone)]
pub struct Marker {
    source: String,
    regex: Regex,
}

impl Marker {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^{pattern}$"))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Author-supplied pattern text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Canonical marker string: the pattern source with escapes stripped.
    pub fn canonical(&self) -> String {
        self.source.replace('\\', "")
    }

    /// Match a marker, returning all capture groups (whole match first).
    /// Unmatched optional groups come back empty.
    pub fn matches(&self, marker: &str) -> Option<Vec<String>> {
        self.regex.captures(marker).map(|caps| {
            caps.iter()
                .map(|g| g.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect()
        })
    }
}

/// Normalize a raw fragment: strip a leading `#`, collapse redundant
/// slashes. Returns `None` when nothing remains.
pub fn normalize_fragment(raw: &str) -> Option<String> {
    let raw = raw.strip_prefix('#').unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(raw.len());
    let mut prev_slash = false;
    for c in raw.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_fragment("#a/b"), Some("a/b".to_string()));
        assert_eq!(normalize_fragment("a//b///c"), Some("a/b/c".to_string()));
        assert_eq!(normalize_fragment("#"), None);
        assert_eq!(normalize_fragment(""), None);
    }

    #[test]
    fn test_marker_anchored() {
        let marker = Marker::compile("news/(\\d+)").unwrap();
        assert!(marker.matches("news/7").is_some());
        assert!(marker.matches("news/7/extra").is_none());
        assert!(marker.matches("xnews/7").is_none());
    }

    #[test]
    fn test_canonical_strips_escapes() {
        let marker = Marker::compile("about\\-us").unwrap();
        assert_eq!(marker.canonical(), "about-us");
        assert_eq!(marker.source(), "about\\-us");
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryFragment::new();
        store.set("a/b");
        assert_eq!(store.get(), "a/b");
    }
}
