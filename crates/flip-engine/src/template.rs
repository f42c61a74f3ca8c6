//! Template Engine
//!
//! Collaborator interface for template rendering. Absent a real engine,
//! templates pass through unchanged.

use serde_json::Value;

/// Renders a template against page data.
pub trait TemplateEngine {
    fn render(&self, template: &str, data: &Value) -> String;
}

/// Default engine: returns the template text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl TemplateEngine for Passthrough {
    fn render(&self, template: &str, _data: &Value) -> String {
        template.to_string()
    }
}
