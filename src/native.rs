//! Node bridge for the pure parts of MiniView (event-map parsing and template
//! compilation), enabled with the `napi` feature.

use napi_derive::napi;

use crate::config::ViewOptions;
use crate::events::parse_event_key;
use crate::factory::VERSION;
use crate::template::{DelimitedCompiler, TemplateCompiler};

#[napi]
pub fn miniview_version() -> String {
    VERSION.to_string()
}

/// Parses an events-map key into `[{ event, selector }]`.
#[napi]
pub fn parse_event_key_native(key: String) -> napi::Result<serde_json::Value> {
    let specs = parse_event_key(&key).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(specs).map_err(|e| napi::Error::from_reason(e.to_string()))
}

/// Compiles `markup` against `data`. `options` is a JSON `ViewOptions` document.
#[napi]
pub fn render_template_native(
    markup: String,
    data: serde_json::Value,
    options: Option<String>,
) -> napi::Result<String> {
    let options = match options {
        Some(source) => {
            ViewOptions::from_json(&source).map_err(|e| napi::Error::from_reason(e.to_string()))?
        }
        None => ViewOptions::default(),
    };
    DelimitedCompiler::new(options.template_settings)
        .render(&markup, &data)
        .map_err(|e| napi::Error::from_reason(format!("[{}] {}", e.code(), e)))
}
