//! Configuration for view factories.

use serde::{Deserialize, Serialize};

use crate::error::ViewError;
use crate::template::TemplateSettings;

pub const DEFAULT_TEMPLATE_ATTRIBUTE: &str = "data-template";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewOptions {
    /// Attribute whose value names a template element in the DOM.
    pub template_attribute: String,
    pub template_settings: TemplateSettings,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            template_attribute: DEFAULT_TEMPLATE_ATTRIBUTE.to_string(),
            template_settings: TemplateSettings::default(),
        }
    }
}

impl ViewOptions {
    pub fn from_json(source: &str) -> Result<Self, ViewError> {
        serde_json::from_str(source).map_err(|e| ViewError::Config {
            message: e.to_string(),
        })
    }
}
