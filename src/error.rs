//! Error Module for MiniView
//!
//! Every failure of the view lifecycle surfaces as a [`ViewError`]. Each
//! variant carries a stable code so callers (and the Node bridge) can match
//! on the kind without parsing messages.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_VIEW_NODE_MISSING: &str = "MV-ERR-VIEW-001";
pub const ERR_TEMPLATE_NAME_MISSING: &str = "MV-ERR-RENDER-001";
pub const ERR_TARGET_MISSING: &str = "MV-ERR-RENDER-002";
pub const ERR_TEMPLATE_NOT_FOUND: &str = "MV-ERR-RENDER-003";
pub const ERR_TEMPLATE_COMPILE: &str = "MV-ERR-RENDER-004";
pub const ERR_EVENT_SPEC_PARSE: &str = "MV-ERR-EVENT-001";
pub const ERR_INVALID_SELECTOR: &str = "MV-ERR-DOM-001";
pub const ERR_BINDER: &str = "MV-ERR-DOM-002";
pub const ERR_METHOD_NOT_FOUND: &str = "MV-ERR-METHOD-001";
pub const ERR_APPLICATION: &str = "MV-ERR-APP-001";
pub const ERR_CONFIG: &str = "MV-ERR-CONFIG-001";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The root selector was empty or matched no element.
    #[error("could not find the view element `{selector}`; link the view to the DOM with a selector that matches an element")]
    ViewNodeMissing { selector: String },

    #[error("could not render: no `template` name was given")]
    TemplateNameMissing,

    #[error("could not render `{template}`: no `into` target was given")]
    TargetMissing { template: String },

    #[error("could not find template `{template}` in the DOM")]
    TemplateNotFound { template: String },

    #[error("template `{template}` failed to compile: {reason}")]
    TemplateCompile { template: String, reason: String },

    /// A piece of an events-map key did not match `<event>[ <selector>]`.
    #[error("could not parse event `{spec}`")]
    EventSpecParse { spec: String },

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("element binder failure: {message}")]
    Binder { message: String },

    #[error("view has no method named `{name}`")]
    MethodNotFound { name: String },

    #[error("invalid view options: {message}")]
    Config { message: String },

    /// Raised by application code (`init`, handlers, methods).
    #[error("{message}")]
    Application { message: String },
}

impl ViewError {
    /// Convenience for application code returning its own failures.
    pub fn application(message: impl Into<String>) -> Self {
        ViewError::Application {
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ViewError::ViewNodeMissing { .. } => ERR_VIEW_NODE_MISSING,
            ViewError::TemplateNameMissing => ERR_TEMPLATE_NAME_MISSING,
            ViewError::TargetMissing { .. } => ERR_TARGET_MISSING,
            ViewError::TemplateNotFound { .. } => ERR_TEMPLATE_NOT_FOUND,
            ViewError::TemplateCompile { .. } => ERR_TEMPLATE_COMPILE,
            ViewError::EventSpecParse { .. } => ERR_EVENT_SPEC_PARSE,
            ViewError::InvalidSelector { .. } => ERR_INVALID_SELECTOR,
            ViewError::Binder { .. } => ERR_BINDER,
            ViewError::MethodNotFound { .. } => ERR_METHOD_NOT_FOUND,
            ViewError::Config { .. } => ERR_CONFIG,
            ViewError::Application { .. } => ERR_APPLICATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = ViewError::ViewNodeMissing {
            selector: "#nope".to_string(),
        };
        assert_eq!(err.code(), "MV-ERR-VIEW-001");
        assert!(err.to_string().contains("#nope"));

        assert_eq!(ViewError::TemplateNameMissing.code(), ERR_TEMPLATE_NAME_MISSING);
        assert_eq!(
            ViewError::EventSpecParse {
                spec: ",".to_string()
            }
            .to_string(),
            "could not parse event `,`"
        );
    }

    #[test]
    fn test_application_message_is_verbatim() {
        let err = ViewError::application("model is required");
        assert_eq!(err.to_string(), "model is required");
        assert_eq!(err.code(), ERR_APPLICATION);
    }
}
