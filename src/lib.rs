//! # MiniView
//!
//! A declarative view factory. A behavior definition (state, nested
//! templates, events map, methods, constructor) is bound to one root element,
//! producing a [`View`] with a render/attach lifecycle.
//!
//! ## Invariants
//!
//! 1. **Root**: a view is bound to exactly one root element, resolved at
//!    construction. A selector that matches nothing fails with
//!    `ViewNodeMissing` and no view is returned.
//!
//! 2. **Scoped queries**: every selector a view resolves (render targets,
//!    `View::query`) is searched inside the root only. Template lookup is the
//!    exception: templates are found anywhere in the document.
//!
//! 3. **Events map**: keys are parsed when a definition is extended, in
//!    declaration order, without de-duplication. Handlers always run with
//!    the owning view as receiver.
//!
//! 4. **Lifecycle**: construct → render → attach, and detach → un-render.
//!    Events are never attached to content that is not inserted.
//!
//! ## Collaborators
//!
//! The core talks to the host through two capabilities:
//! [`ElementBinder`] (queries, insertion, listeners) and [`TemplateCompiler`].
//! [`DomBinder`] (html5ever) and [`DelimitedCompiler`] are the bundled
//! implementations.

mod binder;
mod config;
mod dom;
mod error;
mod events;
mod factory;
mod render;
mod selector;
mod template;
mod view;

#[cfg(feature = "napi")]
mod native;


pub use binder::{BoundElement, ElementBinder, InsertMethod, Listener};
pub use config::{ViewOptions, DEFAULT_TEMPLATE_ATTRIBUTE};
pub use dom::{DomBinder, DomEvent};
pub use error::*;
pub use events::{parse_event_key, BindingInfo, EventSpec};
pub use factory::{BehaviorDefinition, InitFn, ViewConstructor, ViewFactory, VERSION};
pub use render::{DestroyOptions, InsertDeclaration, RenderOptions, TemplateRenderer};
pub use selector::{parse_selector, SelectorList};
pub use template::{
    escape_html, CompiledTemplate, DelimitedCompiler, Delimiters, TemplateCompiler,
    TemplateSettings,
};
pub use view::{Handler, Method, View};

#[cfg(feature = "napi")]
pub use native::*;
