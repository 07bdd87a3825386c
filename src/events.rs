//! Events Map Module
//!
//! Turns the string-keyed events map of a behavior definition into an ordered
//! list of bindings. Keys are comma-separated specs of the form
//! `<event>[ <selector>]`, e.g. `"keyup .answers, change .answers"`.
//!
//! Parsing happens once when a definition is extended; each view instance
//! then gets its own bindings whose listeners call back into that instance.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::rc::{Rc, Weak};

use crate::binder::{ElementBinder, Listener};
use crate::error::ViewError;
use crate::view::{Handler, View, ViewInner};

lazy_static! {
    /// Event name (letters, colons, hyphens, underscores), then optionally one
    /// whitespace and the selector.
    static ref EVENT_SPEC_RE: Regex = Regex::new(r"^([A-Za-z:_\-]+)(?:\s(.+)?)?$").unwrap();
}

/// One parsed `<event>[ <selector>]` piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSpec {
    pub event: String,
    /// None targets the root element itself.
    pub selector: Option<String>,
}

/// Parses one events-map key into its specs, in declaration order.
pub fn parse_event_key(key: &str) -> Result<Vec<EventSpec>, ViewError> {
    key.split(',')
        .map(|piece| {
            let caps = EVENT_SPEC_RE
                .captures(piece.trim())
                .ok_or_else(|| ViewError::EventSpecParse {
                    spec: piece.to_string(),
                })?;
            let selector = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            Ok(EventSpec {
                event: caps[1].to_string(),
                selector,
            })
        })
        .collect()
}

/// One events-map entry after parsing: every spec of the key shares a handler.
pub struct EventEntry<B: ElementBinder> {
    pub specs: Vec<EventSpec>,
    pub handler: Handler<B>,
}

impl<B: ElementBinder> Clone for EventEntry<B> {
    fn clone(&self) -> Self {
        Self {
            specs: self.specs.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<B: ElementBinder> EventEntry<B> {
    pub fn parse(key: &str, handler: Handler<B>) -> Result<Self, ViewError> {
        Ok(Self {
            specs: parse_event_key(key)?,
            handler,
        })
    }
}

/// A compiled binding owned by one view instance.
pub struct EventBinding<E> {
    pub selector: Option<String>,
    pub event: String,
    pub handler: Listener<E>,
    /// The listener handed to the binder while attached. The binder owns it;
    /// the binding only keeps what `off` needs to find it again.
    pub registration: Option<Weak<dyn Fn(&E)>>,
}

/// Read-only view of a binding, without the listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingInfo {
    pub event: String,
    pub selector: Option<String>,
    pub attached: bool,
}

impl<E> EventBinding<E> {
    /// Whether the binding is currently registered with the binder.
    pub fn is_attached(&self) -> bool {
        self.registration.is_some()
    }

    pub fn info(&self) -> BindingInfo {
        BindingInfo {
            event: self.event.clone(),
            selector: self.selector.clone(),
            attached: self.is_attached(),
        }
    }
}

/// Wraps `handler` so it runs with the owning view as receiver, whatever
/// context the binder dispatches from. Handler errors cannot reach the host
/// dispatcher, so they are logged here.
fn bind_to_owner<B>(handler: &Handler<B>, owner: &Weak<ViewInner<B>>) -> Listener<B::Event>
where
    B: ElementBinder + 'static,
{
    let handler = handler.clone();
    let owner = owner.clone();
    Rc::new(move |event: &B::Event| {
        let Some(inner) = owner.upgrade() else {
            tracing::debug!("event for a dropped view ignored");
            return;
        };
        let view = View::from_inner(inner);
        if let Err(err) = handler(&view, event) {
            tracing::error!(view = view.id(), code = err.code(), error = %err, "event handler failed");
        }
    })
}

/// Listener registered with the binder for one attach. It holds the view
/// strongly, so a view with attached events outlives its handles until
/// `detach_events` drops the registration.
pub(crate) fn owning_listener<B>(handler: &Listener<B::Event>, owner: Rc<ViewInner<B>>) -> Listener<B::Event>
where
    B: ElementBinder + 'static,
{
    let handler = handler.clone();
    Rc::new(move |event: &B::Event| {
        let _owner = &owner;
        handler(event)
    })
}

/// Produces the instance's events map, preserving declaration order.
/// Duplicate `(event, selector)` pairs are all kept.
pub(crate) fn compile_events_map<B>(
    entries: &[EventEntry<B>],
    owner: &Weak<ViewInner<B>>,
) -> Vec<EventBinding<B::Event>>
where
    B: ElementBinder + 'static,
{
    let mut bindings = Vec::new();
    for entry in entries {
        let listener = bind_to_owner(&entry.handler, owner);
        for spec in &entry.specs {
            bindings.push(EventBinding {
                selector: spec.selector.clone(),
                event: spec.event.clone(),
                handler: listener.clone(),
                registration: None,
            });
        }
    }
    bindings
}
