//! View Module for MiniView
//!
//! A [`View`] is one live instance produced by a view constructor: a root
//! element, instance-owned state, nested templates and compiled event
//! bindings, sequenced by a small lifecycle.
//!
//! ## Lifecycle Invariants
//!
//! 1. **Construct order**: init → `refresh_view` → `attach_events`.
//! 2. **Teardown order**: `detach_events` → destroy every nested template.
//! 3. **Rendered flag**: `is_rendered()` is true iff the nested templates are
//!    inserted; events are only attached while it is true.
//! 4. **No partial render**: a failing `refresh_view` un-renders what it
//!    rendered in that pass, detaches events and leaves the view unrendered.
//! 5. **Ownership**: attached listeners own the instance. Dropping every
//!    `View` handle leaves a wired view running; `destroy_view` releases it.
//!
//! Handlers and methods may call back into the view (re-render, detach,
//! destroy). Calling `destroy_view` from a handler while other handlers of
//! the same dispatch are still pending is not guarded: the pending ones
//! still run.

use serde_json::Value;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::binder::{BoundElement, ElementBinder};
use crate::error::ViewError;
use crate::events::{owning_listener, BindingInfo, EventBinding};
use crate::render::{DestroyOptions, InsertDeclaration, RenderOptions, TemplateRenderer};
use crate::template::TemplateCompiler;

/// Event handler of a behavior definition; runs with the owning view as receiver.
pub type Handler<B> =
    Rc<dyn Fn(&View<B>, &<B as ElementBinder>::Event) -> Result<(), ViewError>>;

/// Application method declared on a behavior definition.
pub type Method<B> = Rc<dyn Fn(&View<B>, &Value) -> Result<Value, ViewError>>;

pub(crate) struct ViewInner<B: ElementBinder> {
    pub(crate) root: BoundElement<B>,
    pub(crate) compiler: Rc<dyn TemplateCompiler>,
    pub(crate) template_attribute: Rc<str>,
    pub(crate) insert: Rc<[InsertDeclaration]>,
    pub(crate) methods: Rc<HashMap<String, Method<B>>>,
    pub(crate) state: RefCell<Value>,
    pub(crate) events_map: RefCell<Vec<EventBinding<B::Event>>>,
    pub(crate) rendered: Cell<bool>,
}

/// Handle to a live view instance. Clones share the same instance.
pub struct View<B: ElementBinder> {
    inner: Rc<ViewInner<B>>,
}

impl<B: ElementBinder> Clone for View<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: ElementBinder + 'static> View<B> {
    pub(crate) fn from_inner(inner: Rc<ViewInner<B>>) -> Self {
        Self { inner }
    }

    /// Root selector the view was created with.
    pub fn id(&self) -> &str {
        self.inner.root.id()
    }

    pub fn element(&self) -> &B::Element {
        self.inner.root.element()
    }

    pub fn binder(&self) -> &Rc<B> {
        self.inner.root.binder()
    }

    pub fn is_rendered(&self) -> bool {
        self.inner.rendered.get()
    }

    pub fn ptr_eq(&self, other: &View<B>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> Ref<'_, Value> {
        self.inner.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, Value> {
        self.inner.state.borrow_mut()
    }

    /// Sets one top-level state key. Non-object state is replaced by an object.
    pub fn set_state(&self, key: &str, value: Value) {
        let mut state = self.inner.state.borrow_mut();
        if !state.is_object() {
            *state = Value::Object(Default::default());
        }
        if let Value::Object(map) = &mut *state {
            map.insert(key.to_string(), value);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERY & METHODS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Elements matching `selector` inside the root.
    pub fn query(&self, selector: &str) -> Result<Vec<B::Element>, ViewError> {
        self.inner.root.query(selector)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.inner.methods.contains_key(name)
    }

    /// Calls an application method with this view as receiver.
    pub fn call(&self, name: &str, args: Value) -> Result<Value, ViewError> {
        let method = self
            .inner
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| ViewError::MethodNotFound {
                name: name.to_string(),
            })?;
        method(self, &args)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RENDERING
    // ═══════════════════════════════════════════════════════════════════════════

    fn renderer(&self) -> TemplateRenderer<'_, B> {
        TemplateRenderer::new(
            &self.inner.root,
            self.inner.compiler.as_ref(),
            &self.inner.template_attribute,
        )
    }

    /// Renders a template into a target inside the root and returns the target.
    pub fn render(&self, options: RenderOptions) -> Result<Vec<B::Element>, ViewError> {
        let state = self.inner.state.borrow();
        self.renderer().render(&options, &state)
    }

    /// Empties a target inside the root and returns it.
    pub fn destroy(&self, options: DestroyOptions) -> Result<Vec<B::Element>, ViewError> {
        self.renderer().destroy(&options)
    }

    /// Renders every declared nested template, then marks the view rendered.
    pub fn refresh_view(&self) -> Result<(), ViewError> {
        let insert = self.inner.insert.clone();
        for (done, decl) in insert.iter().enumerate() {
            if let Err(err) = self.render(RenderOptions::from(decl)) {
                tracing::debug!(view = self.id(), template = %decl.template, "render failed, rolling back");
                self.detach_events();
                for rendered in insert[..done].iter().rev() {
                    if let Err(cleanup) = self.destroy(DestroyOptions::from(rendered)) {
                        tracing::warn!(view = self.id(), error = %cleanup, "rollback could not destroy template");
                    }
                }
                self.inner.rendered.set(false);
                return Err(err);
            }
        }
        self.inner.rendered.set(true);
        Ok(())
    }

    /// Un-renders the view: detaches events, then destroys the nested
    /// templates. No-op when the view is not rendered.
    pub fn destroy_view(&self) -> Result<(), ViewError> {
        if !self.inner.rendered.get() {
            return Ok(());
        }

        self.detach_events();
        let mut first_error = None;
        for decl in self.inner.insert.iter() {
            if let Err(err) = self.destroy(DestroyOptions::from(decl)) {
                first_error.get_or_insert(err);
            }
        }
        self.inner.rendered.set(false);

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EVENTS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn event_bindings(&self) -> Vec<BindingInfo> {
        self.inner
            .events_map
            .borrow()
            .iter()
            .map(EventBinding::info)
            .collect()
    }

    /// Registers every binding on the root. Skipped (and logged) while the
    /// view is not rendered; bindings already attached are left alone. A
    /// binding the binder refuses is logged and stays detached.
    ///
    /// While any binding is attached the binder keeps the view alive, even
    /// after every `View` handle is dropped.
    pub fn attach_events(&self) {
        if !self.inner.rendered.get() {
            tracing::error!(view = self.id(), "view not rendered, could not attach events");
            return;
        }

        let binder = self.inner.root.binder();
        let el = self.inner.root.element();
        for binding in self.inner.events_map.borrow_mut().iter_mut() {
            if binding.is_attached() {
                continue;
            }
            let listener = owning_listener(&binding.handler, self.inner.clone());
            match binder.on(el, &binding.event, binding.selector.as_deref(), listener.clone()) {
                Ok(()) => {
                    tracing::debug!(view = self.id(), event = %binding.event, selector = ?binding.selector, "attached");
                    binding.registration = Some(Rc::downgrade(&listener));
                }
                Err(err) => {
                    tracing::error!(
                        view = self.id(),
                        event = %binding.event,
                        selector = ?binding.selector,
                        code = err.code(),
                        error = %err,
                        "could not attach binding"
                    );
                }
            }
        }
    }

    /// Unregisters every attached binding. Safe to call at any time.
    pub fn detach_events(&self) {
        let binder = self.inner.root.binder();
        let el = self.inner.root.element();
        for binding in self.inner.events_map.borrow_mut().iter_mut() {
            let Some(registration) = binding.registration.take() else {
                continue;
            };
            tracing::debug!(view = self.id(), event = %binding.event, selector = ?binding.selector, "detach");
            if let Some(listener) = registration.upgrade() {
                binder.off(el, &binding.event, binding.selector.as_deref(), &listener);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomBinder;
    use crate::factory::{BehaviorDefinition, ViewFactory};
    use serde_json::json;

    const PAGE: &str = r#"
        <script type="text/template" data-template="title"><h1><#= title #></h1></script>
        <div id="card"><header></header><section class="body"></section></div>
    "#;

    fn card(binder: &Rc<DomBinder>) -> View<DomBinder> {
        let definition = BehaviorDefinition::<DomBinder>::new()
            .state(json!({"title": "Card"}))
            .insert("title", "header")
            .method("rename", |view, args| {
                view.set_state("title", args.clone());
                view.render(RenderOptions::new("title", "header"))?;
                Ok(Value::Null)
            });
        ViewFactory::new(binder.clone())
            .extend(definition)
            .unwrap()
            .create("#card", Value::Null)
            .unwrap()
    }

    #[test]
    fn test_set_state_and_method_call() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let view = card(&binder);
        assert_eq!(binder.text_of("#card header").unwrap().as_deref(), Some("Card"));

        view.call("rename", json!("Renamed")).unwrap();
        assert_eq!(view.state()["title"], "Renamed");
        assert_eq!(binder.text_of("#card header").unwrap().as_deref(), Some("Renamed"));
    }

    #[test]
    fn test_unknown_method() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let view = card(&binder);
        assert!(view.has_method("rename"));
        assert_eq!(
            view.call("explode", Value::Null),
            Err(ViewError::MethodNotFound {
                name: "explode".to_string()
            })
        );
    }

    #[test]
    fn test_set_state_replaces_non_object_state() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let view = card(&binder);
        *view.state_mut() = json!(3);
        view.set_state("n", json!(1));
        assert_eq!(*view.state(), json!({"n": 1}));
    }

    #[test]
    fn test_attached_view_outlives_handles_until_destroyed() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let definition = BehaviorDefinition::<DomBinder>::new()
            .state(json!({"title": "Card"}))
            .insert("title", "header")
            .on("click", |view, _| view.destroy_view());
        let view = ViewFactory::new(binder.clone())
            .extend(definition)
            .unwrap()
            .create("#card", Value::Null)
            .unwrap();
        let weak = Rc::downgrade(&view.inner);

        drop(view);
        assert!(weak.upgrade().is_some());

        binder.trigger_all("#card header", "click").unwrap();
        assert!(weak.upgrade().is_none());
        assert_eq!(binder.listener_count(), 0);
        assert_eq!(binder.text_of("#card header").unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_detached_view_is_released_with_its_last_handle() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let view = ViewFactory::new(binder.clone())
            .extend(BehaviorDefinition::<DomBinder>::new().on("click", |_, _| Ok(())))
            .unwrap()
            .create("#card", Value::Null)
            .unwrap();
        let weak = Rc::downgrade(&view.inner);
        assert_eq!(binder.listener_count(), 1);

        view.detach_events();
        assert_eq!(binder.listener_count(), 0);
        drop(view);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_query_is_scoped_and_clones_share_instance() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let view = card(&binder);
        assert_eq!(view.query(".body").unwrap().len(), 1);
        assert!(view.query("script").unwrap().is_empty());

        let other = view.clone();
        other.set_state("title", json!("shared"));
        assert_eq!(view.state()["title"], "shared");
        assert!(view.ptr_eq(&other));
        assert_eq!(view.id(), "#card");
    }
}
