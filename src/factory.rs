//! Factory Module for MiniView
//!
//! Builds view constructors from behavior definitions.
//!
//! ```ignore
//! let questions = ViewFactory::new(binder.clone()).extend(
//!     BehaviorDefinition::new()
//!         .init(|view, props| {
//!             view.set_state("model", props["model"].clone());
//!             Ok(())
//!         })
//!         .state(json!({ "answers": [], "hide": true }))
//!         .insert("answers-for-type", ".question-answers")
//!         .on("keyup .question-answers, change .question-answers", |view, _event| {
//!             view.set_state("hide", json!(false));
//!             Ok(())
//!         })
//!         .method("renderQuestions", |view, _args| {
//!             view.render(RenderOptions::new("question-card", ".questions-container"))?;
//!             Ok(Value::Null)
//!         }),
//! )?;
//!
//! let view = questions.create("#my-view-element", json!({ "model": model }))?;
//! ```

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::binder::{BoundElement, ElementBinder};
use crate::config::ViewOptions;
use crate::error::ViewError;
use crate::events::{compile_events_map, EventEntry};
use crate::render::InsertDeclaration;
use crate::template::{DelimitedCompiler, TemplateCompiler};
use crate::view::{Handler, Method, View, ViewInner};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-shot constructor procedure; receives the view and the caller's argument.
pub type InitFn<B> = Rc<dyn Fn(&View<B>, &Value) -> Result<(), ViewError>>;

// ═══════════════════════════════════════════════════════════════════════════════
// BEHAVIOR DEFINITION
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything an application declares about a kind of view.
pub struct BehaviorDefinition<B: ElementBinder> {
    init: Option<InitFn<B>>,
    state: Value,
    insert: Vec<InsertDeclaration>,
    events: Vec<(String, Handler<B>)>,
    methods: HashMap<String, Method<B>>,
}

impl<B: ElementBinder + 'static> Default for BehaviorDefinition<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ElementBinder + 'static> BehaviorDefinition<B> {
    pub fn new() -> Self {
        Self {
            init: None,
            state: Value::Object(Default::default()),
            insert: Vec::new(),
            events: Vec::new(),
            methods: HashMap::new(),
        }
    }

    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(&View<B>, &Value) -> Result<(), ViewError> + 'static,
    {
        self.init = Some(Rc::new(init));
        self
    }

    /// Initial state; every instance starts from its own copy.
    pub fn state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// Declares a nested template rendered into `into` (a selector inside the root).
    pub fn insert(mut self, template: &str, into: &str) -> Self {
        self.insert.push(InsertDeclaration::new(template, into));
        self
    }

    /// Adds an events-map entry. `spec` is a comma-separated list of
    /// `<event>[ <selector>]`; it is parsed by [`ViewFactory::extend`].
    pub fn on<F>(mut self, spec: &str, handler: F) -> Self
    where
        F: Fn(&View<B>, &B::Event) -> Result<(), ViewError> + 'static,
    {
        self.events.push((spec.to_string(), Rc::new(handler)));
        self
    }

    pub fn method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&View<B>, &Value) -> Result<Value, ViewError> + 'static,
    {
        self.methods.insert(name.to_string(), Rc::new(method));
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FACTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Holds the collaborators shared by every view it extends.
pub struct ViewFactory<B: ElementBinder> {
    binder: Rc<B>,
    compiler: Rc<dyn TemplateCompiler>,
    template_attribute: Rc<str>,
}

impl<B: ElementBinder + 'static> ViewFactory<B> {
    pub fn new(binder: Rc<B>) -> Self {
        Self::with_options(binder, ViewOptions::default())
    }

    /// Uses the bundled [`DelimitedCompiler`] configured from `options`.
    pub fn with_options(binder: Rc<B>, options: ViewOptions) -> Self {
        let compiler = Rc::new(DelimitedCompiler::new(options.template_settings.clone()));
        Self::with_compiler(binder, compiler, options)
    }

    pub fn with_compiler(
        binder: Rc<B>,
        compiler: Rc<dyn TemplateCompiler>,
        options: ViewOptions,
    ) -> Self {
        Self {
            binder,
            compiler,
            template_attribute: options.template_attribute.into(),
        }
    }

    pub fn version() -> &'static str {
        VERSION
    }

    /// Parses the definition's events map and returns a constructor closing
    /// over the definition. Malformed event specs, and delegation selectors
    /// the binder cannot handle, fail here.
    pub fn extend(&self, definition: BehaviorDefinition<B>) -> Result<ViewConstructor<B>, ViewError> {
        let events = definition
            .events
            .into_iter()
            .map(|(key, handler)| EventEntry::parse(&key, handler))
            .collect::<Result<Vec<_>, _>>()?;
        for selector in events
            .iter()
            .flat_map(|entry| &entry.specs)
            .filter_map(|spec| spec.selector.as_deref())
        {
            self.binder.validate_selector(selector)?;
        }

        tracing::debug!(
            entries = events.len(),
            inserts = definition.insert.len(),
            methods = definition.methods.len(),
            "extended behavior definition"
        );

        Ok(ViewConstructor {
            binder: self.binder.clone(),
            compiler: self.compiler.clone(),
            template_attribute: self.template_attribute.clone(),
            init: definition.init,
            state: definition.state,
            insert: definition.insert.into(),
            events: events.into(),
            methods: Rc::new(definition.methods),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTRUCTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Produces fully wired view instances of one behavior definition.
pub struct ViewConstructor<B: ElementBinder> {
    binder: Rc<B>,
    compiler: Rc<dyn TemplateCompiler>,
    template_attribute: Rc<str>,
    init: Option<InitFn<B>>,
    state: Value,
    insert: Rc<[InsertDeclaration]>,
    events: Rc<[EventEntry<B>]>,
    methods: Rc<HashMap<String, Method<B>>>,
}

impl<B: ElementBinder> Clone for ViewConstructor<B> {
    fn clone(&self) -> Self {
        Self {
            binder: self.binder.clone(),
            compiler: self.compiler.clone(),
            template_attribute: self.template_attribute.clone(),
            init: self.init.clone(),
            state: self.state.clone(),
            insert: self.insert.clone(),
            events: self.events.clone(),
            methods: self.methods.clone(),
        }
    }
}

impl<B: ElementBinder + 'static> ViewConstructor<B> {
    /// Binds the root, runs `init` with `args`, renders the nested templates
    /// and attaches events. On error no instance is returned.
    ///
    /// The instance stays alive through its event registrations until
    /// `destroy_view` (or `detach_events`), so the returned handle may be
    /// dropped.
    pub fn create(&self, root_id: &str, args: Value) -> Result<View<B>, ViewError> {
        let root = BoundElement::bind(self.binder.clone(), root_id)?;
        tracing::debug!(view = root_id, "constructing view");

        let inner = Rc::new_cyclic(|owner| ViewInner {
            root,
            compiler: self.compiler.clone(),
            template_attribute: self.template_attribute.clone(),
            insert: self.insert.clone(),
            methods: self.methods.clone(),
            state: RefCell::new(self.state.clone()),
            events_map: RefCell::new(compile_events_map(&self.events, owner)),
            rendered: Cell::new(false),
        });
        let view = View::from_inner(inner);

        if let Some(init) = &self.init {
            tracing::debug!(view = root_id, "calling init");
            init(&view, &args)?;
        }

        view.refresh_view()?;
        view.attach_events();
        Ok(view)
    }

    pub fn inserts(&self) -> &[InsertDeclaration] {
        &self.insert
    }
}
