//! Render Module for MiniView
//!
//! Looks up named template elements in the DOM, compiles them against a data
//! context and inserts (or removes) the result inside a view's root.
//!
//! Templates are found by attribute (`data-template="name"` by default) and
//! are looked up again on every call; nothing is cached.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binder::{BoundElement, ElementBinder, InsertMethod};
use crate::error::ViewError;
use crate::template::TemplateCompiler;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// One nested-render declaration of a behavior definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertDeclaration {
    pub template: String,
    pub into: String,
}

impl InsertDeclaration {
    pub fn new(template: &str, into: &str) -> Self {
        Self {
            template: template.to_string(),
            into: into.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    pub template: Option<String>,
    /// Selector of the target, resolved inside the view's root.
    pub into: Option<String>,
    /// Defaults to [`InsertMethod::Html`].
    pub method: Option<InsertMethod>,
    /// Defaults to the view's current state. Falsy values (`null`, `false`,
    /// `0`, `""`) also fall back to the state.
    pub data: Option<Value>,
}

impl RenderOptions {
    pub fn new(template: &str, into: &str) -> Self {
        Self {
            template: Some(template.to_string()),
            into: Some(into.to_string()),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: InsertMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<&InsertDeclaration> for RenderOptions {
    fn from(decl: &InsertDeclaration) -> Self {
        RenderOptions::new(&decl.template, &decl.into)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyOptions {
    pub template: Option<String>,
    pub into: Option<String>,
}

impl DestroyOptions {
    pub fn new(template: &str, into: &str) -> Self {
        Self {
            template: Some(template.to_string()),
            into: Some(into.to_string()),
        }
    }
}

impl From<&InsertDeclaration> for DestroyOptions {
    fn from(decl: &InsertDeclaration) -> Self {
        DestroyOptions::new(&decl.template, &decl.into)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TemplateRenderer<'a, B: ElementBinder> {
    root: &'a BoundElement<B>,
    compiler: &'a dyn TemplateCompiler,
    template_attribute: &'a str,
}

impl<'a, B: ElementBinder> TemplateRenderer<'a, B> {
    pub fn new(
        root: &'a BoundElement<B>,
        compiler: &'a dyn TemplateCompiler,
        template_attribute: &'a str,
    ) -> Self {
        Self {
            root,
            compiler,
            template_attribute,
        }
    }

    /// Markup of the first element, in document order, tagged with `name`.
    pub fn lookup(&self, name: &str) -> Result<String, ViewError> {
        let selector = format!("[{}=\"{}\"]", self.template_attribute, name);
        let matches = match self.root.binder().query(&selector, None) {
            Ok(matches) => matches,
            Err(ViewError::InvalidSelector { .. }) => Vec::new(),
            Err(err) => return Err(err),
        };

        if matches.len() > 1 {
            tracing::warn!(
                template = name,
                count = matches.len(),
                "several elements share this template name, using the first"
            );
        }
        match matches.first() {
            Some(element) => self.root.binder().inner_html(element),
            None => Err(ViewError::TemplateNotFound {
                template: name.to_string(),
            }),
        }
    }

    /// Renders a template into `options.into`. Returns the target elements.
    pub fn render(
        &self,
        options: &RenderOptions,
        state: &Value,
    ) -> Result<Vec<B::Element>, ViewError> {
        let template = options
            .template
            .as_deref()
            .ok_or(ViewError::TemplateNameMissing)?;
        let into = options
            .into
            .as_deref()
            .ok_or_else(|| ViewError::TargetMissing {
                template: template.to_string(),
            })?;

        let markup = self.lookup(template)?;
        tracing::debug!(view = self.root.id(), template, into, "rendering");

        let data = options.data.as_ref().filter(|data| is_truthy(data)).unwrap_or(state);
        let output = self.compiler.render(&markup, data).map_err(|err| match err {
            ViewError::TemplateCompile { reason, .. } => ViewError::TemplateCompile {
                template: template.to_string(),
                reason,
            },
            other => other,
        })?;

        let targets = self.root.query(into)?;
        if targets.is_empty() {
            tracing::warn!(view = self.root.id(), template, into, "render target matched nothing");
        }
        self.root
            .binder()
            .insert(&targets, &output, options.method.unwrap_or_default())?;
        Ok(targets)
    }

    /// Empties `options.into`. Returns the emptied elements.
    pub fn destroy(&self, options: &DestroyOptions) -> Result<Vec<B::Element>, ViewError> {
        let template = options
            .template
            .as_deref()
            .ok_or(ViewError::TemplateNameMissing)?;
        let into = options
            .into
            .as_deref()
            .ok_or_else(|| ViewError::TargetMissing {
                template: template.to_string(),
            })?;

        tracing::debug!(view = self.root.id(), template, into, "destroying");
        let targets = self.root.query(into)?;
        self.root.binder().empty(&targets);
        Ok(targets)
    }
}

/// Whether explicit render data replaces the view's state.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomBinder;
    use crate::template::DelimitedCompiler;
    use serde_json::json;
    use std::rc::Rc;

    const PAGE: &str = r#"
        <html><head>
        <script type="text/template" data-template="greeting"><p>Hello <#= name #></p></script>
        <script type="text/template" data-template="item"><li><#= label #></li></script>
        <script type="text/template" data-template="twice">first</script>
        <script type="text/template" data-template="twice">second</script>
        <script type="text/template" data-template="broken"><# if x #></script>
        </head><body>
        <div id="app"><div class="x"></div><ul class="list"><li>seed</li></ul></div>
        <div class="x">outside</div>
        </body></html>
    "#;

    fn setup() -> (Rc<DomBinder>, BoundElement<DomBinder>, DelimitedCompiler) {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let root = BoundElement::bind(binder.clone(), "#app").unwrap();
        (binder, root, DelimitedCompiler::default())
    }

    #[test]
    fn test_render_uses_state_by_default() {
        let (binder, root, compiler) = setup();
        let renderer = TemplateRenderer::new(&root, &compiler, "data-template");
        let targets = renderer
            .render(&RenderOptions::new("greeting", ".x"), &json!({"name": "state"}))
            .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(binder.text_of("#app .x").unwrap().as_deref(), Some("Hello state"));
        assert_eq!(binder.text_of("body > .x").unwrap().as_deref(), Some("outside"));

        renderer
            .render(
                &RenderOptions::new("greeting", ".x").with_data(json!({"name": "data"})),
                &json!({"name": "state"}),
            )
            .unwrap();
        assert_eq!(binder.text_of("#app .x").unwrap().as_deref(), Some("Hello data"));
    }

    #[test]
    fn test_render_append_and_prepend() {
        let (binder, root, compiler) = setup();
        let renderer = TemplateRenderer::new(&root, &compiler, "data-template");
        let state = json!({});
        for (label, method) in [("b", InsertMethod::Append), ("a", InsertMethod::Prepend)] {
            renderer
                .render(
                    &RenderOptions::new("item", ".list")
                        .with_method(method)
                        .with_data(json!({ "label": label })),
                    &state,
                )
                .unwrap();
        }
        assert_eq!(binder.text_of(".list").unwrap().as_deref(), Some("aseedb"));
    }

    #[test]
    fn test_render_argument_errors() {
        let (_, root, compiler) = setup();
        let renderer = TemplateRenderer::new(&root, &compiler, "data-template");
        let state = json!({});

        let no_template = RenderOptions {
            into: Some(".x".to_string()),
            ..Default::default()
        };
        assert_eq!(
            renderer.render(&no_template, &state).err(),
            Some(ViewError::TemplateNameMissing)
        );

        let no_target = RenderOptions {
            template: Some("t".to_string()),
            ..Default::default()
        };
        assert_eq!(
            renderer.render(&no_target, &state).err(),
            Some(ViewError::TargetMissing {
                template: "t".to_string()
            })
        );

        assert_eq!(
            renderer.render(&RenderOptions::new("nonexistent", ".x"), &state).err(),
            Some(ViewError::TemplateNotFound {
                template: "nonexistent".to_string()
            })
        );
    }

    #[test]
    fn test_compile_error_names_template() {
        let (_, root, compiler) = setup();
        let renderer = TemplateRenderer::new(&root, &compiler, "data-template");
        match renderer.render(&RenderOptions::new("broken", ".x"), &json!({})) {
            Err(ViewError::TemplateCompile { template, .. }) => assert_eq!(template, "broken"),
            other => panic!("expected compile error, got {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn test_duplicate_template_names_use_first() {
        let (_, root, compiler) = setup();
        let renderer = TemplateRenderer::new(&root, &compiler, "data-template");
        assert_eq!(renderer.lookup("twice").unwrap(), "first");
    }

    #[test]
    fn test_destroy_empties_target() {
        let (binder, root, compiler) = setup();
        let renderer = TemplateRenderer::new(&root, &compiler, "data-template");
        let emptied = renderer.destroy(&DestroyOptions::new("item", ".list")).unwrap();
        assert_eq!(emptied.len(), 1);
        assert_eq!(binder.text_of(".list").unwrap().as_deref(), Some(""));

        assert_eq!(
            renderer
                .destroy(&DestroyOptions {
                    template: Some("item".to_string()),
                    into: None
                })
                .err(),
            Some(ViewError::TargetMissing {
                template: "item".to_string()
            })
        );

        binder
            .insert(&binder.query(".list", None).unwrap(), "<i>kept</i>", InsertMethod::Html)
            .unwrap();
        assert_eq!(
            renderer
                .destroy(&DestroyOptions {
                    template: None,
                    into: Some(".list".to_string())
                })
                .err(),
            Some(ViewError::TemplateNameMissing)
        );
        assert_eq!(binder.text_of(".list").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_falsy_data_falls_back_to_state() {
        let (binder, root, compiler) = setup();
        let renderer = TemplateRenderer::new(&root, &compiler, "data-template");
        let state = json!({"name": "state"});
        for data in [json!(null), json!(false), json!(0), json!("")] {
            renderer
                .render(&RenderOptions::new("greeting", ".x").with_data(data), &state)
                .unwrap();
            assert_eq!(binder.text_of("#app .x").unwrap().as_deref(), Some("Hello state"));
        }

        renderer
            .render(&RenderOptions::new("greeting", ".x").with_data(json!({})), &state)
            .unwrap();
        assert_eq!(binder.text_of("#app .x").unwrap().as_deref(), Some("Hello "));
    }
}
