//! DOM Module for MiniView
//!
//! Reference [`ElementBinder`] backed by an html5ever `RcDom`. It owns a
//! parsed document, answers selector queries, inserts markup fragments and
//! keeps a listener registry that [`DomBinder::trigger`] dispatches through
//! with bubbling and selector delegation.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::{parse_document, parse_fragment, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::Rc;
use tendril::TendrilSink;

use crate::binder::{ElementBinder, InsertMethod, Listener};
use crate::error::ViewError;
use crate::selector::{parse_selector, SelectorList};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

// ═══════════════════════════════════════════════════════════════════════════════
// NODE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lowercase tag name, or None for non-element nodes.
pub fn element_tag(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_lowercase()),
        _ => None,
    }
}

pub fn attribute(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn parent_node(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

pub fn parent_element(node: &Handle) -> Option<Handle> {
    parent_node(node).filter(|p| matches!(p.data, NodeData::Element { .. }))
}

fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

fn remove_children(parent: &Handle) {
    let removed = std::mem::take(&mut *parent.children.borrow_mut());
    for child in removed {
        child.parent.set(None);
    }
}

fn collect_descendants(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        out.push(child.clone());
        collect_descendants(child, out);
    }
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

/// Parses `markup` as the contents of a `<body>` and returns the top-level nodes.
fn parse_body_fragment(markup: &str) -> Vec<Handle> {
    let context = QualName::new(
        None,
        Namespace::from(HTML_NAMESPACE),
        LocalName::from("body"),
    );
    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
        .one(markup);

    // The fragment parser roots its output in a synthetic <html> element.
    let root = dom.document.children.borrow().first().cloned();
    let Some(root) = root else {
        return Vec::new();
    };
    let nodes = std::mem::take(&mut *root.children.borrow_mut());
    for node in &nodes {
        node.parent.set(None);
    }
    nodes
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Synthetic event handed to listeners by [`DomBinder::trigger`].
#[derive(Clone)]
pub struct DomEvent {
    pub kind: String,
    /// Node the event originated from.
    pub target: Handle,
    /// Element the listener is registered on.
    pub current_target: Handle,
    /// For delegated listeners, the descendant that matched the selector.
    pub delegate_target: Option<Handle>,
}

struct Registration {
    element: Handle,
    event: String,
    selector: Option<String>,
    matcher: Option<SelectorList>,
    listener: Listener<DomEvent>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct DomBinder {
    dom: RcDom,
    registrations: RefCell<Vec<Registration>>,
}

impl DomBinder {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        Self::from_dom(dom)
    }

    pub fn from_dom(dom: RcDom) -> Self {
        Self {
            dom,
            registrations: RefCell::new(Vec::new()),
        }
    }

    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    pub fn text_content(&self, node: &Handle) -> String {
        let mut text = String::new();
        collect_text(node, &mut text);
        text
    }

    /// Text of the first element matching `selector`, if any.
    pub fn text_of(&self, selector: &str) -> Result<Option<String>, ViewError> {
        Ok(self
            .query(selector, None)?
            .first()
            .map(|node| self.text_content(node)))
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.borrow().len()
    }

    /// Dispatches `event` from `target` up to the document. Returns how many
    /// listeners ran.
    pub fn trigger(&self, target: &Handle, event: &str) -> usize {
        let mut path = vec![target.clone()];
        let mut current = parent_node(target);
        while let Some(node) = current {
            current = parent_node(&node);
            path.push(node);
        }

        tracing::debug!(event, depth = path.len(), "dispatching event");

        let mut fired = 0;
        for (depth, listening) in path.iter().enumerate() {
            // Snapshot so listeners may register or unregister while we dispatch.
            let snapshot: Vec<(Option<SelectorList>, Listener<DomEvent>)> = self
                .registrations
                .borrow()
                .iter()
                .filter(|r| Rc::ptr_eq(&r.element, listening) && r.event == event)
                .map(|r| (r.matcher.clone(), r.listener.clone()))
                .collect();
            if snapshot.is_empty() {
                continue;
            }

            for node in &path[..depth] {
                for (matcher, listener) in &snapshot {
                    if matcher.as_ref().is_some_and(|m| m.matches(node)) {
                        listener(&DomEvent {
                            kind: event.to_string(),
                            target: target.clone(),
                            current_target: listening.clone(),
                            delegate_target: Some(node.clone()),
                        });
                        fired += 1;
                    }
                }
            }

            for (matcher, listener) in &snapshot {
                if matcher.is_none() {
                    listener(&DomEvent {
                        kind: event.to_string(),
                        target: target.clone(),
                        current_target: listening.clone(),
                        delegate_target: None,
                    });
                    fired += 1;
                }
            }
        }
        fired
    }

    /// Triggers `event` on every element matching `selector`.
    pub fn trigger_all(&self, selector: &str, event: &str) -> Result<usize, ViewError> {
        let targets = self.query(selector, None)?;
        Ok(targets.iter().map(|t| self.trigger(t, event)).sum())
    }
}

impl ElementBinder for DomBinder {
    type Element = Handle;
    type Event = DomEvent;

    fn query(&self, selector: &str, context: Option<&Handle>) -> Result<Vec<Handle>, ViewError> {
        let list = parse_selector(selector)?;
        let root = context.unwrap_or(&self.dom.document);

        let mut nodes = Vec::new();
        collect_descendants(root, &mut nodes);
        Ok(nodes.into_iter().filter(|n| list.matches(n)).collect())
    }

    fn inner_html(&self, element: &Handle) -> Result<String, ViewError> {
        let scope_name = match &element.data {
            NodeData::Element { name, .. } => Some(name.clone()),
            _ => None,
        };
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(scope_name),
            ..Default::default()
        };

        let mut bytes = Vec::new();
        serialize(&mut bytes, &SerializableHandle::from(element.clone()), opts).map_err(|e| {
            ViewError::Binder {
                message: format!("failed to serialize element: {}", e),
            }
        })?;
        String::from_utf8(bytes).map_err(|e| ViewError::Binder {
            message: format!("serialized markup is not UTF-8: {}", e),
        })
    }

    fn insert(&self, targets: &[Handle], markup: &str, method: InsertMethod) -> Result<(), ViewError> {
        for target in targets {
            let nodes = parse_body_fragment(markup);
            match method {
                InsertMethod::Html => {
                    remove_children(target);
                    for node in nodes {
                        append_child(target, node);
                    }
                }
                InsertMethod::Append => {
                    for node in nodes {
                        append_child(target, node);
                    }
                }
                InsertMethod::Prepend => {
                    for node in &nodes {
                        node.parent.set(Some(Rc::downgrade(target)));
                    }
                    let mut children = target.children.borrow_mut();
                    let existing = std::mem::take(&mut *children);
                    children.extend(nodes);
                    children.extend(existing);
                }
            }
        }
        Ok(())
    }

    fn empty(&self, targets: &[Handle]) {
        for target in targets {
            remove_children(target);
        }
    }

    fn on(
        &self,
        element: &Handle,
        event: &str,
        selector: Option<&str>,
        listener: Listener<DomEvent>,
    ) -> Result<(), ViewError> {
        let matcher = selector.map(parse_selector).transpose()?;
        self.registrations.borrow_mut().push(Registration {
            element: element.clone(),
            event: event.to_string(),
            selector: selector.map(str::to_string),
            matcher,
            listener,
        });
        Ok(())
    }

    fn validate_selector(&self, selector: &str) -> Result<(), ViewError> {
        parse_selector(selector).map(|_| ())
    }

    fn off(&self, element: &Handle, event: &str, selector: Option<&str>, listener: &Listener<DomEvent>) {
        self.registrations.borrow_mut().retain(|r| {
            !(Rc::ptr_eq(&r.element, element)
                && r.event == event
                && r.selector.as_deref() == selector
                && Rc::ptr_eq(&r.listener, listener))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn first(binder: &DomBinder, selector: &str) -> Handle {
        binder.query(selector, None).unwrap().remove(0)
    }

    #[test]
    fn test_insert_strategies() {
        let binder = DomBinder::parse(r#"<ul id="list"><li>b</li></ul>"#);
        let list = binder.query("#list", None).unwrap();

        binder.insert(&list, "<li>c</li>", InsertMethod::Append).unwrap();
        binder.insert(&list, "<li>a</li>", InsertMethod::Prepend).unwrap();
        assert_eq!(binder.text_content(&list[0]), "abc");

        binder.insert(&list, "<li>z</li>", InsertMethod::Html).unwrap();
        assert_eq!(binder.text_content(&list[0]), "z");

        binder.empty(&list);
        assert_eq!(binder.text_content(&list[0]), "");
    }

    #[test]
    fn test_inserted_nodes_are_queryable_with_parents() {
        let binder = DomBinder::parse(r#"<div id="root"></div>"#);
        let root = binder.query("#root", None).unwrap();
        binder
            .insert(&root, r#"<p class="x"><b>hi</b></p>"#, InsertMethod::Html)
            .unwrap();
        let bold = first(&binder, "#root .x b");
        let parent = parent_element(&bold).unwrap();
        assert_eq!(element_tag(&parent).as_deref(), Some("p"));
    }

    #[test]
    fn test_inner_html_keeps_script_text_raw() {
        let binder = DomBinder::parse(
            r#"<script type="text/template" data-template="t"><b><#= name #></b></script>"#,
        );
        let script = first(&binder, "[data-template=t]");
        assert_eq!(binder.inner_html(&script).unwrap(), "<b><#= name #></b>");
    }

    #[test]
    fn test_delegated_and_direct_dispatch() {
        let binder = DomBinder::parse(
            r#"<div id="root"><button class="go"><span>go</span></button><p>x</p></div>"#,
        );
        let root = first(&binder, "#root");
        let delegated_hits = Rc::new(Cell::new(0));
        let direct_hits = Rc::new(Cell::new(0));

        let hits = delegated_hits.clone();
        let delegated: Listener<DomEvent> = Rc::new(move |e: &DomEvent| {
            assert_eq!(e.delegate_target.as_ref().and_then(element_tag).as_deref(), Some("button"));
            hits.set(hits.get() + 1);
        });
        let hits = direct_hits.clone();
        let direct: Listener<DomEvent> = Rc::new(move |_: &DomEvent| hits.set(hits.get() + 1));

        binder.on(&root, "click", Some(".go"), delegated.clone()).unwrap();
        binder.on(&root, "click", None, direct.clone()).unwrap();

        assert_eq!(binder.trigger(&first(&binder, ".go span"), "click"), 2);
        assert_eq!(binder.trigger(&first(&binder, "#root p"), "click"), 1);
        assert_eq!(delegated_hits.get(), 1);
        assert_eq!(direct_hits.get(), 2);

        binder.off(&root, "click", Some(".go"), &delegated);
        binder.off(&root, "click", None, &direct);
        assert_eq!(binder.listener_count(), 0);
        assert_eq!(binder.trigger(&first(&binder, ".go"), "click"), 0);
    }

    #[test]
    fn test_on_rejects_unsupported_selector() {
        let binder = DomBinder::parse(r#"<div id="root"><a>x</a></div>"#);
        let root = first(&binder, "#root");
        let listener: Listener<DomEvent> = Rc::new(|_: &DomEvent| {});

        let err = binder.on(&root, "click", Some("a:first-child"), listener.clone());
        assert!(matches!(err, Err(ViewError::InvalidSelector { .. })));
        assert_eq!(binder.listener_count(), 0);
        assert!(binder.validate_selector("a:first-child").is_err());
        assert!(binder.validate_selector("ul > li.item").is_ok());
    }

    #[test]
    fn test_off_with_unknown_registration_is_ignored() {
        let binder = DomBinder::parse(r#"<div id="root"></div>"#);
        let root = first(&binder, "#root");
        let listener: Listener<DomEvent> = Rc::new(|_: &DomEvent| {});
        binder.off(&root, "click", None, &listener);
        assert_eq!(binder.listener_count(), 0);
    }
}
