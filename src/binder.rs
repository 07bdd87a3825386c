//! Element Binder Module
//!
//! The core never touches a DOM directly. Everything it needs from the host
//! (selector queries, markup insertion, listener registration) goes through
//! the [`ElementBinder`] capability. [`BoundElement`] resolves a view's root
//! once and scopes all later queries to its subtree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::ViewError;

/// A registered event callback. Identity (`Rc::ptr_eq`) is what `off` matches on.
pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Insertion strategy for rendered markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMethod {
    Append,
    Prepend,
    /// Replace the full contents of the target.
    #[default]
    Html,
}

impl InsertMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsertMethod::Append => "append",
            InsertMethod::Prepend => "prepend",
            InsertMethod::Html => "html",
        }
    }
}

impl fmt::Display for InsertMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsertMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(InsertMethod::Append),
            "prepend" => Ok(InsertMethod::Prepend),
            "html" => Ok(InsertMethod::Html),
            other => Err(format!("unknown insertion method '{}'", other)),
        }
    }
}

/// Host DOM capability.
///
/// Queries return elements in document order. `context`, when given,
/// restricts results to descendants of that element.
pub trait ElementBinder {
    type Element: Clone;
    type Event;

    fn query(
        &self,
        selector: &str,
        context: Option<&Self::Element>,
    ) -> Result<Vec<Self::Element>, ViewError>;

    /// Markup contained by `element` (for `<script>` templates, the raw text).
    fn inner_html(&self, element: &Self::Element) -> Result<String, ViewError>;

    fn insert(
        &self,
        targets: &[Self::Element],
        markup: &str,
        method: InsertMethod,
    ) -> Result<(), ViewError>;

    fn empty(&self, targets: &[Self::Element]);

    /// Registers `listener` on `element`. With a selector the registration is
    /// delegated: it only fires for events originating from matching descendants.
    /// Nothing is registered when an error is returned.
    fn on(
        &self,
        element: &Self::Element,
        event: &str,
        selector: Option<&str>,
        listener: Listener<Self::Event>,
    ) -> Result<(), ViewError>;

    /// Checks a delegation selector ahead of time, so events maps can be
    /// rejected when a behavior is defined rather than when it is attached.
    fn validate_selector(&self, _selector: &str) -> Result<(), ViewError> {
        Ok(())
    }

    /// Removes a registration made by `on`. Unknown registrations are ignored.
    fn off(
        &self,
        element: &Self::Element,
        event: &str,
        selector: Option<&str>,
        listener: &Listener<Self::Event>,
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// BOUND ROOT ELEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// A view's root element, resolved once at construction.
pub struct BoundElement<B: ElementBinder> {
    binder: Rc<B>,
    id: String,
    el: B::Element,
}

impl<B: ElementBinder> BoundElement<B> {
    /// Resolves `id` through the binder. Fails with `ViewNodeMissing` when the
    /// selector is blank or matches nothing.
    pub fn bind(binder: Rc<B>, id: &str) -> Result<Self, ViewError> {
        if id.trim().is_empty() {
            return Err(ViewError::ViewNodeMissing {
                selector: id.to_string(),
            });
        }

        let mut matches = binder.query(id, None)?;
        if matches.len() > 1 {
            tracing::warn!(
                selector = id,
                count = matches.len(),
                "root selector matched several elements, binding the first"
            );
        }
        if matches.is_empty() {
            return Err(ViewError::ViewNodeMissing {
                selector: id.to_string(),
            });
        }
        let el = matches.swap_remove(0);

        Ok(Self {
            binder,
            id: id.to_string(),
            el,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn element(&self) -> &B::Element {
        &self.el
    }

    pub fn binder(&self) -> &Rc<B> {
        &self.binder
    }

    /// The scoped `$`: only descendants of the root are searched.
    pub fn query(&self, selector: &str) -> Result<Vec<B::Element>, ViewError> {
        self.binder.query(selector, Some(&self.el))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomBinder;

    const PAGE: &str = r#"
        <div id="app"><p class="inner">in</p></div>
        <p class="inner">out</p>
        <section class="twin"></section><section class="twin"></section>
    "#;

    #[test]
    fn test_insert_method_parsing() {
        assert_eq!("append".parse::<InsertMethod>(), Ok(InsertMethod::Append));
        assert_eq!("prepend".parse::<InsertMethod>(), Ok(InsertMethod::Prepend));
        assert_eq!("html".parse::<InsertMethod>(), Ok(InsertMethod::Html));
        assert!("after".parse::<InsertMethod>().is_err());
        assert_eq!(InsertMethod::default(), InsertMethod::Html);
    }

    #[test]
    fn test_bind_missing_root() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let err = BoundElement::bind(binder.clone(), "#missing").err();
        assert_eq!(
            err,
            Some(ViewError::ViewNodeMissing {
                selector: "#missing".to_string()
            })
        );
        assert!(matches!(
            BoundElement::bind(binder, "  "),
            Err(ViewError::ViewNodeMissing { .. })
        ));
    }

    #[test]
    fn test_scoped_query_stays_inside_root() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let bound = BoundElement::bind(binder.clone(), "#app").unwrap();
        let found = bound.query(".inner").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(binder.text_content(&found[0]), "in");
        assert_eq!(binder.query(".inner", None).unwrap().len(), 2);
    }

    #[test]
    fn test_bind_first_of_many() {
        let binder = Rc::new(DomBinder::parse(PAGE));
        let bound = BoundElement::bind(binder.clone(), ".twin").unwrap();
        let all = binder.query(".twin", None).unwrap();
        assert!(Rc::ptr_eq(bound.element(), &all[0]));
        assert_eq!(bound.id(), ".twin");
    }
}
