//! Selector Module
//!
//! Small CSS selector subset used by [`crate::dom::DomBinder`]:
//! compounds of `tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`,
//! joined by descendant (whitespace) or child (`>`) combinators, in
//! comma-separated lists.

use markup5ever_rcdom::Handle;

use crate::dom::{attribute, element_tag, parent_element};
use crate::error::ViewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeFilter>,
}

/// Compounds left to right; each carries the combinator linking it to the
/// previous one (ignored for the first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<ComplexSelector>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

struct Cursor<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn error(&self, reason: impl Into<String>) -> ViewError {
        ViewError::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn ident(&mut self) -> Result<String, ViewError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error(format!("expected a name at offset {}", start)));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn attribute(&mut self) -> Result<AttributeFilter, ViewError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let value = match self.peek() {
            Some('=') => {
                self.bump();
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(quote @ ('"' | '\'')) => {
                        self.bump();
                        let start = self.pos;
                        while self.peek().is_some_and(|c| c != quote) {
                            self.pos += 1;
                        }
                        if self.bump() != Some(quote) {
                            return Err(self.error("unterminated attribute value"));
                        }
                        self.chars[start..self.pos - 1].iter().collect()
                    }
                    _ => self.ident()?,
                };
                self.skip_whitespace();
                Some(value)
            }
            _ => None,
        };

        if self.bump() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        Ok(AttributeFilter { name, value })
    }

    fn compound(&mut self) -> Result<Compound, ViewError> {
        let start = self.pos;
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
            }
            Some(c) if c.is_alphabetic() => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.bump();
                    let filter = self.attribute()?;
                    compound.attributes.push(filter);
                }
                _ => break,
            }
        }

        if self.pos == start {
            let found = self.peek().map(String::from).unwrap_or_default();
            return Err(self.error(format!("unexpected `{}` at offset {}", found, start)));
        }
        Ok(compound)
    }
}

fn parse_complex(source: &str) -> Result<ComplexSelector, ViewError> {
    let mut cursor = Cursor::new(source);
    let mut parts: Vec<(Combinator, Compound)> = Vec::new();
    let mut pending = Combinator::Descendant;

    cursor.skip_whitespace();
    while cursor.peek().is_some() {
        if cursor.peek() == Some('>') {
            if parts.is_empty() {
                return Err(cursor.error("selector cannot start with `>`"));
            }
            cursor.bump();
            cursor.skip_whitespace();
            pending = Combinator::Child;
            continue;
        }

        let compound = cursor.compound()?;
        parts.push((pending, compound));
        pending = Combinator::Descendant;
        cursor.skip_whitespace();
    }

    if parts.is_empty() {
        return Err(cursor.error("empty selector"));
    }
    if pending == Combinator::Child {
        return Err(cursor.error("dangling `>`"));
    }
    Ok(ComplexSelector { parts })
}

/// Splits on commas that are not inside `[...]` or quotes.
fn split_list(source: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                pieces.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&source[start..]);
    pieces
}

pub fn parse_selector(source: &str) -> Result<SelectorList, ViewError> {
    let selectors = split_list(source)
        .into_iter()
        .map(parse_complex)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| match err {
            ViewError::InvalidSelector { reason, .. } => ViewError::InvalidSelector {
                selector: source.to_string(),
                reason,
            },
            other => other,
        })?;
    Ok(SelectorList { selectors })
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCHING
// ═══════════════════════════════════════════════════════════════════════════════

impl Compound {
    pub fn matches(&self, node: &Handle) -> bool {
        let Some(tag) = element_tag(node) else {
            return false;
        };
        if self.tag.as_ref().is_some_and(|t| *t != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if attribute(node, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = attribute(node, "class").unwrap_or_default();
            let classes: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|filter| {
            match (attribute(node, &filter.name), &filter.value) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == *expected,
            }
        })
    }
}

fn matches_parts(node: &Handle, parts: &[(Combinator, Compound)]) -> bool {
    let Some(((combinator, compound), rest)) = parts.split_last() else {
        return true;
    };
    if !compound.matches(node) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }

    match combinator {
        Combinator::Child => parent_element(node).is_some_and(|p| matches_parts(&p, rest)),
        Combinator::Descendant => {
            let mut current = parent_element(node);
            while let Some(ancestor) = current {
                if matches_parts(&ancestor, rest) {
                    return true;
                }
                current = parent_element(&ancestor);
            }
            false
        }
    }
}

impl SelectorList {
    pub fn matches(&self, node: &Handle) -> bool {
        self.selectors
            .iter()
            .any(|complex| matches_parts(node, &complex.parts))
    }
}
