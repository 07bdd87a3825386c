//! Template Module
//!
//! The [`TemplateCompiler`] capability substitutes data into template markup.
//! [`DelimitedCompiler`] is the bundled implementation: it reads the
//! delimiters configured in [`TemplateSettings`], rewrites the markup into a
//! `tera` template and lets tera do the rendering and escaping.
//!
//! ## Forms (default delimiters)
//!
//! - `<#= path #>`: raw interpolation of a dotted path (`user.name`, `items.0`)
//! - `<#- path #>`: HTML-escaped interpolation
//! - `<# if cond #>` / `<# else #>` / `<# end #>`: `cond` is a path, optionally negated with `!`
//! - `<# each path as item #>` / `<# each path as item, i #>` ... `<# end #>`
//!
//! Missing and null values render empty. Conditions follow tera truthiness,
//! so empty strings, empty arrays, empty objects and zero are false. `each`
//! iterates arrays; a missing or empty array renders nothing.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tera::{Context, Tera};

use crate::error::ViewError;

pub use tera::escape_html;

/// Compiles template markup against a data context.
pub trait TemplateCompiler {
    fn render(&self, markup: &str, data: &Value) -> Result<String, ViewError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Delimiters {
    pub fn new(open: &str, close: &str) -> Self {
        Self {
            open: open.to_string(),
            close: close.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateSettings {
    pub interpolate: Delimiters,
    /// HTML-escaped interpolation; None disables the form.
    pub escape: Option<Delimiters>,
    pub evaluate: Delimiters,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            interpolate: Delimiters::new("<#=", "#>"),
            escape: Some(Delimiters::new("<#-", "#>")),
            evaluate: Delimiters::new("<#", "#>"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENIZER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Interpolate,
    Escape,
    Evaluate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Tag(TagKind, String),
}

fn compile_error(reason: impl Into<String>) -> ViewError {
    ViewError::TemplateCompile {
        template: String::new(),
        reason: reason.into(),
    }
}

fn tera_error(err: tera::Error) -> ViewError {
    let mut reason = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    compile_error(reason)
}

fn tokenize(markup: &str, settings: &TemplateSettings) -> Result<Vec<Token>, ViewError> {
    let mut forms = vec![
        (TagKind::Interpolate, &settings.interpolate),
        (TagKind::Evaluate, &settings.evaluate),
    ];
    if let Some(escape) = &settings.escape {
        forms.push((TagKind::Escape, escape));
    }

    let mut tokens = Vec::new();
    let mut rest = markup;
    loop {
        // Earliest opener wins; on a tie the longest (`<#=` over `<#`).
        let next = forms
            .iter()
            .filter(|(_, d)| !d.open.is_empty())
            .filter_map(|(kind, d)| rest.find(d.open.as_str()).map(|at| (at, *kind, *d)))
            .min_by(|a, b| a.0.cmp(&b.0).then(b.2.open.len().cmp(&a.2.open.len())));

        let Some((at, kind, delimiters)) = next else {
            if !rest.is_empty() {
                tokens.push(Token::Text(rest.to_string()));
            }
            return Ok(tokens);
        };

        if at > 0 {
            tokens.push(Token::Text(rest[..at].to_string()));
        }
        let body_start = at + delimiters.open.len();
        let Some(len) = rest[body_start..].find(delimiters.close.as_str()) else {
            return Err(compile_error(format!("unterminated `{}`", delimiters.open)));
        };
        tokens.push(Token::Tag(kind, rest[body_start..body_start + len].trim().to_string()));
        rest = &rest[body_start + len + delimiters.close.len()..];
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSLATION
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref PATH_RE: Regex = Regex::new(r"^[A-Za-z_]\w*(?:\.\w+)*$").unwrap();
    static ref IF_RE: Regex = Regex::new(r"^if\s+(!?)\s*(\S+)$").unwrap();
    static ref EACH_RE: Regex =
        Regex::new(r"^each\s+(\S+)\s+as\s+([A-Za-z_]\w*)(?:\s*,\s*([A-Za-z_]\w*))?$").unwrap();
}

const TERA_OPENERS: [&str; 3] = ["{{", "{%", "{#"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    If { has_else: bool },
    Each,
}

fn data_path(source: &str) -> Result<&str, ViewError> {
    if PATH_RE.is_match(source) {
        Ok(source)
    } else {
        Err(compile_error(format!("`{}` is not a data path", source)))
    }
}

/// Literal text must not be read as tera syntax.
fn push_text(out: &mut String, text: &str) {
    if TERA_OPENERS.iter().any(|o| text.contains(o)) || text.ends_with('{') {
        out.push_str("{% raw %}");
        out.push_str(text);
        out.push_str("{% endraw %}");
    } else {
        out.push_str(text);
    }
}

/// Rewrites delimited markup into tera source.
fn translate(markup: &str, settings: &TemplateSettings) -> Result<String, ViewError> {
    let mut out = String::with_capacity(markup.len());
    let mut blocks: Vec<Block> = Vec::new();

    for token in tokenize(markup, settings)? {
        match token {
            Token::Text(text) => push_text(&mut out, &text),
            Token::Tag(TagKind::Interpolate, expr) => {
                out.push_str(&format!("{{{{ {} | default(value=\"\") }}}}", data_path(&expr)?));
            }
            Token::Tag(TagKind::Escape, expr) => {
                out.push_str(&format!(
                    "{{{{ {} | default(value=\"\") | as_str | escape }}}}",
                    data_path(&expr)?
                ));
            }
            Token::Tag(TagKind::Evaluate, stmt) => statement(&mut out, &mut blocks, &stmt)?,
        }
    }

    match blocks.last() {
        None => Ok(out),
        Some(Block::If { .. }) => Err(compile_error("`if` without `end`")),
        Some(Block::Each) => Err(compile_error("`each` without `end`")),
    }
}

fn statement(out: &mut String, blocks: &mut Vec<Block>, stmt: &str) -> Result<(), ViewError> {
    match stmt {
        "else" => {
            match blocks.last_mut() {
                Some(Block::If { has_else }) if !*has_else => *has_else = true,
                Some(Block::If { .. }) => return Err(compile_error("duplicate `else`")),
                Some(Block::Each) => return Err(compile_error("`else` inside `each`")),
                None => return Err(compile_error("`else` outside of `if`")),
            }
            out.push_str("{% else %}");
            return Ok(());
        }
        "end" => {
            match blocks.pop() {
                Some(Block::If { .. }) => out.push_str("{% endif %}"),
                Some(Block::Each) => out.push_str("{% endfor %}{% endif %}"),
                None => return Err(compile_error("unmatched `end`")),
            }
            return Ok(());
        }
        _ => {}
    }

    if let Some(caps) = IF_RE.captures(stmt) {
        let negate = if &caps[1] == "!" { "not " } else { "" };
        out.push_str(&format!("{{% if {}{} %}}", negate, data_path(&caps[2])?));
        blocks.push(Block::If { has_else: false });
        return Ok(());
    }

    if let Some(caps) = EACH_RE.captures(stmt) {
        let path = data_path(&caps[1])?;
        // The guard skips missing, null and empty collections.
        out.push_str(&format!("{{% if {} %}}{{% for {} in {} %}}", path, &caps[2], path));
        if let Some(index) = caps.get(3) {
            out.push_str(&format!("{{% set {} = loop.index0 %}}", index.as_str()));
        }
        blocks.push(Block::Each);
        return Ok(());
    }

    Err(compile_error(format!("unknown statement `{}`", stmt)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

const TEMPLATE_NAME: &str = "miniview";

/// A parsed template, reusable across data contexts.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    tera: Tera,
}

impl CompiledTemplate {
    pub fn render(&self, data: &Value) -> Result<String, ViewError> {
        let context = match data {
            Value::Object(_) => Context::from_value(data.clone()).map_err(tera_error)?,
            _ => Context::new(),
        };
        self.tera.render(TEMPLATE_NAME, &context).map_err(tera_error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DelimitedCompiler {
    settings: TemplateSettings,
}

impl DelimitedCompiler {
    pub fn new(settings: TemplateSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TemplateSettings {
        &self.settings
    }

    pub fn compile(&self, markup: &str) -> Result<CompiledTemplate, ViewError> {
        let source = translate(markup, &self.settings)?;
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_template(TEMPLATE_NAME, &source)
            .map_err(tera_error)?;
        Ok(CompiledTemplate { tera })
    }
}

impl TemplateCompiler for DelimitedCompiler {
    fn render(&self, markup: &str, data: &Value) -> Result<String, ViewError> {
        self.compile(markup)?.render(data)
    }
}
