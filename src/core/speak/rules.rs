//! Rule table compiler
//!
//! A rule table is plain JSON: a `words` pronunciation map, a `types` map of
//! named pattern disjunctions, and a `rules` map from pattern string to
//! template value. Pattern strings are parsed with the ordinary parser and
//! normalized, and the canonical tree is the lookup key, so `"1/2"` and
//! `"\frac{1}{2}"` compile to the same entry. Declaration order is kept;
//! duplicate keys resolve first-write-wins.
//!
//! Template values come in four shapes: a plain string, an array of
//! alternative strings (first eligible wins), a `{"context": .., "template":
//! ..}` object restricting when the template applies, and an object whose
//! single key is a template string and whose value is a nested rule table
//! scoped to that template's arguments.

use crate::core::context::{Context, EnvFrame};
use crate::core::model::parser::parse_expression;
use crate::core::model::Node;
use crate::core::normalize::normalize;
use crate::data::symbols::Symbol;
use crate::utils::error::{MathError, MathResult};
use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use serde_json::Value;

/// Built-in wildcard class names. Declared as identifiers while compiling
/// patterns so the lexer keeps them whole instead of splitting them at unit
/// prefixes.
pub const TYPE_CLASS_NAMES: &[&str] = &[
    "integer",
    "decimal",
    "scientific",
    "fraction",
    "mixedfraction",
    "number",
    "variable",
    "row",
    "column",
    "matrix",
    "smallrow",
    "smallcolumn",
    "smallmatrix",
    "simplerow",
    "simplecolumn",
    "simplematrix",
    "simplesmallrow",
    "simplesmallcolumn",
    "simplesmallmatrix",
];

/// Predicate restricting when a template applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextTag {
    /// Only when the node is not parenthesized
    NoParens,
    /// Only when no enclosing radical is being rendered
    OuterRadical,
}

impl ContextTag {
    fn parse(name: &str) -> MathResult<ContextTag> {
        match name {
            "noParens" => Ok(ContextTag::NoParens),
            "outerRadical" => Ok(ContextTag::OuterRadical),
            _ => Err(MathError::invalid_option_value("context", name)),
        }
    }
}

/// One candidate output string for a pattern.
#[derive(Debug, Clone)]
pub struct Template {
    pub text: String,
    pub context: Option<ContextTag>,
    /// Rules scoped to this template's arguments; shadows the enclosing
    /// table during recursion
    pub subtable: Option<RuleSet>,
}

impl Template {
    fn plain(text: impl Into<String>) -> Template {
        Template {
            text: text.into(),
            context: None,
            subtable: None,
        }
    }

    /// Highest ordinal placeholder (`%1`..`%9`) in the template text.
    pub fn max_ordinal(&self) -> usize {
        crate::core::speak::expand::max_ordinal(&self.text)
    }
}

/// One compiled rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub words: FxHashMap<String, String>,
    pub types: FxHashMap<String, Vec<Node>>,
    /// Pattern tree -> candidate templates, in declaration order
    pub rules: IndexMap<Node, Vec<Template>>,
}

impl RuleSet {
    /// Compile a `{words, types, rules}` JSON table.
    pub fn compile(table: &Value, ctx: &mut Context) -> MathResult<RuleSet> {
        let words = parse_words(table.get("words"))?;
        let types_spec = table.get("types");
        let rules_spec = table.get("rules");

        // The pattern parser must treat class names and user type names as
        // known identifiers so longest-match lexing keeps them whole.
        let mut frame = EnvFrame::default();
        for name in TYPE_CLASS_NAMES {
            frame.insert((*name).to_string(), Symbol::Var);
        }
        if let Some(Value::Object(map)) = types_spec {
            for name in map.keys() {
                frame.insert(name.clone(), Symbol::Var);
            }
        }
        ctx.with_frame(frame, |ctx| {
            let types = parse_types(types_spec, ctx)?;
            let rules = parse_rules(rules_spec, ctx)?;
            Ok(RuleSet {
                words,
                types,
                rules,
            })
        })
    }

    /// Build the table named by the active options.
    pub fn from_options(ctx: &mut Context) -> MathResult<RuleSet> {
        let mut table = serde_json::Map::new();
        if let Some(words) = ctx.options().words.clone() {
            table.insert("words".to_string(), words);
        }
        if let Some(types) = ctx.options().types.clone() {
            table.insert("types".to_string(), types);
        }
        if let Some(rules) = ctx.options().rules.clone() {
            table.insert("rules".to_string(), rules);
        }
        RuleSet::compile(&Value::Object(table), ctx)
    }
}

fn compile_pattern(src: &str, ctx: &mut Context) -> MathResult<Node> {
    let node = parse_expression(src, ctx)?;
    Ok(normalize(&node, ctx))
}

fn parse_words(spec: Option<&Value>) -> MathResult<FxHashMap<String, String>> {
    let mut words = FxHashMap::default();
    match spec {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (k, v) in map {
                match v.as_str() {
                    Some(s) => {
                        words.insert(k.clone(), s.to_string());
                    }
                    None => {
                        return Err(MathError::invalid_option_value("words", &v.to_string()))
                    }
                }
            }
        }
        Some(other) => {
            return Err(MathError::invalid_option_value("words", &other.to_string()))
        }
    }
    Ok(words)
}

fn parse_types(
    spec: Option<&Value>,
    ctx: &mut Context,
) -> MathResult<FxHashMap<String, Vec<Node>>> {
    let mut types = FxHashMap::default();
    match spec {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, alternatives) in map {
                let list = match alternatives {
                    Value::Array(items) => items,
                    other => {
                        return Err(MathError::invalid_option_value(
                            "types",
                            &other.to_string(),
                        ))
                    }
                };
                let mut patterns = Vec::with_capacity(list.len());
                for item in list {
                    match item.as_str() {
                        Some(s) => patterns.push(compile_pattern(s, ctx)?),
                        None => {
                            return Err(MathError::invalid_option_value(
                                "types",
                                &item.to_string(),
                            ))
                        }
                    }
                }
                types.insert(name.clone(), patterns);
            }
        }
        Some(other) => {
            return Err(MathError::invalid_option_value("types", &other.to_string()))
        }
    }
    Ok(types)
}

fn parse_rules(
    spec: Option<&Value>,
    ctx: &mut Context,
) -> MathResult<IndexMap<Node, Vec<Template>>> {
    let mut rules = IndexMap::new();
    let map = match spec {
        None | Some(Value::Null) => return Ok(rules),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(MathError::invalid_option_value("rules", &other.to_string()))
        }
    };
    for (pattern_src, template_spec) in map {
        let key = compile_pattern(pattern_src, ctx)?;
        if rules.contains_key(&key) {
            // First write wins.
            continue;
        }
        let templates = parse_template_value(template_spec, ctx)?;
        rules.insert(key, templates);
    }
    Ok(rules)
}

fn parse_template_value(spec: &Value, ctx: &mut Context) -> MathResult<Vec<Template>> {
    match spec {
        Value::String(s) => Ok(vec![Template::plain(s)]),
        Value::Array(items) => {
            let mut templates = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => templates.push(Template::plain(s)),
                    None => {
                        return Err(MathError::invalid_option_value(
                            "rules",
                            &item.to_string(),
                        ))
                    }
                }
            }
            Ok(templates)
        }
        Value::Object(map) if map.contains_key("context") => {
            let tag = map
                .get("context")
                .and_then(Value::as_str)
                .map(ContextTag::parse)
                .transpose()?
                .ok_or_else(|| MathError::invalid_option_value("context", &spec.to_string()))?;
            let mut templates = match map.get("template") {
                Some(t) => parse_template_value(t, ctx)?,
                None => {
                    return Err(MathError::invalid_option_value("rules", &spec.to_string()))
                }
            };
            for t in &mut templates {
                t.context = Some(tag);
            }
            Ok(templates)
        }
        Value::Object(map) => {
            // Each key is a template string scoped to its own nested table.
            let mut templates = Vec::with_capacity(map.len());
            for (text, nested) in map {
                let table = if nested.get("rules").is_some()
                    || nested.get("words").is_some()
                    || nested.get("types").is_some()
                {
                    nested.clone()
                } else {
                    // A bare pattern map is shorthand for {"rules": ..}.
                    let mut wrapped = serde_json::Map::new();
                    wrapped.insert("rules".to_string(), nested.clone());
                    Value::Object(wrapped)
                };
                let subtable = RuleSet::compile(&table, ctx)?;
                templates.push(Template {
                    text: text.clone(),
                    context: None,
                    subtable: Some(subtable),
                });
            }
            Ok(templates)
        }
        other => Err(MathError::invalid_option_value("rules", &other.to_string())),
    }
}

// ============================================================================
// Scope chain
// ============================================================================

/// A chain of rule tables, innermost last. Translation pushes a template's
/// nested table while rendering that template's arguments; local entries
/// shadow enclosing ones on key collision.
#[derive(Debug, Clone)]
pub struct Scope<'r> {
    sets: Vec<&'r RuleSet>,
}

impl<'r> Scope<'r> {
    pub fn new(root: &'r RuleSet) -> Scope<'r> {
        Scope { sets: vec![root] }
    }

    pub fn push(&self, local: &'r RuleSet) -> Scope<'r> {
        let mut sets = self.sets.clone();
        sets.push(local);
        Scope { sets }
    }

    /// Rules in tie-break order: innermost table first, each in declaration
    /// order, with keys shadowed by an inner table skipped.
    pub fn rules_in_order(&self) -> Vec<(&'r Node, &'r Vec<Template>)> {
        let mut seen: FxHashSet<&Node> = FxHashSet::default();
        let mut out = Vec::new();
        for set in self.sets.iter().rev() {
            for (pattern, templates) in &set.rules {
                if seen.insert(pattern) {
                    out.push((pattern, templates));
                }
            }
        }
        out
    }

    /// Innermost-first user type lookup.
    pub fn lookup_type(&self, name: &str) -> Option<&'r Vec<Node>> {
        self.sets.iter().rev().find_map(|s| s.types.get(name))
    }

    /// Pronunciation lookup; a miss strips the leading backslash and reads
    /// a decimal point aloud.
    pub fn lookup_word(&self, raw: &str) -> String {
        for set in self.sets.iter().rev() {
            if let Some(word) = set.words.get(raw) {
                return word.clone();
            }
        }
        let val = raw.strip_prefix('\\').unwrap_or(raw);
        match val.find('.') {
            Some(i) => format!("{} point {}", &val[..i], &val[i + 1..]),
            None => val.to_string(),
        }
    }
}
