//! Tree-to-speech translator
//!
//! Walks a normalized tree and renders it against a rule scope. Each node
//! picks the first declared still-eligible template among the patterns that
//! cover it, translates its children (through the template's nested table
//! when one is declared), and expands the template. Variable and numeric
//! leaves render through the `words` table directly.
//!
//! A node no pattern covers passes through unmodified; `translate` turns
//! that into a descriptive "missing rule" rendering at the top level while
//! `translate_node` exposes it to callers that want to detect the miss.

use crate::core::context::Context;
use crate::core::model::{is_lower_precedence, Node, Op};
use crate::core::normalize::normalize;
use crate::core::speak::expand::{expand, ExpandInputs};
use crate::core::speak::matcher::pattern_matches;
use crate::core::speak::rules::{ContextTag, RuleSet, Scope, Template};
use crate::utils::error::{MathError, MathResult};

/// Recursion guard independent of the step counter; a rule table that sends
/// `%%` back into itself without a shadowing entry hits this before the
/// native stack does.
const MAX_DEPTH: u32 = 1_000;

#[derive(Debug, Clone, Copy, Default)]
struct VisitState {
    /// The node being rendered is the direct child of a group
    inside_parens: bool,
    /// Some enclosing node on this walk is a radical
    inside_radical: bool,
    depth: u32,
}

impl VisitState {
    fn child_of(self, node: &Node) -> VisitState {
        VisitState {
            inside_parens: false,
            inside_radical: self.inside_radical || node.op == Op::Sqrt,
            depth: self.depth + 1,
        }
    }
}

/// Render `node` as spoken text. A top-level node no rule covers renders as
/// a "missing rule" description instead of failing.
pub fn translate(node: &Node, rules: &RuleSet, ctx: &mut Context) -> MathResult<String> {
    let out = translate_node(node, rules, ctx)?;
    if out.is_text_leaf() {
        Ok(trim(out.literal.as_deref().unwrap_or("")))
    } else {
        Ok(format!("missing rule for {:?} expression", out.op))
    }
}

/// Render `node`, returning either a text leaf or, when no pattern covers
/// some subtree, that subtree unmodified.
pub fn translate_node(node: &Node, rules: &RuleSet, ctx: &mut Context) -> MathResult<Node> {
    ctx.reset_steps();
    let normalized = normalize(node, ctx);
    let scope = Scope::new(rules);
    visit(&normalized, &scope, VisitState::default(), ctx)
}

/// Collapse whitespace runs and strip the trailing `baseline` markers the
/// subscript assembly leaves behind.
fn trim(text: &str) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    while words.last() == Some(&"baseline") {
        words.pop();
    }
    words.join(" ")
}

fn node_text(node: &Node) -> String {
    if node.args.is_empty() {
        node.literal.clone().unwrap_or_default()
    } else {
        String::new()
    }
}

// ============================================================================
// Template selection
// ============================================================================

enum Selection<'r> {
    Chosen(&'r Template),
    /// Some pattern covered the node but every template was filtered out
    Filtered,
    NoMatch,
}

fn context_ok(tag: ContextTag, state: VisitState, node: &Node) -> bool {
    match tag {
        ContextTag::NoParens => !state.inside_parens && !node.has_brackets(),
        ContextTag::OuterRadical => !state.inside_radical,
    }
}

fn select<'r>(
    node: &Node,
    scope: &Scope<'r>,
    state: VisitState,
    arg_count: usize,
) -> Selection<'r> {
    let mut covered = false;
    for (pattern, templates) in scope.rules_in_order() {
        if !pattern_matches(pattern, node, scope) {
            continue;
        }
        covered = true;
        for template in templates {
            let eligible = template.max_ordinal() <= arg_count
                && template
                    .context
                    .map_or(true, |tag| context_ok(tag, state, node));
            if eligible {
                return Selection::Chosen(template);
            }
        }
    }
    if covered {
        Selection::Filtered
    } else {
        Selection::NoMatch
    }
}

// ============================================================================
// Visitor
// ============================================================================

fn visit(node: &Node, scope: &Scope, state: VisitState, ctx: &mut Context) -> MathResult<Node> {
    ctx.step()?;
    if state.depth > MAX_DEPTH {
        return Err(MathError::too_long());
    }
    match node.op {
        Op::Num => numeric(node, scope, state, ctx),
        Op::Var => variable(node, scope, state, ctx),
        Op::Subscript => subscripted(node, scope, state, ctx),
        Op::Paren => group(node, scope, state, ctx),
        Op::None => Ok(Node::var("")),
        Op::Comma | Op::List | Op::Interval | Op::Vec => comma_join(node, scope, state, ctx),
        _ => rule_driven(node, scope, state, ctx),
    }
}

/// Numbers render through `words`, with `%IP`/`%FP` available to templates.
/// With no covering rule the word rendering itself is the output.
fn numeric(node: &Node, scope: &Scope, state: VisitState, ctx: &mut Context) -> MathResult<Node> {
    let literal = node.literal.clone().unwrap_or_default();
    let word = scope.lookup_word(&literal);
    match select(node, scope, state, 1) {
        Selection::Chosen(template) => {
            let local;
            let scope = match &template.subtable {
                Some(sub) => {
                    local = scope.push(sub);
                    &local
                }
                None => scope,
            };
            let args = [scope.lookup_word(&literal)];
            let decimal = split_decimal(&literal, ctx);
            let inputs = ExpandInputs {
                whole: template.text.contains("%%").then_some(word.as_str()),
                args: &args,
                dims: None,
                decimal: decimal.as_ref().map(|(ip, fp)| (ip.as_str(), fp.as_str())),
            };
            Ok(Node::var(expand(&template.text, &inputs)))
        }
        Selection::Filtered => Ok(Node::var("")),
        Selection::NoMatch => Ok(Node::var(word)),
    }
}

/// Integer and fractional part of a decimal literal, at any separator the
/// options admit.
fn split_decimal(literal: &str, ctx: &Context) -> Option<(String, String)> {
    let mut seps = ctx.options().decimal_separators();
    if !seps.contains(&'.') {
        seps.push('.');
    }
    let at = literal.find(|c| seps.contains(&c))?;
    Some((literal[..at].to_string(), literal[at + 1..].to_string()))
}

/// Variables render through `words`; subscript parts fold into
/// `<base> sub <part> baseline`.
fn variable(node: &Node, scope: &Scope, state: VisitState, ctx: &mut Context) -> MathResult<Node> {
    let literal = node.literal.clone().unwrap_or_default();
    let mut text = scope.lookup_word(&literal);
    for part in &node.args {
        let rendered = visit(part, scope, state.child_of(node), ctx)?;
        if !rendered.is_text_leaf() {
            return Ok(rendered);
        }
        text = format!("{} sub {} baseline", text, node_text(&rendered));
    }
    Ok(Node::var(text))
}

fn subscripted(
    node: &Node,
    scope: &Scope,
    state: VisitState,
    ctx: &mut Context,
) -> MathResult<Node> {
    let mut parts = Vec::with_capacity(node.args.len());
    for arg in &node.args {
        let rendered = visit(arg, scope, state.child_of(node), ctx)?;
        if !rendered.is_text_leaf() {
            return Ok(rendered);
        }
        parts.push(node_text(&rendered));
    }
    let mut it = parts.into_iter();
    let mut text = it.next().unwrap_or_default();
    for part in it {
        text = format!("{} sub {} baseline", text, part);
    }
    Ok(Node::var(text))
}

/// A group consults the rules (so `"(?)"` patterns apply); with no covering
/// rule it is transparent and marks its operand as parenthesized.
fn group(node: &Node, scope: &Scope, state: VisitState, ctx: &mut Context) -> MathResult<Node> {
    match select(node, scope, state, node.args.len()) {
        Selection::Chosen(template) => apply_template(node, template, scope, state, ctx),
        Selection::Filtered => Ok(Node::var("")),
        Selection::NoMatch => match node.args.first() {
            Some(inner) => {
                let inner_state = VisitState {
                    inside_parens: true,
                    ..state.child_of(node)
                };
                visit(inner, scope, inner_state, ctx)
            }
            None => Ok(Node::var("")),
        },
    }
}

/// Lists outside matrices fall back to a " comma " join when no rule covers
/// them.
fn comma_join(node: &Node, scope: &Scope, state: VisitState, ctx: &mut Context) -> MathResult<Node> {
    match select(node, scope, state, node.args.len()) {
        Selection::Chosen(template) => apply_template(node, template, scope, state, ctx),
        Selection::Filtered => Ok(Node::var("")),
        Selection::NoMatch => {
            let mut parts = Vec::with_capacity(node.args.len());
            for child in &node.args {
                let rendered = visit(child, scope, state.child_of(node), ctx)?;
                if !rendered.is_text_leaf() {
                    return Ok(rendered);
                }
                parts.push(node_text(&rendered));
            }
            Ok(Node::var(parts.join(" comma ")))
        }
    }
}

fn rule_driven(
    node: &Node,
    scope: &Scope,
    state: VisitState,
    ctx: &mut Context,
) -> MathResult<Node> {
    match select(node, scope, state, node.args.len()) {
        Selection::Chosen(template) => apply_template(node, template, scope, state, ctx),
        Selection::Filtered => Ok(Node::var("")),
        Selection::NoMatch => Ok(node.clone()),
    }
}

fn apply_template<'r>(
    node: &Node,
    template: &'r Template,
    scope: &Scope<'r>,
    state: VisitState,
    ctx: &mut Context,
) -> MathResult<Node> {
    let local;
    let scope = match &template.subtable {
        Some(sub) => {
            local = scope.push(sub);
            &local
        }
        None => scope,
    };
    let child_state = state.child_of(node);
    // Only infix operator parents wrap loose children in a synthesized
    // group; fenced forms (radicals, bars, big operators) already delimit
    // their operands in speech.
    let wrap = matches!(
        node.op,
        Op::Mul | Op::Times | Op::Div | Op::Frac | Op::Colon | Op::Pow
    );
    let mut args = Vec::with_capacity(node.args.len());
    for child in &node.args {
        let rendered = if wrap && is_lower_precedence(node, child) {
            let wrapped = Node::unary(Op::Paren, child.clone());
            visit(&wrapped, scope, child_state, ctx)?
        } else {
            visit(child, scope, child_state, ctx)?
        };
        if !rendered.is_text_leaf() {
            return Ok(rendered);
        }
        args.push(node_text(&rendered));
    }
    let whole = if template.text.contains("%%") {
        if template.subtable.is_some() {
            let rendered = visit(node, scope, child_state, ctx)?;
            if !rendered.is_text_leaf() {
                return Ok(rendered);
            }
            Some(node_text(&rendered))
        } else {
            Some(node_text(node))
        }
    } else {
        None
    };
    let inputs = ExpandInputs {
        whole: whole.as_deref(),
        args: &args,
        dims: node.meta.dims,
        decimal: None,
    };
    Ok(Node::var(expand(&template.text, &inputs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::parser::parse_expression;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn speak_with(table: serde_json::Value, src: &str) -> String {
        let mut ctx = Context::default();
        let rules = RuleSet::compile(&table, &mut ctx).unwrap();
        let node = parse_expression(src, &mut ctx).unwrap();
        translate(&node, &rules, &mut ctx).unwrap()
    }

    fn basic_table() -> serde_json::Value {
        json!({
            "words": { "\\pi": "pi" },
            "rules": {
                "?:number": "%1",
                "? + ?": "%1 plus %2",
                "? - ?": "%1 minus %2",
                "-?": "negative %1",
                "?^2": "%1 squared",
                "?^?": "%1 to the power of %2",
                "(?)": "open paren %1 close paren"
            }
        })
    }

    #[test]
    fn test_binary_addition() {
        assert_eq!(speak_with(basic_table(), "1+2"), "1 plus 2");
    }

    #[test]
    fn test_flattened_chain_folds() {
        assert_eq!(speak_with(basic_table(), "1+2+3"), "1 plus 2 plus 3");
    }

    #[test]
    fn test_exact_rule_beats_shape() {
        let table = json!({
            "rules": {
                "\\frac{1}{2}": "1 half",
                "? / ?": "%1 over %2",
                "?:integer": "%1"
            }
        });
        assert_eq!(speak_with(table.clone(), "\\frac{1}{2}"), "1 half");
        assert_eq!(speak_with(table, "\\frac{1}{3}"), "1 over 3");
    }

    #[test]
    fn test_exponent_special_case() {
        assert_eq!(speak_with(basic_table(), "x^2"), "x squared");
        assert_eq!(speak_with(basic_table(), "x^5"), "x to the power of 5");
    }

    #[test]
    fn test_words_lookup() {
        assert_eq!(speak_with(basic_table(), "\\pi + 1"), "pi plus 1");
        // Miss strips the command backslash.
        assert_eq!(speak_with(basic_table(), "\\theta + 1"), "theta plus 1");
    }

    #[test]
    fn test_decimal_point_reading() {
        assert_eq!(speak_with(basic_table(), "3.14"), "3 point 14");
    }

    #[test]
    fn test_parens_render_and_recurse() {
        assert_eq!(
            speak_with(basic_table(), "(1+2)"),
            "open paren 1 plus 2 close paren"
        );
    }

    #[test]
    fn test_no_parens_context_tag() {
        let table = json!({
            "rules": {
                "?:number": "%1",
                "? + ?": [
                    { "context": "noParens", "template": "%1 plus %2" },
                    "the sum %1 and %2"
                ]
            }
        });
        let mut ctx = Context::default();
        let rules = RuleSet::compile(&table, &mut ctx).unwrap();
        let bare = parse_expression("1+2", &mut ctx).unwrap();
        assert_eq!(translate(&bare, &rules, &mut ctx).unwrap(), "1 plus 2");
        let grouped = parse_expression("(1+2)", &mut ctx).unwrap();
        assert_eq!(
            translate(&grouped, &rules, &mut ctx).unwrap(),
            "the sum 1 and 2"
        );
    }

    #[test]
    fn test_outer_radical_context_tag() {
        let table = json!({
            "rules": {
                "?:number": "%1",
                "\\sqrt{?}": [
                    { "context": "outerRadical", "template": "the square root of %1" },
                    "root %1"
                ]
            }
        });
        assert_eq!(speak_with(table.clone(), "\\sqrt{2}"), "the square root of 2");
        assert_eq!(
            speak_with(table, "\\sqrt{\\sqrt{2}}"),
            "the square root of root 2"
        );
    }

    #[test]
    fn test_nested_table_scopes_matrix() {
        let table = json!({
            "rules": {
                "?:number": "%1",
                "?:matrix": {
                    "the %M by %N matrix %*": {
                        "?:row": "row %*",
                        "?:column": "%*"
                    }
                }
            }
        });
        assert_eq!(
            speak_with(table, "\\begin{bmatrix} 1 & 2 \\\\ 3 & 4 \\end{bmatrix}"),
            "the 2 by 2 matrix row 1 2 row 3 4"
        );
    }

    #[test]
    fn test_subscript_assembly() {
        assert_eq!(speak_with(basic_table(), "a_n + 1"), "a sub n baseline plus 1");
        // Trailing baseline markers trim away.
        assert_eq!(speak_with(basic_table(), "a_n"), "a sub n");
    }

    #[test]
    fn test_comma_join_fallback() {
        assert_eq!(speak_with(basic_table(), "1, 2, 3"), "1 comma 2 comma 3");
    }

    #[test]
    fn test_missing_rule_passes_through() {
        let table = json!({ "rules": { "?:number": "%1" } });
        let mut ctx = Context::default();
        let rules = RuleSet::compile(&table, &mut ctx).unwrap();
        let node = parse_expression("1+2", &mut ctx).unwrap();
        let out = translate_node(&node, &rules, &mut ctx).unwrap();
        assert!(!out.is_text_leaf());
        assert_eq!(out.op, Op::Add);
        assert_eq!(
            translate(&node, &rules, &mut ctx).unwrap(),
            "missing rule for Add expression"
        );
    }

    #[test]
    fn test_precedence_wraps_loose_child() {
        let table = json!({
            "rules": {
                "?:number": "%1",
                "? + ?": "%1 plus %2",
                "? \\cdot ?": "%1 times %2",
                "(?)": "open paren %1 close paren"
            }
        });
        let mut ctx = Context::default();
        let rules = RuleSet::compile(&table, &mut ctx).unwrap();
        // Hand-built Times over Add, as rule rewriting can produce.
        let sum = parse_expression("1+2", &mut ctx).unwrap();
        let product = Node::new(Op::Times, vec![Node::num("3"), sum]);
        assert_eq!(
            translate(&product, &rules, &mut ctx).unwrap(),
            "3 times open paren 1 plus 2 close paren"
        );
    }

    #[test]
    fn test_step_counter_aborts_runaway_table() {
        // %% with a subtable that does not shadow the pattern recurses until
        // the guard trips.
        let table = json!({
            "rules": {
                "? + ?": { "the sum %%": { "?:variable": "%1" } }
            }
        });
        let mut ctx = Context::default();
        let rules = RuleSet::compile(&table, &mut ctx).unwrap();
        let node = parse_expression("1+2", &mut ctx).unwrap();
        assert!(translate(&node, &rules, &mut ctx).is_err());
    }
}
