//! Pattern matcher
//!
//! Decides whether a compiled pattern tree covers a normalized input tree.
//! `?` matches any node, `?:class` restricts the wildcard to one of the
//! built-in value classes or to a user-declared type, and a trailing integer
//! on a numeric class (`?:integer 3`) pins the digit count. Everything else
//! matches structurally: same operator, same arity, children pairwise. A
//! two-child pattern additionally covers a longer flattened chain of the
//! same operator; the expander folds such a match pairwise.

use crate::core::model::{Node, NumberFormat, Op};
use crate::core::speak::rules::Scope;

/// A typed wildcard as it comes out of the pattern parser: `?:integer`
/// compiles to `Colon(?, integer)` and a digit-count suffix rides along as
/// an implicit multiplication.
fn as_typed_wildcard(pattern: &Node) -> Option<(&str, Option<usize>)> {
    match pattern.op {
        Op::Colon if pattern.args.len() == 2 => {
            let (head, class) = (&pattern.args[0], &pattern.args[1]);
            if head.is_var_named("?")
                && head.args.is_empty()
                && class.is_var()
                && !class.is_var_named("?")
            {
                class.literal.as_deref().map(|name| (name, None))
            } else {
                None
            }
        }
        Op::Mul if pattern.args.len() == 2 => {
            let (name, _) = as_typed_wildcard(&pattern.args[0])?;
            let count = pattern.args[1]
                .is_integer_literal()
                .then(|| pattern.args[1].literal.as_deref())
                .flatten()
                .and_then(|s| s.parse::<usize>().ok())?;
            Some((name, Some(count)))
        }
        _ => None,
    }
}

fn digit_count(node: &Node) -> usize {
    node.literal
        .as_deref()
        .map(|s| s.chars().filter(|c| c.is_ascii_digit()).count())
        .unwrap_or(0)
}

fn is_simple_leaf(node: &Node) -> bool {
    (node.is_num() || node.is_var()) && node.args.is_empty()
}

/// All cells of an aggregate are bare numbers or variables.
fn is_simple_aggregate(node: &Node) -> bool {
    match node.op {
        Op::Matrix | Op::Row => node.args.iter().all(is_simple_aggregate),
        Op::Col => node.args.iter().all(is_simple_leaf),
        _ => false,
    }
}

/// Row and column counts both at most three.
fn is_small_aggregate(node: &Node) -> bool {
    match node.op {
        Op::Matrix => node
            .meta
            .dims
            .map_or(false, |(r, c)| r <= 3 && c <= 3),
        Op::Row | Op::Col => node.args.len() <= 3,
        _ => false,
    }
}

fn matches_class(name: &str, count: Option<usize>, node: &Node, scope: &Scope) -> bool {
    let counted = |ok: bool| ok && count.map_or(true, |n| digit_count(node) == n);
    match name {
        "integer" => counted(node.meta.number_format == Some(NumberFormat::Integer)),
        "decimal" => counted(node.meta.number_format == Some(NumberFormat::Decimal)),
        "scientific" => node.meta.is_scientific,
        "fraction" => node.op == Op::Frac,
        "mixedfraction" => node.meta.is_mixed_fraction,
        "number" => counted(node.is_num()) || node.is_simple_fraction(),
        "variable" => node.is_var(),
        "matrix" => node.op == Op::Matrix,
        "row" => node.op == Op::Row,
        "column" => node.op == Op::Col,
        "smallmatrix" => node.op == Op::Matrix && is_small_aggregate(node),
        "smallrow" => node.op == Op::Row && is_small_aggregate(node),
        "smallcolumn" => node.op == Op::Col && is_small_aggregate(node),
        "simplematrix" => node.op == Op::Matrix && is_simple_aggregate(node),
        "simplerow" => node.op == Op::Row && is_simple_aggregate(node),
        "simplecolumn" => node.op == Op::Col && is_simple_aggregate(node),
        "simplesmallmatrix" => {
            node.op == Op::Matrix && is_small_aggregate(node) && is_simple_aggregate(node)
        }
        "simplesmallrow" => {
            node.op == Op::Row && is_small_aggregate(node) && is_simple_aggregate(node)
        }
        "simplesmallcolumn" => {
            node.op == Op::Col && is_small_aggregate(node) && is_simple_aggregate(node)
        }
        // User-declared type: a disjunction of patterns.
        _ => scope
            .lookup_type(name)
            .map_or(false, |patterns| {
                patterns.iter().any(|p| pattern_matches(p, node, scope))
            }),
    }
}

/// Whether `pattern` covers `node` under the active scope.
pub fn pattern_matches(pattern: &Node, node: &Node, scope: &Scope) -> bool {
    if pattern.is_var_named("?") && pattern.args.is_empty() {
        return true;
    }
    if let Some((name, count)) = as_typed_wildcard(pattern) {
        return matches_class(name, count, node, scope);
    }
    if pattern.op != node.op {
        return false;
    }
    if pattern.args.is_empty() && node.args.is_empty() {
        return pattern.literal == node.literal;
    }
    if pattern.args.len() == node.args.len() {
        return pattern
            .args
            .iter()
            .zip(&node.args)
            .all(|(p, n)| pattern_matches(p, n, scope));
    }
    // A binary pattern also covers a longer flattened chain: the head child
    // must match the first operand and the tail child the synthesized rest.
    if pattern.args.len() == 2 && node.args.len() > 2 {
        if !pattern_matches(&pattern.args[0], &node.args[0], scope) {
            return false;
        }
        let rest = Node::new(node.op, node.args[1..].to_vec());
        return pattern_matches(&pattern.args[1], &rest, scope);
    }
    false
}
