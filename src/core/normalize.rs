//! Literal normalizer
//!
//! Puts a parsed tree into the canonical shape rule patterns are compiled
//! into, so a pattern written one way matches an input written another.
//! Nested same-operator additions and multiplications are flattened, a fully
//! explicit multiplication chain becomes a `Times` node, and under
//! `ignoreOrder` the strict comparisons are flipped to their mirrored form.
//! The pass is idempotent.

use crate::core::context::Context;
use crate::core::model::{Node, Op};

pub fn normalize(node: &Node, ctx: &Context) -> Node {
    let ignore_order = ctx.options().ignore_order;
    normalize_inner(node, ignore_order)
}

fn normalize_inner(node: &Node, ignore_order: bool) -> Node {
    let mut out = node.clone();
    out.args = node
        .args
        .iter()
        .map(|n| normalize_inner(n, ignore_order))
        .collect();
    match out.op {
        Op::Add | Op::Mul | Op::Times if out.args.len() > 1 => {
            let op = out.op;
            let mut flat = Vec::with_capacity(out.args.len());
            for n in out.args {
                if n.op == op {
                    flat.extend(n.args);
                } else {
                    flat.push(n);
                }
            }
            out.args = flat;
            if op == Op::Mul && is_fully_explicit(&out) {
                out.op = Op::Times;
            }
            out
        }
        Op::Gt if ignore_order => {
            out.op = Op::Lt;
            out.args.reverse();
            out
        }
        Op::Ge if ignore_order => {
            out.op = Op::Le;
            out.args.reverse();
            out
        }
        _ => out,
    }
}

/// A multiplication chain with no implicit, polynomial, scientific or
/// binomial reading was written with explicit operators throughout.
fn is_fully_explicit(node: &Node) -> bool {
    !node.meta.is_implicit
        && !node.meta.is_polynomial
        && !node.meta.is_scientific
        && !node.meta.is_binomial
        && node.args.iter().all(|n| {
            !n.meta.is_implicit && !n.meta.is_polynomial
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::parser::parse_expression;
    use crate::core::options::Options;
    use serde_json::json;

    fn norm(src: &str) -> Node {
        let mut ctx = Context::default();
        let n = parse_expression(src, &mut ctx).unwrap();
        normalize(&n, &ctx)
    }

    #[test]
    fn test_flatten_addition() {
        let n = norm("1 + 2 + 3 + 4");
        assert_eq!(n.op, Op::Add);
        assert_eq!(n.args.len(), 4);
    }

    #[test]
    fn test_explicit_chain_becomes_times() {
        let n = norm("2 \\cdot 3 \\cdot 4");
        assert_eq!(n.op, Op::Times);
        assert_eq!(n.args.len(), 3);
    }

    #[test]
    fn test_implicit_chain_stays_mul() {
        let n = norm("2x");
        assert_eq!(n.op, Op::Mul);
    }

    #[test]
    fn test_ignore_order_flips_strict_comparisons() {
        let mut ctx = Context::new(
            Options::from_json(&json!({"ignoreOrder": true})).unwrap(),
        );
        let n = parse_expression("x > 3", &mut ctx).unwrap();
        let n = normalize(&n, &ctx);
        assert_eq!(n.op, Op::Lt);
        assert_eq!(n.args[0], Node::num("3"));
        assert!(n.args[1].is_var_named("x"));
    }

    #[test]
    fn test_idempotent() {
        let once = norm("1 + 2 \\cdot 3 \\cdot x + 4");
        let twice = normalize(&once, &Context::default());
        assert_eq!(once, twice);
    }
}
