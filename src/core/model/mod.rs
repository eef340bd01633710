//! Expression tree model
//!
//! The universal intermediate form shared by the parser, the normalizer and
//! the translation engine. A [`Node`] is a tagged operator with an ordered
//! list of child nodes; leaves carry a literal string instead. Every node
//! carries one uniformly-present [`Meta`] record for the flags the parser
//! attaches (number format, mixed fraction, implicit multiplication, bracket
//! kinds, matrix dimensions).
//!
//! Structural equality and hashing cover the operator, the literal and the
//! children only - metadata never participates - so two independently parsed
//! occurrences of the same pattern string produce equal rule-table keys.

pub mod lexer;
pub mod parser;

use std::hash::{Hash, Hasher};

/// The closed operator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Numeric literal
    Num,
    /// Variable (may carry subscript/annotation children)
    Var,
    Add,
    Sub,
    /// Plus-or-minus, prefix or infix
    Pm,
    /// Set difference `\backslash`
    Backslash,
    /// Multiplication chain (implicit or mixed)
    Mul,
    /// Fully explicit multiplication chain, introduced by the normalizer
    Times,
    /// Long division `\div`
    Div,
    /// Fraction `\frac` and `/`
    Frac,
    /// Ratio `:`
    Colon,
    Pow,
    Subscript,
    Sqrt,
    Vec,
    Abs,
    Percent,
    Fact,
    Eql,
    Ne,
    Approx,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    To,
    RightArrow,
    Comma,
    List,
    Set,
    Interval,
    Matrix,
    Row,
    Col,
    /// Synthesized grouping used for precedence-driven parenthesization and
    /// for bracketed sub-expressions
    Paren,
    Exists,
    Forall,
    Lim,
    Exp,
    Sum,
    Int,
    Prod,
    /// Molar concentration `\M`
    Molecule,
    /// Type annotation `\type{..}`
    Type,
    Overline,
    Overset,
    Underset,
    Dot,
    MathField,
    /// Empty input placeholder
    None,
}

/// Number literal format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Integer,
    Decimal,
}

/// Bracket kinds recorded on grouped nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    Paren,
    Square,
    Brace,
}

/// Uniform node metadata. Default is "no flags set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub number_format: Option<NumberFormat>,
    pub is_repeating: bool,
    pub is_fraction: bool,
    pub is_mixed_fraction: bool,
    pub is_scientific: bool,
    pub is_polynomial: bool,
    pub is_implicit: bool,
    pub is_binomial: bool,
    pub has_thousands_separator: bool,
    pub has_leading_zero: bool,
    pub has_trailing_zero: bool,
    pub lbrk: Option<Bracket>,
    pub rbrk: Option<Bracket>,
    /// Rows x columns, set on matrix nodes
    pub dims: Option<(usize, usize)>,
    /// Position of a row/column inside its parent aggregate
    pub index: Option<usize>,
}

/// One expression tree node.
#[derive(Debug, Clone)]
pub struct Node {
    pub op: Op,
    /// Literal payload for `Num`/`Var` leaves
    pub literal: Option<String>,
    pub args: Vec<Node>,
    pub meta: Meta,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.literal == other.literal && self.args == other.args
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.op.hash(state);
        self.literal.hash(state);
        self.args.len().hash(state);
        for arg in &self.args {
            arg.hash(state);
        }
    }
}

impl Node {
    /// Generic constructor.
    pub fn new(op: Op, args: Vec<Node>) -> Node {
        Node {
            op,
            literal: None,
            args,
            meta: Meta::default(),
        }
    }

    /// Variable leaf.
    pub fn var(name: impl Into<String>) -> Node {
        Node {
            op: Op::Var,
            literal: Some(name.into()),
            args: Vec::new(),
            meta: Meta::default(),
        }
    }

    /// Plain number leaf with the format derived from the literal.
    pub fn num(value: impl Into<String>) -> Node {
        let value = value.into();
        let format = if value.contains('.') {
            NumberFormat::Decimal
        } else {
            NumberFormat::Integer
        };
        let mut node = Node {
            op: Op::Num,
            literal: Some(value),
            args: Vec::new(),
            meta: Meta::default(),
        };
        node.meta.number_format = Some(format);
        node
    }

    /// Unary node. The arity is the caller's contract; construction cannot
    /// fail.
    pub fn unary(op: Op, arg: Node) -> Node {
        Node::new(op, vec![arg])
    }

    /// N-ary node; with `flatten`, children that carry the same operator are
    /// spliced into the new argument list.
    pub fn binary(op: Op, args: Vec<Node>, flatten: bool) -> Node {
        let mut aa = Vec::with_capacity(args.len());
        for n in args {
            if flatten && n.op == op {
                aa.extend(n.args);
            } else {
                aa.push(n);
            }
        }
        Node::new(op, aa)
    }

    pub fn multiply(args: Vec<Node>) -> Node {
        Node::binary(Op::Mul, args, false)
    }

    /// The literal `1`.
    pub fn one() -> Node {
        Node::num("1")
    }

    /// The literal `-1` as a unary minus.
    pub fn minus_one() -> Node {
        Node::unary(Op::Sub, Node::num("1"))
    }

    /// Placeholder node for empty input.
    pub fn none() -> Node {
        Node::unary(Op::None, Node::num("0"))
    }

    /// Empty-variable placeholder used in non-strict error recovery.
    pub fn empty_var() -> Node {
        Node::var("")
    }

    /// Fresh deep copy. The parser reuses the shared middle operand of a
    /// chained comparison through this, so later in-place flag updates on one
    /// comparison cannot leak into the other.
    pub fn reify(&self) -> Node {
        self.clone()
    }

    pub fn is_num(&self) -> bool {
        self.op == Op::Num
    }

    pub fn is_var(&self) -> bool {
        self.op == Op::Var
    }

    pub fn is_var_named(&self, name: &str) -> bool {
        self.op == Op::Var && self.literal.as_deref() == Some(name)
    }

    pub fn is_integer_literal(&self) -> bool {
        self.op == Op::Num && self.meta.number_format == Some(NumberFormat::Integer)
    }

    pub fn is_decimal_literal(&self) -> bool {
        self.op == Op::Num && self.meta.number_format == Some(NumberFormat::Decimal)
    }

    /// `1` literal.
    pub fn is_one(&self) -> bool {
        self.op == Op::Num && self.literal.as_deref() == Some("1")
    }

    /// Unary `-1`.
    pub fn is_minus_one(&self) -> bool {
        self.op == Op::Sub && self.args.len() == 1 && self.args[0].is_one()
    }

    /// Integer-over-integer fraction.
    pub fn is_simple_fraction(&self) -> bool {
        self.op == Op::Frac
            && self.args.len() == 2
            && self.args[0].is_integer_literal()
            && self.args[1].is_integer_literal()
    }

    /// Leading-negative detection used by the mixed-fraction and scientific
    /// rewrites.
    pub fn is_neg(&self) -> bool {
        match self.args.len() {
            1 => {
                self.op == Op::Sub
                    || (self.op == Op::Num
                        && self
                            .literal
                            .as_deref()
                            .map(|s| s.starts_with('-'))
                            .unwrap_or(false))
            }
            _ => self.op == Op::Mul && self.args.first().map(Node::is_neg).unwrap_or(false),
        }
    }

    pub fn has_brackets(&self) -> bool {
        self.meta.lbrk.is_some()
    }

    /// Numeric inverse: pushes the sign into a leading multiplication factor
    /// or a reciprocal power base, otherwise wraps in unary minus.
    pub fn negate(self) -> Node {
        match self.op {
            Op::Mul if !self.args.is_empty() => {
                let mut args = self.args;
                let first = args.remove(0).negate();
                let mut out = vec![first];
                out.extend(args);
                Node::multiply(out)
            }
            Op::Pow if self.args.len() == 2 && self.args[1].is_minus_one() => {
                let mut args = self.args;
                let exponent = args.pop().unwrap_or_else(Node::minus_one);
                let base = args.pop().unwrap_or_else(Node::one).negate();
                Node::new(Op::Pow, vec![base, exponent])
            }
            _ => Node::unary(Op::Sub, self),
        }
    }

    /// Whether this node is a text leaf produced by translation.
    pub fn is_text_leaf(&self) -> bool {
        self.op == Op::Var && self.args.is_empty()
    }
}

/// Precedence rank used for parenthesization during translation. The table is
/// fixed: disjunction < conjunction < equality < relational < additive <
/// multiplicative/fraction < exponent; the tightest binds highest. Ranks 1
/// and 2 are reserved for the logical connectives, which never reach the
/// parser but keep rule data expressible.
pub fn precedence(op: Op) -> u8 {
    match op {
        Op::Eql | Op::Ne | Op::Approx | Op::RightArrow => 3,
        Op::Lt | Op::Gt | Op::Le | Op::Ge | Op::In | Op::To => 4,
        Op::Add | Op::Sub | Op::Pm | Op::Backslash => 5,
        Op::Mul | Op::Times | Op::Frac | Op::Div | Op::Colon => 6,
        _ => 7,
    }
}

/// Is `child` lower precedence than `parent`?
pub fn is_lower_precedence(parent: &Node, child: &Node) -> bool {
    precedence(child.op) < precedence(parent.op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality_ignores_metadata() {
        let mut a = Node::num("2");
        let b = Node::num("2");
        a.meta.is_implicit = true;
        a.meta.lbrk = Some(Bracket::Paren);
        assert_eq!(a, b);
    }

    #[test]
    fn test_binary_flatten() {
        let inner = Node::binary(Op::Add, vec![Node::num("1"), Node::num("2")], false);
        let outer = Node::binary(Op::Add, vec![inner, Node::num("3")], true);
        assert_eq!(outer.args.len(), 3);
    }

    #[test]
    fn test_negate_multiplication() {
        let m = Node::multiply(vec![Node::num("2"), Node::var("x")]);
        let neg = m.negate();
        assert_eq!(neg.op, Op::Mul);
        assert_eq!(neg.args[0].op, Op::Sub);
    }

    #[test]
    fn test_reify_is_distinct() {
        let n = Node::var("y");
        let mut copy = n.reify();
        copy.meta.is_polynomial = true;
        assert!(!n.meta.is_polynomial);
        assert_eq!(n, copy);
    }

    #[test]
    fn test_precedence_ordering() {
        let add = Node::binary(Op::Add, vec![Node::num("1"), Node::num("2")], false);
        let mul = Node::binary(Op::Mul, vec![Node::num("1"), Node::num("2")], false);
        assert!(is_lower_precedence(&mul, &add));
        assert!(!is_lower_precedence(&add, &mul));
    }
}
