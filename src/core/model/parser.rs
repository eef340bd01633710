//! Recursive-descent parser
//!
//! Builds the expression tree from the token stream. The grammar is a fixed
//! precedence chain: comma list, equality chain, relational chain, additive,
//! multiplicative, fraction, subscript, unary, postfix, exponential, primary.
//! Implicit multiplication is resolved inside the multiplicative level, where
//! a sequence of disambiguation rules decides between mixed fractions,
//! repeating decimals, polynomial coefficients, scientific notation and plain
//! adjacency.

use crate::core::context::Context;
use crate::core::model::lexer::{token_name, ScanOptions, Scanner, Token};
use crate::core::model::{Bracket, Meta, Node, NumberFormat, Op};
use crate::utils::error::{
    MathError, MathResult, E_EXPECTED_FOUND, E_EXPRESSION_EXPECTED, E_EXTRA_CHARACTERS,
    E_INVALID_CHARACTER, E_MISPLACED_THOUSANDS, E_OPERATOR_EXPECTED, E_UNEXPECTED_CHARACTER,
};

/// Parse one complete expression. Empty input yields the `None` placeholder
/// node.
pub fn parse_expression(src: &str, ctx: &mut Context) -> MathResult<Node> {
    let mut parser = Parser::new(src, ctx)?;
    parser.expr()
}

struct Parser<'a> {
    ctx: &'a mut Context,
    scanner: Scanner,
    t0: (Token, String),
    t1: Option<(Token, String)>,
}

impl<'a> Parser<'a> {
    fn new(src: &str, ctx: &'a mut Context) -> MathResult<Parser<'a>> {
        let mut scanner = Scanner::new(src, ctx)?;
        let tok = scanner.next_token(ScanOptions::default())?;
        let lexeme = scanner.take_lexeme();
        Ok(Parser {
            ctx,
            scanner,
            t0: (tok, lexeme),
            t1: None,
        })
    }

    // ========================================================================
    // Token stream management
    // ========================================================================

    fn hd(&self) -> Token {
        self.t0.0
    }

    fn lexeme(&self) -> &str {
        &self.t0.1
    }

    fn next(&mut self, opts: ScanOptions) -> MathResult<()> {
        // A buffered lookahead was scanned with default options already.
        match self.t1.take() {
            Some(pair) => self.t0 = pair,
            None => {
                let tok = self.scanner.next_token(opts)?;
                self.t0 = (tok, self.scanner.take_lexeme());
            }
        }
        Ok(())
    }

    fn lookahead(&mut self) -> MathResult<Token> {
        if self.t1.is_none() {
            let tok = self.scanner.next_token(ScanOptions::default())?;
            self.t1 = Some((tok, self.scanner.take_lexeme()));
        }
        Ok(self.t1.as_ref().map(|p| p.0).unwrap_or(Token::Eos))
    }

    fn eat(&mut self, expected: Token, opts: ScanOptions) -> MathResult<()> {
        if self.hd() != expected {
            return Err(self.expected(token_name(expected)));
        }
        self.next(opts)
    }

    fn expected(&self, what: &str) -> MathError {
        MathError::expected_found(what, token_name(self.hd()), self.scanner.pos())
    }

    fn is_chem(&self) -> bool {
        self.ctx.is_chem_core()
    }

    // ========================================================================
    // Number literal validation
    // ========================================================================

    /// Validate a scanned numeric lexeme: thousands separators must fall on
    /// group boundaries, at most one decimal separator, and the literal is
    /// rewritten with separators erased and a canonical `.` decimal point.
    fn number_node(&mut self, raw: &str) -> MathResult<Node> {
        let options = self.ctx.options();
        let decimal_seps = options.decimal_separators();
        let thousands_seps = options.thousands_separators();
        let ignore_trailing_zeros = options.ignore_trailing_zeros;
        let pos = self.scanner.pos();

        if raw == "." {
            return Err(MathError::parse(
                E_INVALID_CHARACTER,
                format!("Invalid character '.' ({}) in input.", '.' as u32),
                pos,
            ));
        }
        let mut out = String::with_capacity(raw.len());
        let mut format = NumberFormat::Integer;
        let mut separator_count = 0usize;
        let mut thousands_count = 0usize;
        let mut last_separator_index: Option<usize> = None;
        let mut last_thousands: Option<char> = None;
        let mut last_significant_index: Option<usize> = None;
        let mut has_leading_zero = false;
        let mut chars_len = 0usize;
        for (i, ch) in raw.chars().enumerate() {
            chars_len = i + 1;
            let is_thousands = match &thousands_seps {
                Some(seps) => match last_thousands {
                    Some(last) => ch == last,
                    None => {
                        if seps.contains(&ch) && !decimal_seps.contains(&ch) {
                            last_thousands = Some(ch);
                            true
                        } else {
                            false
                        }
                    }
                },
                None => false,
            };
            if is_thousands {
                if separator_count > 0 && last_separator_index != Some(i.wrapping_sub(4))
                    || separator_count == 0 && i > 4
                {
                    return Err(MathError::parse(
                        E_MISPLACED_THOUSANDS,
                        "Misplaced thousands separator.",
                        pos,
                    ));
                }
                last_separator_index = Some(i);
                separator_count += 1;
                thousands_count += 1;
                // Separators are erased so 1,000 and 1000 are the same
                // literal.
            } else if decimal_seps.contains(&ch) {
                if format == NumberFormat::Decimal {
                    return Err(MathError::parse(
                        E_UNEXPECTED_CHARACTER,
                        format!("Unexpected character '{}' in '{}{}'.", ch, out, ch),
                        pos,
                    ));
                }
                format = NumberFormat::Decimal;
                if separator_count > 0 && last_separator_index != Some(i.wrapping_sub(4)) {
                    return Err(MathError::parse(
                        E_MISPLACED_THOUSANDS,
                        "Misplaced thousands separator.",
                        pos,
                    ));
                }
                if out == "0" {
                    has_leading_zero = true;
                }
                last_significant_index = Some(out.len());
                last_separator_index = Some(i);
                separator_count += 1;
                out.push('.');
            } else {
                if format == NumberFormat::Decimal && ch != '0' {
                    last_significant_index = Some(out.len());
                }
                out.push(ch);
            }
        }
        if format != NumberFormat::Decimal {
            if let Some(last) = last_separator_index {
                if last != chars_len.wrapping_sub(4) {
                    return Err(MathError::parse(
                        E_MISPLACED_THOUSANDS,
                        "Misplaced thousands separator.",
                        pos,
                    ));
                }
            }
        }
        let mut has_trailing_zero = false;
        if let Some(lsi) = last_significant_index {
            if lsi + 1 < out.len() {
                has_trailing_zero = true;
            }
            if ignore_trailing_zeros {
                out.truncate(lsi + 1);
                if out == "." {
                    out = "0".to_string();
                }
            }
        }
        let mut node = Node {
            op: Op::Num,
            literal: Some(out),
            args: Vec::new(),
            meta: Meta::default(),
        };
        node.meta.number_format = Some(format);
        node.meta.has_thousands_separator = thousands_count != 0;
        node.meta.has_leading_zero = has_leading_zero;
        node.meta.has_trailing_zero = has_trailing_zero;
        Ok(node)
    }

    // ========================================================================
    // Grammar, lowest precedence first
    // ========================================================================

    /// Entry point: full expression plus trailing-input check.
    fn expr(&mut self) -> MathResult<Node> {
        if self.hd() == Token::Eos {
            return Ok(Node::none());
        }
        let mut node = self.comma_expr()?;
        if node.meta.lbrk == Some(Bracket::Brace) && node.meta.rbrk == Some(Bracket::Brace) {
            // Top-level {..} is a set.
            node = Node::unary(Op::Set, node);
        }
        if self.hd() != Token::Eos {
            return Err(MathError::parse(
                E_EXTRA_CHARACTERS,
                format!(
                    "Extra characters in input at position {}, lexeme '{}'.",
                    self.scanner.pos(),
                    self.lexeme()
                ),
                self.scanner.pos(),
            ));
        }
        Ok(node)
    }

    fn comma_expr(&mut self) -> MathResult<Node> {
        let first = self.equal_expr()?;
        let mut args = vec![first];
        while self.hd() == Token::Comma {
            self.next(ScanOptions::default())?;
            args.push(self.equal_expr()?);
        }
        if args.len() > 1 {
            Ok(Node::new(Op::Comma, args))
        } else {
            Ok(args.remove(0))
        }
    }

    fn is_equality(t: Token) -> bool {
        matches!(t, Token::Eql | Token::Ne | Token::Approx)
    }

    /// `x = y = z` desugars to a comma group of pairwise equations; the
    /// shared middle operand is a fresh copy per equation.
    fn equal_expr(&mut self) -> MathResult<Node> {
        let mut expr = self.relational_expr()?;
        let mut args = Vec::new();
        loop {
            let t = self.hd();
            if !Self::is_equality(t) && t != Token::RightArrow {
                break;
            }
            self.next(ScanOptions::default())?;
            let rhs = self.additive_expr()?;
            let op = match t {
                Token::Eql => Op::Eql,
                Token::Ne => Op::Ne,
                Token::Approx => Op::Approx,
                _ => Op::RightArrow,
            };
            let next_lhs = rhs.reify();
            args.push(Node::new(op, vec![expr, rhs]));
            expr = next_lhs;
        }
        match args.len() {
            0 => Ok(expr),
            1 => Ok(args.remove(0)),
            _ => Ok(Node::new(Op::Comma, args)),
        }
    }

    fn is_relational(t: Token) -> bool {
        matches!(
            t,
            Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::In | Token::To
        )
    }

    fn relational_expr(&mut self) -> MathResult<Node> {
        let mut expr = self.additive_expr()?;
        let mut args = Vec::new();
        loop {
            let t = self.hd();
            if !Self::is_relational(t) {
                break;
            }
            self.next(ScanOptions::default())?;
            let rhs = self.additive_expr()?;
            let op = match t {
                Token::Lt => Op::Lt,
                Token::Le => Op::Le,
                Token::Gt => Op::Gt,
                Token::Ge => Op::Ge,
                Token::In => Op::In,
                _ => Op::To,
            };
            let next_lhs = rhs.reify();
            args.push(Node::new(op, vec![expr, rhs]));
            expr = next_lhs;
        }
        match args.len() {
            0 => Ok(expr),
            1 => Ok(args.remove(0)),
            _ => Ok(Node::new(Op::Comma, args)),
        }
    }

    fn is_additive(t: Token) -> bool {
        matches!(t, Token::Add | Token::Sub | Token::Pm | Token::Backslash)
    }

    fn additive_expr(&mut self) -> MathResult<Node> {
        let mut expr = self.multiplicative_expr()?;
        loop {
            let t = self.hd();
            if !Self::is_additive(t) {
                break;
            }
            self.next(ScanOptions::default())?;
            let rhs = self.multiplicative_expr()?;
            let op = match t {
                Token::Backslash => Op::Backslash,
                Token::Pm => Op::Pm,
                Token::Sub => Op::Sub,
                _ => Op::Add,
            };
            expr = Node::binary(op, vec![expr, rhs], false);
        }
        Ok(expr)
    }

    /// Tokens that terminate an implicit multiplication run.
    fn ends_factor_run(t: Token) -> bool {
        t == Token::Eos
            || Self::is_additive(t)
            || Self::is_relational(t)
            || Self::is_equality(t)
            || matches!(
                t,
                Token::Comma
                    | Token::RightBrace
                    | Token::RightParen
                    | Token::RightBracket
                    | Token::RightArrow
                    | Token::VerticalBar
                    | Token::NewRow
                    | Token::NewCol
                    | Token::End
            )
    }

    fn multiplicative_expr(&mut self) -> MathResult<Node> {
        self.ctx.step()?;
        let expr = self.fraction_expr()?;
        let mut args = if expr.op == Op::Mul && !expr.meta.is_binomial {
            expr.args
        } else {
            vec![expr]
        };
        loop {
            let t = self.hd();
            if Self::ends_factor_run(t) {
                break;
            }
            let explicit = matches!(t, Token::Mul | Token::Div | Token::Slash);
            if explicit {
                self.next(ScanOptions::default())?;
            }
            let mut expr = self.fraction_expr()?;
            if t == Token::Div {
                let lhs = args.pop().unwrap_or_else(Node::empty_var);
                expr = Node::new(Op::Div, vec![lhs, expr]);
            }
            if !explicit && !args.is_empty() {
                let prev = &args[args.len() - 1];
                if !expr.has_brackets()
                    && prev.is_num()
                    && !prev.has_brackets()
                    && expr.is_num()
                    && Self::repeating_decimal(prev, &expr).is_none()
                {
                    return Err(MathError::parse(
                        E_OPERATOR_EXPECTED,
                        "Expecting an operator between numbers.",
                        self.scanner.pos(),
                    ));
                }
            }
            if self.is_chem()
                && t == Token::LeftParen
                && args.last().map_or(false, |n| n.is_var_named("M"))
            {
                // M(x) is molar concentration in chemistry mode.
                args.pop();
                expr = Node::unary(Op::Molecule, expr);
            } else if !explicit {
                let mixed = args
                    .last()
                    .map_or(false, |prev| Self::is_mixed_fraction(prev, &expr));
                if mixed {
                    // 3 \frac{1}{2} reads as 3 + \frac{1}{2}
                    let whole = args.pop().unwrap_or_else(Node::empty_var);
                    if whole.is_neg() {
                        expr = Node::binary(Op::Mul, vec![Node::minus_one(), expr], false);
                    }
                    expr = Node::binary(Op::Add, vec![whole, expr], false);
                    expr.meta.is_mixed_fraction = true;
                } else if self.ctx.options().ignore_coefficient_one
                    && args.len() == 1
                    && (args[0].is_one() || args[0].is_minus_one())
                    && Self::is_polynomial_term(&args[0], &expr)
                {
                    // 1x reads as x
                    if args[0].is_one() {
                        args.pop();
                    } else {
                        args.pop();
                        expr = expr.negate();
                    }
                } else if let Some(rep) = args
                    .last()
                    .and_then(|prev| Self::repeating_decimal(prev, &expr))
                {
                    args.pop();
                    expr = rep;
                } else if !self.is_chem()
                    && args
                        .last()
                        .map_or(false, |prev| Self::is_polynomial_term(prev, &expr))
                {
                    // 2x, -3y; not CH in chemistry mode
                    expr.meta.is_polynomial = true;
                    let mut prev = args.pop().unwrap_or_else(Node::empty_var);
                    if !prev.meta.is_polynomial {
                        let was_implicit = prev.meta.is_implicit;
                        prev.meta.is_implicit = false;
                        expr = Node::binary(Op::Mul, vec![prev, expr], false);
                        expr.meta.is_implicit = was_implicit;
                    } else {
                        args.push(prev);
                    }
                } else {
                    // 2(x), (y+1)z
                    expr.meta.is_implicit = true;
                }
            } else if t == Token::Mul
                && args
                    .last()
                    .map_or(false, |prev| Self::is_scientific(prev, &expr))
            {
                // 1.2 \times 10^{-3}
                let mantissa = args.pop().unwrap_or_else(Node::empty_var);
                if mantissa.is_neg() {
                    expr = Node::binary(Op::Mul, vec![Node::minus_one(), expr], false);
                }
                expr = Node::binary(Op::Mul, vec![mantissa, expr], false);
                expr.meta.is_scientific = true;
            }
            // Merge a nested implicit polynomial product into the run.
            let merge = expr.op == Op::Mul
                && !expr.meta.is_scientific
                && !expr.meta.is_binomial
                && expr.meta.is_implicit
                && expr.meta.is_polynomial
                && args.last().map_or(false, |prev| {
                    !prev.meta.is_implicit && !prev.meta.is_polynomial
                });
            if merge {
                args.extend(expr.args);
            } else {
                args.push(expr);
            }
        }
        if args.len() > 1 {
            Ok(Node::multiply(args))
        } else {
            Ok(args.remove(0))
        }
    }

    fn is_mixed_fraction(n0: &Node, n1: &Node) -> bool {
        // 3\frac{1}{2} but not 3(\frac{1}{2})
        let n0 = if n0.op == Op::Sub && n0.args.len() == 1 {
            &n0.args[0]
        } else {
            n0
        };
        !n0.has_brackets() && !n1.has_brackets() && n0.is_num() && n1.is_simple_fraction()
    }

    fn is_polynomial_term(n0: &Node, n1: &Node) -> bool {
        // 3x but not 3(x)
        let n0 = if n0.op == Op::Sub && n0.args.len() == 1 {
            &n0.args[0]
        } else {
            n0
        };
        if n0.has_brackets() || n1.has_brackets() {
            return false;
        }
        n0.is_num() && n1.is_var()
            || n0.is_var() && n1.is_num()
            || n0.is_num() && n1.is_num()
            || n0.is_var() && n1.is_var()
            || n0.op == Op::Mul
                && n0.args.last().map_or(false, |n| n.meta.is_polynomial)
                && (n1.is_var() || n1.is_num())
    }

    /// Combine `3.` followed by `\overline{..}`, `\dot{..}` or a
    /// parenthesized integer into a repeating decimal.
    fn repeating_decimal(n0: &Node, n1: &Node) -> Option<Node> {
        if n0.has_brackets() {
            return None;
        }
        if !(n0.is_decimal_literal() || n0.is_var_named("?")) {
            return None;
        }
        let matches = if n1.meta.lbrk == Some(Bracket::Paren) {
            Self::is_integer_valued(n1)
        } else {
            !n1.has_brackets() && (n1.op == Op::Overline || n1.op == Op::Dot)
        };
        if !matches {
            return None;
        }
        let mut repetend = n1.clone();
        repetend.meta.is_repeating = true;
        let mut expr = Node::binary(Op::Add, vec![n0.clone(), repetend], false);
        expr.meta.number_format = Some(NumberFormat::Decimal);
        expr.meta.is_repeating = true;
        Some(expr)
    }

    fn is_integer_valued(node: &Node) -> bool {
        match node.op {
            Op::Num => node
                .literal
                .as_deref()
                .map_or(false, |s| s.parse::<i64>().is_ok()),
            _ => node
                .args
                .first()
                .map_or(false, Self::is_integer_valued),
        }
    }

    /// `1.2 \times 10^n`: single-digit mantissa (or one digit before the
    /// decimal point) against a power of ten with an integer exponent.
    fn is_scientific(a: &Node, e: &Node) -> bool {
        let mantissa_ok = a.is_num()
            && a.literal.as_deref().map_or(false, |s| {
                s.chars().count() == 1 || s.chars().nth(1) == Some('.')
            });
        if !mantissa_ok {
            return false;
        }
        e.op == Op::Pow
            && e.args.len() == 2
            && e.args[0].is_num()
            && e.args[0].literal.as_deref() == Some("10")
            && (e.args[1].is_integer_literal()
                || e.args[1].op == Op::Sub
                    && e.args[1].args.len() == 1
                    && e.args[1].args[0].is_integer_literal())
    }

    fn fraction_expr(&mut self) -> MathResult<Node> {
        let mut node = self.subscript_expr()?;
        loop {
            let t = self.hd();
            if t != Token::Slash && t != Token::Colon {
                break;
            }
            self.next(ScanOptions::default())?;
            let rhs = self.subscript_expr()?;
            let op = if t == Token::Slash { Op::Frac } else { Op::Colon };
            node = Node::new(op, vec![node, rhs]);
            node.meta.is_fraction = node.is_simple_fraction();
        }
        Ok(node)
    }

    fn subscript_expr(&mut self) -> MathResult<Node> {
        let base = self.unary_expr()?;
        if self.hd() != Token::Underscore {
            return Ok(base);
        }
        self.next(ScanOptions {
            one_char_token: true,
        })?;
        let sub = self.exponential_expr()?;
        if self.is_chem() && self.hd() == Token::LeftBrace {
            // C_2{}^3 reads as C_2^3
            self.eat(Token::LeftBrace, ScanOptions::default())?;
            self.eat(Token::RightBrace, ScanOptions::default())?;
        }
        Ok(Node::new(Op::Subscript, vec![base, sub]))
    }

    fn unary_expr(&mut self) -> MathResult<Node> {
        self.ctx.step()?;
        let one_char = ScanOptions {
            one_char_token: true,
        };
        match self.hd() {
            Token::Add => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Add, self.unary_expr()?))
            }
            Token::Sub => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Sub, self.unary_expr()?))
            }
            Token::Pm => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Pm, self.unary_expr()?))
            }
            Token::Underscore => {
                // _1, _1^2, _+^- (isotope/charge shorthand)
                self.next(one_char)?;
                let mut expr = self.sign_or_unary()?;
                expr = Node::unary(Op::Subscript, expr);
                if self.hd() == Token::Caret {
                    self.next(one_char)?;
                    let sup = self.sign_or_unary()?;
                    expr = Node::new(Op::Pow, vec![expr, sup]);
                }
                Ok(expr)
            }
            Token::Caret => {
                self.next(one_char)?;
                let expr = self.sign_or_unary()?;
                Ok(Node::unary(Op::Pow, expr))
            }
            Token::Var if self.lexeme() == "$" => {
                self.next(ScanOptions::default())?;
                if self.hd() != Token::Eos {
                    // $1 binds tighter than ordinary multiplication.
                    let amount = self.postfix_expr()?;
                    let mut expr = Node::multiply(vec![Node::var("$"), amount]);
                    expr.args[1].meta.is_polynomial = true;
                    Ok(expr)
                } else {
                    Ok(Node::var("$"))
                }
            }
            _ => self.postfix_expr(),
        }
    }

    /// `^+`/`^-` charge shorthand reads as 1; anything else is a unary
    /// expression.
    fn sign_or_unary(&mut self) -> MathResult<Node> {
        match self.hd() {
            Token::Add | Token::Sub => {
                self.next(ScanOptions::default())?;
                Ok(Node::one())
            }
            _ => self.unary_expr(),
        }
    }

    fn postfix_expr(&mut self) -> MathResult<Node> {
        let mut expr = self.exponential_expr()?;
        match self.hd() {
            Token::Percent => {
                self.next(ScanOptions::default())?;
                expr = Node::unary(Op::Percent, expr);
            }
            Token::Bang => {
                self.next(ScanOptions::default())?;
                expr = Node::unary(Op::Fact, expr);
            }
            t => {
                if t == Token::Var && self.lexeme() == "\\degree" {
                    self.next(ScanOptions::default())?;
                    expr = self.degree_suffix(expr)?;
                } else if self.is_chem()
                    && (t == Token::Add || t == Token::Sub)
                    && self.lookahead()? == Token::RightBrace
                {
                    // Trailing ion charge, e.g. 3+
                    self.next(ScanOptions::default())?;
                    let op = if t == Token::Add { Op::Add } else { Op::Sub };
                    expr = Node::unary(op, expr);
                }
            }
        }
        Ok(expr)
    }

    /// Fold a degree marker (optionally scaled K/C/F) into an implicit
    /// product with a degree unit-variable.
    fn degree_suffix(&mut self, expr: Node) -> MathResult<Node> {
        let unit = if self.hd() == Token::Var && matches!(self.lexeme(), "K" | "C" | "F") {
            let unit = format!("\\degree {}", self.lexeme());
            self.next(ScanOptions::default())?;
            unit
        } else {
            "\\degree".to_string()
        };
        let mut n = Node::multiply(vec![expr, Node::var(unit)]);
        n.meta.is_implicit = true;
        Ok(n)
    }

    fn exponential_expr(&mut self) -> MathResult<Node> {
        let one_char = ScanOptions {
            one_char_token: true,
        };
        let mut args = vec![self.primary_expr()?];
        while self.hd() == Token::Caret {
            self.next(one_char)?;
            let charge_base = args
                .first()
                .map_or(false, |n| self.is_math_symbol(n))
                || self.is_chem();
            if charge_base && matches!(self.hd(), Token::Add | Token::Sub) {
                // Na^+
                let op = if self.hd() == Token::Add {
                    Op::Add
                } else {
                    Op::Sub
                };
                self.next(ScanOptions::default())?;
                args.push(Node::unary(op, Node::one()));
            } else {
                let n = self.unary_expr()?;
                if n.is_var_named("\\circ") {
                    // 90^{\circ} reads as 90 degrees.
                    let base = args.pop().unwrap_or_else(Node::empty_var);
                    args.push(self.degree_suffix(base)?);
                } else {
                    args.push(n);
                }
            }
        }
        if args.len() > 1 {
            // Right-associative fold.
            let mut expo = args.pop().unwrap_or_else(Node::empty_var);
            while let Some(base) = args.pop() {
                expo = Node::new(Op::Pow, vec![base, expo]);
            }
            Ok(expo)
        } else {
            Ok(args.remove(0))
        }
    }

    fn is_math_symbol(&self, n: &Node) -> bool {
        use crate::data::symbols::Symbol;
        n.is_var()
            && n.literal
                .as_deref()
                .and_then(|name| self.ctx.lookup(name))
                .map_or(false, |sym| matches!(sym, Symbol::Special { .. }))
    }

    // ========================================================================
    // Primary expressions
    // ========================================================================

    fn primary_expr(&mut self) -> MathResult<Node> {
        self.ctx.step()?;
        match self.hd() {
            Token::Var => {
                let name = self.lexeme().to_string();
                self.next(ScanOptions::default())?;
                let mut node = Node::var(name);
                if self.hd() == Token::Underscore {
                    // Subscripts make multipart variable names.
                    self.next(ScanOptions {
                        one_char_token: true,
                    })?;
                    let sub = self.primary_expr()?;
                    node.args.push(sub);
                }
                if self.is_chem()
                    && self.hd() == Token::LeftBrace
                    && self.lookahead()? == Token::RightBrace
                {
                    self.eat(Token::LeftBrace, ScanOptions::default())?;
                    self.eat(Token::RightBrace, ScanOptions::default())?;
                }
                Ok(node)
            }
            Token::Num => {
                let raw = self.lexeme().to_string();
                let node = self.number_node(&raw)?;
                self.next(ScanOptions::default())?;
                Ok(node)
            }
            Token::TypeName => {
                let name = self.lexeme().to_string();
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Type, Node::var(name)))
            }
            tk @ (Token::LeftParen | Token::LeftBracket) => self.paren_expr(tk),
            Token::LeftBrace => self.brace_expr(),
            Token::Begin => {
                self.next(ScanOptions::default())?;
                let figure = self.brace_expr()?;
                let node = self.matrix_expr(&figure)?;
                self.eat(Token::End, ScanOptions::default())?;
                self.brace_expr()?;
                Ok(node)
            }
            Token::VerticalBar => self.abs_expr(),
            Token::Abs => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Abs, self.brace_expr()?))
            }
            Token::Frac => {
                self.next(ScanOptions::default())?;
                let num = self.brace_expr()?;
                let den = self.brace_expr()?;
                let mut node = Node::new(Op::Frac, vec![num, den]);
                node.meta.is_fraction = node.is_simple_fraction();
                Ok(node)
            }
            Token::Binom => {
                self.next(ScanOptions::default())?;
                let n = self.brace_expr()?;
                let k = self.brace_expr()?;
                // (n k) = n! (k!(n-k)!)^-1
                let num = Node::unary(Op::Fact, n.clone());
                let n_minus_k = Node::binary(Op::Add, vec![n, k.clone().negate()], false);
                let den = Node::new(
                    Op::Pow,
                    vec![
                        Node::binary(
                            Op::Mul,
                            vec![
                                Node::unary(Op::Fact, k),
                                Node::unary(Op::Fact, n_minus_k),
                            ],
                            false,
                        ),
                        Node::minus_one(),
                    ],
                );
                let mut node = Node::binary(Op::Mul, vec![num, den], false);
                node.meta.is_binomial = true;
                Ok(node)
            }
            Token::Sqrt => {
                self.next(ScanOptions::default())?;
                match self.hd() {
                    Token::LeftBracket => {
                        let root = self.bracket_expr()?;
                        let base = self.brace_expr()?;
                        Ok(Node::new(Op::Sqrt, vec![base, root]))
                    }
                    Token::LeftBrace => {
                        let base = self.brace_expr()?;
                        Ok(Node::new(Op::Sqrt, vec![base, Node::num("2")]))
                    }
                    _ => Err(self.expected("{ or [")),
                }
            }
            Token::Vec => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Vec, self.brace_expr()?))
            }
            Token::Lim => {
                self.next(ScanOptions::default())?;
                self.eat(Token::Underscore, ScanOptions::default())?;
                let bound = self.primary_expr()?;
                let body = self.primary_expr()?;
                Ok(Node::new(Op::Lim, vec![bound, body]))
            }
            tk @ (Token::Sum | Token::Int | Token::Prod) => {
                self.next(ScanOptions::default())?;
                let one_char = ScanOptions {
                    one_char_token: true,
                };
                let mut args = Vec::new();
                if self.hd() == Token::Underscore {
                    self.next(one_char)?;
                    args.push(self.primary_expr()?);
                    // A lower bound requires an upper bound.
                    self.eat(Token::Caret, one_char)?;
                    args.push(self.primary_expr()?);
                }
                args.push(self.comma_expr()?);
                let op = match tk {
                    Token::Sum => Op::Sum,
                    Token::Int => Op::Int,
                    _ => Op::Prod,
                };
                Ok(Node::new(op, args))
            }
            Token::Exists => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Exists, self.equal_expr()?))
            }
            Token::Forall => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Forall, self.comma_expr()?))
            }
            Token::Exp => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Exp, self.additive_expr()?))
            }
            Token::Molecule => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Molecule, self.multiplicative_expr()?))
            }
            Token::Overline => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Overline, self.brace_expr()?))
            }
            Token::Dot => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::Dot, self.brace_expr()?))
            }
            Token::MathField => {
                self.next(ScanOptions::default())?;
                Ok(Node::unary(Op::MathField, self.brace_expr()?))
            }
            tk @ (Token::Overset | Token::Underset) => {
                self.next(ScanOptions::default())?;
                let annotation = self.brace_expr()?;
                let mut operand = self.brace_expr()?;
                let op = if tk == Token::Overset {
                    Op::Overset
                } else {
                    Op::Underset
                };
                // The annotation rides along as an extra child.
                operand.args.push(Node::unary(op, annotation));
                Ok(operand)
            }
            Token::Mathbf => {
                // Erased.
                self.next(ScanOptions::default())?;
                self.brace_expr()
            }
            Token::Qmark => {
                self.next(ScanOptions::default())?;
                Ok(Node::var("?"))
            }
            tk => {
                if self.ctx.options().strict {
                    return Err(MathError::parse(
                        E_EXPRESSION_EXPECTED,
                        format!("Expression expected, '{}' found.", token_name(tk)),
                        self.scanner.pos(),
                    ));
                }
                Ok(Node::empty_var())
            }
        }
    }

    /// `1 & 2 \\ a & b` inside a `\begin{..matrix..}` environment. Rows and
    /// cells carry their position and the matrix its dimensions.
    fn matrix_expr(&mut self, figure: &Node) -> MathResult<Node> {
        let name = figure.literal.as_deref().unwrap_or("");
        if !name.contains("matrix") && name != "array" {
            return Err(MathError::parse(
                E_EXPECTED_FOUND,
                format!("Unrecognized environment name '{}'.", name),
                self.scanner.pos(),
            ));
        }
        let mut rows = vec![self.row_expr()?];
        while self.hd() == Token::NewRow {
            self.next(ScanOptions::default())?;
            rows.push(self.row_expr()?);
        }
        let mut cols = 0;
        for (i, row) in rows.iter_mut().enumerate() {
            row.meta.index = Some(i);
            cols = cols.max(row.args.len());
        }
        let mut node = Node::new(Op::Matrix, rows);
        node.meta.dims = Some((node.args.len(), cols));
        Ok(node)
    }

    fn row_expr(&mut self) -> MathResult<Node> {
        let mut cells = vec![self.equal_expr()?];
        while self.hd() == Token::NewCol {
            self.next(ScanOptions::default())?;
            cells.push(self.equal_expr()?);
        }
        let cols = cells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                let mut col = Node::unary(Op::Col, cell);
                col.meta.index = Some(i);
                col
            })
            .collect();
        Ok(Node::new(Op::Row, cols))
    }

    fn abs_expr(&mut self) -> MathResult<Node> {
        self.eat(Token::VerticalBar, ScanOptions::default())?;
        let e = self.additive_expr()?;
        self.eat(Token::VerticalBar, ScanOptions::default())?;
        Ok(Node::unary(Op::Abs, e))
    }

    fn brace_expr(&mut self) -> MathResult<Node> {
        self.eat(Token::LeftBrace, ScanOptions::default())?;
        let mut node = if self.hd() == Token::RightBrace {
            Node::new(Op::Comma, Vec::new())
        } else {
            self.comma_expr()?
        };
        self.eat(Token::RightBrace, ScanOptions::default())?;
        node.meta.lbrk = Some(Bracket::Brace);
        node.meta.rbrk = Some(Bracket::Brace);
        Ok(node)
    }

    fn bracket_expr(&mut self) -> MathResult<Node> {
        self.eat(Token::LeftBracket, ScanOptions::default())?;
        let e = self.comma_expr()?;
        self.eat(Token::RightBracket, ScanOptions::default())?;
        Ok(e)
    }

    /// `( expr )`, `[ expr ]` and the mixed interval forms `( expr ]`,
    /// `[ expr )`.
    fn paren_expr(&mut self, tk: Token) -> MathResult<Node> {
        self.eat(tk, ScanOptions::default())?;
        let (e, tk2) = if matches!(self.hd(), Token::RightParen | Token::RightBracket) {
            let tk2 = if tk == Token::LeftParen {
                Token::RightParen
            } else {
                Token::RightBracket
            };
            self.eat(tk2, ScanOptions::default())?;
            (Node::new(Op::Comma, Vec::new()), tk2)
        } else {
            let e = self.comma_expr()?;
            let tk2 = if self.hd() == Token::RightParen {
                Token::RightParen
            } else {
                Token::RightBracket
            };
            self.eat(tk2, ScanOptions::default())?;
            (e, tk2)
        };
        let mut node = Node::unary(Op::Paren, e);
        node.meta.lbrk = Some(if tk == Token::LeftParen {
            Bracket::Paren
        } else {
            Bracket::Square
        });
        node.meta.rbrk = Some(if tk2 == Token::RightParen {
            Bracket::Paren
        } else {
            Bracket::Square
        });
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Context;
    use serde_json::json;

    fn parse(src: &str) -> Node {
        let mut ctx = Context::default();
        parse_expression(src, &mut ctx).unwrap()
    }

    fn parse_with(src: &str, options: serde_json::Value) -> MathResult<Node> {
        use crate::core::options::Options;
        let mut ctx = Context::new(Options::from_json(&options).unwrap());
        parse_expression(src, &mut ctx)
    }

    #[test]
    fn test_additive() {
        let n = parse("1 + 2");
        assert_eq!(n.op, Op::Add);
        assert_eq!(n.args.len(), 2);
        assert_eq!(n.args[0], Node::num("1"));
    }

    #[test]
    fn test_precedence() {
        let n = parse("1 + 2 \\cdot 3");
        assert_eq!(n.op, Op::Add);
        assert_eq!(n.args[1].op, Op::Mul);
    }

    #[test]
    fn test_simple_fraction_flag() {
        let n = parse("\\frac{1}{2}");
        assert_eq!(n.op, Op::Frac);
        assert!(n.meta.is_fraction);
        let n = parse("\\frac{x}{2}");
        assert!(!n.meta.is_fraction);
    }

    #[test]
    fn test_power_right_associative() {
        let n = parse("2^3^4");
        assert_eq!(n.op, Op::Pow);
        assert_eq!(n.args[0], Node::num("2"));
        assert_eq!(n.args[1].op, Op::Pow);
    }

    #[test]
    fn test_polynomial_adjacency() {
        let n = parse("2x");
        assert_eq!(n.op, Op::Mul);
        assert!(n.args[1].meta.is_polynomial);
    }

    #[test]
    fn test_adjacent_numbers_fail() {
        let mut ctx = Context::default();
        let err = parse_expression("2 3", &mut ctx).unwrap_err();
        assert_eq!(err.code(), E_OPERATOR_EXPECTED);
    }

    #[test]
    fn test_mixed_fraction() {
        let n = parse("3\\frac{1}{2}");
        assert_eq!(n.op, Op::Add);
        assert!(n.meta.is_mixed_fraction);
        assert_eq!(n.args[0], Node::num("3"));
        assert_eq!(n.args[1].op, Op::Frac);
    }

    #[test]
    fn test_scientific() {
        let n = parse("1.2\\times10^3");
        assert_eq!(n.op, Op::Mul);
        assert!(n.meta.is_scientific);
    }

    #[test]
    fn test_chained_relation_reifies() {
        let n = parse("1 < x < 3");
        assert_eq!(n.op, Op::Comma);
        assert_eq!(n.args.len(), 2);
        assert_eq!(n.args[0].op, Op::Lt);
        assert_eq!(n.args[1].op, Op::Lt);
        assert_eq!(n.args[0].args[1], n.args[1].args[0]);
    }

    #[test]
    fn test_chained_equality() {
        let n = parse("a = b = c");
        assert_eq!(n.op, Op::Comma);
        assert_eq!(n.args.len(), 2);
        assert_eq!(n.args[0].op, Op::Eql);
    }

    #[test]
    fn test_matrix() {
        let n = parse("\\begin{pmatrix}1 & 2 \\\\ 3 & 4\\end{pmatrix}");
        assert_eq!(n.op, Op::Matrix);
        assert_eq!(n.meta.dims, Some((2, 2)));
        assert_eq!(n.args[0].op, Op::Row);
        assert_eq!(n.args[0].args[0].op, Op::Col);
    }

    #[test]
    fn test_unknown_environment() {
        let mut ctx = Context::default();
        assert!(parse_expression("\\begin{align}1\\end{align}", &mut ctx).is_err());
    }

    #[test]
    fn test_interval() {
        let n = parse("(1, 3]");
        assert_eq!(n.op, Op::Paren);
        assert_eq!(n.meta.lbrk, Some(Bracket::Paren));
        assert_eq!(n.meta.rbrk, Some(Bracket::Square));
        assert_eq!(n.args[0].op, Op::Comma);
    }

    #[test]
    fn test_top_level_set() {
        let n = parse("{1, 2, 3}");
        assert_eq!(n.op, Op::Set);
        assert_eq!(n.args[0].op, Op::Comma);
    }

    #[test]
    fn test_empty_input() {
        let n = parse("");
        assert_eq!(n.op, Op::None);
    }

    #[test]
    fn test_trailing_garbage() {
        let mut ctx = Context::default();
        let err = parse_expression("1 + 2 }", &mut ctx).unwrap_err();
        assert_eq!(err.code(), E_EXTRA_CHARACTERS);
    }

    #[test]
    fn test_sqrt_forms() {
        let n = parse("\\sqrt{4}");
        assert_eq!(n.op, Op::Sqrt);
        assert_eq!(n.args[1], Node::num("2"));
        let n = parse("\\sqrt[3]{8}");
        assert_eq!(n.args[1], Node::num("3"));
    }

    #[test]
    fn test_binomial_desugar() {
        let n = parse("\\binom{5}{2}");
        assert_eq!(n.op, Op::Mul);
        assert!(n.meta.is_binomial);
        assert_eq!(n.args[0].op, Op::Fact);
    }

    #[test]
    fn test_subscript_variable() {
        let n = parse("x_2");
        assert_eq!(n.op, Op::Var);
        assert_eq!(n.literal.as_deref(), Some("x"));
        assert_eq!(n.args.len(), 1);
        assert_eq!(n.args[0], Node::num("2"));
    }

    #[test]
    fn test_repeating_decimal() {
        let n = parse("3.\\overline{12}");
        assert_eq!(n.op, Op::Add);
        assert!(n.meta.is_repeating);
        assert_eq!(n.args[1].op, Op::Overline);
        assert!(n.args[1].meta.is_repeating);
    }

    #[test]
    fn test_degree() {
        let n = parse("90^{\\circ}");
        assert_eq!(n.op, Op::Mul);
        assert!(n.args[1].is_var_named("\\degree"));
    }

    #[test]
    fn test_percent_postfix() {
        let n = parse("10\\%");
        assert_eq!(n.op, Op::Percent);
    }

    #[test]
    fn test_question_mark_wildcard() {
        let n = parse("? + ?");
        assert_eq!(n.op, Op::Add);
        assert!(n.args[0].is_var_named("?"));
    }

    #[test]
    fn test_thousands_separators() {
        let n = parse_with("1,234,567", json!({"allowThousandsSeparator": true})).unwrap();
        assert_eq!(n.literal.as_deref(), Some("1234567"));
        assert!(n.meta.has_thousands_separator);
    }

    #[test]
    fn test_misplaced_thousands() {
        let err = parse_with("1,23,4", json!({"allowThousandsSeparator": true})).unwrap_err();
        assert_eq!(err.code(), E_MISPLACED_THOUSANDS);
    }

    #[test]
    fn test_trailing_zero_trimming() {
        let n = parse_with("1.500", json!({"ignoreTrailingZeros": true})).unwrap();
        assert_eq!(n.literal.as_deref(), Some("1.5"));
        assert!(n.meta.has_trailing_zero);
    }

    #[test]
    fn test_strict_rejects_unknown() {
        let err = parse_with("\\end", json!({"strict": true})).unwrap_err();
        assert_eq!(err.code(), E_EXPRESSION_EXPECTED);
    }

    #[test]
    fn test_ignore_coefficient_one() {
        let n = parse_with("1x", json!({"ignoreCoefficientOne": true})).unwrap();
        assert!(n.is_var_named("x"));
    }

    #[test]
    fn test_div_operator() {
        let n = parse("6 \\div 2");
        assert_eq!(n.op, Op::Div);
    }

    #[test]
    fn test_overset_annotation() {
        let n = parse("\\overset{a}{x}");
        assert!(n.is_var());
        assert_eq!(n.args.last().map(|a| a.op), Some(Op::Overset));
    }
}
