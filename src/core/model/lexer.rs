//! Scanner for the math markup grammar
//!
//! Turns a markup string into a token stream. Before scanning, an
//! invisible-character pass collapses control characters into single
//! separators (erasing them entirely between adjacent digits, so incidental
//! spacing never breaks digit grouping) while preserving a backslash-escaped
//! character. Backslash command words are resolved against a fixed command
//! table; anything unrecognized lexes as a plain variable, so arbitrary
//! Greek-letter-style identifiers pass through uniformly.

use crate::core::context::Context;
use crate::core::options::Options;
use crate::utils::error::{
    MathError, MathResult, E_INVALID_CHARACTER,
};
use phf::phf_map;

/// Lexical tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// End of stream
    Eos,
    Add,
    Sub,
    Pm,
    Mul,
    Div,
    Slash,
    Colon,
    Caret,
    Underscore,
    Percent,
    Bang,
    Qmark,
    Comma,
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
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    VerticalBar,
    /// Numeric literal; lexeme holds the raw digits and separators
    Num,
    /// Identifier; lexeme holds the name (commands keep their backslash)
    Var,
    /// `\type{..}`; lexeme holds the annotation text
    TypeName,
    Frac,
    Sqrt,
    Vec,
    Abs,
    Overline,
    Dot,
    MathField,
    Overset,
    Underset,
    Mathbf,
    Exists,
    Forall,
    Lim,
    Exp,
    Sum,
    Int,
    Prod,
    Molecule,
    Binom,
    Begin,
    End,
    NewRow,
    NewCol,
    Backslash,
}

/// Human-readable token name for diagnostics.
pub fn token_name(tok: Token) -> &'static str {
    match tok {
        Token::Eos => "EOS",
        Token::Add => "+",
        Token::Sub => "-",
        Token::Pm => "\\pm",
        Token::Mul => "*",
        Token::Div => "\\div",
        Token::Slash => "/",
        Token::Colon => ":",
        Token::Caret => "^",
        Token::Underscore => "_",
        Token::Percent => "%",
        Token::Bang => "!",
        Token::Qmark => "?",
        Token::Comma => ",",
        Token::Eql => "=",
        Token::Ne => "\\ne",
        Token::Approx => "\\approx",
        Token::Lt => "<",
        Token::Le => "<=",
        Token::Gt => ">",
        Token::Ge => ">=",
        Token::In => "\\in",
        Token::To => "\\to",
        Token::RightArrow => "->",
        Token::LeftParen => "(",
        Token::RightParen => ")",
        Token::LeftBracket => "[",
        Token::RightBracket => "]",
        Token::LeftBrace => "{",
        Token::RightBrace => "}",
        Token::VerticalBar => "|",
        Token::Num => "number",
        Token::Var => "identifier",
        Token::TypeName => "\\type",
        Token::Frac => "\\frac",
        Token::Sqrt => "\\sqrt",
        Token::Vec => "\\vec",
        Token::Abs => "\\abs",
        Token::Overline => "\\overline",
        Token::Dot => "\\dot",
        Token::MathField => "\\MathQuillMathField",
        Token::Overset => "\\overset",
        Token::Underset => "\\underset",
        Token::Mathbf => "\\mathbf",
        Token::Exists => "\\exists",
        Token::Forall => "\\forall",
        Token::Lim => "\\lim",
        Token::Exp => "\\exp",
        Token::Sum => "\\sum",
        Token::Int => "\\int",
        Token::Prod => "\\prod",
        Token::Molecule => "\\M",
        Token::Binom => "\\binom",
        Token::Begin => "\\begin",
        Token::End => "\\end",
        Token::NewRow => "\\\\",
        Token::NewCol => "&",
        Token::Backslash => "\\backslash",
    }
}

/// Command classification in the fixed command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Tok(Token),
    /// Text annotation command; brace content becomes a variable lexeme
    Text,
    /// Type annotation command
    Type,
    /// Pure spacing, erased
    Whitespace,
}

/// Fixed backslash-command table. Commands absent from the table lex as
/// plain variables.
static COMMANDS: phf::Map<&'static str, Command> = phf_map! {
    "\\cdot" => Command::Tok(Token::Mul),
    "\\times" => Command::Tok(Token::Mul),
    "\\div" => Command::Tok(Token::Div),
    "\\dfrac" => Command::Tok(Token::Frac),
    "\\frac" => Command::Tok(Token::Frac),
    "\\sqrt" => Command::Tok(Token::Sqrt),
    "\\vec" => Command::Tok(Token::Vec),
    "\\pm" => Command::Tok(Token::Pm),
    "\\left" => Command::Whitespace,
    "\\right" => Command::Whitespace,
    "\\big" => Command::Whitespace,
    "\\Big" => Command::Whitespace,
    "\\bigg" => Command::Whitespace,
    "\\Bigg" => Command::Whitespace,
    "\\quad" => Command::Whitespace,
    "\\qquad" => Command::Whitespace,
    "\\text" => Command::Text,
    "\\textrm" => Command::Text,
    "\\textit" => Command::Text,
    "\\textbf" => Command::Text,
    "\\lt" => Command::Tok(Token::Lt),
    "\\le" => Command::Tok(Token::Le),
    "\\leq" => Command::Tok(Token::Le),
    "\\gt" => Command::Tok(Token::Gt),
    "\\ge" => Command::Tok(Token::Ge),
    "\\geq" => Command::Tok(Token::Ge),
    "\\ne" => Command::Tok(Token::Ne),
    "\\neq" => Command::Tok(Token::Ne),
    "\\approx" => Command::Tok(Token::Approx),
    "\\exists" => Command::Tok(Token::Exists),
    "\\in" => Command::Tok(Token::In),
    "\\forall" => Command::Tok(Token::Forall),
    "\\lim" => Command::Tok(Token::Lim),
    "\\exp" => Command::Tok(Token::Exp),
    "\\to" => Command::Tok(Token::To),
    "\\sum" => Command::Tok(Token::Sum),
    "\\int" => Command::Tok(Token::Int),
    "\\prod" => Command::Tok(Token::Prod),
    "\\%" => Command::Tok(Token::Percent),
    "\\rightarrow" => Command::Tok(Token::RightArrow),
    "\\longrightarrow" => Command::Tok(Token::RightArrow),
    "\\binom" => Command::Tok(Token::Binom),
    "\\begin" => Command::Tok(Token::Begin),
    "\\end" => Command::Tok(Token::End),
    "\\colon" => Command::Tok(Token::Colon),
    "\\vert" => Command::Tok(Token::VerticalBar),
    "\\lvert" => Command::Tok(Token::VerticalBar),
    "\\rvert" => Command::Tok(Token::VerticalBar),
    "\\mid" => Command::Tok(Token::VerticalBar),
    "\\type" => Command::Type,
    "\\overline" => Command::Tok(Token::Overline),
    "\\overset" => Command::Tok(Token::Overset),
    "\\underset" => Command::Tok(Token::Underset),
    "\\backslash" => Command::Tok(Token::Backslash),
    "\\mathbf" => Command::Tok(Token::Mathbf),
    "\\abs" => Command::Tok(Token::Abs),
    "\\dot" => Command::Tok(Token::Dot),
    "\\M" => Command::Tok(Token::Molecule),
    "\\MathQuillMathField" => Command::Tok(Token::MathField),
};

fn is_control(c: char) -> bool {
    matches!(c as u32, 0x0001..=0x001F | 0x007F..=0x009F)
}

/// Invisible-character pass: collapse control-character runs to a single
/// separator, erase the separator entirely when it stands between digits,
/// and keep the character following a backslash untouched.
pub fn strip_invisible(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if is_control(c) {
            while i < chars.len() && is_control(chars[i]) {
                i += 1;
            }
            let prev_digit = out.chars().last().map_or(false, |p| p.is_ascii_digit());
            let next_digit = i < chars.len() && chars[i].is_ascii_digit();
            if !(prev_digit && next_digit) && !out.ends_with(' ') {
                out.push('\t');
            }
            continue;
        }
        if c == '\\' {
            out.push(c);
            i += 1;
            if i < chars.len() {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Scanner options controlling one token fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// After `^`/`_` a single digit is one token
    pub one_char_token: bool,
}

/// The scanner. One instance per parse; separator configuration is captured
/// from the context at construction, where a decimal/thousands conflict is a
/// fatal configuration error even if option validation was skipped.
#[derive(Debug)]
pub struct Scanner {
    src: Vec<char>,
    cur: usize,
    lexeme: String,
    decimal_separators: Vec<char>,
    thousands_separators: Option<Vec<char>>,
    last_thousands: Option<char>,
    ignore_text: bool,
    /// Known multi-character identifier names, snapshotted from the
    /// environment; drives longest-match identifier extension
    identifiers: Vec<String>,
}

impl Scanner {
    pub fn new(src: &str, ctx: &Context) -> MathResult<Scanner> {
        let options: &Options = ctx.options();
        options.check_separator_conflict()?;
        Ok(Scanner {
            src: strip_invisible(src).chars().collect(),
            cur: 0,
            lexeme: String::new(),
            decimal_separators: options.decimal_separators(),
            thousands_separators: options.thousands_separators(),
            last_thousands: None,
            ignore_text: options.ignore_text,
            identifiers: ctx.identifier_names(),
        })
    }

    /// Current scan position (character offset into the preprocessed input).
    pub fn pos(&self) -> usize {
        self.cur
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn take_lexeme(&mut self) -> String {
        std::mem::take(&mut self.lexeme)
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.cur).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.cur + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.cur += 1;
        }
        c
    }

    fn rest_starts_with(&self, needle: &str) -> bool {
        needle
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn is_decimal_separator(&self, c: char) -> bool {
        self.decimal_separators.contains(&c)
    }

    /// Thousands separator match, constrained to the separator already in
    /// use within the current literal.
    fn match_thousands(&mut self, c: char) -> bool {
        let seps = match &self.thousands_separators {
            Some(s) => s,
            None => return false,
        };
        match self.last_thousands {
            Some(last) => c == last,
            None => {
                if seps.contains(&c) {
                    self.last_thousands = Some(c);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Fetch the next token, skipping whitespace and erased commands.
    pub fn next_token(&mut self, opts: ScanOptions) -> MathResult<Token> {
        self.lexeme.clear();
        while let Some(c) = self.bump() {
            match c {
                ' ' | '\t' | '\n' | '\r' => continue,
                '&' => {
                    if self.rest_starts_with("nbsp;") {
                        self.cur += 5;
                        continue;
                    }
                    return Ok(Token::NewCol);
                }
                '\\' => match self.scan_command()? {
                    Some(tok) => return Ok(tok),
                    None => {
                        self.lexeme.clear();
                        continue;
                    }
                },
                '-' => {
                    if self.peek() == Some('>') {
                        self.cur += 1;
                        return Ok(Token::RightArrow);
                    }
                    return Ok(Token::Sub);
                }
                '!' => {
                    if self.peek() == Some('=') {
                        self.cur += 1;
                        return Ok(Token::Ne);
                    }
                    return Ok(Token::Bang);
                }
                '<' => {
                    if self.peek() == Some('=') {
                        self.cur += 1;
                        return Ok(Token::Le);
                    }
                    return Ok(Token::Lt);
                }
                '>' => {
                    if self.peek() == Some('=') {
                        self.cur += 1;
                        return Ok(Token::Ge);
                    }
                    return Ok(Token::Gt);
                }
                '+' => return Ok(Token::Add),
                '*' => return Ok(Token::Mul),
                '/' => return Ok(Token::Slash),
                ':' => return Ok(Token::Colon),
                '^' => return Ok(Token::Caret),
                '_' => return Ok(Token::Underscore),
                '%' => return Ok(Token::Percent),
                '?' => return Ok(Token::Qmark),
                ',' => return Ok(Token::Comma),
                '=' => return Ok(Token::Eql),
                '(' => return Ok(Token::LeftParen),
                ')' => return Ok(Token::RightParen),
                '[' => return Ok(Token::LeftBracket),
                ']' => return Ok(Token::RightBracket),
                '{' => return Ok(Token::LeftBrace),
                '}' => return Ok(Token::RightBrace),
                '|' => return Ok(Token::VerticalBar),
                '$' => {
                    self.lexeme.push('$');
                    return Ok(Token::Var);
                }
                _ => {
                    if c.is_ascii_alphabetic() || c == '\'' {
                        return Ok(self.scan_identifier(c));
                    }
                    if c.is_ascii_digit() || self.is_decimal_separator(c) {
                        if opts.one_char_token {
                            self.lexeme.push(c);
                            return Ok(Token::Num);
                        }
                        return Ok(self.scan_number(c));
                    }
                    return Err(MathError::parse(
                        E_INVALID_CHARACTER,
                        format!("Invalid character '{}' ({}) in input.", c, c as u32),
                        self.cur,
                    ));
                }
            }
        }
        Ok(Token::Eos)
    }

    /// Scan digits plus decimal/thousands separators. A thousands separator
    /// is consumed only when a digit follows it; position checks happen when
    /// the literal becomes a node.
    fn scan_number(&mut self, first: char) -> Token {
        self.last_thousands = None;
        self.lexeme.push(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || self.is_decimal_separator(c) {
                self.lexeme.push(c);
                self.cur += 1;
            } else if self.peek_at(1).map_or(false, |n| n.is_ascii_digit())
                && self.match_thousands(c)
            {
                self.lexeme.push(c);
                self.cur += 1;
            } else {
                break;
            }
        }
        // A lone separator before \overline or \dot reads as "0."
        if self.lexeme.len() == 1
            && self.is_decimal_separator(first)
            && self.peek() == Some('\\')
            && (self
                .src
                .get(self.cur + 1..)
                .map_or(false, |rest| starts_with_str(rest, "overline") || starts_with_str(rest, "dot")))
        {
            self.lexeme = "0.".to_string();
        }
        Token::Num
    }

    /// Scan an identifier: single letters always stand alone unless a longer
    /// known identifier (unit name, declared type name) extends them; the
    /// longest match wins. Trailing primes attach to the name.
    fn scan_identifier(&mut self, first: char) -> Token {
        self.lexeme.push(first);
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            let mut candidate = self.lexeme.clone();
            candidate.push(c);
            if !self.identifiers.iter().any(|n| n.starts_with(&candidate)) {
                break;
            }
            self.lexeme.push(c);
            self.cur += 1;
        }
        while self.peek() == Some('\'') {
            self.lexeme.push('\'');
            self.cur += 1;
        }
        Token::Var
    }

    /// Scan the command word after a backslash. Returns `None` for erased
    /// whitespace commands.
    fn scan_command(&mut self) -> MathResult<Option<Token>> {
        self.lexeme.push('\\');
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };
        match c {
            '\\' => {
                self.cur += 1;
                return Ok(Some(Token::NewRow));
            }
            '{' | '|' | '}' => {
                // Escaped bracket; the backslash is erased.
                self.cur += 1;
                self.lexeme.clear();
                return Ok(Some(match c {
                    '{' => Token::LeftBrace,
                    '|' => Token::VerticalBar,
                    _ => Token::RightBrace,
                }));
            }
            '$' => {
                self.cur += 1;
                self.lexeme = "$".to_string();
                return Ok(Some(Token::Var));
            }
            '%' => {
                self.cur += 1;
                return Ok(Some(Token::Percent));
            }
            ' ' | ':' | ';' | ',' | '!' => {
                self.cur += 1;
                return Ok(None);
            }
            _ => {}
        }
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            self.lexeme.push(c);
            self.cur += 1;
        }
        match COMMANDS.get(self.lexeme.as_str()).copied() {
            None => Ok(Some(Token::Var)), // e.g. \theta
            Some(Command::Tok(tok)) => Ok(Some(tok)),
            Some(Command::Whitespace) => Ok(None),
            Some(Command::Text) => {
                let content = self.scan_braced_text();
                if content.is_empty() || self.ignore_text {
                    Ok(None)
                } else {
                    self.lexeme = content;
                    Ok(Some(Token::Var))
                }
            }
            Some(Command::Type) => {
                self.lexeme = self.scan_braced_text();
                Ok(Some(Token::TypeName))
            }
        }
    }

    /// Capture `{...}` content with spaces and `&nbsp;` entities stripped.
    fn scan_braced_text(&mut self) -> String {
        while let Some(c) = self.bump() {
            if c == '{' {
                break;
            }
        }
        let mut content = String::new();
        while let Some(c) = self.bump() {
            match c {
                '}' => break,
                '&' if self.rest_starts_with("nbsp;") => {
                    self.cur += 5;
                }
                ' ' | '\t' => {}
                _ => content.push(c),
            }
        }
        content
    }
}

fn starts_with_str(haystack: &[char], needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(i, c)| haystack.get(i) == Some(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Context;

    fn scan_all(src: &str) -> Vec<Token> {
        let ctx = Context::default();
        let mut scanner = Scanner::new(src, &ctx).unwrap();
        let mut out = Vec::new();
        loop {
            let tok = scanner.next_token(ScanOptions::default()).unwrap();
            if tok == Token::Eos {
                return out;
            }
            out.push(tok);
        }
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            scan_all("1 + 2"),
            vec![Token::Num, Token::Add, Token::Num]
        );
        assert_eq!(
            scan_all("a < b <= c"),
            vec![Token::Var, Token::Lt, Token::Var, Token::Le, Token::Var]
        );
        assert_eq!(scan_all("x -> y"), vec![Token::Var, Token::RightArrow, Token::Var]);
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            scan_all("\\frac{1}{2}"),
            vec![
                Token::Frac,
                Token::LeftBrace,
                Token::Num,
                Token::RightBrace,
                Token::LeftBrace,
                Token::Num,
                Token::RightBrace
            ]
        );
        // Spacing commands vanish.
        assert_eq!(scan_all("\\left( x \\right)"), vec![Token::LeftParen, Token::Var, Token::RightParen]);
    }

    #[test]
    fn test_unknown_command_is_variable() {
        let ctx = Context::default();
        let mut scanner = Scanner::new("\\theta", &ctx).unwrap();
        assert_eq!(scanner.next_token(ScanOptions::default()).unwrap(), Token::Var);
        assert_eq!(scanner.lexeme(), "\\theta");
    }

    #[test]
    fn test_invisible_characters() {
        assert_eq!(strip_invisible("1\u{0002}2"), "12");
        assert_eq!(strip_invisible("a\u{0002}\u{0003}b"), "a\tb");
        assert_eq!(strip_invisible("\\\u{0007}"), "\\\u{0007}");
    }

    #[test]
    fn test_primes() {
        let ctx = Context::default();
        let mut scanner = Scanner::new("x''", &ctx).unwrap();
        assert_eq!(scanner.next_token(ScanOptions::default()).unwrap(), Token::Var);
        assert_eq!(scanner.lexeme(), "x''");
    }

    #[test]
    fn test_illegal_character() {
        let ctx = Context::default();
        let mut scanner = Scanner::new("#", &ctx).unwrap();
        let err = scanner.next_token(ScanOptions::default()).unwrap_err();
        assert_eq!(err.code(), E_INVALID_CHARACTER);
    }

    #[test]
    fn test_text_capture() {
        let ctx = Context::default();
        let mut scanner = Scanner::new("\\text{miles per hour}", &ctx).unwrap();
        assert_eq!(scanner.next_token(ScanOptions::default()).unwrap(), Token::Var);
        assert_eq!(scanner.lexeme(), "milesperhour");
    }
}
