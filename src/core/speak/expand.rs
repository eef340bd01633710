//! Template expansion
//!
//! Substitutes placeholders into a matched template. Each placeholder form
//! replaces its first occurrence, mirroring how templates are written:
//!
//!   %%        the whole node, rendered through the template's own table
//!   %*        all translated arguments joined by single spaces
//!   %M / %N   row and column count of a matrix node
//!   %IP / %FP integer and fractional part of a decimal literal
//!   %1 .. %9  the translated argument at that position
//!
//! A template with `%1` and `%2` only also covers a flattened chain of more
//! than two operands; it is folded pairwise from the left, feeding each
//! partial rendering back in as the next `%1`.

/// Highest ordinal placeholder in a template string.
pub fn max_ordinal(text: &str) -> usize {
    let mut max = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            if let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                max = max.max(d as usize);
            }
        }
    }
    max
}

/// Everything a template may refer to.
#[derive(Debug, Default)]
pub struct ExpandInputs<'a> {
    /// Rendering of the whole node, for `%%`
    pub whole: Option<&'a str>,
    /// Translated arguments, in node order
    pub args: &'a [String],
    /// Matrix dimensions, for `%M`/`%N`
    pub dims: Option<(usize, usize)>,
    /// Integer and fractional part of a decimal literal
    pub decimal: Option<(&'a str, &'a str)>,
}

pub fn expand(text: &str, inputs: &ExpandInputs) -> String {
    if max_ordinal(text) == 2 && inputs.args.len() > 2 {
        let mut acc = expand_once(text, &inputs.args[..2], inputs);
        for arg in &inputs.args[2..] {
            let pair = [acc, arg.clone()];
            acc = expand_once(text, &pair, inputs);
        }
        acc
    } else {
        expand_once(text, inputs.args, inputs)
    }
}

fn expand_once(text: &str, args: &[String], inputs: &ExpandInputs) -> String {
    let mut out = text.to_string();
    if let Some(whole) = inputs.whole {
        out = out.replacen("%%", whole, 1);
    }
    if out.contains("%*") {
        out = out.replacen("%*", &args.join(" "), 1);
    }
    if let Some((rows, cols)) = inputs.dims {
        out = out.replacen("%M", &rows.to_string(), 1);
        out = out.replacen("%N", &cols.to_string(), 1);
    }
    if let Some((ip, fp)) = inputs.decimal {
        out = out.replacen("%IP", ip, 1);
        out = out.replacen("%FP", fp, 1);
    }
    for (i, arg) in args.iter().enumerate().take(9) {
        let marker = format!("%{}", i + 1);
        out = out.replacen(&marker, arg, 1);
    }
    out
}
