//! Default spoken-English rule table
//!
//! The table shipped with the crate and used by [`crate::speak`]. It is
//! ordinary rule-table JSON, so callers can extend or replace any part of it
//! through the `words`/`types`/`rules` options. Entry order is load-bearing:
//! the specific readings (mixed fractions, repeating decimals, unit
//! fractions, squared/cubed) sit above the generic shapes they refine.

use lazy_static::lazy_static;
use serde_json::{json, Value};

lazy_static! {
    pub static ref DEFAULT_TABLE: Value = json!({
        "words": {
            "\\pi": "pi",
            "\\theta": "theta",
            "\\infty": "infinity",
            "$": "dollars",
            "?": "blank",
            "\\degree": "degrees",
            "\\degree C": "degrees Celsius",
            "\\degree F": "degrees Fahrenheit",
            "\\degree K": "Kelvin"
        },
        "rules": {
            "?:mixedfraction": "%1 and %2",
            "?:decimal + \\overline{?}": {
                "%1 %2": { "\\overline{?}": "repeating %1" }
            },
            "?:decimal + \\dot{?}": {
                "%1 %2": { "\\dot{?}": "repeating %1" }
            },
            "?:decimal + (?)": {
                "%1 %2": { "(?)": "repeating %1" }
            },
            "?:scientific": "%1 times %2",
            "?:integer": "%1",
            "?:decimal": "%1",
            "\\frac{1}{2}": "1 half",
            "\\frac{1}{3}": "1 third",
            "\\frac{1}{4}": "1 fourth",
            "? + ?": "%1 plus %2",
            "? - ?": "%1 minus %2",
            "-?": "negative %1",
            "+?": "positive %1",
            "? \\pm ?": "%1 plus or minus %2",
            "\\pm ?": "plus or minus %1",
            "? \\backslash ?": "%1 set minus %2",
            "? \\cdot ?": "%1 times %2",
            "? ?": "%1 %2",
            "? \\div ?": "%1 divided by %2",
            "? / ?": "%1 over %2",
            "? : ?": "the ratio of %1 to %2",
            "?^2": "%1 squared",
            "?^3": "%1 cubed",
            "?^?": "%1 to the power of %2",
            "\\sqrt{?}": "the square root of %1",
            "\\sqrt[?]{?}": "the %2 root of %1",
            "|?|": "the absolute value of %1",
            "?!": "%1 factorial",
            "?\\%": "%1 percent",
            "? = ?": "%1 equals %2",
            "? != ?": "%1 is not equal to %2",
            "? \\approx ?": "%1 is approximately equal to %2",
            "? < ?": "%1 is less than %2",
            "? <= ?": "%1 is less than or equal to %2",
            "? > ?": "%1 is greater than %2",
            "? >= ?": "%1 is greater than or equal to %2",
            "? \\in ?": "%1 is in %2",
            "? \\to ?": "%1 approaches %2",
            "? -> ?": "%1 yields %2",
            "(?)": "open paren %1 close paren",
            "\\overline{?}": "%1 bar",
            "\\dot{?}": "%1 dot",
            "\\vec{?}": "vector %1",
            "?:matrix": {
                "the %M by %N matrix %*": {
                    "?:row": "row %*",
                    "?:column": "%*"
                }
            },
            "\\sum_{?}^{?} ?": "the sum from %1 to %2 of %3",
            "\\sum ?": "the sum of %1",
            "\\int_{?}^{?} ?": "the integral from %1 to %2 of %3",
            "\\int ?": "the integral of %1",
            "\\prod_{?}^{?} ?": "the product from %1 to %2 of %3",
            "\\prod ?": "the product of %1",
            "\\lim_{?} ?": "the limit as %1 of %2",
            "\\exists ?": "there exists %1",
            "\\forall ?": "for all %1",
            "\\exp ?": "the exponential of %1",
            "{?}": "the set %1"
        }
    });
}
