//! Built-in symbol environment
//!
//! Units, constants and known identifier names available to the lexer and
//! parser by default. Multi-character identifiers listed here are what the
//! lexer's longest-match extension runs against.

use phf::phf_map;

const K: f64 = 1000.0;
const C: f64 = 1e-2;
const M: f64 = 1e-3;
const MU: f64 = 1e-6;
const N: f64 = 1e-9;

/// A symbol known to the environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Symbol {
    /// Measurement unit with a scale factor over its base unit
    Unit { scale: f64, base: &'static str },
    /// Named constant
    Const { value: f64 },
    /// Known variable name (Greek letters and the like)
    Var,
    /// Matrix environment name for `\begin{..}`
    MatrixEnv,
    /// Special math symbol (e.g. the reals)
    Special { name: &'static str },
}

/// Default environment: metric/imperial units, time, currency, matrix
/// environment names, Greek letters.
pub static BUILTIN_SYMBOLS: phf::Map<&'static str, Symbol> = phf_map! {
    "g" => Symbol::Unit { scale: 1.0, base: "g" },
    "s" => Symbol::Unit { scale: 1.0, base: "s" },
    "m" => Symbol::Unit { scale: 1.0, base: "m" },
    "L" => Symbol::Unit { scale: 1.0, base: "L" },
    "kg" => Symbol::Unit { scale: K, base: "g" },
    "km" => Symbol::Unit { scale: K, base: "m" },
    "ks" => Symbol::Unit { scale: K, base: "s" },
    "kL" => Symbol::Unit { scale: K, base: "L" },
    "cg" => Symbol::Unit { scale: C, base: "g" },
    "cm" => Symbol::Unit { scale: C, base: "m" },
    "cs" => Symbol::Unit { scale: C, base: "s" },
    "cL" => Symbol::Unit { scale: C, base: "L" },
    "mg" => Symbol::Unit { scale: M, base: "g" },
    "mm" => Symbol::Unit { scale: M, base: "m" },
    "ms" => Symbol::Unit { scale: M, base: "s" },
    "mL" => Symbol::Unit { scale: M, base: "L" },
    "\\mug" => Symbol::Unit { scale: MU, base: "g" },
    "\\mum" => Symbol::Unit { scale: MU, base: "m" },
    "\\mus" => Symbol::Unit { scale: MU, base: "s" },
    "\\muL" => Symbol::Unit { scale: MU, base: "L" },
    "ng" => Symbol::Unit { scale: N, base: "g" },
    "nm" => Symbol::Unit { scale: N, base: "m" },
    "ns" => Symbol::Unit { scale: N, base: "s" },
    "nL" => Symbol::Unit { scale: N, base: "L" },
    "in" => Symbol::Unit { scale: 1.0 / 12.0, base: "ft" },
    "ft" => Symbol::Unit { scale: 1.0, base: "ft" },
    "yd" => Symbol::Unit { scale: 3.0, base: "ft" },
    "mi" => Symbol::Unit { scale: 5280.0, base: "ft" },
    "fl" => Symbol::Unit { scale: 1.0, base: "fl" },
    "cup" => Symbol::Unit { scale: 8.0, base: "fl" },
    "pt" => Symbol::Unit { scale: 16.0, base: "fl" },
    "qt" => Symbol::Unit { scale: 32.0, base: "fl" },
    "gal" => Symbol::Unit { scale: 128.0, base: "fl" },
    "oz" => Symbol::Unit { scale: 1.0 / 16.0, base: "lb" },
    "lb" => Symbol::Unit { scale: 1.0, base: "lb" },
    "st" => Symbol::Unit { scale: 1.0 / 1614.0, base: "lb" },
    "qtr" => Symbol::Unit { scale: 28.0, base: "lb" },
    "cwt" => Symbol::Unit { scale: 112.0, base: "lb" },
    "t" => Symbol::Unit { scale: 2240.0, base: "lb" },
    "$" => Symbol::Unit { scale: 1.0, base: "$" },
    "i" => Symbol::Unit { scale: 1.0, base: "i" },
    "min" => Symbol::Unit { scale: 60.0, base: "s" },
    "hr" => Symbol::Unit { scale: 3600.0, base: "s" },
    "day" => Symbol::Unit { scale: 86400.0, base: "s" },
    "\\radian" => Symbol::Unit { scale: 1.0, base: "radian" },
    "\\degree" => Symbol::Unit { scale: core::f64::consts::PI / 180.0, base: "radian" },
    "\\degree K" => Symbol::Unit { scale: 1.0, base: "\\degree K" },
    "\\degree C" => Symbol::Unit { scale: 1.0, base: "\\degree C" },
    "\\degree F" => Symbol::Unit { scale: 1.0, base: "\\degree F" },
    "R" => Symbol::Special { name: "reals" },
    "matrix" => Symbol::MatrixEnv,
    "pmatrix" => Symbol::MatrixEnv,
    "bmatrix" => Symbol::MatrixEnv,
    "Bmatrix" => Symbol::MatrixEnv,
    "vmatrix" => Symbol::MatrixEnv,
    "Vmatrix" => Symbol::MatrixEnv,
    "smallmatrix" => Symbol::MatrixEnv,
    "array" => Symbol::MatrixEnv,
    "\\alpha" => Symbol::Var,
    "\\beta" => Symbol::Var,
    "\\gamma" => Symbol::Var,
    "\\delta" => Symbol::Var,
    "\\epsilon" => Symbol::Var,
    "\\zeta" => Symbol::Var,
    "\\eta" => Symbol::Var,
    "\\theta" => Symbol::Var,
    "\\iota" => Symbol::Var,
    "\\kappa" => Symbol::Var,
    "\\lambda" => Symbol::Var,
    "\\mu" => Symbol::Const { value: MU },
    "\\nu" => Symbol::Var,
    "\\xi" => Symbol::Var,
    "\\pi" => Symbol::Const { value: core::f64::consts::PI },
    "\\rho" => Symbol::Var,
    "\\sigma" => Symbol::Var,
    "\\tau" => Symbol::Var,
    "\\upsilon" => Symbol::Var,
    "\\phi" => Symbol::Var,
    "\\chi" => Symbol::Var,
    "\\psi" => Symbol::Var,
    "\\omega" => Symbol::Var,
};
