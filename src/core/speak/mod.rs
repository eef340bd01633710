//! Rule-driven translation engine: table compilation, pattern matching,
//! template expansion and the tree visitor that ties them together.

pub mod expand;
pub mod matcher;
pub mod rules;
pub mod translator;

pub use rules::{ContextTag, RuleSet, Scope, Template};
pub use translator::{translate, translate_node};
