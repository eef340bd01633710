//! Translation context
//!
//! Carries the shared state every entry point threads through explicitly:
//! the symbol environment stack, the active options, and the operation
//! counter that bounds pathological inputs. There is no ambient global; one
//! `Context` belongs to one top-level call chain, and concurrent use means
//! one context per call.

use crate::core::options::Options;
use crate::data::symbols::{Symbol, BUILTIN_SYMBOLS};
use crate::utils::error::{MathError, MathResult};
use fxhash::FxHashMap;

/// Default liveness bound for one top-level operation.
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// One pushed environment frame of extra identifier bindings.
pub type EnvFrame = FxHashMap<String, Symbol>;

/// Explicit state threaded through parsing and translation.
#[derive(Debug, Clone)]
pub struct Context {
    options: Options,
    /// Dynamic frames, innermost last; the built-in table is the implicit
    /// base frame
    frames: Vec<EnvFrame>,
    steps: u64,
    step_limit: u64,
}

impl Default for Context {
    fn default() -> Self {
        Context::new(Options::default())
    }
}

impl Context {
    pub fn new(options: Options) -> Context {
        Context {
            options,
            frames: Vec::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Push `frame`, run `f`, pop the frame again. The pop happens on every
    /// exit path, including error propagation out of `f`.
    pub fn with_frame<R>(&mut self, frame: EnvFrame, f: impl FnOnce(&mut Context) -> R) -> R {
        self.frames.push(frame);
        let out = f(self);
        self.frames.pop();
        out
    }

    /// Look a symbol up, innermost frame first, then the built-in table.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        for frame in self.frames.iter().rev() {
            if let Some(sym) = frame.get(name) {
                return Some(*sym);
            }
        }
        BUILTIN_SYMBOLS.get(name).copied()
    }

    /// Whether any known identifier starts with `prefix`. Drives the lexer's
    /// longest-match extension of multi-character identifiers.
    pub fn has_identifier_prefix(&self, prefix: &str) -> bool {
        for frame in self.frames.iter().rev() {
            if frame.keys().any(|k| k.starts_with(prefix)) {
                return true;
            }
        }
        BUILTIN_SYMBOLS.keys().any(|k| k.starts_with(prefix))
    }

    /// All known identifier names, dynamic frames included. Snapshotted by
    /// the scanner for longest-match identifier extension.
    pub fn identifier_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_SYMBOLS
            .keys()
            .filter(|k| k.chars().next().map_or(false, |c| c.is_ascii_alphabetic()))
            .map(|k| k.to_string())
            .collect();
        for frame in &self.frames {
            names.extend(frame.keys().cloned());
        }
        names
    }

    /// Chemistry mode is active when the environment declares chemical
    /// elements.
    pub fn is_chem_core(&self) -> bool {
        self.lookup("Au").is_some()
    }

    /// Reset the operation counter for a fresh top-level call.
    pub fn reset_steps(&mut self) {
        self.steps = 0;
    }

    pub fn set_step_limit(&mut self, limit: u64) {
        self.step_limit = limit;
    }

    /// Account one internal step; aborts the operation once the configured
    /// liveness bound is exceeded.
    pub fn step(&mut self) -> MathResult<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            Err(MathError::too_long())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let ctx = Context::default();
        assert!(matches!(ctx.lookup("cm"), Some(Symbol::Unit { .. })));
        assert!(matches!(ctx.lookup("\\pi"), Some(Symbol::Const { .. })));
        assert!(ctx.lookup("zz").is_none());
        assert!(!ctx.is_chem_core());
    }

    #[test]
    fn test_frame_shadowing_and_pop() {
        let mut ctx = Context::default();
        let mut frame = EnvFrame::default();
        frame.insert("integer".to_string(), Symbol::Var);
        let found = ctx.with_frame(frame, |ctx| ctx.lookup("integer").is_some());
        assert!(found);
        assert!(ctx.lookup("integer").is_none());
    }

    #[test]
    fn test_identifier_prefix() {
        let ctx = Context::default();
        assert!(ctx.has_identifier_prefix("c"));
        assert!(ctx.has_identifier_prefix("cu")); // cup
        assert!(!ctx.has_identifier_prefix("cupcake"));
    }

    #[test]
    fn test_step_counter_aborts() {
        let mut ctx = Context::default();
        ctx.set_step_limit(3);
        assert!(ctx.step().is_ok());
        assert!(ctx.step().is_ok());
        assert!(ctx.step().is_ok());
        assert!(ctx.step().is_err());
        ctx.reset_steps();
        assert!(ctx.step().is_ok());
    }
}
